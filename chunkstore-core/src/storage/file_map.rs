//! Mapping of the logical address space onto backing files
//!
//! Files are laid out back to back in declaration order. A byte range of the
//! logical space resolves into per-file segments, clipped at file boundaries,
//! so a single chunk may straddle any number of files.

use std::ops::Range;
use std::path::{Path, PathBuf};

use super::StorageError;

/// A backing file and its position in the logical address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpec {
    pub path: PathBuf,
    /// Number of bytes this file contributes
    pub length: u64,
    /// Start of this file within the logical address space
    pub offset: u64,
}

impl FileSpec {
    /// End of this file within the logical address space (exclusive).
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Part of a logical byte range that lives in a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Index into the file map
    pub file_index: usize,
    /// Byte offset within the file
    pub file_offset: u64,
    /// Byte offset within the requested range
    pub range_offset: u64,
    pub length: u64,
}

impl Segment {
    /// Position of this segment inside a buffer holding the whole range.
    pub fn buffer_range(&self) -> Range<usize> {
        let start = self.range_offset as usize;
        start..start + self.length as usize
    }
}

/// Ordered backing files with cumulative offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMap {
    files: Vec<FileSpec>,
    total_length: u64,
}

impl FileMap {
    /// Builds the map from `(path, length)` pairs in address order.
    ///
    /// # Errors
    ///
    /// - `StorageError::InvalidConfig` - If there are no files or the lengths
    ///   overflow the address space
    pub fn new<I>(entries: I) -> Result<Self, StorageError>
    where
        I: IntoIterator<Item = (PathBuf, u64)>,
    {
        let mut files = Vec::new();
        let mut offset: u64 = 0;

        for (path, length) in entries {
            let end = offset
                .checked_add(length)
                .ok_or_else(|| StorageError::InvalidConfig {
                    reason: "total file length overflows".to_string(),
                })?;
            files.push(FileSpec {
                path,
                length,
                offset,
            });
            offset = end;
        }

        if files.is_empty() {
            return Err(StorageError::InvalidConfig {
                reason: "at least one backing file is required".to_string(),
            });
        }

        Ok(Self {
            files,
            total_length: offset,
        })
    }

    /// Single backing file. Without a length the file grows without bound.
    pub fn single(path: PathBuf, length: Option<u64>) -> Self {
        let length = length.filter(|&length| length > 0).unwrap_or(u64::MAX);
        Self {
            files: vec![FileSpec {
                path,
                length,
                offset: 0,
            }],
            total_length: length,
        }
    }

    pub fn files(&self) -> &[FileSpec] {
        &self.files
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|file| file.path.as_path())
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Splits `range` into per-file segments in file order.
    ///
    /// Zero-length files never produce a segment. An empty range yields no
    /// segments.
    ///
    /// # Errors
    ///
    /// - `StorageError::OutOfBounds` - If the range ends past the last file
    pub fn segments(&self, range: Range<u64>) -> Result<Vec<Segment>, StorageError> {
        if range.end > self.total_length || range.start > range.end {
            return Err(StorageError::OutOfBounds {
                start: range.start,
                end: range.end,
                total: self.total_length,
            });
        }

        // File ends are non-decreasing, so the first file ending after the
        // range start can be found by bisection.
        let first = self.files.partition_point(|file| file.end() <= range.start);

        let mut segments = Vec::new();
        let mut position = range.start;
        for (file_index, file) in self.files.iter().enumerate().skip(first) {
            if position >= range.end {
                break;
            }

            let segment_end = file.end().min(range.end);
            if segment_end <= position {
                continue;
            }

            segments.push(Segment {
                file_index,
                file_offset: position - file.offset,
                range_offset: position - range.start,
                length: segment_end - position,
            });
            position = segment_end;
        }

        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn map_of(lengths: &[u64]) -> FileMap {
        FileMap::new(
            lengths
                .iter()
                .enumerate()
                .map(|(i, &length)| (PathBuf::from(format!("file{i}")), length)),
        )
        .unwrap()
    }

    #[test]
    fn test_offsets_are_prefix_sums() {
        let map = map_of(&[5, 0, 7, 3]);

        let offsets: Vec<u64> = map.files().iter().map(|file| file.offset).collect();
        assert_eq!(offsets, vec![0, 5, 5, 12]);
        assert_eq!(map.total_length(), 15);
    }

    #[test]
    fn test_two_file_split() {
        let map = map_of(&[5, 5]);

        let segments = map.segments(0..10).unwrap();
        assert_eq!(
            segments,
            vec![
                Segment {
                    file_index: 0,
                    file_offset: 0,
                    range_offset: 0,
                    length: 5
                },
                Segment {
                    file_index: 1,
                    file_offset: 0,
                    range_offset: 5,
                    length: 5
                },
            ]
        );
    }

    #[test]
    fn test_three_file_span() {
        let map = map_of(&[4, 3, 10]);

        let segments = map.segments(2..12).unwrap();
        let summary: Vec<(usize, u64, u64)> = segments
            .iter()
            .map(|s| (s.file_index, s.file_offset, s.length))
            .collect();
        assert_eq!(summary, vec![(0, 2, 2), (1, 0, 3), (2, 0, 5)]);
    }

    #[test]
    fn test_range_inside_one_file() {
        let map = map_of(&[100, 100]);

        let segments = map.segments(120..150).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].file_index, 1);
        assert_eq!(segments[0].file_offset, 20);
    }

    #[test]
    fn test_zero_length_files_are_skipped() {
        let map = map_of(&[0, 3, 0, 0, 3]);

        let segments = map.segments(0..6).unwrap();
        let files: Vec<usize> = segments.iter().map(|s| s.file_index).collect();
        assert_eq!(files, vec![1, 4]);
    }

    #[test]
    fn test_range_past_end() {
        let map = map_of(&[5, 5]);

        let result = map.segments(5..11);
        assert!(matches!(
            result,
            Err(StorageError::OutOfBounds {
                start: 5,
                end: 11,
                total: 10
            })
        ));
    }

    #[test]
    fn test_single_unbounded() {
        let map = FileMap::single(PathBuf::from("store"), None);

        let segments = map.segments(1 << 40..(1 << 40) + 16).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].file_offset, 1 << 40);
    }

    #[test]
    fn test_empty_map_rejected() {
        let result = FileMap::new(Vec::new());
        assert!(matches!(result, Err(StorageError::InvalidConfig { .. })));
    }

    proptest! {
        #[test]
        fn segments_cover_range_exactly(
            lengths in prop::collection::vec(0u64..40, 1..8),
            start_seed in any::<u64>(),
            len_seed in any::<u64>(),
        ) {
            let map = map_of(&lengths);
            let total = map.total_length();
            prop_assume!(total > 0);

            let start = start_seed % total;
            let len = 1 + len_seed % (total - start);
            let segments = map.segments(start..start + len).unwrap();

            let mut expected_offset = 0;
            let mut last_file = None;
            for segment in &segments {
                let file = &map.files()[segment.file_index];
                prop_assert!(segment.length > 0);
                prop_assert_eq!(segment.range_offset, expected_offset);
                prop_assert!(segment.file_offset + segment.length <= file.length);
                prop_assert_eq!(file.offset + segment.file_offset, start + segment.range_offset);
                if let Some(previous) = last_file {
                    prop_assert!(segment.file_index > previous);
                }
                last_file = Some(segment.file_index);
                expected_offset += segment.length;
            }
            prop_assert_eq!(expected_offset, len);
        }
    }
}
