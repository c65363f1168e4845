//! Chunk geometry calculations
//!
//! Converts chunk indices into byte ranges of the logical address space and
//! validates chunk lengths and sub-range reads against that geometry.

use std::ops::Range;

use super::StorageError;

/// Optional sub-range applied to a chunk read.
///
/// `offset` is relative to the start of the chunk. When `length` is `None`
/// the read extends to the end of the chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub offset: u64,
    pub length: Option<u64>,
}

impl ReadOptions {
    /// Reads `length` bytes starting `offset` bytes into the chunk.
    pub fn range(offset: u64, length: u64) -> Self {
        Self {
            offset,
            length: Some(length),
        }
    }

    /// Reads from `offset` to the end of the chunk.
    pub fn from_offset(offset: u64) -> Self {
        Self {
            offset,
            length: None,
        }
    }
}

/// Geometry of a chunk store: fixed chunk size plus an optional shorter tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    chunk_length: u64,
    total_length: Option<u64>,
    last_chunk_index: Option<u64>,
    last_chunk_length: u64,
}

impl ChunkLayout {
    /// Creates the layout for `chunk_length` sized chunks.
    ///
    /// A `total_length` of zero is treated as unknown, leaving the store
    /// unbounded.
    ///
    /// # Errors
    ///
    /// - `StorageError::InvalidConfig` - If `chunk_length` is zero
    pub fn new(chunk_length: u64, total_length: Option<u64>) -> Result<Self, StorageError> {
        if chunk_length == 0 {
            return Err(StorageError::InvalidConfig {
                reason: "chunk length must be greater than zero".to_string(),
            });
        }

        let total_length = total_length.filter(|&total| total > 0);
        let (last_chunk_index, last_chunk_length) = match total_length {
            Some(total) => {
                let remainder = total % chunk_length;
                let last_length = if remainder == 0 {
                    chunk_length
                } else {
                    remainder
                };
                (Some(total.div_ceil(chunk_length) - 1), last_length)
            }
            None => (None, chunk_length),
        };

        Ok(Self {
            chunk_length,
            total_length,
            last_chunk_index,
            last_chunk_length,
        })
    }

    pub fn chunk_length(&self) -> u64 {
        self.chunk_length
    }

    pub fn total_length(&self) -> Option<u64> {
        self.total_length
    }

    pub fn last_chunk_index(&self) -> Option<u64> {
        self.last_chunk_index
    }

    pub fn last_chunk_length(&self) -> u64 {
        self.last_chunk_length
    }

    /// Number of chunks, when the total length is known.
    pub fn chunk_count(&self) -> Option<u64> {
        self.last_chunk_index.map(|last| last + 1)
    }

    /// Returns the length of the chunk at `index`.
    pub fn chunk_len(&self, index: u64) -> u64 {
        if Some(index) == self.last_chunk_index {
            self.last_chunk_length
        } else {
            self.chunk_length
        }
    }

    /// Returns the byte range occupied by the chunk at `index`.
    ///
    /// # Errors
    ///
    /// - `StorageError::OutOfBounds` - If the index lies past the last chunk
    ///   or its offset does not fit the address space
    pub fn chunk_range(&self, index: u64) -> Result<Range<u64>, StorageError> {
        let start = index.checked_mul(self.chunk_length);
        let end = start.and_then(|start| start.checked_add(self.chunk_len(index)));

        match (start, end, self.last_chunk_index) {
            (Some(start), Some(end), Some(last)) if index > last => Err(StorageError::OutOfBounds {
                start,
                end,
                total: self.total_length.unwrap_or_default(),
            }),
            (Some(start), Some(end), _) => Ok(start..end),
            _ => Err(StorageError::OutOfBounds {
                start: u64::MAX,
                end: u64::MAX,
                total: self.total_length.unwrap_or(u64::MAX),
            }),
        }
    }

    /// Checks that a write of `actual` bytes fits the chunk at `index`.
    ///
    /// Returns the byte range the chunk occupies.
    ///
    /// # Errors
    ///
    /// - `StorageError::InvalidChunkLength` - If `actual` differs from the chunk length
    /// - `StorageError::OutOfBounds` - If the index lies past the last chunk
    pub fn validate_put(&self, index: u64, actual: u64) -> Result<Range<u64>, StorageError> {
        let expected = self.chunk_len(index);
        if actual != expected {
            return Err(StorageError::InvalidChunkLength {
                index,
                expected,
                actual,
                last: Some(index) == self.last_chunk_index,
            });
        }

        self.chunk_range(index)
    }

    /// Resolves read options into a range relative to the start of the chunk.
    ///
    /// # Errors
    ///
    /// - `StorageError::InvalidRange` - If the length is zero or the range ends
    ///   past the chunk
    pub fn sub_range(&self, index: u64, options: ReadOptions) -> Result<Range<usize>, StorageError> {
        let max = self.chunk_len(index);
        let offset = options.offset;
        let length = options.length.unwrap_or_else(|| max.saturating_sub(offset));

        let end = offset.checked_add(length).filter(|&end| end <= max);
        match end {
            Some(end) if length > 0 => Ok(offset as usize..end as usize),
            _ => Err(StorageError::InvalidRange {
                offset,
                length,
                max,
            }),
        }
    }
}
