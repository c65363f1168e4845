//! Construction options for chunk stores and path placement
//!
//! Options describe where a store lives: a single file, or an ordered list of
//! files under an optional base directory. Placement turns them into absolute
//! paths and a file map.

use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use uuid::Uuid;

use super::StorageError;
use super::file_map::FileMap;
use crate::config::StoreConfig;

/// One backing file of a multi-file store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileEntry {
    pub path: PathBuf,
    pub length: u64,
}

impl FileEntry {
    pub fn new(path: impl Into<PathBuf>, length: u64) -> Self {
        Self {
            path: path.into(),
            length,
        }
    }
}

/// Options accepted when constructing a chunk store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreOptions {
    /// Backing file (single-file mode) or base directory (multi-file mode)
    pub path: Option<PathBuf>,
    /// Total logical length of the store
    pub length: Option<u64>,
    /// Ordered backing files; enables multi-file mode
    pub files: Option<Vec<FileEntry>>,
    /// Subdirectory placed under `path`
    pub name: Option<String>,
    /// Insert a generated unique path segment
    #[serde(rename = "addUID")]
    pub add_uid: bool,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_files(mut self, files: Vec<FileEntry>) -> Self {
        self.files = Some(files);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_unique_id(mut self) -> Self {
        self.add_uid = true;
        self
    }

    /// Resolves the options into absolute backing paths.
    ///
    /// # Errors
    ///
    /// - `StorageError::InvalidConfig` - If a file entry has an empty path,
    ///   the file list is empty, `length` disagrees with the file lengths, or a
    ///   path cannot be made absolute
    pub fn place(&self, config: &StoreConfig) -> Result<Placement, StorageError> {
        match &self.files {
            None => self.place_single(config),
            Some(files) => self.place_multi(files, config),
        }
    }

    fn place_single(&self, config: &StoreConfig) -> Result<Placement, StorageError> {
        let base = match &self.path {
            Some(path) => path.clone(),
            None => config.scratch_root().join(Uuid::new_v4().to_string()),
        };
        let target = absolute(&self.decorate(base))?;

        Ok(Placement {
            base_path: target.clone(),
            removal_targets: vec![target.clone()],
            file_map: FileMap::single(target, self.length),
            length: self.length,
        })
    }

    fn place_multi(
        &self,
        files: &[FileEntry],
        config: &StoreConfig,
    ) -> Result<Placement, StorageError> {
        if files.is_empty() {
            return Err(StorageError::InvalidConfig {
                reason: "`files` must contain at least one entry".to_string(),
            });
        }

        let root = if self.path.is_some() || self.name.is_some() || self.add_uid {
            let base = self.path.clone().unwrap_or_else(|| config.scratch_root());
            Some(absolute(&self.decorate(base))?)
        } else {
            None
        };

        let mut entries = Vec::with_capacity(files.len());
        for (i, file) in files.iter().enumerate() {
            if file.path.as_os_str().is_empty() {
                return Err(StorageError::InvalidConfig {
                    reason: format!("file {i} is missing a path"),
                });
            }
            let path = match &root {
                Some(root) => root.join(&file.path),
                None => file.path.clone(),
            };
            entries.push((absolute(&path)?, file.length));
        }

        let file_map = FileMap::new(entries)?;
        let total = file_map.total_length();
        if let Some(length) = self.length {
            if length != total {
                return Err(StorageError::InvalidConfig {
                    reason: format!(
                        "total `files` length {total} is not equal to explicit `length` {length}"
                    ),
                });
            }
        }

        // Only a generated unique directory belongs to the store as a whole
        let each_file = || -> Vec<PathBuf> { file_map.paths().map(Path::to_path_buf).collect() };
        let (base_path, removal_targets) = match root {
            Some(root) if self.add_uid => (root.clone(), vec![root]),
            Some(root) => (root, each_file()),
            None => (common_ancestor(file_map.paths()), each_file()),
        };

        Ok(Placement {
            base_path,
            removal_targets,
            file_map,
            length: Some(total),
        })
    }

    fn decorate(&self, mut base: PathBuf) -> PathBuf {
        if let Some(name) = &self.name {
            base.push(name);
        }
        if self.add_uid {
            base.push(Uuid::new_v4().to_string());
        }
        base
    }
}

/// Resolved on-disk placement of a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Backing file in single-file mode, base directory in multi-file mode
    pub base_path: PathBuf,
    /// Paths removed on destroy
    pub removal_targets: Vec<PathBuf>,
    pub file_map: FileMap,
    /// Logical length implied by the options
    pub length: Option<u64>,
}

fn absolute(path: &Path) -> Result<PathBuf, StorageError> {
    std::path::absolute(path).map_err(|error| StorageError::InvalidConfig {
        reason: format!("cannot resolve {}: {error}", path.display()),
    })
}

/// Deepest directory containing the parents of all `paths`.
fn common_ancestor<'a>(paths: impl Iterator<Item = &'a Path>) -> PathBuf {
    let mut common: Option<Vec<Component<'a>>> = None;
    for path in paths {
        let parent: Vec<Component<'a>> = path
            .parent()
            .map(|parent| parent.components().collect())
            .unwrap_or_default();
        common = Some(match common {
            None => parent,
            Some(prefix) => prefix
                .into_iter()
                .zip(parent)
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a)
                .collect(),
        });
    }
    common.unwrap_or_default().into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path) -> StoreConfig {
        StoreConfig {
            temp_dir: dir.to_path_buf(),
            ..StoreConfig::for_testing()
        }
    }

    #[test]
    fn test_single_default_path_is_unique() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = config_in(temp_dir.path());

        let first = StoreOptions::new().place(&config).unwrap();
        let second = StoreOptions::new().place(&config).unwrap();

        assert_ne!(first.base_path, second.base_path);
        assert!(first.base_path.starts_with(config.scratch_root()));
        assert_eq!(first.removal_targets, vec![first.base_path.clone()]);
    }

    #[test]
    fn test_single_relative_path_is_absolute() {
        let placement = StoreOptions::new()
            .with_path("tmp/test_file")
            .place(&StoreConfig::default())
            .unwrap();

        assert!(placement.base_path.is_absolute());
        assert!(placement.base_path.ends_with("tmp/test_file"));
    }

    #[test]
    fn test_single_name_and_uid() {
        let placement = StoreOptions::new()
            .with_path("/data")
            .with_name("movie")
            .with_unique_id()
            .place(&StoreConfig::default())
            .unwrap();

        let relative = placement.base_path.strip_prefix("/data/movie").unwrap();
        assert_eq!(relative.components().count(), 1);
    }

    #[test]
    fn test_multi_files_under_base() {
        let options = StoreOptions::new().with_path("/data").with_files(vec![
            FileEntry::new("a/one", 5),
            FileEntry::new("b/two", 7),
        ]);

        let placement = options.place(&StoreConfig::default()).unwrap();

        assert_eq!(placement.base_path, PathBuf::from("/data"));
        assert_eq!(
            placement.removal_targets,
            vec![PathBuf::from("/data/a/one"), PathBuf::from("/data/b/two")]
        );
        assert_eq!(placement.length, Some(12));
        let paths: Vec<&Path> = placement.file_map.paths().collect();
        assert_eq!(paths, vec![Path::new("/data/a/one"), Path::new("/data/b/two")]);
    }

    #[test]
    fn test_multi_unique_directory_is_removed_whole() {
        let options = StoreOptions::new()
            .with_path("/data")
            .with_name("movie")
            .with_unique_id()
            .with_files(vec![FileEntry::new("one", 5), FileEntry::new("two", 5)]);

        let placement = options.place(&StoreConfig::default()).unwrap();

        assert!(placement.base_path.starts_with("/data/movie"));
        assert_eq!(placement.removal_targets, vec![placement.base_path.clone()]);
    }

    #[test]
    fn test_multi_named_directory_keeps_neighbours() {
        let options = StoreOptions::new()
            .with_path("/data")
            .with_name("movie")
            .with_files(vec![FileEntry::new("one", 5)]);

        let placement = options.place(&StoreConfig::default()).unwrap();

        assert_eq!(placement.base_path, PathBuf::from("/data/movie"));
        assert_eq!(placement.removal_targets, vec![PathBuf::from("/data/movie/one")]);
    }

    #[test]
    fn test_multi_without_base_removes_each_file() {
        let options = StoreOptions::new().with_files(vec![
            FileEntry::new("/srv/x/one", 5),
            FileEntry::new("/srv/x/sub/two", 5),
        ]);

        let placement = options.place(&StoreConfig::default()).unwrap();

        assert_eq!(placement.base_path, PathBuf::from("/srv/x"));
        assert_eq!(
            placement.removal_targets,
            vec![PathBuf::from("/srv/x/one"), PathBuf::from("/srv/x/sub/two")]
        );
    }

    #[test]
    fn test_multi_length_mismatch() {
        let options = StoreOptions::new()
            .with_length(11)
            .with_files(vec![FileEntry::new("/a", 5), FileEntry::new("/b", 5)]);

        let result = options.place(&StoreConfig::default());
        assert!(matches!(result, Err(StorageError::InvalidConfig { .. })));
    }

    #[test]
    fn test_multi_missing_path() {
        let options = StoreOptions::new().with_files(vec![FileEntry::new("", 5)]);

        let result = options.place(&StoreConfig::default());
        assert!(matches!(result, Err(StorageError::InvalidConfig { .. })));
    }

    #[test]
    fn test_multi_empty_file_list() {
        let options = StoreOptions::new().with_files(Vec::new());

        let result = options.place(&StoreConfig::default());
        assert!(matches!(result, Err(StorageError::InvalidConfig { .. })));
    }

    #[test]
    fn test_options_from_json() {
        let options: StoreOptions = serde_json::from_str(
            r#"{
                "path": "/data",
                "name": "torrent",
                "addUID": true,
                "files": [{ "path": "a", "length": 3 }, { "path": "b", "length": 4 }]
            }"#,
        )
        .unwrap();

        assert_eq!(options.path, Some(PathBuf::from("/data")));
        assert_eq!(options.name.as_deref(), Some("torrent"));
        assert!(options.add_uid);
        assert_eq!(options.files.unwrap().len(), 2);
        assert_eq!(options.length, None);
    }
}
