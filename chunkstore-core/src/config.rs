//! Runtime configuration for chunk stores.
//!
//! Tunables that are not part of a store's identity (where scratch stores go,
//! how hard destroy tries) live here, with environment variable overrides.

use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings shared by chunk stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory under which stores without an explicit path are created
    pub temp_dir: PathBuf,
    /// Total removal attempts made by destroy when a resource is busy
    pub destroy_retries: u32,
    /// Pause between removal attempts
    pub destroy_backoff: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            destroy_retries: 60,
            destroy_backoff: Duration::from_millis(100),
        }
    }
}

impl StoreConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("CHUNKSTORE_TMP_DIR") {
            if !dir.is_empty() {
                config.temp_dir = PathBuf::from(dir);
            }
        }

        if let Ok(retries) = std::env::var("CHUNKSTORE_DESTROY_RETRIES") {
            if let Ok(count) = retries.parse::<u32>() {
                config.destroy_retries = count;
            }
        }

        if let Ok(backoff) = std::env::var("CHUNKSTORE_DESTROY_BACKOFF_MS") {
            if let Ok(millis) = backoff.parse::<u64>() {
                config.destroy_backoff = Duration::from_millis(millis);
            }
        }

        config
    }

    /// Creates a configuration optimized for testing.
    pub fn for_testing() -> Self {
        Self {
            destroy_retries: 5,
            destroy_backoff: Duration::from_millis(1),
            ..Default::default()
        }
    }

    /// Root under which generated store paths are placed.
    pub fn scratch_root(&self) -> PathBuf {
        self.temp_dir.join("fs-chunk-store")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = StoreConfig::default();

        assert_eq!(config.temp_dir, std::env::temp_dir());
        assert_eq!(config.destroy_retries, 60);
        assert_eq!(config.destroy_backoff, Duration::from_millis(100));
        assert!(config.scratch_root().ends_with("fs-chunk-store"));
    }

    #[test]
    fn test_testing_preset() {
        let config = StoreConfig::for_testing();
        assert!(config.destroy_backoff < StoreConfig::default().destroy_backoff);
        assert_eq!(config.temp_dir, std::env::temp_dir());
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("CHUNKSTORE_TMP_DIR", "/var/tmp/chunks");
            std::env::set_var("CHUNKSTORE_DESTROY_RETRIES", "3");
            std::env::set_var("CHUNKSTORE_DESTROY_BACKOFF_MS", "not-a-number");
        }

        let config = StoreConfig::from_env();

        assert_eq!(config.temp_dir, PathBuf::from("/var/tmp/chunks"));
        assert_eq!(config.destroy_retries, 3);
        assert_eq!(config.destroy_backoff, Duration::from_millis(100));

        // Cleanup
        unsafe {
            std::env::remove_var("CHUNKSTORE_TMP_DIR");
            std::env::remove_var("CHUNKSTORE_DESTROY_RETRIES");
            std::env::remove_var("CHUNKSTORE_DESTROY_BACKOFF_MS");
        }
    }
}
