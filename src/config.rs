use crate::error::{Error, Result};
use std::path::PathBuf;

/// Default number of parallel fetch workers.
pub const DEFAULT_WORKERS: usize = 8;
/// Default bound on tiles dispatched but not yet merged.
pub const DEFAULT_QUEUE_CAPACITY: usize = 15;
/// Default number of attempts for each retrieval and unpack step.
pub const DEFAULT_FETCH_ATTEMPTS: usize = 3;

/// Configuration for one tiled merge run.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Number of columns (candidate subsequences) per tile.
    pub tile_width: usize,
    /// Number of rows (query subsequences) per tile.
    pub tile_height: usize,
    /// Length of the global profile for a full merge.
    pub matrix_profile_length: usize,
    /// Whether the tiles come from a self-join (upper triangle only).
    pub self_join: bool,
    /// Parallel fetch workers.
    pub workers: usize,
    /// Maximum tiles dispatched but not yet merged.
    pub queue_capacity: usize,
    /// Attempts per retrieval or unpack before the run aborts.
    pub fetch_attempts: usize,
    /// Parent directory for per-tile scratch directories.
    pub scratch_dir: PathBuf,
}

impl MergeConfig {
    pub fn new(
        tile_width: usize,
        tile_height: usize,
        matrix_profile_length: usize,
        self_join: bool,
    ) -> Self {
        Self {
            tile_width,
            tile_height,
            matrix_profile_length,
            self_join,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            fetch_attempts: DEFAULT_FETCH_ATTEMPTS,
            scratch_dir: std::env::temp_dir(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("tile_width", self.tile_width),
            ("tile_height", self.tile_height),
            ("workers", self.workers),
            ("queue_capacity", self.queue_capacity),
            ("fetch_attempts", self.fetch_attempts),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be > 0")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MergeConfig::new(10, 20, 100, true);
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.fetch_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero() {
        let mut config = MergeConfig::new(10, 10, 100, false);
        config.queue_capacity = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("queue_capacity"));

        let config = MergeConfig::new(0, 10, 100, false);
        assert!(config.validate().is_err());
    }
}
