//! Cache configuration: backing location and retention limits.
//!
//! Options are validated at construction and immutable afterwards - a
//! running cache can never hold an invalid configuration.

use std::path::{Path, PathBuf};

use uplink_core::ConfigError;

/// Default maximum age of a cached record, in days.
pub const DEFAULT_AGE_LIMIT_DAYS: u32 = 7;

/// Where the record store keeps its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backing {
    /// Process-local table, lost on exit.
    InMemory,
    /// LMDB environment at `base_dir/name`, surviving restarts.
    OnDisk { base_dir: PathBuf, name: String },
}

/// Configuration for an [`UploadCache`](crate::UploadCache) instance.
///
/// # Example
///
/// ```ignore
/// let options = CacheOptions::on_disk("/var/lib/app/uplink", "uploads")?
///     .with_count_limit(1_000)
///     .with_age_limit_days(7);
/// ```
#[derive(Debug, Clone)]
pub struct CacheOptions {
    backing: Backing,
    /// Maximum number of cached records. 0 disables the limit.
    count_limit: usize,
    /// Maximum age of a record in days. 0 disables the limit.
    age_limit_days: u32,
    /// Clear any existing rows of an on-disk database when opening.
    reset_cache: bool,
}

impl CacheOptions {
    /// Create options for an in-memory cache. Cannot fail.
    pub fn in_memory() -> Self {
        Self {
            backing: Backing::InMemory,
            count_limit: 0,
            age_limit_days: DEFAULT_AGE_LIMIT_DAYS,
            reset_cache: false,
        }
    }

    /// Create options for an on-disk cache stored at `base_dir/name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLocation`] if `base_dir` is empty or
    /// carries a URL scheme (only local filesystem paths are accepted),
    /// or if `name` is empty.
    pub fn on_disk(
        base_dir: impl AsRef<Path>,
        name: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let base_dir = base_dir.as_ref();
        let name = name.into();

        if base_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidLocation {
                reason: "base directory is empty".to_string(),
            });
        }
        if base_dir.to_string_lossy().contains("://") {
            return Err(ConfigError::InvalidLocation {
                reason: "base directory must be a local path, not a URL".to_string(),
            });
        }
        if name.is_empty() {
            return Err(ConfigError::InvalidLocation {
                reason: "cache name is empty".to_string(),
            });
        }

        Ok(Self {
            backing: Backing::OnDisk {
                base_dir: base_dir.to_path_buf(),
                name,
            },
            count_limit: 0,
            age_limit_days: DEFAULT_AGE_LIMIT_DAYS,
            reset_cache: false,
        })
    }

    /// Set the maximum number of cached records. 0 disables the limit.
    pub fn with_count_limit(mut self, limit: usize) -> Self {
        self.count_limit = limit;
        self
    }

    /// Set the maximum record age in days. 0 disables the limit.
    pub fn with_age_limit_days(mut self, days: u32) -> Self {
        self.age_limit_days = days;
        self
    }

    /// Clear any existing rows of an on-disk database when opening.
    pub fn with_reset_cache(mut self, reset: bool) -> Self {
        self.reset_cache = reset;
        self
    }

    /// The configured backing.
    pub fn backing(&self) -> &Backing {
        &self.backing
    }

    /// The configured count limit (0 = unbounded).
    pub fn count_limit(&self) -> usize {
        self.count_limit
    }

    /// The configured age limit in days (0 = unbounded).
    pub fn age_limit_days(&self) -> u32 {
        self.age_limit_days
    }

    /// Whether an existing on-disk database is cleared when opening.
    pub fn reset_cache(&self) -> bool {
        self.reset_cache
    }

    /// Path of the database directory for on-disk backings.
    pub fn db_path(&self) -> Option<PathBuf> {
        match &self.backing {
            Backing::InMemory => None,
            Backing::OnDisk { base_dir, name } => Some(base_dir.join(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_defaults() {
        let options = CacheOptions::in_memory();
        assert_eq!(options.backing(), &Backing::InMemory);
        assert_eq!(options.count_limit(), 0);
        assert_eq!(options.age_limit_days(), DEFAULT_AGE_LIMIT_DAYS);
        assert!(!options.reset_cache());
        assert!(options.db_path().is_none());
    }

    #[test]
    fn test_on_disk_builder() {
        let options = CacheOptions::on_disk("/tmp/uplink", "uploads")
            .expect("options creation should succeed")
            .with_count_limit(500)
            .with_age_limit_days(3)
            .with_reset_cache(true);

        assert_eq!(options.count_limit(), 500);
        assert_eq!(options.age_limit_days(), 3);
        assert!(options.reset_cache());
        assert_eq!(
            options.db_path(),
            Some(PathBuf::from("/tmp/uplink/uploads"))
        );
    }

    #[test]
    fn test_on_disk_rejects_url_location() {
        let result = CacheOptions::on_disk("https://example.com/cache", "uploads");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidLocation { .. })
        ));
    }

    #[test]
    fn test_on_disk_rejects_empty_location() {
        assert!(CacheOptions::on_disk("", "uploads").is_err());
        assert!(CacheOptions::on_disk("/tmp/uplink", "").is_err());
    }
}
