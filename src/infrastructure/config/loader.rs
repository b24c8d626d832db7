use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::{Config, DepthProfile, PercolationDepth};

/// Project-local configuration directory.
pub const CONFIG_DIR: &str = ".percolator";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid max_concurrent_percolations: {0}. Must be at least 1")]
    InvalidConcurrency(usize),

    #[error("Invalid event_channel_capacity: {0}. Must be at least 1")]
    InvalidChannelCapacity(usize),

    #[error("Invalid {depth} depth profile: {reason}")]
    InvalidDepthProfile { depth: String, reason: String },

    #[error("max_patch_bytes ({patch}) cannot exceed max_content_bytes ({content})")]
    PatchLargerThanContent { patch: usize, content: usize },
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .percolator/config.yaml (project config, created by init)
    /// 3. .percolator/local.yaml (project local overrides, optional)
    /// 4. Environment variables (PERCOLATOR_* prefix, `__` separates nested keys)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment(Path::new(CONFIG_DIR))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("PERCOLATOR_").split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment(dir: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed("PERCOLATOR_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let percolation = &config.percolation;
        if percolation.max_concurrent_percolations == 0 {
            return Err(ConfigError::InvalidConcurrency(0));
        }
        if percolation.event_channel_capacity == 0 {
            return Err(ConfigError::InvalidChannelCapacity(0));
        }
        for depth in PercolationDepth::ALL {
            Self::validate_profile(depth, percolation.depths.profile(depth))?;
        }

        let limits = config.limits;
        if limits.max_patch_bytes > limits.max_content_bytes {
            return Err(ConfigError::PatchLargerThanContent {
                patch: limits.max_patch_bytes,
                content: limits.max_content_bytes,
            });
        }

        Ok(())
    }

    fn validate_profile(depth: PercolationDepth, profile: DepthProfile) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidDepthProfile {
            depth: depth.as_str().to_string(),
            reason: reason.to_string(),
        };
        if profile.budget_tokens == 0 {
            return Err(invalid("budget_tokens must be at least 1"));
        }
        if profile.stress_test_iterations == 0 {
            return Err(invalid("stress_test_iterations must be at least 1"));
        }
        if profile.research_query_cap < -1 {
            return Err(invalid("research_query_cap must be -1 (unlimited) or a non-negative count"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, ".percolator/percolator.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.percolation.max_concurrent_percolations, 5);
        assert_eq!(config.percolation.timeout_ms, 300_000);
        assert_eq!(config.percolation.depths.quick, DepthProfile::new(1_000, 3, 1));
        assert_eq!(config.percolation.depths.exhaustive.research_limit(), None);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
database:
  path: /custom/path.db
  max_connections: 2
logging:
  level: debug
  format: json
percolation:
  max_concurrent_percolations: 2
  timeout_ms: 1000
  depths:
    quick:
      budget_tokens: 500
      stress_test_iterations: 2
      research_query_cap: -1
limits:
  max_patch_bytes: 1000
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.database.path, "/custom/path.db");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.percolation.timeout_ms, 1000);
        assert_eq!(config.percolation.depths.quick.budget_tokens, 500);
        assert_eq!(config.percolation.depths.quick.research_limit(), None);
        assert_eq!(config.percolation.depths.standard, DepthProfile::new(5_000, 10, 3));
        assert_eq!(config.limits.max_patch_bytes, 1000);
        assert_eq!(config.limits.max_content_bytes, 1_000_000);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidLogFormat(_)
        ));
    }

    #[test]
    fn test_validate_empty_database_path() {
        let mut config = Config::default();
        config.database.path = String::new();

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::EmptyDatabasePath
        ));
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let mut config = Config::default();
        config.percolation.max_concurrent_percolations = 0;

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidConcurrency(0)
        ));
    }

    #[test]
    fn test_validate_depth_profiles() {
        let mut config = Config::default();
        config.percolation.depths.thorough.stress_test_iterations = 0;
        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidDepthProfile { depth, .. } => assert_eq!(depth, "thorough"),
            other => panic!("Expected InvalidDepthProfile error, got {other}"),
        }

        let mut config = Config::default();
        config.percolation.depths.quick.research_query_cap = -2;
        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn test_validate_patch_limit_within_content_limit() {
        let mut config = Config::default();
        config.limits.max_patch_bytes = config.limits.max_content_bytes + 1;

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::PatchLargerThanContent { .. }
        ));
    }

    #[test]
    fn test_hierarchical_merging() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            "logging:\n  level: info\n  format: json\npercolation:\n  timeout_ms: 5000\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("local.yaml"), "logging:\n  level: debug\n").unwrap();

        temp_env::with_var("PERCOLATOR_PERCOLATION__TIMEOUT_MS", Some("42"), || {
            let config: Config = ConfigLoader::figment(dir.path()).extract().unwrap();

            assert_eq!(config.logging.level, "debug", "Local file should win");
            assert_eq!(config.logging.format, "json", "Base value should persist");
            assert_eq!(config.percolation.timeout_ms, 42, "Environment should win");
            assert_eq!(config.percolation.max_concurrent_percolations, 5);
        });
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "percolation:\n  max_concurrent_percolations: 3").unwrap();
        file.flush().unwrap();

        temp_env::with_var_unset("PERCOLATOR_PERCOLATION__MAX_CONCURRENT_PERCOLATIONS", || {
            let config = ConfigLoader::load_from_file(file.path()).unwrap();
            assert_eq!(config.percolation.max_concurrent_percolations, 3);
        });
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "logging:\n  level: loud").unwrap();
        file.flush().unwrap();

        assert!(ConfigLoader::load_from_file(file.path()).is_err());
    }
}
