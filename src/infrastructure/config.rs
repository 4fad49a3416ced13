//! Configuration loading.
//!
//! Hierarchical merging: programmatic defaults, then `hivemind.yaml`, then
//! `HIVEMIND_`-prefixed environment variables (highest priority). The
//! merged configuration is validated before use; bounds violations reject
//! the load.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;

use crate::domain::models::config::SwarmConfig;

/// Default project-local configuration file.
pub const CONFIG_FILE: &str = "hivemind.yaml";

/// Environment variable prefix, e.g. `HIVEMIND_INSTANCE_COUNT=5`.
pub const ENV_PREFIX: &str = "HIVEMIND_";

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the default locations.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. `hivemind.yaml` in the working directory
    /// 3. Environment variables with the `HIVEMIND_` prefix
    pub fn load() -> Result<SwarmConfig> {
        let config: SwarmConfig = Figment::new()
            .merge(Serialized::defaults(SwarmConfig::default()))
            .merge(Yaml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract swarm configuration")?;

        config.validate().context("Invalid swarm configuration")?;
        Ok(config)
    }

    /// Load configuration from a specific YAML file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<SwarmConfig> {
        let config: SwarmConfig = Figment::new()
            .merge(Serialized::defaults(SwarmConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context("Failed to extract swarm configuration")?;

        config.validate().context("Invalid swarm configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "instance_count: 7\ntask_distribution_strategy: round_robin\nhealth_check_interval: 15"
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.instance_count, 7);
        assert_eq!(config.health_check_interval, 15);
        // Untouched fields keep their defaults.
        assert_eq!(config.max_instances, 10);
    }

    #[test]
    fn test_load_from_file_rejects_out_of_bounds() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "min_instances: 9\nmax_instances: 4").unwrap();
        assert!(ConfigLoader::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = ConfigLoader::load_from_file("/nonexistent/hivemind.yaml").unwrap();
        assert_eq!(config, SwarmConfig::default());
    }
}
