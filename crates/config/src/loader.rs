//! Configuration loading with precedence: defaults < JSON file < environment

use crate::settings::ChainAuthConfig;
use chainauth_core::{Error, Result, CHAINAUTH_ENV_PREFIX};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable naming the config file when none is set on the loader
pub const CONFIG_FILE_ENV: &str = "CHAINAUTH_CONFIG";

/// Where the effective configuration came from, for startup logging
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Default,
    ConfigFile(PathBuf),
    EnvironmentVariable(String),
}

/// Loaded configuration together with the highest-precedence source applied
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ChainAuthConfig,
    pub source: ConfigSource,
}

/// Configuration loader that handles precedence
#[derive(Debug, Default)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    skip_env: bool,
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read this file instead of the one named by `CHAINAUTH_CONFIG`
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Ignore `CHAINAUTH_*` overrides
    #[must_use]
    pub fn without_env(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Load and validate configuration with full precedence handling
    pub fn load(&self) -> Result<LoadedConfig> {
        let mut loaded = LoadedConfig {
            config: ChainAuthConfig::default(),
            source: ConfigSource::Default,
        };

        if let Some(path) = self.config_file_path() {
            if path.exists() {
                loaded.config = Self::load_from_file(&path)?;
                loaded.source = ConfigSource::ConfigFile(path);
            } else if self.file.is_some() {
                return Err(Error::configuration(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
        }

        if !self.skip_env {
            if let Some(name) = Self::apply_env(&mut loaded.config)? {
                loaded.source = ConfigSource::EnvironmentVariable(name);
            }
        }

        loaded.config.validate()?;

        tracing::debug!(
            source = ?loaded.source,
            max_linked_wallets = loaded.config.max_linked_wallets(),
            timeout_ms = loaded.config.contract_calls_timeout().as_millis() as u64,
            "Loaded chain auth configuration"
        );

        Ok(loaded)
    }

    fn config_file_path(&self) -> Option<PathBuf> {
        self.file
            .clone()
            .or_else(|| std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from))
    }

    /// Load configuration from a JSON file; absent keys keep their defaults
    pub fn load_from_file(path: &Path) -> Result<ChainAuthConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            Error::configuration(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Apply `CHAINAUTH_*` overrides, returning the last variable applied
    fn apply_env(config: &mut ChainAuthConfig) -> Result<Option<String>> {
        let mut applied = None;

        if let Some((name, value)) = read_env::<String>("ARCHITECT_CONTRACT")? {
            config.architect_contract = value;
            applied = Some(name);
        }
        if let Some((name, value)) = read_env::<String>("APP_REGISTRY_CONTRACT")? {
            config.app_registry_contract = value;
            applied = Some(name);
        }
        if let Some((name, value)) = read_env("MAX_LINKED_WALLETS")? {
            config.max_linked_wallets = value;
            applied = Some(name);
        }
        if let Some((name, value)) = read_env("CONTRACT_CALLS_TIMEOUT_MS")? {
            config.contract_calls_timeout_ms = value;
            applied = Some(name);
        }
        if let Some((name, value)) = read_env("ENTITLEMENT_CACHE_POSITIVE_TTL_SECS")? {
            config.entitlement_cache.positive_ttl_secs = value;
            applied = Some(name);
        }
        if let Some((name, value)) = read_env("ENTITLEMENT_CACHE_NEGATIVE_TTL_SECS")? {
            config.entitlement_cache.negative_ttl_secs = value;
            applied = Some(name);
        }
        if let Some((name, value)) = read_env("LINKED_WALLET_CACHE_TTL_SECS")? {
            config.linked_wallet_cache.positive_ttl_secs = value;
            applied = Some(name);
        }
        if let Some((name, value)) = read_env("BANNED_TOKENS_TTL_MS")? {
            config.banned_tokens_ttl_ms = value;
            applied = Some(name);
        }
        if let Some((name, value)) = read_env("SCRUB_WORKER_POOL_SIZE")? {
            config.scrubbing.worker_pool_size = value;
            applied = Some(name);
        }
        if let Some((name, value)) = read_env("SCRUB_ELIGIBLE_SECS")? {
            config.scrubbing.scrub_eligible_secs = value;
            applied = Some(name);
        }
        if let Some((name, value)) = read_env::<String>("TEST_BYPASS_SECRET")? {
            config.test_bypass_secret = value;
            applied = Some(name);
        }

        Ok(applied)
    }
}

fn read_env<T: FromStr>(suffix: &str) -> Result<Option<(String, T)>>
where
    T::Err: std::fmt::Display,
{
    let name = format!("{CHAINAUTH_ENV_PREFIX}{suffix}");
    match std::env::var(&name) {
        Ok(raw) => {
            let value = raw.trim().parse::<T>().map_err(|e| {
                Error::configuration(format!("invalid value '{raw}' for {name}: {e}"))
            })?;
            Ok(Some((name, value)))
        }
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::Duration;
    use tempfile::TempDir;

    const ARCHITECT: &str = "0x00000000000000000000000000000000000000aa";

    fn clear_env() {
        for (key, _) in std::env::vars() {
            if key.starts_with(CHAINAUTH_ENV_PREFIX) {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_file_values_override_defaults() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("chainauth.json");
        std::fs::write(
            &path,
            format!(
                r#"{{
                    "architect_contract": "{ARCHITECT}",
                    "max_linked_wallets": 4,
                    "entitlement_cache": {{ "positive_ttl_secs": 60 }}
                }}"#
            ),
        )
        .unwrap();

        let loaded = ConfigLoader::new().with_file(&path).load().unwrap();

        assert_eq!(loaded.source, ConfigSource::ConfigFile(path));
        assert_eq!(loaded.config.max_linked_wallets(), 4);
        assert_eq!(
            loaded.config.entitlement_cache_settings().positive_ttl,
            Duration::from_secs(60)
        );
        assert_eq!(
            loaded.config.contract_calls_timeout(),
            Duration::from_secs(10)
        );
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("chainauth.json");
        std::fs::write(
            &path,
            format!(r#"{{ "architect_contract": "{ARCHITECT}", "max_linked_wallets": 4 }}"#),
        )
        .unwrap();
        std::env::set_var("CHAINAUTH_MAX_LINKED_WALLETS", "7");
        std::env::set_var("CHAINAUTH_SCRUB_ELIGIBLE_SECS", "0");

        let loaded = ConfigLoader::new().with_file(&path).load().unwrap();
        clear_env();

        assert_eq!(loaded.config.max_linked_wallets(), 7);
        assert_eq!(loaded.config.scrubbing.eligible_duration(), None);
        assert!(matches!(
            loaded.source,
            ConfigSource::EnvironmentVariable(_)
        ));
    }

    #[test]
    #[serial]
    fn test_invalid_env_value_is_rejected() {
        clear_env();
        std::env::set_var("CHAINAUTH_ARCHITECT_CONTRACT", ARCHITECT);
        std::env::set_var("CHAINAUTH_MAX_LINKED_WALLETS", "lots");

        let result = ConfigLoader::new().load();
        clear_env();

        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_is_an_error() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let result = ConfigLoader::new()
            .with_file(temp_dir.path().join("missing.json"))
            .load();
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_malformed_architect_fails_validation() {
        clear_env();
        std::env::set_var("CHAINAUTH_ARCHITECT_CONTRACT", "0xnothex");

        let result = ConfigLoader::new().load();
        clear_env();

        assert!(matches!(result, Err(Error::InvalidAddress { .. })));
    }
}
