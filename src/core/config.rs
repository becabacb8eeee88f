use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_HEALTHY_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_DEGRADED_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// A remote JSON endpoint and where the rate lives in its response.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProviderConfig {
    pub name: String,
    pub url: String,
    /// JSON pointers tried in order, e.g. `/rates/RUB`.
    pub fields: Vec<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ProviderConfig {
    fn new(name: &str, url: &str, fields: &[&str]) -> Self {
        ProviderConfig {
            name: name.to_string(),
            url: url.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            headers: BTreeMap::new(),
        }
    }
}

pub fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new(
            "open-er-api",
            "https://open.er-api.com/v6/latest/USD",
            &["/rates/RUB"],
        ),
        ProviderConfig::new(
            "exchangerate-api",
            "https://api.exchangerate-api.com/v4/latest/USD",
            &["/rates/RUB"],
        ),
        ProviderConfig::new(
            "coingecko",
            "https://api.coingecko.com/api/v3/simple/price?ids=usd&vs_currencies=rub",
            &["/usd/rub", "/rub", "/RUB"],
        ),
    ]
}

fn default_healthy_interval_secs() -> u64 {
    DEFAULT_HEALTHY_INTERVAL_SECS
}

fn default_degraded_interval_secs() -> u64 {
    DEFAULT_DEGRADED_INTERVAL_SECS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default = "default_healthy_interval_secs")]
    pub healthy_interval_secs: u64,
    #[serde(default = "default_degraded_interval_secs")]
    pub degraded_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            healthy_interval_secs: DEFAULT_HEALTHY_INTERVAL_SECS,
            degraded_interval_secs: DEFAULT_DEGRADED_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            providers: default_providers(),
        }
    }
}

/// Re-arm delays after a successful and a failed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intervals {
    healthy: Duration,
    degraded: Duration,
}

impl Intervals {
    pub fn new(healthy: Duration, degraded: Duration) -> Self {
        Intervals { healthy, degraded }
    }

    pub fn healthy_interval(&self) -> Duration {
        self.healthy
    }

    pub fn degraded_interval(&self) -> Duration {
        self.degraded
    }
}

impl Default for Intervals {
    fn default() -> Self {
        Intervals::new(
            Duration::from_secs(DEFAULT_HEALTHY_INTERVAL_SECS),
            Duration::from_secs(DEFAULT_DEGRADED_INTERVAL_SECS),
        )
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "usd-rub", "usd-rub-indicator")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.healthy_interval_secs == 0 {
            bail!("healthy_interval_secs must be greater than zero");
        }
        if self.degraded_interval_secs == 0 {
            bail!("degraded_interval_secs must be greater than zero");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        if self.providers.is_empty() {
            bail!("at least one provider must be configured");
        }
        for provider in &self.providers {
            if provider.fields.is_empty() {
                bail!("provider '{}' has no fields", provider.name);
            }
            if let Some(field) = provider.fields.iter().find(|f| !f.starts_with('/')) {
                bail!(
                    "provider '{}' field '{}' must be a JSON pointer starting with '/'",
                    provider.name,
                    field
                );
            }
        }
        Ok(())
    }

    pub fn intervals(&self) -> Intervals {
        Intervals::new(
            Duration::from_secs(self.healthy_interval_secs),
            Duration::from_secs(self.degraded_interval_secs),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_from_empty_yaml() {
        let config: AppConfig = serde_yaml::from_str("{}").expect("Failed to deserialize");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.intervals().healthy_interval(), Duration::from_secs(300));
        assert_eq!(config.intervals().degraded_interval(), Duration::from_secs(15));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.providers.len(), 3);
        assert_eq!(config.providers[0].name, "open-er-api");
        assert_eq!(config.providers[2].fields, vec!["/usd/rub", "/rub", "/RUB"]);
    }

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
healthy_interval_secs: 600
degraded_interval_secs: 7
request_timeout_secs: 15
providers:
  - name: "primary"
    url: "http://example.com/latest"
    fields: ["/rates/RUB"]
    headers:
      Accept: "application/json"
  - name: "backup"
    url: "http://example.com/backup"
    fields: ["/rub", "/RUB"]
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        config.validate().expect("Config should be valid");
        assert_eq!(config.intervals().healthy_interval(), Duration::from_secs(600));
        assert_eq!(config.intervals().degraded_interval(), Duration::from_secs(7));
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.providers.len(), 2);
        assert_eq!(
            config.providers[0].headers.get("Accept"),
            Some(&"application/json".to_string())
        );
        assert!(config.providers[1].headers.is_empty());
        assert_eq!(config.providers[1].fields, vec!["/rub", "/RUB"]);
    }

    #[test]
    fn test_validate_rejects_zero_intervals_and_empty_providers() {
        let config = AppConfig {
            degraded_interval_secs: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AppConfig {
            providers: vec![],
            ..AppConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at least one provider"));
    }

    #[test]
    fn test_validate_rejects_bad_field_pointer() {
        let mut config = AppConfig::default();
        config.providers[0].fields = vec!["rates.RUB".to_string()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must be a JSON pointer"));
    }

    #[test]
    fn test_load_from_path() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("config.yaml");
        fs::write(&path, "degraded_interval_secs: 30\n")?;

        let config = AppConfig::load_from_path(&path)?;
        assert_eq!(config.degraded_interval_secs, 30);
        assert_eq!(config.healthy_interval_secs, 300);

        fs::write(&path, "healthy_interval_secs: 0\n")?;
        assert!(AppConfig::load_from_path(&path).is_err());
        Ok(())
    }
}
