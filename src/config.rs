use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Environment variable prefix, e.g. `ORCHESTRATOR__ROUTING__AUTO_FALLBACK=false`
pub const ENV_PREFIX: &str = "ORCHESTRATOR";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub routing: RoutingConfig,

    /// Seeded providers; also what `reset-defaults` restores
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderSeed>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            routing: RoutingConfig::default(),
            providers: default_providers(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set (default: "info")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "text" or "json" (default: "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// JSON file holding the persisted orchestrator state
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
    /// Advance to the next provider when one fails (default: true)
    #[serde(default = "default_true")]
    pub auto_fallback: bool,

    /// Use the local path when no provider can serve a request (default: true)
    #[serde(default = "default_true")]
    pub fallback_to_local: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            auto_fallback: true,
            fallback_to_local: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ProviderSeed {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub credential: String,

    /// Successful calls allowed per calendar month
    #[serde(default = "default_quota_limit")]
    pub quota_limit: u64,

    #[serde(default = "default_priority")]
    pub priority: i64,

    /// Consecutive failures before the provider is circuit-broken
    #[serde(default = "default_max_errors")]
    pub max_errors: u32,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ProviderSeed {
    pub fn new(id: &str, name: &str, quota_limit: u64, priority: i64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            credential: String::new(),
            quota_limit,
            priority,
            max_errors: default_max_errors(),
            enabled: true,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_state_path() -> PathBuf {
    PathBuf::from("./data/orchestrator-state.json")
}

fn default_true() -> bool {
    true
}

fn default_quota_limit() -> u64 {
    1000
}

fn default_priority() -> i64 {
    1
}

fn default_max_errors() -> u32 {
    3
}

/// Built-in provider seeds (free-tier monthly allowances, no credentials)
pub fn default_providers() -> Vec<ProviderSeed> {
    vec![
        ProviderSeed::new("google-vision", "Google Cloud Vision", 1000, 1),
        ProviderSeed::new("azure-vision", "Azure Computer Vision", 5000, 2),
        ProviderSeed::new("aws-rekognition", "AWS Rekognition", 5000, 3),
    ]
}

/// Load settings from `path` (optional) layered with `ORCHESTRATOR__*` env vars
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let config = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    let settings: Settings = config.try_deserialize()?;
    validate_settings(&settings)?;

    Ok(settings)
}

pub fn validate_settings(settings: &Settings) -> anyhow::Result<()> {
    match settings.logging.format.as_str() {
        "text" | "json" => {}
        other => anyhow::bail!("Invalid log format '{}': expected 'text' or 'json'", other),
    }

    validate_unique_provider_ids(&settings.providers)?;

    for seed in &settings.providers {
        if seed.max_errors < 1 {
            anyhow::bail!("Provider '{}': max_errors must be >= 1", seed.id);
        }
        if seed.name.is_empty() {
            anyhow::bail!("Provider '{}': name cannot be empty", seed.id);
        }
    }

    Ok(())
}

fn validate_unique_provider_ids(seeds: &[ProviderSeed]) -> anyhow::Result<()> {
    let mut ids = HashSet::new();
    for seed in seeds {
        if seed.id.is_empty() {
            anyhow::bail!("Provider id cannot be empty");
        }
        if !ids.insert(seed.id.as_str()) {
            anyhow::bail!("Provider id '{}' is duplicated", seed.id);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(validate_settings(&settings).is_ok());
        assert_eq!(settings.providers.len(), 3);
        assert!(settings.routing.auto_fallback);
        assert!(settings.routing.fallback_to_local);
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let mut settings = Settings::default();
        settings
            .providers
            .push(ProviderSeed::new("google-vision", "Duplicate", 10, 9));

        let result = validate_settings(&settings);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("duplicated"));
    }

    #[test]
    fn test_validate_rejects_zero_max_errors() {
        let mut settings = Settings::default();
        settings.providers[0].max_errors = 0;

        let result = validate_settings(&settings);
        assert!(result.unwrap_err().to_string().contains("max_errors"));
    }

    #[test]
    fn test_validate_rejects_unknown_log_format() {
        let mut settings = Settings::default();
        settings.logging.format = "xml".to_string();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_load_settings_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.providers, default_providers());
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn test_load_settings_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orchestrator.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[routing]
auto_fallback = false

[storage]
state_path = "/tmp/state.json"

[[providers]]
id = "primary"
name = "Primary"
credential = "secret"
quota_limit = 50
priority = 2

[[providers]]
id = "backup"
name = "Backup"
"#
        )
        .unwrap();

        let settings = load_settings(&path).unwrap();

        assert!(!settings.routing.auto_fallback);
        assert!(settings.routing.fallback_to_local);
        assert_eq!(settings.storage.state_path, PathBuf::from("/tmp/state.json"));
        assert_eq!(settings.providers.len(), 2);
        assert_eq!(settings.providers[0].quota_limit, 50);
        assert_eq!(settings.providers[1].quota_limit, 1000);
        assert_eq!(settings.providers[1].max_errors, 3);
        assert!(settings.providers[1].credential.is_empty());
    }
}
