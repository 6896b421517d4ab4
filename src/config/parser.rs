use super::ConfigError;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub seed: SeedConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub mode: RunMode,
    /// Absent means the network store is never initialized.
    #[serde(default)]
    pub network: Option<NetworkStoreConfig>,
    #[serde(default)]
    pub embedded: EmbeddedStoreConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Development,
    Production,
}

impl RunMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(RunMode::Development),
            "production" | "prod" => Some(RunMode::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NetworkStoreConfig {
    #[serde(deserialize_with = "deserialize_secret")]
    pub url: SecretString,
    #[serde(default = "default_network_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_network_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl NetworkStoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: SecretString::from(url.into()),
            max_connections: default_network_max_connections(),
            min_connections: default_network_min_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EmbeddedStoreConfig {
    #[serde(default = "default_embedded_path")]
    pub path: String,
    #[serde(default = "default_embedded_max_connections")]
    pub max_connections: u32,
}

impl Default for EmbeddedStoreConfig {
    fn default() -> Self {
        Self {
            path: default_embedded_path(),
            max_connections: default_embedded_max_connections(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SeedConfig {
    #[serde(default = "default_seed_enabled")]
    pub enabled: bool,
    #[serde(default, deserialize_with = "deserialize_optional_secret")]
    pub default_password: Option<SecretString>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            enabled: default_seed_enabled(),
            default_password: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
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

impl Config {
    /// Loads `CONFIG_PATH`, or `config.yaml` when it exists. Without either the
    /// defaults plus environment overrides are used.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var("CONFIG_PATH") {
            Ok(path) => Self::load_from_file(path),
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::load_from_file(DEFAULT_CONFIG_PATH)
            }
            Err(_) => Self::from_env(),
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()) {
            match self.database.network.as_mut() {
                Some(network) => network.url = SecretString::from(url),
                None => self.database.network = Some(NetworkStoreConfig::new(url)),
            }
        }
        if let Some(mode) = lookup("APP_MODE").as_deref().and_then(RunMode::parse) {
            self.database.mode = mode;
        }
        if let Some(path) = lookup("EMBEDDED_DB_PATH") {
            self.database.embedded.path = path;
        }
        if let Some(password) = lookup("SEED_DEFAULT_PASSWORD").filter(|v| !v.is_empty()) {
            self.seed.default_password = Some(SecretString::from(password));
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

fn deserialize_optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

fn default_network_max_connections() -> u32 {
    10
}

fn default_network_min_connections() -> u32 {
    1
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_embedded_path() -> String {
    "data/sensors.db".to_string()
}

fn default_embedded_max_connections() -> u32 {
    10
}

fn default_seed_enabled() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
