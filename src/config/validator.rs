use secrecy::ExposeSecret;
use thiserror::Error;
use url::Url;

use super::parser::Config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let embedded = &self.database.embedded;
        if embedded.path.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "database.embedded.path cannot be empty".to_string(),
            ));
        }
        if embedded.max_connections == 0 {
            return Err(ConfigError::InvalidConfig(
                "database.embedded.max_connections must be at least 1".to_string(),
            ));
        }

        if let Some(network) = &self.database.network {
            let url = Url::parse(network.url.expose_secret()).map_err(|e| {
                ConfigError::InvalidConfig(format!("database.network.url is not a valid url: {e}"))
            })?;
            if !matches!(url.scheme(), "postgres" | "postgresql") {
                return Err(ConfigError::InvalidConfig(format!(
                    "database.network.url must use the postgres scheme, got {}",
                    url.scheme()
                )));
            }
            if network.max_connections == 0 {
                return Err(ConfigError::InvalidConfig(
                    "database.network.max_connections must be at least 1".to_string(),
                ));
            }
            if network.min_connections > network.max_connections {
                return Err(ConfigError::InvalidConfig(
                    "database.network.min_connections cannot exceed max_connections".to_string(),
                ));
            }
            if network.connect_timeout_secs == 0 {
                return Err(ConfigError::InvalidConfig(
                    "database.network.connect_timeout_secs must be at least 1".to_string(),
                ));
            }
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::InvalidConfig(format!(
                "logging.format must be pretty or json, got {}",
                self.logging.format
            )));
        }

        Ok(())
    }
}
