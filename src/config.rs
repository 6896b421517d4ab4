pub use self::parser::{
    Config, DatabaseConfig, EmbeddedStoreConfig, LoggingConfig, NetworkStoreConfig, RunMode,
    SeedConfig,
};
pub use self::validator::ConfigError;

mod parser;
mod validator;
