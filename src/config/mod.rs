// Configuration management module
// Handles TOML configuration, environment overrides, and settings validation

pub mod settings;

pub use settings::{
    Config, ConfigError, PathsConfig, ProviderConfig, RetrievalConfig, ServerConfig,
};

/// Get the configuration directory path (`~/.holos` by default)
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".holos"))
        .ok_or(ConfigError::DirectoryError)
}
