// Configuration management module
// TOML settings file plus environment overrides

pub mod settings;


pub use settings::{
    AwsCredentials, CONFIG_FILE_NAME, Config, ConfigError, EmbeddingConfig, EmbeddingProvider,
    IngestConfig, OllamaConfig, ServerConfig, VectorStoreConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}

/// Print the effective configuration as TOML
#[inline]
pub fn show_config(config: &Config) -> anyhow::Result<()> {
    match &config.config_path {
        Some(path) if path.exists() => println!("# Loaded from {}", path.display()),
        Some(path) => println!("# No file at {}, showing defaults", path.display()),
        None => println!("# Showing defaults"),
    }
    print!("{}", config.to_toml_string()?);
    Ok(())
}
