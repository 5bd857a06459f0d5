
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::ingest::IngestMode;

/// Output size of Titan Text Embeddings v2 at its default setting
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1024;
pub const DEFAULT_BEDROCK_MODEL: &str = "amazon.titan-embed-text-v2:0";
pub const DEFAULT_OLLAMA_MODEL: &str = "mxbai-embed-large:latest";

pub const CONFIG_FILE_NAME: &str = "config.toml";
const TITAN_DIMENSIONS: [u32; 3] = [256, 512, 1024];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Where this configuration was read from, if anywhere
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    #[default]
    Bedrock,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    /// AWS region hosting the Bedrock runtime
    pub region: String,
    /// Model identifier; the provider default is used when unset
    pub model: Option<String>,
    /// Overrides the Bedrock runtime endpoint derived from the region
    pub endpoint: Option<String>,
    /// Bedrock API key, sent as a bearer token
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Static AWS credentials used to SigV4-sign Bedrock requests when no
    /// API key is set. Only ever read from the environment.
    #[serde(skip)]
    pub aws_credentials: Option<AwsCredentials>,
    pub dimension: u32,
    pub batch_size: u32,
    /// Number of embeddings kept in memory; 0 disables the cache
    pub cache_capacity: usize,
    pub timeout_secs: u64,
    pub ollama: OllamaConfig,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Bedrock,
            region: "us-east-1".to_string(),
            model: None,
            endpoint: None,
            api_key: None,
            aws_credentials: None,
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            batch_size: 16,
            cache_capacity: 256,
            timeout_secs: 30,
            ollama: OllamaConfig::default(),
        }
    }
}

/// Access key pair from `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// LanceDB connection URI: a local directory, `s3://...` or `db://...`
    pub uri: String,
    pub table_name: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            uri: "data/faqs.lance".to_string(),
            table_name: "faqs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    /// JSON file of FAQ records; the built-in list is used when unset
    pub faq_file: Option<PathBuf>,
    pub mode: IngestMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Neighbors fetched per query; only the best one is returned
    pub top_k: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            top_k: 1,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(String),
    #[error("Invalid region: {0:?} (expected something like 'us-east-1')")]
    InvalidRegion(String),
    #[error("Invalid embedding provider: {0} (must be 'bedrock' or 'ollama')")]
    InvalidProvider(String),
    #[error("Invalid model name: {0:?} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (Titan v2 supports 256, 512 or 1024)")]
    InvalidTitanDimension(u32),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid cache capacity: {0} (must be at most 100000)")]
    InvalidCacheCapacity(usize),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid vector store URI (cannot be empty)")]
    EmptyVectorStoreUri,
    #[error("Invalid table name: {0:?} (letters, digits and underscores only)")]
    InvalidTableName(String),
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default directory holding `config.toml`
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("faq-search"))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load the config file (explicit path, or the default location), then
    /// apply environment overrides and validate.
    ///
    /// A missing file is not an error; defaults are used instead.
    #[inline]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_dir()?.join(CONFIG_FILE_NAME),
        };

        let mut config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else {
            Self::default()
        };
        config.config_path = Some(config_path);

        config
            .apply_env_overrides(|key| std::env::var(key).ok())
            .context("Invalid environment override")?;

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    /// Parse a TOML config file without validating it
    #[inline]
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply the recognized environment variables on top of file settings.
    ///
    /// `lookup` returns the value of a variable, or `None` when unset.
    #[inline]
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(region) = lookup("AWS_REGION") {
            self.embedding.region = region;
        }
        if let Some(uri) = lookup("DATABASE_URL") {
            self.vector_store.uri = uri;
        }
        if let Some(path) = lookup("FAQ_FILE") {
            self.ingest.faq_file = Some(PathBuf::from(path));
        }
        if let Some(key) = lookup("AWS_BEARER_TOKEN_BEDROCK") {
            self.embedding.api_key = Some(key);
        }
        if let (Some(access_key_id), Some(secret_access_key)) =
            (lookup("AWS_ACCESS_KEY_ID"), lookup("AWS_SECRET_ACCESS_KEY"))
        {
            self.embedding.aws_credentials = Some(AwsCredentials {
                access_key_id,
                secret_access_key,
                session_token: lookup("AWS_SESSION_TOKEN"),
            });
        }
        if let Some(provider) = lookup("EMBEDDING_PROVIDER") {
            self.embedding.provider = match provider.trim().to_ascii_lowercase().as_str() {
                "bedrock" => EmbeddingProvider::Bedrock,
                "ollama" => EmbeddingProvider::Ollama,
                _ => return Err(ConfigError::InvalidProvider(provider)),
            };
        }
        if let Some(port) = lookup("FAQ_SEARCH_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
        }

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        self.vector_store.validate()?;
        self.server.validate()?;
        Ok(())
    }

    #[inline]
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    #[inline]
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = self
            .to_toml_string()
            .context("Failed to serialize config to TOML")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

impl EmbeddingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(model) = &self.model {
            if model.trim().is_empty() {
                return Err(ConfigError::InvalidModel(model.clone()));
            }
        }

        match self.provider {
            EmbeddingProvider::Bedrock => {
                let region_ok = !self.region.is_empty()
                    && self
                        .region
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
                if !region_ok {
                    return Err(ConfigError::InvalidRegion(self.region.clone()));
                }
                if !TITAN_DIMENSIONS.contains(&self.dimension) {
                    return Err(ConfigError::InvalidTitanDimension(self.dimension));
                }
                if let Some(endpoint) = &self.endpoint {
                    Url::parse(endpoint).map_err(|_| ConfigError::InvalidUrl(endpoint.clone()))?;
                }
            }
            EmbeddingProvider::Ollama => {
                self.ollama.validate()?;
                if !(64..=4096).contains(&self.dimension) {
                    return Err(ConfigError::InvalidEmbeddingDimension(self.dimension));
                }
            }
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if self.cache_capacity > 100_000 {
            return Err(ConfigError::InvalidCacheCapacity(self.cache_capacity));
        }

        if !(1..=600).contains(&self.timeout_secs) {
            return Err(ConfigError::InvalidTimeout(self.timeout_secs));
        }

        Ok(())
    }

    /// Model identifier with the provider default filled in
    #[inline]
    pub fn model_id(&self) -> &str {
        match (&self.model, self.provider) {
            (Some(model), _) => model,
            (None, EmbeddingProvider::Bedrock) => DEFAULT_BEDROCK_MODEL,
            (None, EmbeddingProvider::Ollama) => DEFAULT_OLLAMA_MODEL,
        }
    }

    /// Base URL of the Bedrock runtime API
    #[inline]
    pub fn bedrock_endpoint(&self) -> Result<Url, ConfigError> {
        let url_str = self
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", self.region));
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}

impl OllamaConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port.to_string()));
        }

        self.ollama_url()?;
        Ok(())
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}

impl VectorStoreConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.uri.trim().is_empty() {
            return Err(ConfigError::EmptyVectorStoreUri);
        }

        let name_ok = !self.table_name.is_empty()
            && self
                .table_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !name_ok {
            return Err(ConfigError::InvalidTableName(self.table_name.clone()));
        }

        Ok(())
    }
}

impl ServerConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port.to_string()));
        }

        if !(1..=100).contains(&self.top_k) {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }

        Ok(())
    }

    /// Address the HTTP listener binds to
    #[inline]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
