use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

use crate::shape::BuildOptions;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Client configuration with validation
#[derive(Clone, Debug, PartialEq, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Nesting levels followed when describing a type; deeper fields are skipped
    #[validate(range(min = 1, max = 256, message = "Max depth must be between 1 and 256"))]
    pub max_depth: u16,

    /// Use every resolved field as identity for groups that declare no key
    pub identity_fallback: bool,

    /// Log substituted query text before it is sent to the driver
    pub log_queries: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_depth: 20,
            identity_fallback: false,
            log_queries: true,
        }
    }
}

impl ClientConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            max_depth: parse_env_var("ROWGRAPH_MAX_DEPTH", "20")?,
            identity_fallback: parse_env_var("ROWGRAPH_IDENTITY_FALLBACK", "false")?,
            log_queries: parse_env_var("ROWGRAPH_LOG_QUERIES", "true")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from CLI arguments with validation
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.merge(cli);
        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file; absent keys keep their defaults
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI overrides on top of this configuration
    pub fn merge(&mut self, cli: CliConfig) {
        if let Some(max_depth) = cli.max_depth {
            self.max_depth = max_depth;
        }
        if let Some(identity_fallback) = cli.identity_fallback {
            self.identity_fallback = identity_fallback;
        }
        if let Some(log_queries) = cli.log_queries {
            self.log_queries = log_queries;
        }
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            max_depth: self.max_depth,
            identity_fallback: self.identity_fallback,
        }
    }
}

/// CLI overrides; `None` keeps the value from the lower layer
#[derive(Clone, Debug, Default)]
pub struct CliConfig {
    pub max_depth: Option<u16>,
    pub identity_fallback: Option<bool>,
    pub log_queries: Option<bool>,
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
