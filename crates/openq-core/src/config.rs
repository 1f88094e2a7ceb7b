//! Configuration management for openq
//!
//! Loads configuration with priority:
//! 1. openq.toml (or specified config file)
//! 2. Environment variables referenced as `${VAR_NAME}`
//! 3. Defaults

use crate::auth::AuthConfig;
use crate::error::Error;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "openq.toml";

/// openq configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenqConfig {
    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL every operation path is appended to
    #[serde(default)]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Defaults handed to the query cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// How long fetched data counts as fresh
    #[serde(default)]
    pub stale_time_ms: u64,

    /// Query parameter paginated queries write the page param into
    #[serde(default = "default_page_param_name")]
    pub page_param_name: String,
}

/// Observability configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: Option<String>,
    pub service_name: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: default_timeout_secs(),
            headers: BTreeMap::new(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time_ms: 0,
            page_param_name: default_page_param_name(),
        }
    }
}

impl OpenqConfig {
    /// Load configuration from openq.toml in the current directory or a parent.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p.to_path_buf()
        } else {
            Self::find_config_file()?
        };

        tracing::debug!("Loading configuration from: {:?}", config_path);

        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))
    }

    /// Parse configuration from a TOML string and resolve `${VAR}` references.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: OpenqConfig = toml::from_str(contents)?;
        config.resolve_env_vars();
        config.validate()?;
        Ok(config)
    }

    /// Find openq.toml by searching current directory and parents
    fn find_config_file() -> Result<PathBuf> {
        let mut current = env::current_dir()?;

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Ok(config_path);
            }

            if !current.pop() {
                break;
            }
        }

        Err(anyhow!("{} not found in current directory or any parent", CONFIG_FILE_NAME))
    }

    fn resolve_env_vars(&mut self) {
        if let Some(resolved) = Self::resolve_env_var(&self.client.base_url) {
            self.client.base_url = resolved;
        }

        for value in self.client.headers.values_mut() {
            if let Some(resolved) = Self::resolve_env_var(value) {
                *value = resolved;
            }
        }

        for secret in self.auth.secrets_mut() {
            if let Some(resolved) = Self::resolve_env_var(secret) {
                *secret = resolved;
            }
        }
    }

    /// Resolve a single ${VAR_NAME} reference
    ///
    /// Plain values come back unchanged; references to unset variables yield `None`
    /// and leave the original text in place.
    fn resolve_env_var(value: &str) -> Option<String> {
        if value.starts_with("${") && value.ends_with('}') {
            let var_name = &value[2..value.len() - 1];
            env::var(var_name).ok()
        } else {
            Some(value.to_string())
        }
    }

    fn validate(&self) -> Result<()> {
        if self.query.page_param_name.is_empty() {
            return Err(Error::config_error("query.page_param_name must not be empty").into());
        }
        Ok(())
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_param_name() -> String {
    "cursor".to_string()
}
