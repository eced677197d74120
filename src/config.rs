use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::Token;
use crate::error::BambooError;

/// Configuration file structure for bamboo-mcp.
///
/// Every value can also be supplied on the command line or through the
/// `BAMBOO_URL`, `BAMBOO_TOKEN` and `BAMBOO_PROXY` environment variables,
/// which take precedence over the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Bamboo server connection
    #[serde(default)]
    pub bamboo: BambooConfig,

    /// Log retrieval defaults
    #[serde(default)]
    pub logs: LogsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BambooConfig {
    /// Bamboo instance base URL (e.g., 'https://bamboo.example.com')
    pub base_url: Option<String>,

    /// Personal access token
    pub token: Option<String>,

    /// HTTP(S) proxy all requests are routed through
    pub proxy_url: Option<String>,

    /// Per-request timeout in seconds; no timeout when unset
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LogsConfig {
    /// Maximum log lines fetched per job
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            max_lines: default_max_lines(),
        }
    }
}

pub const DEFAULT_MAX_LOG_LINES: usize = 1000;

fn default_max_lines() -> usize {
    DEFAULT_MAX_LOG_LINES
}

/// Resolved, immutable connection settings handed to the HTTP client.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub base_url: String,
    pub token: Token,
    pub proxy_url: Option<String>,
    pub timeout: Option<Duration>,
}

impl ConnectionSettings {
    pub fn new(base_url: impl Into<String>, token: Token) -> Self {
        Self {
            base_url: base_url.into(),
            token,
            proxy_url: None,
            timeout: None,
        }
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./bamboo-mcp.toml, ./bamboo-mcp.json, ./bamboo-mcp.yaml, ./bamboo-mcp.yml
    /// 3. `<config dir>/bamboo-mcp/config.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                log::debug!("Config file {} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            return Self::load_from_path(path);
        }

        let candidates = [
            "bamboo-mcp.toml",
            "bamboo-mcp.json",
            "bamboo-mcp.yaml",
            "bamboo-mcp.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        if let Some(path) = user_config_path().filter(|p| p.exists()) {
            return Self::load_from_path(&path);
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        let config = match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Overlay values given on the command line (or via their env fallbacks).
    pub fn apply_overrides(
        &mut self,
        base_url: Option<&str>,
        token: Option<&str>,
        proxy_url: Option<&str>,
    ) {
        if let Some(url) = base_url {
            self.bamboo.base_url = Some(url.to_owned());
        }
        if let Some(token) = token {
            self.bamboo.token = Some(token.to_owned());
        }
        if let Some(proxy) = proxy_url {
            self.bamboo.proxy_url = Some(proxy.to_owned());
        }
    }

    /// Resolve the connection settings, failing when URL or token are missing.
    pub fn connection(&self) -> crate::error::Result<ConnectionSettings> {
        let base_url = self
            .bamboo
            .base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                BambooError::Config(
                    "BAMBOO_URL environment variable (or bamboo.base-url) is required".into(),
                )
            })?;

        let token = self
            .bamboo
            .token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                BambooError::Config(
                    "BAMBOO_TOKEN environment variable (or bamboo.token) is required".into(),
                )
            })?;

        let mut settings = ConnectionSettings::new(base_url, Token::from(token));
        settings.proxy_url = self.bamboo.proxy_url.clone().filter(|p| !p.is_empty());
        settings.timeout = self.bamboo.timeout_secs.map(Duration::from_secs);
        Ok(settings)
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bamboo-mcp").join("config.toml"))
}
