use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub openid: OpenIdConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/microblog.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    /// Externally visible base URL; identity providers redirect back to it.
    pub public_url: String,

    /// Whether to set the Secure flag on session cookies.
    /// Leave off for local development without HTTPS.
    pub secure_cookies: bool,

    /// Idle lifetime of a session that did not ask to be remembered.
    pub session_inactivity_minutes: i64,

    /// Lifetime of a "remember me" session, surviving browser restarts.
    pub remember_me_days: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            public_url: "http://localhost:5000".to_string(),
            secure_cookies: false,
            session_inactivity_minutes: 60,
            remember_me_days: 365,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpenIdProviderConfig {
    pub name: String,

    /// Identity URL; `<username>` is a placeholder the user fills in.
    pub url: String,
}

impl OpenIdProviderConfig {
    fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenIdConfig {
    pub providers: Vec<OpenIdProviderConfig>,

    /// Timeout for the direct verification request to the provider.
    pub request_timeout_seconds: u64,
}

impl Default for OpenIdConfig {
    fn default() -> Self {
        Self {
            providers: vec![
                OpenIdProviderConfig::new("Yahoo", "https://me.yahoo.com"),
                OpenIdProviderConfig::new("AOL", "http://openid.aol.com/<username>"),
                OpenIdProviderConfig::new("Flickr", "http://www.flickr.com/<username>"),
                OpenIdProviderConfig::new("MyOpenID", "https://www.myopenid.com"),
            ],
            request_timeout_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub json_logs: bool,

    pub loki_enabled: bool,

    pub loki_url: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            json_logs: false,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            openid: OpenIdConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("microblog").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".microblog").join("config.toml"));
        }

        paths
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.database_path.trim().is_empty() {
            anyhow::bail!("Database path cannot be empty");
        }

        if self.server.port == 0 {
            anyhow::bail!("Server port must be > 0");
        }

        url::Url::parse(&self.server.public_url)
            .with_context(|| format!("Invalid public URL: {}", self.server.public_url))?;

        if self.server.remember_me_days <= 0 || self.server.session_inactivity_minutes <= 0 {
            anyhow::bail!("Session lifetimes must be positive");
        }

        Ok(())
    }

    /// Public URL the identity provider sends the browser back to.
    pub fn login_return_url(&self) -> Result<url::Url> {
        let base = url::Url::parse(&self.server.public_url)
            .with_context(|| format!("Invalid public URL: {}", self.server.public_url))?;
        base.join(crate::constants::routes::LOGIN_COMPLETE)
            .context("Failed to build login return URL")
    }
}
