//! Configuration loading and management.
//!
//! Loads configuration from embedded config.toml with environment variable overrides.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Embedded configuration file content.
const CONFIG_TOML: &str = include_str!("../config.toml");

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub api: ApiConfig,
    pub routes: RoutesConfig,
    pub refresh: RefreshConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub token_header: String,
    pub authenticate_path: String,
    pub refresh_path: String,
    pub logout_path: String,
    pub ping_path: String,
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutesConfig {
    /// Where irrecoverable auth failures send the user.
    pub login_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub key: String,
    pub file_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    /// Load configuration from embedded config.toml with environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::embedded()?;

        if let Ok(base_url) = env::var("ARCHIVAL_API_BASE_URL") {
            config.api.base_url = base_url;
        }

        if let Ok(login_path) = env::var("ARCHIVAL_LOGIN_PATH") {
            config.routes.login_path = login_path;
        }

        if let Ok(timeout) = env::var("ARCHIVAL_REFRESH_TIMEOUT") {
            config.refresh.timeout_seconds = timeout
                .parse()
                .context("ARCHIVAL_REFRESH_TIMEOUT must be a number of seconds")?;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            config.logging.level = log_level;
        }

        config.validate()?;

        Ok(config)
    }

    /// Parse the embedded defaults without applying the environment.
    pub fn embedded() -> Result<Self> {
        toml::from_str(CONFIG_TOML).context("Failed to parse embedded config.toml")
    }

    /// Validate that required configuration is present.
    fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            anyhow::bail!(
                "API base URL not configured. Set ARCHIVAL_API_BASE_URL environment variable \
                 or update config.toml"
            );
        }

        url::Url::parse(&self.api.base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.api.base_url))?;

        if !self.routes.login_path.starts_with('/') {
            anyhow::bail!(
                "Login path must be absolute (got {:?})",
                self.routes.login_path
            );
        }

        if self.api.token_header.is_empty() {
            anyhow::bail!("Token header name must not be empty");
        }

        Ok(())
    }

    /// Build a full endpoint URL from a path relative to the API base.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api.base_url.trim_end_matches('/'), path)
    }

    /// Deadline for a single refresh call, if one is configured.
    pub fn refresh_timeout(&self) -> Option<Duration> {
        match self.refresh.timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_seconds)
    }

    pub fn http_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.api.connect_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(base_url: &str) -> Config {
        let mut config = Config::embedded().unwrap();
        config.api.base_url = base_url.to_string();
        config
    }

    #[test]
    fn test_config_parsing() {
        let result = toml::from_str::<Config>(CONFIG_TOML);
        assert!(result.is_ok(), "Config parsing failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.routes.login_path, "/login");
        assert_eq!(config.store.key, "token");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint() {
        let config = test_config("http://localhost:8080/api/");
        assert_eq!(
            config.endpoint("/users/refresh-token"),
            "http://localhost:8080/api/users/refresh-token"
        );
    }

    #[test]
    fn test_refresh_timeout() {
        let mut config = test_config("http://localhost:8080/api");
        config.refresh.timeout_seconds = 0;
        assert!(config.refresh_timeout().is_none());

        config.refresh.timeout_seconds = 5;
        assert_eq!(config.refresh_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_validate_rejects_relative_login_path() {
        let mut config = test_config("http://localhost:8080/api");
        config.routes.login_path = "LoginPage".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let config = test_config("not a url");
        assert!(config.validate().is_err());
    }
}
