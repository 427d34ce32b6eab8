//! Configuration for the relay server
//!
//! Settings come from the environment (with `.env` loaded by `main`) and an
//! optional YAML file. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use voice_bid_relay::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::from_env()?;
//!
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::core::realtime::openai::{RealtimeModel, RealtimeVoice};

mod env;
mod merge;
mod validation;
mod yaml;

pub use validation::{ConfigError, ConfigResult};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Upstream realtime service
    /// Without it every relay session is rejected
    pub openai_api_key: Option<String>,
    pub realtime_url: String,
    pub realtime_model: RealtimeModel,
    pub realtime_voice: RealtimeVoice,
    pub upstream_connect_timeout_seconds: u64,

    // Bid delivery
    /// Extracted bids are POSTed here when set, otherwise only logged
    pub bid_webhook_url: Option<String>,
    pub bid_webhook_token: Option<String>,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("realtime_url", &self.realtime_url)
            .field("realtime_model", &self.realtime_model)
            .field("realtime_voice", &self.realtime_voice)
            .field("upstream_connect_timeout_seconds", &self.upstream_connect_timeout_seconds)
            .field("bid_webhook_url", &self.bid_webhook_url)
            .field("bid_webhook_token", &self.bid_webhook_token.as_ref().map(|_| "[REDACTED]"))
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .finish()
    }
}

/// Zeroize secrets when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
        if let Some(ref mut token) = self.bid_webhook_token {
            token.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        validation::validate_tls(&self.tls)?;
        validation::validate_realtime_url(&self.realtime_url)?;
        validation::validate_webhook_url(&self.bid_webhook_url)?;
        validation::validate_connect_timeout(self.upstream_connect_timeout_seconds)?;
        Ok(())
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    pub fn upstream_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_connect_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    const ENV_KEYS: &[&str] = &[
        "HOST",
        "PORT",
        "OPENAI_API_KEY",
        "REALTIME_URL",
        "REALTIME_MODEL",
        "REALTIME_VOICE",
        "UPSTREAM_CONNECT_TIMEOUT_SECS",
        "BID_WEBHOOK_URL",
        "BID_WEBHOOK_TOKEN",
        "CORS_ALLOWED_ORIGINS",
        "TLS_CERT_PATH",
        "TLS_KEY_PATH",
    ];

    fn cleanup_env_vars() {
        unsafe {
            for key in ENV_KEYS {
                env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();

        let config = ServerConfig::from_env().unwrap();

        assert_eq!(config.address(), "0.0.0.0:3001");
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.realtime_url, "wss://api.openai.com/v1/realtime");
        assert_eq!(config.realtime_model, RealtimeModel::default());
        assert_eq!(config.realtime_voice, RealtimeVoice::Alloy);
        assert_eq!(config.upstream_connect_timeout(), Duration::from_secs(10));
        assert!(!config.is_tls_enabled());
        assert!(config.bid_webhook_url.is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_values() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PORT", "4000");
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("REALTIME_VOICE", "sage");
            env::set_var("UPSTREAM_CONNECT_TIMEOUT_SECS", "3");
            env::set_var("BID_WEBHOOK_URL", "http://localhost:8000/bids");
        }

        let config = ServerConfig::from_env().unwrap();

        assert_eq!(config.port, 4000);
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.realtime_voice, RealtimeVoice::Sage);
        assert_eq!(config.upstream_connect_timeout_seconds, 3);
        assert_eq!(config.bid_webhook_url.as_deref(), Some("http://localhost:8000/bids"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_blank_api_key_is_absent() {
        cleanup_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "   ");
        }

        let config = ServerConfig::from_env().unwrap();
        assert!(config.openai_api_key.is_none());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_invalid_port_rejected() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PORT", "not-a-port");
        }

        let err = ServerConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("PORT"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_half_tls_rejected() {
        cleanup_env_vars();
        unsafe {
            env::set_var("TLS_CERT_PATH", "/certs/cert.pem");
        }

        let err = ServerConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("TLS_KEY_PATH"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 8080
providers:
  openai_api_key: "sk-yaml"
realtime:
  url: "ws://127.0.0.1:9000/v1/realtime"
  connect_timeout_seconds: 2
"#;
        fs::write(&config_path, yaml_content).unwrap();

        unsafe {
            env::set_var("HOST", "0.0.0.0");
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("REALTIME_VOICE", "echo");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-yaml"));
        assert_eq!(config.realtime_url, "ws://127.0.0.1:9000/v1/realtime");
        assert_eq!(config.realtime_voice, RealtimeVoice::Echo);
        assert_eq!(config.upstream_connect_timeout_seconds, 2);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_rejects_http_realtime_url() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "realtime:\n  url: \"https://api.openai.com\"\n").unwrap();

        assert!(ServerConfig::from_file(&config_path).is_err());
    }

    #[test]
    #[serial]
    fn test_from_file_tls_disabled_in_yaml() {
        cleanup_env_vars();
        unsafe {
            env::set_var("TLS_CERT_PATH", "/missing/cert.pem");
            env::set_var("TLS_KEY_PATH", "/missing/key.pem");
        }

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "server:\n  tls:\n    enabled: false\n").unwrap();

        let config = ServerConfig::from_file(&config_path).unwrap();
        assert!(!config.is_tls_enabled());

        cleanup_env_vars();
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ServerConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            tls: None,
            openai_api_key: Some("sk-secret".to_string()),
            realtime_url: "wss://api.openai.com/v1/realtime".to_string(),
            realtime_model: RealtimeModel::default(),
            realtime_voice: RealtimeVoice::default(),
            upstream_connect_timeout_seconds: DEFAULT_CONNECT_TIMEOUT_SECS,
            bid_webhook_url: None,
            bid_webhook_token: Some("hook-secret".to_string()),
            cors_allowed_origins: None,
        };

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(!rendered.contains("hook-secret"));
    }
}
