use std::env;
use std::str::FromStr;

use super::validation::{ConfigError, ConfigResult};

/// Raw values read from the process environment.
///
/// Unset and blank variables are both treated as absent.
#[derive(Debug, Default)]
pub(super) struct EnvConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
    pub openai_api_key: Option<String>,
    pub realtime_url: Option<String>,
    pub realtime_model: Option<String>,
    pub realtime_voice: Option<String>,
    pub upstream_connect_timeout_seconds: Option<u64>,
    pub bid_webhook_url: Option<String>,
    pub bid_webhook_token: Option<String>,
    pub cors_allowed_origins: Option<String>,
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parsed<T: FromStr>(key: &'static str) -> ConfigResult<Option<T>> {
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(None),
    }
}

impl EnvConfig {
    pub fn load() -> ConfigResult<Self> {
        Ok(Self {
            host: var("HOST"),
            port: parsed("PORT")?,
            tls_cert_path: var("TLS_CERT_PATH"),
            tls_key_path: var("TLS_KEY_PATH"),
            openai_api_key: var("OPENAI_API_KEY"),
            realtime_url: var("REALTIME_URL"),
            realtime_model: var("REALTIME_MODEL"),
            realtime_voice: var("REALTIME_VOICE"),
            upstream_connect_timeout_seconds: parsed("UPSTREAM_CONNECT_TIMEOUT_SECS")?,
            bid_webhook_url: var("BID_WEBHOOK_URL"),
            bid_webhook_token: var("BID_WEBHOOK_TOKEN"),
            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS"),
        })
    }
}
