use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use super::TlsConfig;

/// Errors found while validating a merged configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("TLS requires both TLS_CERT_PATH and TLS_KEY_PATH")]
    TlsIncomplete,

    #[error("TLS file not found: {}", .0.display())]
    TlsFileMissing(PathBuf),

    #[error("Invalid URL for {key}: {reason}")]
    InvalidUrl { key: &'static str, reason: String },

    #[error("UPSTREAM_CONNECT_TIMEOUT_SECS must be greater than zero")]
    ZeroTimeout,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

pub fn validate_tls(tls: &Option<TlsConfig>) -> ConfigResult<()> {
    let Some(tls) = tls else {
        return Ok(());
    };
    for path in [&tls.cert_path, &tls.key_path] {
        if !path.exists() {
            return Err(ConfigError::TlsFileMissing(path.clone()));
        }
    }
    Ok(())
}

/// The realtime endpoint must be a WebSocket URL.
pub fn validate_realtime_url(url: &str) -> ConfigResult<()> {
    let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
        key: "REALTIME_URL",
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(ConfigError::InvalidUrl {
            key: "REALTIME_URL",
            reason: format!("expected ws:// or wss://, got {other}://"),
        }),
    }
}

pub fn validate_webhook_url(url: &Option<String>) -> ConfigResult<()> {
    let Some(url) = url else {
        return Ok(());
    };
    let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
        key: "BID_WEBHOOK_URL",
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidUrl {
            key: "BID_WEBHOOK_URL",
            reason: format!("expected http:// or https://, got {other}://"),
        }),
    }
}

pub fn validate_connect_timeout(seconds: u64) -> ConfigResult<()> {
    if seconds == 0 {
        return Err(ConfigError::ZeroTimeout);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_tls_files_must_exist() {
        assert!(validate_tls(&None).is_ok());

        let cert = NamedTempFile::new().unwrap();
        let key = NamedTempFile::new().unwrap();
        let present = Some(TlsConfig {
            cert_path: cert.path().to_path_buf(),
            key_path: key.path().to_path_buf(),
        });
        assert!(validate_tls(&present).is_ok());

        let missing = Some(TlsConfig {
            cert_path: cert.path().to_path_buf(),
            key_path: PathBuf::from("/nonexistent/key.pem"),
        });
        assert!(matches!(validate_tls(&missing), Err(ConfigError::TlsFileMissing(_))));
    }

    #[test]
    fn test_realtime_url_scheme() {
        assert!(validate_realtime_url("wss://api.openai.com/v1/realtime").is_ok());
        assert!(validate_realtime_url("ws://127.0.0.1:9000").is_ok());
        assert!(validate_realtime_url("https://api.openai.com").is_err());
        assert!(validate_realtime_url("not a url").is_err());
    }

    #[test]
    fn test_webhook_url_scheme() {
        assert!(validate_webhook_url(&None).is_ok());
        assert!(validate_webhook_url(&Some("https://bids.example.com/hook".into())).is_ok());
        assert!(validate_webhook_url(&Some("ftp://bids.example.com".into())).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(validate_connect_timeout(10).is_ok());
        assert!(matches!(validate_connect_timeout(0), Err(ConfigError::ZeroTimeout)));
    }
}
