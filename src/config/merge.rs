use std::path::PathBuf;

use super::env::EnvConfig;
use super::validation::{ConfigError, ConfigResult};
use super::yaml::YamlConfig;
use super::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_HOST, DEFAULT_PORT, ServerConfig, TlsConfig};
use crate::core::realtime::openai::{OPENAI_REALTIME_URL, RealtimeModel, RealtimeVoice};

/// Build the final configuration: YAML over environment over defaults.
pub(super) fn merge_config(yaml: Option<YamlConfig>) -> ConfigResult<ServerConfig> {
    let env = EnvConfig::load()?;
    let yaml = yaml.unwrap_or_default();

    let server = yaml.server.unwrap_or_default();
    let providers = yaml.providers.unwrap_or_default();
    let realtime = yaml.realtime.unwrap_or_default();
    let bids = yaml.bids.unwrap_or_default();
    let security = yaml.security.unwrap_or_default();

    let tls = merge_tls(&env, server.tls.as_ref())?;

    let realtime_model = realtime
        .model
        .or(env.realtime_model)
        .map(|m| RealtimeModel::from_str_or_default(&m))
        .unwrap_or_default();
    let realtime_voice = realtime
        .voice
        .or(env.realtime_voice)
        .map(|v| RealtimeVoice::from_str_or_default(&v))
        .unwrap_or_default();

    Ok(ServerConfig {
        host: server.host.or(env.host).unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: server.port.or(env.port).unwrap_or(DEFAULT_PORT),
        tls,
        openai_api_key: providers
            .openai_api_key
            .or(env.openai_api_key)
            .filter(|key| !key.trim().is_empty()),
        realtime_url: realtime
            .url
            .or(env.realtime_url)
            .unwrap_or_else(|| OPENAI_REALTIME_URL.to_string()),
        realtime_model,
        realtime_voice,
        upstream_connect_timeout_seconds: realtime
            .connect_timeout_seconds
            .or(env.upstream_connect_timeout_seconds)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        bid_webhook_url: bids.webhook_url.or(env.bid_webhook_url),
        bid_webhook_token: bids.webhook_token.or(env.bid_webhook_token),
        cors_allowed_origins: security.cors_allowed_origins.or(env.cors_allowed_origins),
    })
}

fn merge_tls(env: &EnvConfig, yaml: Option<&super::yaml::TlsYaml>) -> ConfigResult<Option<TlsConfig>> {
    if yaml.and_then(|t| t.enabled) == Some(false) {
        return Ok(None);
    }

    let cert = yaml
        .and_then(|t| t.cert_path.clone())
        .or_else(|| env.tls_cert_path.clone());
    let key = yaml
        .and_then(|t| t.key_path.clone())
        .or_else(|| env.tls_key_path.clone());

    match (cert, key) {
        (Some(cert), Some(key)) => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        })),
        (None, None) => Ok(None),
        _ => Err(ConfigError::TlsIncomplete),
    }
}
