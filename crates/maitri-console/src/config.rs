use crate::link::LinkConfig;
use clap::Parser;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_WS_URL: &str = "ws://localhost:8000/ws";
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Parser, Debug, Clone)]
#[command(name = "maitri-console", about = "MAITRI crew assistant console")]
pub struct Args {
    #[arg(long, default_value = "")]
    pub ws_url: String,
    #[arg(long, default_value = "")]
    pub api_url: String,
    #[arg(long, default_value = "")]
    pub log_dir: String,
    #[arg(long, default_value_t = 3000)]
    pub reconnect_delay_ms: u64,
    #[arg(long, default_value_t = 5)]
    pub poll_interval_secs: u64,
    /// 0 disables the keepalive ping.
    #[arg(long, default_value_t = 30)]
    pub ping_interval_secs: u64,
    #[arg(long, default_value_t = 10)]
    pub request_timeout_secs: u64,
    /// Answer locally only; do not forward operator text to the backend.
    #[arg(long)]
    pub no_relay: bool,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub ws_url: Url,
    pub api_url: Url,
    pub log_dir: PathBuf,
    pub log_stdout: bool,
    pub link: LinkConfig,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub relay: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid {name} {value:?}: {reason}")]
    InvalidUrl {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("{name} must use one of {allowed:?}, got {scheme}")]
    UnsupportedScheme {
        name: &'static str,
        scheme: String,
        allowed: &'static [&'static str],
    },
}

pub fn load_config(args: &Args) -> Result<Config, ConfigError> {
    let ws_url = resolve_url(
        "ws url",
        &args.ws_url,
        "MAITRI_WS_URL",
        DEFAULT_WS_URL,
        &["ws", "wss"],
    )?;
    let api_url = resolve_url(
        "api url",
        &args.api_url,
        "MAITRI_API_URL",
        DEFAULT_API_URL,
        &["http", "https"],
    )?;
    Ok(Config {
        ws_url,
        api_url,
        log_dir: resolve_log_dir(&args.log_dir),
        log_stdout: resolve_log_stdout(),
        link: LinkConfig {
            reconnect_delay: Duration::from_millis(args.reconnect_delay_ms),
            ping_interval: (args.ping_interval_secs > 0)
                .then(|| Duration::from_secs(args.ping_interval_secs)),
        },
        poll_interval: Duration::from_secs(args.poll_interval_secs.max(1)),
        request_timeout: Duration::from_secs(args.request_timeout_secs.max(1)),
        relay: !args.no_relay,
    })
}

fn resolve_url(
    name: &'static str,
    flag: &str,
    env_key: &str,
    default: &str,
    allowed: &'static [&'static str],
) -> Result<Url, ConfigError> {
    let raw = if !flag.trim().is_empty() {
        flag.trim().to_string()
    } else {
        env_value(env_key).unwrap_or_else(|| default.to_string())
    };
    parse_url(name, &raw, allowed)
}

fn parse_url(
    name: &'static str,
    raw: &str,
    allowed: &'static [&'static str],
) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|err| ConfigError::InvalidUrl {
        name,
        value: raw.to_string(),
        reason: err.to_string(),
    })?;
    if !allowed.contains(&url.scheme()) {
        return Err(ConfigError::UnsupportedScheme {
            name,
            scheme: url.scheme().to_string(),
            allowed,
        });
    }
    Ok(url)
}

fn resolve_log_dir(flag: &str) -> PathBuf {
    if !flag.trim().is_empty() {
        return PathBuf::from(flag.trim());
    }
    if let Some(value) = env_value("MAITRI_LOG_DIR") {
        return PathBuf::from(value);
    }
    if let Some(state) = env_value("XDG_STATE_HOME") {
        return PathBuf::from(state).join("maitri");
    }
    if let Some(home) = env_value("HOME") {
        return PathBuf::from(home).join(".local/state/maitri");
    }
    env::temp_dir().join("maitri")
}

fn resolve_log_stdout() -> bool {
    env_value("MAITRI_LOG_STDOUT")
        .and_then(|value| parse_bool_flag(&value))
        .unwrap_or(false)
}

pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" | "off" | "OFF" => Some(false),
        _ => None,
    }
}

fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
