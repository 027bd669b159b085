use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::loader::{ECB_HISTORY_URL, SourceLocation};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub source: SourceLocation,
    pub fetch_timeout: Duration,
    /// `None` disables periodic reloads.
    pub reload_interval: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let source = match get("FXRATE_SOURCE_FILE") {
            Some(path) => SourceLocation::File(PathBuf::from(path)),
            None => SourceLocation::Url(
                get("FXRATE_SOURCE_URL").unwrap_or_else(|| ECB_HISTORY_URL.to_string()),
            ),
        };

        let port = parse_or(get("FXRATE_PORT"), "FXRATE_PORT", 5000u16)?;
        let fetch_timeout = parse_or(get("FXRATE_FETCH_TIMEOUT_SECS"), "FXRATE_FETCH_TIMEOUT_SECS", 30u64)?;
        let reload_interval = parse_or(get("FXRATE_RELOAD_INTERVAL_SECS"), "FXRATE_RELOAD_INTERVAL_SECS", 0u64)?;

        Ok(Self {
            bind: get("FXRATE_BIND").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            source,
            fetch_timeout: Duration::from_secs(fetch_timeout),
            reload_interval: (reload_interval > 0).then(|| Duration::from_secs(reload_interval)),
        })
    }
}

fn parse_or<T>(value: Option<String>, name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", name, raw)),
        None => Ok(default),
    }
}
