//! Crawl-level settings and per-request flag resolution
use crate::client::ClientOptions;
use crate::constants;
use crate::http::Meta;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Behaviour switches that can be set per request or per crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    /// Try the archive before issuing a live GET
    ProxyEnabled,
    /// Go live when the archive has nothing for a proxied request
    ProxyFallthroughEnabled,
    /// Try the archive when a live GET comes back as an HTTP error
    FallbackEnabled,
}

impl Flag {
    /// Key in a request's meta that overrides the crawl setting
    pub fn meta_key(&self) -> &'static str {
        match self {
            Flag::ProxyEnabled => constants::META_PROXY_ENABLED,
            Flag::ProxyFallthroughEnabled => constants::META_PROXY_FALLTHROUGH_ENABLED,
            Flag::FallbackEnabled => constants::META_FALLBACK_ENABLED,
        }
    }

    /// Name of the crawl setting
    pub fn setting_key(&self) -> &'static str {
        match self {
            Flag::ProxyEnabled => constants::SETTING_PROXY_ENABLED,
            Flag::ProxyFallthroughEnabled => constants::SETTING_PROXY_FALLTHROUGH_ENABLED,
            Flag::FallbackEnabled => constants::SETTING_FALLBACK_ENABLED,
        }
    }

    pub fn default_value(&self) -> bool {
        match self {
            Flag::ProxyEnabled => false,
            Flag::ProxyFallthroughEnabled => true,
            Flag::FallbackEnabled => true,
        }
    }
}

/// Crawl-wide configuration. Unset values fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "WAYBACK_MACHINE_PROXY_ENABLED", default, skip_serializing_if = "Option::is_none")]
    pub proxy_enabled: Option<bool>,

    #[serde(rename = "WAYBACK_MACHINE_PROXY_FALLTHROUGH_ENABLED", default, skip_serializing_if = "Option::is_none")]
    pub proxy_fallthrough_enabled: Option<bool>,

    #[serde(rename = "WAYBACK_MACHINE_FALLBACK_ENABLED", default, skip_serializing_if = "Option::is_none")]
    pub fallback_enabled: Option<bool>,

    /// Archive base URL
    #[serde(rename = "WAYBACK_MACHINE_URL", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Archive request timeout in seconds
    #[serde(rename = "WAYBACK_MACHINE_TIMEOUT_SECS", default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Archive requests per minute
    #[serde(rename = "WAYBACK_MACHINE_RATE_LIMIT", default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<usize>,
}

impl Settings {
    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
        Ok(settings)
    }

    /// Read settings from `WAYBACK_MACHINE_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let flag = |key: &str| -> Result<Option<bool>> {
            match lookup(key) {
                None => Ok(None),
                Some(raw) => parse_bool(&raw)
                    .map(Some)
                    .with_context(|| format!("{} must be a boolean, got `{}`", key, raw)),
            }
        };
        let number = |key: &str| -> Result<Option<u64>> {
            lookup(key)
                .map(|raw| {
                    raw.trim()
                        .parse::<u64>()
                        .with_context(|| format!("{} must be a number, got `{}`", key, raw))
                })
                .transpose()
        };

        Ok(Self {
            proxy_enabled: flag(constants::SETTING_PROXY_ENABLED)?,
            proxy_fallthrough_enabled: flag(constants::SETTING_PROXY_FALLTHROUGH_ENABLED)?,
            fallback_enabled: flag(constants::SETTING_FALLBACK_ENABLED)?,
            url: lookup(constants::SETTING_URL),
            timeout_secs: number(constants::SETTING_TIMEOUT_SECS)?,
            rate_limit: number(constants::SETTING_RATE_LIMIT)?.map(|n| n as usize),
        })
    }

    /// Values set in `other` take precedence over values set here
    pub fn merge(self, other: Settings) -> Settings {
        Settings {
            proxy_enabled: other.proxy_enabled.or(self.proxy_enabled),
            proxy_fallthrough_enabled: other
                .proxy_fallthrough_enabled
                .or(self.proxy_fallthrough_enabled),
            fallback_enabled: other.fallback_enabled.or(self.fallback_enabled),
            url: other.url.or(self.url),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
            rate_limit: other.rate_limit.or(self.rate_limit),
        }
    }

    /// The crawl-level value of a flag, if set
    pub fn get(&self, flag: Flag) -> Option<bool> {
        match flag {
            Flag::ProxyEnabled => self.proxy_enabled,
            Flag::ProxyFallthroughEnabled => self.proxy_fallthrough_enabled,
            Flag::FallbackEnabled => self.fallback_enabled,
        }
    }

    pub fn set(&mut self, flag: Flag, value: bool) {
        match flag {
            Flag::ProxyEnabled => self.proxy_enabled = Some(value),
            Flag::ProxyFallthroughEnabled => self.proxy_fallthrough_enabled = Some(value),
            Flag::FallbackEnabled => self.fallback_enabled = Some(value),
        }
    }

    /// Archive client options derived from these settings
    pub fn client_options(&self) -> ClientOptions {
        let mut options = ClientOptions::default();
        if let Some(url) = &self.url {
            options.base_url = url.clone();
        }
        if let Some(secs) = self.timeout_secs {
            options.timeout = Duration::from_secs(secs);
        }
        options.rate_limit = self.rate_limit;
        options
    }
}

/// Resolve a flag with precedence request meta > crawl settings > default
///
/// A meta value counts by truthiness: recognised boolean words decide directly, other
/// strings and collections are true when non-empty, numbers when non-zero, null is false.
pub fn resolve_flag(meta: &Meta, settings: &Settings, flag: Flag) -> bool {
    if let Some(value) = meta.get(flag.meta_key()) {
        return meta_truthy(value);
    }

    settings.get(flag).unwrap_or_else(|| flag.default_value())
}

fn meta_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => parse_bool(s).unwrap_or_else(|| !s.trim().is_empty()),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
