use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_FILE_PATH: &str = "config.toml";

pub const DEFAULT_API_BASE: &str = "http://localhost:8080";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 7;
pub const DEFAULT_GREETING: &str = "Good morning, Dave. I am HAL 9000. I became operational at the H.A.L. plant in Urbana, Illinois on the 12th of January 1992. How may I assist you today?";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Which library entry may serve as video context for a chat turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoContextPolicy {
    /// Any entry with a remote path, whatever its processing status.
    #[default]
    AnyUploaded,
    /// Only entries whose processing has completed.
    CompletedOnly,
}

impl FromStr for VideoContextPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "any_uploaded" | "any" => Ok(Self::AnyUploaded),
            "completed_only" | "completed" => Ok(Self::CompletedOnly),
            other => Err(format!("unknown video context policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base: String,
    pub poll_interval_secs: u64,
    /// Retries for the JSON endpoints. Zero leaves retry policy to the caller.
    pub max_retries: u32,
    pub http_proxy: String,
    pub https_proxy: String,
    /// When set, chat requests reference videos as `{media_dir}/{file name}`.
    pub media_dir: Option<String>,
    pub video_context: VideoContextPolicy,
    pub greeting: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            max_retries: 0,
            http_proxy: String::new(),
            https_proxy: String::new(),
            media_dir: None,
            video_context: VideoContextPolicy::default(),
            greeting: Some(DEFAULT_GREETING.to_string()),
        }
    }
}

impl Config {
    /// Loads `config.toml` from the working directory when present, then applies
    /// environment overrides. A broken config file is logged and ignored.
    pub fn new() -> Self {
        let mut config = if Path::new(CONFIG_FILE_PATH).exists() {
            match Self::load_from(CONFIG_FILE_PATH) {
                Ok(config) => config,
                Err(err) => {
                    log::warn!("{}, falling back to defaults", err);
                    Config::default()
                }
            }
        } else {
            Config::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str::<Config>(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Applies overrides from a key lookup (normally the process environment).
    /// Values that fail to parse are logged and skipped.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_base) = lookup("KUBRICK_API_BASE") {
            self.api_base = api_base;
        }
        if let Some(interval) = lookup("KUBRICK_POLL_INTERVAL_SECS") {
            match interval.trim().parse::<u64>() {
                Ok(secs) => self.poll_interval_secs = secs,
                Err(err) => log::warn!("Ignoring KUBRICK_POLL_INTERVAL_SECS={}: {}", interval, err),
            }
        }
        if let Some(retries) = lookup("KUBRICK_MAX_RETRIES") {
            match retries.trim().parse::<u32>() {
                Ok(value) => self.max_retries = value,
                Err(err) => log::warn!("Ignoring KUBRICK_MAX_RETRIES={}: {}", retries, err),
            }
        }
        if let Some(http_proxy) = lookup("HTTP_PROXY") {
            self.http_proxy = http_proxy;
        }
        if let Some(https_proxy) = lookup("HTTPS_PROXY") {
            self.https_proxy = https_proxy;
        }
        if let Some(media_dir) = lookup("KUBRICK_MEDIA_DIR") {
            let media_dir = media_dir.trim().trim_end_matches('/').to_string();
            self.media_dir = (!media_dir.is_empty()).then_some(media_dir);
        }
        if let Some(policy) = lookup("KUBRICK_VIDEO_CONTEXT") {
            match policy.parse() {
                Ok(policy) => self.video_context = policy,
                Err(err) => log::warn!("Ignoring KUBRICK_VIDEO_CONTEXT: {}", err),
            }
        }
        if let Some(greeting) = lookup("KUBRICK_GREETING") {
            self.greeting = (!greeting.trim().is_empty()).then_some(greeting);
        }
    }

    /// Poll interval, clamped to at least one second.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn api_base(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }
}
