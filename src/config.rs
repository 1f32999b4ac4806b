use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const API_URL_VAR: &str = "CHATBOT_API_URL";
pub const TIMEOUT_VAR: &str = "CHATBOT_TIMEOUT_SECS";
pub const REVEAL_VAR: &str = "CHATBOT_REVEAL_MS";
pub const HISTORY_PATH_VAR: &str = "CHATBOT_HISTORY_PATH";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REVEAL_MS: u64 = 40;

/// File name of the persisted conversation, one file per storage key.
const HISTORY_FILE: &str = "chatHistory.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("{var} must be a whole number, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("could not determine a data directory; set {0}")]
    NoDataDir(&'static str),
}

/// Runtime settings for the chat client.
///
/// The backend base address is the only value that must come from the
/// deployment; everything else has a default.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_base_url: Url,
    pub request_timeout: Duration,
    pub reveal_interval: Duration,
    pub history_path: PathBuf,
}

impl ChatConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_url = lookup(API_URL_VAR)
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::Missing(API_URL_VAR))?;
        let api_base_url = Url::parse(raw_url.trim()).map_err(|source| ConfigError::InvalidUrl {
            var: API_URL_VAR,
            source,
        })?;

        let request_timeout =
            Duration::from_secs(parse_positive(&lookup, TIMEOUT_VAR, DEFAULT_TIMEOUT_SECS)?);
        let reveal_interval =
            Duration::from_millis(parse_positive(&lookup, REVEAL_VAR, DEFAULT_REVEAL_MS)?);

        let history_path = match lookup(HISTORY_PATH_VAR).filter(|p| !p.trim().is_empty()) {
            Some(path) => PathBuf::from(path),
            None => default_history_path()?,
        };

        Ok(Self {
            api_base_url,
            request_timeout,
            reveal_interval,
            history_path,
        })
    }
}

fn parse_positive<F>(lookup: &F, var: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let number = match lookup(var) {
        None => default,
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var, value })?,
    };
    if number == 0 {
        return Err(ConfigError::Zero(var));
    }
    Ok(number)
}

fn default_history_path() -> Result<PathBuf, ConfigError> {
    let data_dir = dirs::data_dir().ok_or(ConfigError::NoDataDir(HISTORY_PATH_VAR))?;
    Ok(data_dir.join("mini-chat").join(HISTORY_FILE))
}
