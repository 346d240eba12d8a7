use careerlink_common::util::PositiveDuration;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const ENV_PREFIX: &str = "CAREERLINK_";

pub const DEFAULT_COMMENT_PAGE_STEP: usize = 5;
pub const DEFAULT_FOLLOW_THROTTLE_THRESHOLD: usize = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
}

/// Tuning knobs of the synchronization core. Every field has a default.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Upper bound on every remote call; expiry counts as a failure.
    pub request_timeout: PositiveDuration,
    /// Above this many distinct authors, relationship lookups are spaced out.
    pub follow_throttle_threshold: usize,
    pub follow_throttle_delay: PositiveDuration,
    pub focus_debounce: PositiveDuration,
    pub search_debounce: PositiveDuration,
    pub comment_page_step: usize,
    pub comment_fetch_size: u32,
    pub search_page_size: u32,
    pub fallback_scan_size: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout: PositiveDuration::from_millis(10_000),
            follow_throttle_threshold: DEFAULT_FOLLOW_THROTTLE_THRESHOLD,
            follow_throttle_delay: PositiveDuration::from_millis(300),
            focus_debounce: PositiveDuration::from_millis(500),
            search_debounce: PositiveDuration::from_millis(800),
            comment_page_step: DEFAULT_COMMENT_PAGE_STEP,
            comment_fetch_size: 50,
            search_page_size: 20,
            fallback_scan_size: 100,
        }
    }
}

/// Loads `.env` if present. A missing file is not an error.
pub fn load_dotenv() -> Result<(), ConfigError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .env file found");
        } else {
            return Err(e.into());
        }
    }
    Ok(())
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv()?;
        Ok(envy::prefixed(ENV_PREFIX).from_env()?)
    }
}
