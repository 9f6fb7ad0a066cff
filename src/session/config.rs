//! Session configuration.

use std::env;
use std::time::Duration;

use crate::conversation::DEFAULT_SAMPLE_RATE;
use crate::error::{ColloquyError, Result};

pub const DEFAULT_MODEL: &str = "gpt-4o-realtime-preview-2024-10-01";
pub const DEFAULT_URL: &str = "wss://api.openai.com/v1/realtime";

/// Configuration for a realtime session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub model: String,
    pub base_url: String,
    /// Falls back to `OPENAI_API_KEY` at connect time when unset.
    pub api_key: Option<String>,
    /// PCM sample rate used for truncation and speech-slice math.
    pub sample_rate: u32,
    pub heartbeat_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_URL.to_string(),
            api_key: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            heartbeat_interval: Duration::from_secs(15),
        }
    }
}

impl SessionConfig {
    /// Defaults plus the API key from the environment (`OPENAI_API_KEY`),
    /// reading a `.env` file when present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self {
            api_key: env::var("OPENAI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            ..Self::default()
        }
    }

    pub(crate) fn resolve_api_key(&self) -> Result<String> {
        self.api_key
            .clone()
            .or_else(|| env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ColloquyError::Authentication("Missing OPENAI_API_KEY".into()))
    }

    pub(crate) fn realtime_url(&self) -> Result<String> {
        let trimmed = self.base_url.trim();
        if trimmed.is_empty() {
            return Err(ColloquyError::Configuration(
                "Realtime base URL cannot be empty".into(),
            ));
        }
        if self.model.is_empty() {
            return Ok(trimmed.to_string());
        }
        let separator = if trimmed.contains('?') { "&" } else { "?" };
        Ok(format!("{trimmed}{separator}model={}", self.model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_realtime_endpoint() {
        let config = SessionConfig::default();
        assert_eq!(config.base_url, DEFAULT_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.sample_rate, 24_000);
    }

    #[test]
    fn url_appends_model_query() {
        let config = SessionConfig {
            base_url: "ws://127.0.0.1:9000/v1/realtime".into(),
            model: "test-model".into(),
            ..SessionConfig::default()
        };
        assert_eq!(
            config.realtime_url().unwrap(),
            "ws://127.0.0.1:9000/v1/realtime?model=test-model"
        );
    }

    #[test]
    fn url_uses_ampersand_when_query_present() {
        let config = SessionConfig {
            base_url: "ws://127.0.0.1:9000/v1/realtime?beta=1".into(),
            model: "test-model".into(),
            ..SessionConfig::default()
        };
        assert_eq!(
            config.realtime_url().unwrap(),
            "ws://127.0.0.1:9000/v1/realtime?beta=1&model=test-model"
        );
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let config = SessionConfig {
            base_url: "  ".into(),
            ..SessionConfig::default()
        };
        assert!(config.realtime_url().is_err());
    }
}
