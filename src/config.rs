//! Session configuration from environment variables

use crate::speech::{token_endpoint, VoicePattern, DEFAULT_VOICE_PATTERN};
use crate::state_machine::state::DEFAULT_PASSIVITY_TIMEOUT;
use std::time::Duration;

pub const DEFAULT_LANGUAGE: &str = "en-US";
pub const DEFAULT_REGION: &str = "northeurope";
pub const DEFAULT_PORT: u16 = 8000;

/// Configuration for a spoken dialogue session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// BCP-47 recognition language
    pub language: String,
    /// Regex matched against voice names; first match wins
    pub voice: VoicePattern,
    pub region: String,
    pub subscription_key: Option<String>,
    pub token_endpoint: String,
    pub passivity_timeout: Duration,
    pub port: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let language = lookup("SPEECH_LANGUAGE").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let voice = match lookup("SPEECH_VOICE") {
            Some(pattern) => VoicePattern::new(&pattern).unwrap_or_else(|e| {
                tracing::warn!(
                    %pattern,
                    error = %e,
                    fallback = DEFAULT_VOICE_PATTERN,
                    "Invalid SPEECH_VOICE pattern"
                );
                VoicePattern::default()
            }),
            None => VoicePattern::default(),
        };

        let region = lookup("SPEECH_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string());
        let endpoint = lookup("SPEECH_TOKEN_ENDPOINT").unwrap_or_else(|| token_endpoint(&region));

        let passivity_timeout = lookup("SPEECH_PASSIVITY_SECS")
            .and_then(|s| s.parse().ok())
            .map_or(DEFAULT_PASSIVITY_TIMEOUT, Duration::from_secs);

        let port = lookup("SPEECH_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            language,
            voice,
            region,
            subscription_key: lookup("SPEECH_KEY").filter(|k| !k.is_empty()),
            token_endpoint: endpoint,
            passivity_timeout,
            port,
        }
    }
}
