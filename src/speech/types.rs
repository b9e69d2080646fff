//! Opaque handles and value types shared between the turn manager and the
//! speech collaborators

use super::SpeechError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Bearer credential returned by the token endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// Handle to an opened audio capture context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioInputHandle(pub uuid::Uuid);

impl AudioInputHandle {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for AudioInputHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle recorded in the session context for a constructed speech client.
/// The client object itself is owned by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientHandle(pub uuid::Uuid);

impl ClientHandle {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ClientHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A synthesis voice as enumerated by the synthesis client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub name: String,
    pub locale: String,
}

impl Voice {
    pub fn new(name: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locale: locale.into(),
        }
    }
}

/// Identifies one `speak` call so its completion can be told apart from a
/// cancelled predecessor's
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtteranceId(pub u64);

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// Text to speak with the selected voice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    pub voice: Voice,
}

/// Default voice-name pattern when none is configured
pub const DEFAULT_VOICE_PATTERN: &str = "en-US";

static DEFAULT_VOICE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_VOICE_PATTERN).expect("default voice pattern is valid"));

/// Pattern matched against voice names to pick the synthesis voice
#[derive(Debug, Clone)]
pub struct VoicePattern(Regex);

impl VoicePattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn matches(&self, voice: &Voice) -> bool {
        self.0.is_match(&voice.name)
    }

    /// First voice whose name matches wins
    pub fn select<'a>(&self, voices: &'a [Voice]) -> Option<&'a Voice> {
        voices.iter().find(|voice| self.matches(voice))
    }

    /// `select`, reporting a miss as `NoVoice`
    pub fn require<'a>(&self, voices: &'a [Voice]) -> Result<&'a Voice, SpeechError> {
        self.select(voices).ok_or_else(|| {
            SpeechError::no_voice(format!(
                "No voice matches '{}' among {} voices",
                self.as_str(),
                voices.len()
            ))
        })
    }
}

impl Default for VoicePattern {
    fn default() -> Self {
        Self(DEFAULT_VOICE_REGEX.clone())
    }
}
