//! Speech collaborator error types

use thiserror::Error;

/// Failure reported by a speech collaborator (token source, audio device,
/// recognition or synthesis client)
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SpeechError {
    pub kind: SpeechErrorKind,
    pub message: String,
}

impl SpeechError {
    pub fn new(kind: SpeechErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(SpeechErrorKind::Auth, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SpeechErrorKind::Network, message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(SpeechErrorKind::Permission, message)
    }

    pub fn no_voice(message: impl Into<String>) -> Self {
        Self::new(SpeechErrorKind::NoVoice, message)
    }

    pub fn client(message: impl Into<String>) -> Self {
        Self::new(SpeechErrorKind::Client, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(SpeechErrorKind::Unavailable, message)
    }

    /// Whether the session can keep running after this error.
    ///
    /// Permission and authentication failures cannot be recovered without
    /// restarting the session.
    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechErrorKind {
    /// Token endpoint refused the credential (401, 403)
    Auth,
    /// Transport failure or unexpected HTTP status
    Network,
    /// Microphone access refused or revoked
    Permission,
    /// No synthesis voice matched the configured pattern
    NoVoice,
    /// The client rejected a call (start while started, bad utterance, ...)
    Client,
    /// A prerequisite (token, audio input, client) is missing
    Unavailable,
}

impl SpeechErrorKind {
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Auth | Self::Permission | Self::Unavailable)
    }
}
