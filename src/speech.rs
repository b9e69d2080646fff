//! Speech collaborators
//!
//! Value types shared with the turn manager, the Azure token and voice
//! endpoints, and a terminal backend that stands in for a browser's audio
//! stack.

mod azure;
pub mod console;
mod error;
mod types;

pub use azure::{token_endpoint, AzureTokenSource, AzureVoiceCatalog};
pub use error::{SpeechError, SpeechErrorKind};
pub use types::{
    AudioInputHandle, AuthToken, ClientHandle, Utterance, UtteranceId, Voice, VoicePattern,
    DEFAULT_VOICE_PATTERN,
};
