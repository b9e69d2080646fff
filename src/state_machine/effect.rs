//! Effects produced by state transitions

use super::event::Event;
use crate::speech::Voice;
use serde::{Deserialize, Serialize};

/// Stable identity of a cancellable delayed event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKey {
    /// Guards `recognizing.noinput`; delivers `TIMEOUT`
    Passivity,
}

impl TimerKey {
    /// Event delivered when the timer expires
    pub fn event(self) -> Event {
        match self {
            TimerKey::Passivity => Event::Timeout,
        }
    }
}

/// Effects to be executed after a state transition, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Create the audio capture context (once per session)
    OpenAudioInput,

    /// Ask the platform for microphone access
    RequestMicrophone,

    /// Start the token fetch
    FetchToken,

    /// Construct the recognition client from the stored token
    CreateRecognizer,

    /// Construct the synthesis client from the stored token
    CreateSynthesizer,

    /// Wait for the synthesis client's voice list and pick a voice
    AwaitVoices,

    StartRecognition,

    /// Abort the recognition client
    StopRecognition,

    /// Arm a timer; the delay is read from the context when executed
    StartTimer { timer: TimerKey },

    CancelTimer { timer: TimerKey },

    /// Speak `text` with `voice`, arranging `END_SPEECH` on completion
    StartSynthesis { text: String, voice: Voice },

    /// Cancel synthesis playback
    StopSynthesis,

    /// Self-raised event, processed before the next external event
    Raise(Event),
}

impl Effect {
    pub fn raise(event: Event) -> Self {
        Effect::Raise(event)
    }
}
