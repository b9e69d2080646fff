//! Events broadcast to every region

use super::effect::TimerKey;
use super::state::Hypothesis;
use crate::speech::{AuthToken, UtteranceId, Voice};
use serde_json::Value;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // User events
    Click,
    ShowAlternatives,
    Select { value: Value },

    // Recognition events
    AsrResult { hypotheses: Vec<Hypothesis> },
    StartSpeech,
    Timeout,
    Recognized,
    AsrError { message: String, fatal: bool },

    // Dialogue requests
    Listen,
    Speak { text: String },

    // Synthesis events
    EndSpeech,
    TtsReady { voice: Voice },
    TtsError { message: String },

    // Token fetch completion
    TokenReceived { token: AuthToken },
    TokenFailed { message: String },

    // Runtime-internal notifications, translated or dropped before dispatch
    TimerFired { timer: TimerKey, generation: u64 },
    UtteranceFinished { utterance: UtteranceId },
}

impl Event {
    /// Vocabulary name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Event::Click => "CLICK",
            Event::ShowAlternatives => "SHOW_ALTERNATIVES",
            Event::Select { .. } => "SELECT",
            Event::AsrResult { .. } => "ASR_RESULT",
            Event::StartSpeech => "START_SPEECH",
            Event::Timeout => "TIMEOUT",
            Event::Recognized => "RECOGNIZED",
            Event::AsrError { .. } => "ASR_ERROR",
            Event::Listen => "LISTEN",
            Event::Speak { .. } => "SPEAK",
            Event::EndSpeech => "END_SPEECH",
            Event::TtsReady { .. } => "TTS_READY",
            Event::TtsError { .. } => "TTS_ERROR",
            Event::TokenReceived { .. } => "TOKEN_RECEIVED",
            Event::TokenFailed { .. } => "TOKEN_FAILED",
            Event::TimerFired { .. } => "TIMER_FIRED",
            Event::UtteranceFinished { .. } => "UTTERANCE_FINISHED",
        }
    }

    pub fn speak(text: impl Into<String>) -> Self {
        Event::Speak { text: text.into() }
    }

    pub fn asr_result(utterance: impl Into<String>, confidence: f64) -> Self {
        Event::AsrResult {
            hypotheses: vec![Hypothesis::new(utterance, confidence)],
        }
    }
}
