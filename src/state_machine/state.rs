//! Turn manager states and the shared session context

use crate::speech::{AudioInputHandle, AuthToken, ClientHandle, Voice};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// How long `recognizing.noinput` waits for speech unless the dialogue
/// region overrides it
pub const DEFAULT_PASSIVITY_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Spoken Turn Manager State
// ============================================================================

/// Spoken turn manager state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnState {
    /// Waiting for the first user gesture
    #[default]
    Init,

    /// Token request in flight
    GettingToken,

    /// Recognition client under construction. Transient: the reducer
    /// always continues to `SettingUpSynthesis` in the same step.
    SettingUpRecognition,

    /// Synthesis client constructed, waiting for its voice list
    SettingUpSynthesis,

    /// Between turns
    Idle,

    /// Listening for the user
    Recognizing { phase: RecognizingPhase },

    /// Playing back `synthesis_agenda`
    Speaking,

    /// Setup failed; the session must be restarted externally
    Fail { reason: String },
}

/// Child state of `Recognizing`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecognizingPhase {
    /// Recognition started, passivity timer armed
    #[default]
    NoInput,
    /// Speech detected, waiting for the final result
    InProgress,
    /// Final result stored; entry raises `RECOGNIZED`
    Match,
    /// Paused by the user, recognition client stopped
    Pause,
}

impl TurnState {
    pub fn recognizing(phase: RecognizingPhase) -> Self {
        TurnState::Recognizing { phase }
    }

    /// `Fail` has no outgoing transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Fail { .. })
    }

    /// States that are always left before the macrostep that entered them
    /// ends
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TurnState::SettingUpRecognition
                | TurnState::Recognizing {
                    phase: RecognizingPhase::Match
                }
        )
    }

    pub fn is_recognizing(&self) -> bool {
        matches!(self, TurnState::Recognizing { .. })
    }

    /// Dotted state path, e.g. `recognizing.noinput`
    pub fn path(&self) -> &'static str {
        match self {
            TurnState::Init => "init",
            TurnState::GettingToken => "getting_token",
            TurnState::SettingUpRecognition => "setting_up_recognition",
            TurnState::SettingUpSynthesis => "setting_up_synthesis",
            TurnState::Idle => "idle",
            TurnState::Recognizing { phase } => match phase {
                RecognizingPhase::NoInput => "recognizing.noinput",
                RecognizingPhase::InProgress => "recognizing.inprogress",
                RecognizingPhase::Match => "recognizing.match",
                RecognizingPhase::Pause => "recognizing.pause",
            },
            TurnState::Speaking => "speaking",
            TurnState::Fail { .. } => "fail",
        }
    }
}

// ============================================================================
// Dialogue Output Types
// ============================================================================

/// One recognition hypothesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub utterance: String,
    pub confidence: f64,
}

impl Hypothesis {
    pub fn new(utterance: impl Into<String>, confidence: f64) -> Self {
        Self {
            utterance: utterance.into(),
            confidence,
        }
    }
}

/// Attribute/value pair describing visual output (`name`, `image`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualAttribute {
    pub attribute: String,
    pub value: String,
}

impl VisualAttribute {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

/// An expected response the user may pick instead of speaking it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub visual_information: Vec<VisualAttribute>,
    /// Sent back as the value of `SELECT` when picked
    pub semantic_expression: Value,
}

// ============================================================================
// Session Context
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("{0} is write-once and already set")]
    AlreadySet(&'static str),
}

/// Shared record read by every region.
///
/// Setup fields are write-once per session. Per-turn fields are overwritten
/// every turn.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,

    // Setup (write-once)
    pub audio_input: Option<AudioInputHandle>,
    pub auth_token: Option<AuthToken>,
    pub recognizer: Option<ClientHandle>,
    pub synthesizer: Option<ClientHandle>,
    pub selected_voice: Option<Voice>,

    // Per turn
    pub recognition_result: Vec<Hypothesis>,
    pub synthesis_agenda: Option<String>,
    pub passivity_timeout: Duration,
    pub visual_output: Vec<VisualAttribute>,
    pub expected_alternatives: Vec<Alternative>,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            audio_input: None,
            auth_token: None,
            recognizer: None,
            synthesizer: None,
            selected_voice: None,
            recognition_result: Vec::new(),
            synthesis_agenda: None,
            passivity_timeout: DEFAULT_PASSIVITY_TIMEOUT,
            visual_output: Vec::new(),
            expected_alternatives: Vec::new(),
        }
    }

    pub fn with_passivity_timeout(mut self, timeout: Duration) -> Self {
        self.passivity_timeout = timeout;
        self
    }

    /// Value of a visual-output attribute, e.g. the prompt text under `name`
    pub fn visual(&self, attribute: &str) -> Option<&str> {
        self.visual_output
            .iter()
            .find(|v| v.attribute == attribute)
            .map(|v| v.value.as_str())
    }

    /// Top recognition hypothesis of the last turn
    pub fn top_hypothesis(&self) -> Option<&Hypothesis> {
        self.recognition_result.first()
    }

    /// Merge a patch. Every per-turn field in the patch is applied; a
    /// write-once field that is already set is left untouched and reported.
    pub fn apply(&mut self, patch: ContextPatch) -> Result<(), ContextError> {
        let ContextPatch {
            audio_input,
            auth_token,
            recognizer,
            synthesizer,
            selected_voice,
            recognition_result,
            synthesis_agenda,
            passivity_timeout,
            visual_output,
            expected_alternatives,
        } = patch;

        if let Some(result) = recognition_result {
            self.recognition_result = result;
        }
        if let Some(agenda) = synthesis_agenda {
            self.synthesis_agenda = Some(agenda);
        }
        if let Some(timeout) = passivity_timeout {
            self.passivity_timeout = timeout;
        }
        if let Some(visual) = visual_output {
            self.visual_output = visual;
        }
        if let Some(alternatives) = expected_alternatives {
            self.expected_alternatives = alternatives;
        }

        let mut outcome = Ok(());
        if let Some(handle) = audio_input {
            outcome = outcome.and(set_once(&mut self.audio_input, handle, "audio_input"));
        }
        if let Some(token) = auth_token {
            outcome = outcome.and(set_once(&mut self.auth_token, token, "auth_token"));
        }
        if let Some(handle) = recognizer {
            outcome = outcome.and(set_once(&mut self.recognizer, handle, "recognizer"));
        }
        if let Some(handle) = synthesizer {
            outcome = outcome.and(set_once(&mut self.synthesizer, handle, "synthesizer"));
        }
        if let Some(voice) = selected_voice {
            outcome = outcome.and(set_once(&mut self.selected_voice, voice, "selected_voice"));
        }
        outcome
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, field: &'static str) -> Result<(), ContextError> {
    if slot.is_some() {
        return Err(ContextError::AlreadySet(field));
    }
    *slot = Some(value);
    Ok(())
}

/// Partial update of the session context produced by a region
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextPatch {
    pub audio_input: Option<AudioInputHandle>,
    pub auth_token: Option<AuthToken>,
    pub recognizer: Option<ClientHandle>,
    pub synthesizer: Option<ClientHandle>,
    pub selected_voice: Option<Voice>,
    pub recognition_result: Option<Vec<Hypothesis>>,
    pub synthesis_agenda: Option<String>,
    pub passivity_timeout: Option<Duration>,
    pub visual_output: Option<Vec<VisualAttribute>>,
    pub expected_alternatives: Option<Vec<Alternative>>,
}

impl ContextPatch {
    pub fn is_empty(&self) -> bool {
        *self == ContextPatch::default()
    }
}
