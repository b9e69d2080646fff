//! Pure state transition function for the spoken turn manager
//!
//! Exit actions are attached to states rather than to individual
//! transitions: leaving `recognizing` always aborts the recognition client and
//! leaving `speaking` always cancels playback, whichever event caused the
//! exit. Effects are listed child exit first, then parent exit, then
//! transition actions, then entry actions.

use super::state::{ContextPatch, RecognizingPhase, SessionContext, TurnState};
use super::{Effect, Event, TimerKey};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: TurnState,
    pub patch: ContextPatch,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: TurnState) -> Self {
        Self {
            new_state: state,
            patch: ContextPatch::default(),
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }

    pub fn with_patch(mut self, patch: ContextPatch) -> Self {
        self.patch = patch;
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    /// The state has no transition for this event. Regions share one event
    /// stream, so this is the normal outcome for most events.
    #[error("No transition from {state} on {event}")]
    Unhandled {
        state: &'static str,
        event: &'static str,
    },
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function.
///
/// Given the same state, context and event it always returns the same result;
/// all I/O is described by the returned effects.
pub fn transition(
    state: &TurnState,
    context: &SessionContext,
    event: &Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Setup
        // ============================================================

        // First user gesture: open audio, ask for the microphone, then fetch
        // the token on entry to GettingToken
        (TurnState::Init, Event::Click) => Ok(TransitionResult::new(TurnState::GettingToken)
            .with_effect(Effect::OpenAudioInput)
            .with_effect(Effect::RequestMicrophone)
            .with_effect(Effect::FetchToken)),

        (TurnState::GettingToken, Event::TokenReceived { token }) => Ok(settle(
            TransitionResult::new(TurnState::SettingUpRecognition)
                .with_patch(ContextPatch {
                    auth_token: Some(token.clone()),
                    ..Default::default()
                })
                .with_effect(Effect::CreateRecognizer),
        )),

        (TurnState::GettingToken, Event::TokenFailed { message }) => Ok(TransitionResult::new(
            TurnState::Fail {
                reason: format!("Token fetch failed: {message}"),
            },
        )),

        (
            TurnState::GettingToken | TurnState::SettingUpSynthesis,
            Event::AsrError {
                message,
                fatal: true,
            },
        ) => Ok(TransitionResult::new(TurnState::Fail {
            reason: format!("Recognition setup failed: {message}"),
        })),

        (TurnState::SettingUpSynthesis, Event::TtsReady { voice }) => {
            Ok(TransitionResult::new(TurnState::Idle).with_patch(ContextPatch {
                selected_voice: Some(voice.clone()),
                ..Default::default()
            }))
        }

        (TurnState::SettingUpSynthesis, Event::TtsError { message }) => {
            Ok(TransitionResult::new(TurnState::Fail {
                reason: format!("Synthesis setup failed: {message}"),
            }))
        }

        // ============================================================
        // Idle
        // ============================================================
        (TurnState::Idle, Event::Listen) => Ok(enter_phase(
            TransitionResult::new(TurnState::recognizing(RecognizingPhase::NoInput)),
            RecognizingPhase::NoInput,
        )),

        (TurnState::Idle, Event::Speak { text }) => {
            let voice = context.selected_voice.clone().ok_or_else(|| {
                TransitionError::InvalidTransition(
                    "cannot speak before a synthesis voice is selected".to_string(),
                )
            })?;
            Ok(TransitionResult::new(TurnState::Speaking)
                .with_patch(ContextPatch {
                    synthesis_agenda: Some(text.clone()),
                    ..Default::default()
                })
                .with_effect(Effect::StartSynthesis {
                    text: text.clone(),
                    voice,
                }))
        }

        // ============================================================
        // Recognizing: child handlers take priority over the parent's
        // ============================================================

        // Resume after a user pause
        (
            TurnState::Recognizing {
                phase: RecognizingPhase::Pause,
            },
            Event::Click,
        ) => Ok(enter_phase(
            TransitionResult::new(TurnState::recognizing(RecognizingPhase::NoInput)),
            RecognizingPhase::NoInput,
        )),

        // The client was aborted on pause; anything it still reports is stale
        (
            TurnState::Recognizing {
                phase: RecognizingPhase::Pause,
            },
            Event::AsrResult { .. } | Event::StartSpeech,
        ) => Err(unhandled(state, event)),

        // Passivity timeout abandons the turn
        (
            TurnState::Recognizing {
                phase: RecognizingPhase::NoInput,
            },
            Event::Timeout,
        ) => Ok(TransitionResult::new(TurnState::Idle)
            .with_effects(exit_recognizing(RecognizingPhase::NoInput))),

        (
            TurnState::Recognizing {
                phase: RecognizingPhase::NoInput,
            },
            Event::StartSpeech,
        ) => Ok(TransitionResult::new(TurnState::recognizing(RecognizingPhase::InProgress))
            .with_effects(exit_phase(RecognizingPhase::NoInput))),

        // Final result: store it, then let `match` raise RECOGNIZED
        (TurnState::Recognizing { phase }, Event::AsrResult { hypotheses }) => Ok(enter_phase(
            TransitionResult::new(TurnState::recognizing(RecognizingPhase::Match))
                .with_patch(ContextPatch {
                    recognition_result: Some(hypotheses.clone()),
                    ..Default::default()
                })
                .with_effects(exit_phase(*phase)),
            RecognizingPhase::Match,
        )),

        (TurnState::Recognizing { phase }, Event::Recognized | Event::Select { .. }) => {
            Ok(TransitionResult::new(TurnState::Idle).with_effects(exit_recognizing(*phase)))
        }

        (TurnState::Recognizing { phase }, Event::Click) => Ok(enter_phase(
            TransitionResult::new(TurnState::recognizing(RecognizingPhase::Pause))
                .with_effects(exit_phase(*phase)),
            RecognizingPhase::Pause,
        )),

        (TurnState::Recognizing { phase }, Event::AsrError { message, fatal }) => {
            let next = if *fatal {
                TurnState::Fail {
                    reason: format!("Recognition failed: {message}"),
                }
            } else {
                TurnState::Idle
            };
            Ok(TransitionResult::new(next).with_effects(exit_recognizing(*phase)))
        }

        // ============================================================
        // Speaking
        // ============================================================
        (TurnState::Speaking, Event::EndSpeech | Event::Select { .. } | Event::TtsError { .. }) => {
            Ok(TransitionResult::new(TurnState::Idle).with_effect(Effect::StopSynthesis))
        }

        // Barge-in: stop playback and tell the other regions speech ended
        (TurnState::Speaking, Event::Click) => Ok(TransitionResult::new(TurnState::Idle)
            .with_effect(Effect::StopSynthesis)
            .with_effect(Effect::raise(Event::EndSpeech))),

        // The input device went away between turns (late permission denial,
        // lost device). Non-fatal errors outside recognizing are ignored.
        (
            TurnState::Idle | TurnState::Speaking,
            Event::AsrError {
                message,
                fatal: true,
            },
        ) => {
            let result = TransitionResult::new(TurnState::Fail {
                reason: format!("Audio input failed: {message}"),
            });
            Ok(if *state == TurnState::Speaking {
                result.with_effect(Effect::StopSynthesis)
            } else {
                result
            })
        }

        // ============================================================
        // Everything else, including all events in Fail
        // ============================================================
        (state, event) => Err(unhandled(state, event)),
    }
}

fn unhandled(state: &TurnState, event: &Event) -> TransitionError {
    TransitionError::Unhandled {
        state: state.path(),
        event: event.name(),
    }
}

/// Follow eventless transitions out of transient states
fn settle(result: TransitionResult) -> TransitionResult {
    match result.new_state {
        TurnState::SettingUpRecognition => TransitionResult {
            new_state: TurnState::SettingUpSynthesis,
            ..result
        }
        .with_effect(Effect::CreateSynthesizer)
        .with_effect(Effect::AwaitVoices),
        _ => result,
    }
}

fn enter_phase(result: TransitionResult, phase: RecognizingPhase) -> TransitionResult {
    let effects = match phase {
        RecognizingPhase::NoInput => vec![
            Effect::StartRecognition,
            Effect::StartTimer {
                timer: TimerKey::Passivity,
            },
        ],
        RecognizingPhase::InProgress => vec![],
        RecognizingPhase::Match => vec![Effect::raise(Event::Recognized)],
        RecognizingPhase::Pause => vec![Effect::StopRecognition],
    };
    result.with_effects(effects)
}

fn exit_phase(phase: RecognizingPhase) -> Vec<Effect> {
    match phase {
        RecognizingPhase::NoInput => vec![Effect::CancelTimer {
            timer: TimerKey::Passivity,
        }],
        RecognizingPhase::InProgress | RecognizingPhase::Match | RecognizingPhase::Pause => vec![],
    }
}

/// Child exit followed by the parent's exit.
///
/// `pause` already aborted the client on entry, so leaving from there issues
/// no second abort.
fn exit_recognizing(phase: RecognizingPhase) -> Vec<Effect> {
    let mut effects = exit_phase(phase);
    if phase != RecognizingPhase::Pause {
        effects.push(Effect::StopRecognition);
    }
    effects
}
