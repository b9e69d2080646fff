//! Property-based tests for the turn manager
//!
//! These tests drive the reducer with arbitrary event sequences, feeding
//! raised events back in before the next external event the way the runtime
//! does, and check the device-safety invariants after every transition.

use super::state::*;
use super::transition::*;
use super::*;
use crate::speech::{AuthToken, Voice};
use proptest::prelude::*;
use std::collections::VecDeque;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_voice() -> Voice {
    Voice::new("en-US-JennyNeural", "en-US")
}

fn ready_context() -> SessionContext {
    let mut ctx = SessionContext::new("prop-session");
    ctx.auth_token = Some(AuthToken::new("tok123"));
    ctx.selected_voice = Some(test_voice());
    ctx
}

/// Models the recognition client, synthesis client and passivity timer as
/// the executor would drive them
#[derive(Debug, Default)]
struct Devices {
    recognizing: bool,
    speaking: bool,
    timer_armed: bool,
    recognition_starts: usize,
    recognition_stops: usize,
}

impl Devices {
    fn apply(&mut self, effect: &Effect) -> Result<(), String> {
        match effect {
            Effect::StartRecognition => {
                if self.recognizing {
                    return Err("recognition started twice".into());
                }
                self.recognizing = true;
                self.recognition_starts += 1;
            }
            Effect::StopRecognition => {
                if !self.recognizing {
                    return Err("recognition stopped while not running".into());
                }
                self.recognizing = false;
                self.recognition_stops += 1;
            }
            Effect::StartSynthesis { .. } => {
                if self.speaking || self.recognizing {
                    return Err("synthesis started while a device was active".into());
                }
                self.speaking = true;
            }
            Effect::StopSynthesis => {
                if !self.speaking {
                    return Err("synthesis stopped while not playing".into());
                }
                self.speaking = false;
            }
            Effect::StartTimer { .. } => {
                if self.timer_armed {
                    return Err("passivity timer armed twice".into());
                }
                self.timer_armed = true;
            }
            Effect::CancelTimer { .. } => self.timer_armed = false,
            _ => {}
        }
        Ok(())
    }

    fn consistent_with(&self, state: &TurnState) -> bool {
        let expect_recognizing = matches!(
            state,
            TurnState::Recognizing {
                phase: RecognizingPhase::NoInput
                    | RecognizingPhase::InProgress
                    | RecognizingPhase::Match
            }
        );
        let expect_timer = *state == TurnState::recognizing(RecognizingPhase::NoInput);
        self.recognizing == expect_recognizing
            && self.speaking == (*state == TurnState::Speaking)
            && self.timer_armed == expect_timer
    }
}

/// One processed transition
struct Step {
    from: TurnState,
    to: TurnState,
    effects: Vec<Effect>,
}

/// Runs an external event to completion, including raised events
fn run_macrostep(
    state: &mut TurnState,
    ctx: &mut SessionContext,
    devices: &mut Devices,
    event: Event,
) -> Result<Vec<Step>, String> {
    let mut queue = VecDeque::from([event]);
    let mut steps = Vec::new();

    while let Some(current) = queue.pop_front() {
        let Ok(result) = transition(state, ctx, &current) else {
            continue;
        };
        ctx.apply(result.patch)
            .map_err(|e| format!("{e} on {}", current.name()))?;
        for effect in &result.effects {
            devices.apply(effect)?;
            if let Effect::Raise(raised) = effect {
                queue.push_back(raised.clone());
            }
        }
        let from = std::mem::replace(state, result.new_state);
        if !devices.consistent_with(state) {
            return Err(format!(
                "devices {devices:?} inconsistent with {} after {}",
                state.path(),
                current.name()
            ));
        }
        steps.push(Step {
            from,
            to: state.clone(),
            effects: result.effects,
        });
    }
    Ok(steps)
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_hypothesis() -> impl Strategy<Value = Hypothesis> {
    ("[a-z ]{1,20}", 0.0f64..=1.0).prop_map(|(utterance, confidence)| Hypothesis {
        utterance,
        confidence,
    })
}

fn arb_turn_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        3 => Just(Event::Click),
        3 => Just(Event::Listen),
        2 => "[a-zA-Z ]{1,20}".prop_map(|text: String| Event::Speak { text }),
        2 => proptest::collection::vec(arb_hypothesis(), 1..3)
            .prop_map(|hypotheses| Event::AsrResult { hypotheses }),
        2 => Just(Event::StartSpeech),
        2 => Just(Event::Timeout),
        1 => Just(Event::Recognized),
        2 => Just(Event::EndSpeech),
        1 => "[a-z]{1,8}".prop_map(|v| Event::Select { value: serde_json::json!(v) }),
        1 => Just(Event::ShowAlternatives),
        1 => any::<bool>().prop_map(|fatal| Event::AsrError {
            message: "recognizer".to_string(),
            fatal,
        }),
    ]
}

fn arb_setup_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::Click),
        Just(Event::TokenReceived {
            token: AuthToken::new("tok123")
        }),
        "[a-z]{1,8}".prop_map(|message| Event::TokenFailed { message }),
        Just(Event::TtsReady {
            voice: test_voice()
        }),
        "[a-z]{1,8}".prop_map(|message| Event::TtsError { message }),
        any::<bool>().prop_map(|fatal| Event::AsrError {
            message: "mic".to_string(),
            fatal,
        }),
    ]
}

fn arb_any_event() -> impl Strategy<Value = Event> {
    prop_oneof![arb_turn_event(), arb_setup_event()]
}

fn arb_recognizing_phase() -> impl Strategy<Value = RecognizingPhase> {
    prop_oneof![
        Just(RecognizingPhase::NoInput),
        Just(RecognizingPhase::InProgress),
        Just(RecognizingPhase::Match),
        Just(RecognizingPhase::Pause),
    ]
}

fn arb_state() -> impl Strategy<Value = TurnState> {
    prop_oneof![
        Just(TurnState::Init),
        Just(TurnState::GettingToken),
        Just(TurnState::SettingUpSynthesis),
        Just(TurnState::Idle),
        arb_recognizing_phase().prop_map(TurnState::recognizing),
        Just(TurnState::Speaking),
        "[a-z ]{1,20}".prop_map(|reason| TurnState::Fail { reason }),
    ]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    // Invariant 1: devices never overlap and always match the state, from idle
    #[test]
    fn prop_devices_follow_state(events in proptest::collection::vec(arb_turn_event(), 0..40)) {
        let mut state = TurnState::Idle;
        let mut ctx = ready_context();
        let mut devices = Devices::default();

        for event in events {
            let outcome = run_macrostep(&mut state, &mut ctx, &mut devices, event);
            prop_assert!(outcome.is_ok(), "{}", outcome.err().unwrap_or_default());
        }
        prop_assert_eq!(devices.recognition_starts - devices.recognition_stops, usize::from(devices.recognizing));
    }

    // Invariant 2: the same holds for whole sessions starting at init, and the
    // reducer never rewrites a write-once context field
    #[test]
    fn prop_sessions_from_init(events in proptest::collection::vec(arb_any_event(), 0..40)) {
        let mut state = TurnState::Init;
        let mut ctx = SessionContext::new("prop-session");
        let mut devices = Devices::default();

        for event in events {
            let outcome = run_macrostep(&mut state, &mut ctx, &mut devices, event);
            prop_assert!(outcome.is_ok(), "{}", outcome.err().unwrap_or_default());
        }
    }

    // Invariant 3: leaving noinput cancels the timer before anything else
    #[test]
    fn prop_leaving_noinput_cancels_timer_first(events in proptest::collection::vec(arb_turn_event(), 0..40)) {
        let mut state = TurnState::Idle;
        let mut ctx = ready_context();
        let mut devices = Devices::default();
        let noinput = TurnState::recognizing(RecognizingPhase::NoInput);

        for event in events {
            let steps = run_macrostep(&mut state, &mut ctx, &mut devices, event).unwrap_or_default();
            for step in steps {
                if step.from == noinput && step.to != noinput {
                    prop_assert_eq!(
                        step.effects.first(),
                        Some(&Effect::CancelTimer { timer: TimerKey::Passivity }),
                        "left noinput for {} without cancelling first",
                        step.to.path()
                    );
                }
            }
        }
    }

    // Invariant 4: recognizing is always entered through noinput
    #[test]
    fn prop_recognizing_entered_via_noinput(events in proptest::collection::vec(arb_turn_event(), 0..40)) {
        let mut state = TurnState::Idle;
        let mut ctx = ready_context();
        let mut devices = Devices::default();

        for event in events {
            let steps = run_macrostep(&mut state, &mut ctx, &mut devices, event).unwrap_or_default();
            for step in steps {
                if !step.from.is_recognizing() && step.to.is_recognizing() {
                    prop_assert_eq!(step.to, TurnState::recognizing(RecognizingPhase::NoInput));
                }
            }
        }
    }

    // Invariant 5: transient states never survive a macrostep
    #[test]
    fn prop_transient_states_do_not_survive(events in proptest::collection::vec(arb_turn_event(), 0..40)) {
        let mut state = TurnState::Idle;
        let mut ctx = ready_context();
        let mut devices = Devices::default();

        for event in events {
            let _ = run_macrostep(&mut state, &mut ctx, &mut devices, event);
            prop_assert!(!state.is_transient(), "stuck in {}", state.path());
        }
    }

    // Invariant 6: SELECT in idle changes nothing
    #[test]
    fn prop_select_in_idle_is_noop(value in "[a-z]{0,12}") {
        let result = transition(&TurnState::Idle, &ready_context(), &Event::Select { value: serde_json::json!(value) });
        prop_assert!(
            matches!(result, Err(TransitionError::Unhandled { .. })),
            "SELECT in idle should be ignored, got {:?}",
            result
        );
    }

    // Invariant 7: fail is absorbing
    #[test]
    fn prop_fail_is_absorbing(reason in "[a-z ]{1,20}", event in arb_any_event()) {
        let state = TurnState::Fail { reason };
        prop_assert!(transition(&state, &ready_context(), &event).is_err());
    }

    // Invariant 8: every transition out of speaking stops synthesis exactly once
    #[test]
    fn prop_speaking_exit_stops_once(event in arb_turn_event()) {
        if let Ok(result) = transition(&TurnState::Speaking, &ready_context(), &event) {
            if result.new_state != TurnState::Speaking {
                let stops = result.effects.iter().filter(|e| **e == Effect::StopSynthesis).count();
                prop_assert_eq!(stops, 1);
            }
        }
    }

    // Invariant 9: internal notifications never reach a reducer transition
    #[test]
    fn prop_internal_events_unhandled(state in arb_state(), generation in 0u64..100) {
        let event = Event::TimerFired { timer: TimerKey::Passivity, generation };
        prop_assert!(transition(&state, &ready_context(), &event).is_err());
    }
}
