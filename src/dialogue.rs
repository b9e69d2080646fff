//! Dialogue region seam
//!
//! The dialogue region runs in parallel with the turn manager and sees the
//! same event stream. It never drives the speech devices itself: it asks for
//! speech or listening by raising `SPEAK` / `LISTEN`, and publishes what the
//! presentation layer should show through a context patch.

use crate::state_machine::{Alternative, ContextPatch, Event, SessionContext, VisualAttribute};
use serde_json::{json, Value};
use std::time::Duration;

/// Context fields the dialogue region is allowed to write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DialoguePatch {
    pub visual_output: Option<Vec<VisualAttribute>>,
    pub expected_alternatives: Option<Vec<Alternative>>,
    pub passivity_timeout: Option<Duration>,
}

impl From<DialoguePatch> for ContextPatch {
    fn from(patch: DialoguePatch) -> Self {
        ContextPatch {
            visual_output: patch.visual_output,
            expected_alternatives: patch.expected_alternatives,
            passivity_timeout: patch.passivity_timeout,
            ..Default::default()
        }
    }
}

/// What the dialogue region produced for one event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DialogueOutput {
    pub patch: DialoguePatch,
    /// Events to process after the current one, in order
    pub raise: Vec<Event>,
}

impl DialogueOutput {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn raise(event: Event) -> Self {
        Self {
            patch: DialoguePatch::default(),
            raise: vec![event],
        }
    }

    pub fn and_raise(mut self, event: Event) -> Self {
        self.raise.push(event);
        self
    }

    pub fn with_visual(mut self, visual: Vec<VisualAttribute>) -> Self {
        self.patch.visual_output = Some(visual);
        self
    }

    pub fn with_alternatives(mut self, alternatives: Vec<Alternative>) -> Self {
        self.patch.expected_alternatives = Some(alternatives);
        self
    }

    pub fn with_passivity(mut self, timeout: Duration) -> Self {
        self.patch.passivity_timeout = Some(timeout);
        self
    }
}

/// A dialogue manager plugged into the session as a parallel region
pub trait DialogueRegion: Send {
    /// React to one broadcast event. `context` already reflects the turn
    /// manager's transition for this event.
    fn on_event(&mut self, event: &Event, context: &SessionContext) -> DialogueOutput;
}

// ============================================================================
// Echo Dialogue
// ============================================================================

/// Confidence below which the echo dialogue asks for confirmation
pub const DEFAULT_CONFIRM_THRESHOLD: f64 = 0.5;

/// Minimal dialogue that greets, listens after every system utterance and
/// repeats what it heard. Low-confidence results are confirmed through
/// yes/no alternatives.
#[derive(Debug, Clone)]
pub struct EchoDialogue {
    greeting: String,
    confirm_below: f64,
    passivity: Option<Duration>,
}

impl Default for EchoDialogue {
    fn default() -> Self {
        Self {
            greeting: "Hello! Say something and I will repeat it.".to_string(),
            confirm_below: DEFAULT_CONFIRM_THRESHOLD,
            passivity: None,
        }
    }
}

impl EchoDialogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    pub fn with_passivity(mut self, timeout: Duration) -> Self {
        self.passivity = Some(timeout);
        self
    }

    fn say(text: String) -> DialogueOutput {
        DialogueOutput::raise(Event::Speak { text: text.clone() })
            .with_visual(vec![VisualAttribute::new("name", text)])
    }

    fn confirmation(utterance: &str) -> Vec<Alternative> {
        ["yes", "no"]
            .into_iter()
            .map(|answer| Alternative {
                visual_information: vec![VisualAttribute::new("name", answer)],
                semantic_expression: json!({ "answer": answer, "utterance": utterance }),
            })
            .collect()
    }

    fn on_select(value: &Value) -> DialogueOutput {
        let utterance = value.get("utterance").and_then(Value::as_str);
        let reply = match (value.get("answer").and_then(Value::as_str), utterance) {
            (Some("yes"), Some(utterance)) => format!("Great. You said {utterance}."),
            (Some("no"), _) => "Sorry about that. Please say it again.".to_string(),
            _ => format!("You picked {value}."),
        };
        Self::say(reply).with_alternatives(vec![])
    }
}

impl DialogueRegion for EchoDialogue {
    fn on_event(&mut self, event: &Event, context: &SessionContext) -> DialogueOutput {
        match event {
            Event::TtsReady { .. } => {
                let greeting = Self::say(self.greeting.clone());
                match self.passivity {
                    Some(timeout) => greeting.with_passivity(timeout),
                    None => greeting,
                }
            }

            Event::EndSpeech => DialogueOutput::raise(Event::Listen),

            Event::Recognized => match context.top_hypothesis() {
                Some(top) if top.confidence < self.confirm_below => {
                    Self::say(format!("Did you say {}?", top.utterance))
                        .with_alternatives(Self::confirmation(&top.utterance))
                        .and_raise(Event::ShowAlternatives)
                }
                Some(top) => Self::say(format!("You said {}.", top.utterance)),
                None => DialogueOutput::none(),
            },

            Event::Select { value } => Self::on_select(value),

            Event::Timeout => Self::say("I didn't hear anything.".to_string()),

            _ => DialogueOutput::none(),
        }
    }
}
