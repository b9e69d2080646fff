//! API request and response types

use crate::state_machine::Event;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// UI gesture posted by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiEventKind {
    Click,
    ShowAlternatives,
    Select,
    Listen,
    Speak,
}

/// Request to post a UI event
#[derive(Debug, Deserialize)]
pub struct UiEventRequest {
    #[serde(rename = "type")]
    pub kind: UiEventKind,
    #[serde(default)]
    pub value: Option<Value>,
}

impl UiEventRequest {
    /// Convert into a session event, validating the payload
    pub fn into_event(self) -> Result<Event, String> {
        match (self.kind, self.value) {
            (UiEventKind::Click, _) => Ok(Event::Click),
            (UiEventKind::ShowAlternatives, _) => Ok(Event::ShowAlternatives),
            (UiEventKind::Listen, _) => Ok(Event::Listen),
            (UiEventKind::Select, Some(value)) if !value.is_null() => Ok(Event::Select { value }),
            (UiEventKind::Select, _) => Err("select requires a value".to_string()),
            (UiEventKind::Speak, Some(Value::String(text))) if !text.trim().is_empty() => {
                Ok(Event::Speak { text })
            }
            (UiEventKind::Speak, _) => Err("speak requires a non-empty string value".to_string()),
        }
    }
}

/// Response to an accepted event
#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub queued: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
