//! Presentation region: which view the UI shows

use super::Event;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationState {
    #[default]
    SingleView,
    AlternativesView,
}

/// Returns the next presentation state, or `None` when the event has no
/// transition from `state`. Never touches the session context.
pub fn transition(state: PresentationState, event: &Event) -> Option<PresentationState> {
    match (state, event) {
        (PresentationState::SingleView, Event::ShowAlternatives) => {
            Some(PresentationState::AlternativesView)
        }
        (PresentationState::AlternativesView, Event::Select { .. }) => {
            Some(PresentationState::SingleView)
        }
        _ => None,
    }
}
