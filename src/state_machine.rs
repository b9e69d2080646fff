//! Spoken turn state machine
//!
//! Pure reducers for the turn manager and presentation regions. The runtime
//! executes the effects they return.

mod effect;
pub mod event;
pub mod presentation;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, TimerKey};
pub use event::Event;
pub use presentation::PresentationState;
pub use state::{
    Alternative, ContextError, ContextPatch, Hypothesis, RecognizingPhase, SessionContext,
    TurnState, VisualAttribute,
};
pub use transition::{transition, TransitionError, TransitionResult};
