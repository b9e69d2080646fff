//! Runtime for executing spoken dialogue sessions
//!
//! One `SessionRuntime` task owns the session's state and speech clients.
//! Everything else talks to it through a `SessionHandle`: events go in over
//! an mpsc channel, snapshots come out over a watch channel.

mod executor;
mod timers;
pub mod traits;


pub use executor::{RuntimeSettings, SessionRuntime};
pub use traits::*;

use crate::speech::console::ConsoleBackend;
use crate::speech::{AzureTokenSource, Voice};
use crate::state_machine::{
    Alternative, Event, Hypothesis, PresentationState, SessionContext, TurnState, VisualAttribute,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};

/// Type alias for the runtime the binary runs
pub type ProductionRuntime = SessionRuntime<AzureTokenSource, ConsoleBackend>;

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    event_tx: mpsc::Sender<Event>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub fn new(
        event_tx: mpsc::Sender<Event>,
        snapshot_rx: watch::Receiver<SessionSnapshot>,
    ) -> Self {
        Self {
            event_tx,
            snapshot_rx,
        }
    }

    /// Queue an event for the session
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.event_tx
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {e}"))
    }

    pub fn event_sender(&self) -> mpsc::Sender<Event> {
        self.event_tx.clone()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Subscribe to snapshot updates
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }
}

/// Serializable view of a session, published after every macrostep
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    /// Turn manager state, tagged with `type`
    pub turn: TurnState,
    /// Dotted path of `turn`, e.g. `recognizing.noinput`
    pub turn_path: &'static str,
    pub presentation: PresentationState,
    pub context: ContextView,
    pub updated_at: DateTime<Utc>,
}

/// Per-turn context fields the presentation layer renders
#[derive(Debug, Clone, Serialize)]
pub struct ContextView {
    pub recognition_result: Vec<Hypothesis>,
    pub synthesis_agenda: Option<String>,
    pub selected_voice: Option<Voice>,
    pub passivity_timeout_ms: u64,
    pub visual_output: Vec<VisualAttribute>,
    pub expected_alternatives: Vec<Alternative>,
    /// Convenience copy of the `name` visual attribute
    pub prompt_text: Option<String>,
}

impl SessionSnapshot {
    pub fn capture(
        state: &TurnState,
        presentation: PresentationState,
        context: &SessionContext,
    ) -> Self {
        Self {
            session_id: context.session_id.clone(),
            turn: state.clone(),
            turn_path: state.path(),
            presentation,
            context: ContextView {
                recognition_result: context.recognition_result.clone(),
                synthesis_agenda: context.synthesis_agenda.clone(),
                selected_voice: context.selected_voice.clone(),
                passivity_timeout_ms: u64::try_from(context.passivity_timeout.as_millis())
                    .unwrap_or(u64::MAX),
                visual_output: context.visual_output.clone(),
                expected_alternatives: context.expected_alternatives.clone(),
                prompt_text: context.visual("name").map(str::to_string),
            },
            updated_at: Utc::now(),
        }
    }
}
