//! HTTP API for the presentation layer
//!
//! The browser (or any other UI) reads session snapshots, streams their
//! changes and posts the user's gestures back as events.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::runtime::SessionHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
}

impl AppState {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }
}
