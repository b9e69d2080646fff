//! Server-Sent Events support

use crate::runtime::SessionSnapshot;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;

/// Stream snapshots as `state_change` events, starting with the current one
pub fn sse_stream(
    snapshot_rx: watch::Receiver<SessionSnapshot>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = WatchStream::new(snapshot_rx).map(|snapshot| Ok(state_change(&snapshot)));

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn state_change(snapshot: &SessionSnapshot) -> Event {
    let data = json!({
        "type": "state_change",
        "snapshot": snapshot,
    });
    Event::default().event("state_change").data(data.to_string())
}
