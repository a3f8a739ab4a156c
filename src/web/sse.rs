//! Server-Sent Events for real-time overlay updates
//!
//! One stream carries two event types:
//! - `overlay`: the full [`OverlayState`] after every processed frame
//! - `notice`: status lines, toasts and errors for the user

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::overlay::OverlayState;
use crate::session::Notice;
use crate::AppState;

/// Create the combined overlay + notice stream
pub fn create_overlay_stream(
    app_state: Arc<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let overlays = BroadcastStream::new(app_state.subscribe_overlay()).filter_map(|result| match result {
        Ok(state) => Some(Ok(overlay_to_event(&state))),
        Err(_) => None, // Skip lagged messages
    });

    let notices = BroadcastStream::new(app_state.subscribe_notices()).filter_map(|result| match result {
        Ok(notice) => Some(Ok(notice_to_event(&notice))),
        Err(_) => None,
    });

    Sse::new(overlays.merge(notices)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Convert overlay state to an SSE event
pub fn overlay_to_event(state: &OverlayState) -> Event {
    let data = serde_json::to_string(state).unwrap_or_else(|_| "{}".to_string());
    Event::default().event("overlay").data(data)
}

/// Convert a notice to an SSE event
pub fn notice_to_event(notice: &Notice) -> Event {
    let data = serde_json::to_string(notice).unwrap_or_else(|_| "{}".to_string());
    Event::default().event("notice").data(data)
}
