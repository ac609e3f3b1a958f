use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use loom_core::notify::Notification;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::state::AppState;

/// Render a notification as an SSE event named after its `kind`, with the
/// JSON payload plus the display text under `message`.
pub fn to_event(notification: &Notification) -> Option<Event> {
    let mut data = serde_json::to_value(notification).ok()?;
    let kind = data["kind"].as_str()?.to_string();
    data["message"] = serde_json::Value::String(notification.message());
    Some(Event::default().event(kind).data(data.to_string()))
}

/// GET /api/events — SSE stream of batch notifications.
///
/// A client that lags behind the channel silently misses the oldest messages.
pub async fn sse_events(State(app): State<AppState>) -> impl axum::response::IntoResponse {
    let rx = app.notifier.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| {
        msg.ok()
            .and_then(|n| to_event(&n))
            .map(Ok::<Event, Infallible>)
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
