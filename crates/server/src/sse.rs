use crate::errors::AppError;
use crate::models::ChatMessageView;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;

pub fn create_sse_stream<S>(stream: S) -> Sse<S>
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keep-alive-text"),
    )
}

pub fn create_stream_start_event() -> Event {
    Event::default().event("stream_start").data("{}")
}

pub fn create_content_delta_event(content: &str) -> Event {
    let data = serde_json::json!({
        "content": content,
        "type": "delta"
    });

    Event::default()
        .event("content_delta")
        .data(data.to_string())
}

/// Carries the stored assistant message once the answer is complete.
pub fn create_stream_end_event(message: &ChatMessageView) -> Event {
    let data = serde_json::json!({
        "success": true,
        "message": message
    });

    Event::default().event("stream_end").data(data.to_string())
}

pub fn create_error_event(error: &AppError) -> Event {
    let data = serde_json::json!({
        "error": error.to_string(),
        "retryable": error.is_retryable(),
        "http_status": error.http_status_code()
    });

    Event::default().event("error_event").data(data.to_string())
}
