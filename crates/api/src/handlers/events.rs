//! Progress subscription over Server-Sent Events.
//!
//! Subscribers get the current status immediately, then live events until
//! the terminal `completion` (or terminal `error`) event closes the stream.
//! Delivery is best effort: a lagging client sees a drop counter on its
//! next event, never pipeline backpressure.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::Stream;
use osint_core::InvestigationId;
use osint_pipeline::{ProgressEvent, ProgressEventType};
use std::convert::Infallible;
use std::time::Duration;

pub fn event_routes() -> Router<AppState> {
    Router::new().route("/:id/events", get(subscribe_events))
}

fn to_sse(event: &ProgressEvent) -> Event {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    Event::default()
        .event(match event.event_type {
            ProgressEventType::StatusUpdate => "status_update",
            ProgressEventType::NewEntity => "new_entity",
            ProgressEventType::StageTransition => "stage_transition",
            ProgressEventType::Error => "error",
            ProgressEventType::Completion => "completion",
        })
        .data(payload)
}

fn is_terminal(event: &ProgressEvent) -> bool {
    match event.event_type {
        ProgressEventType::Completion => true,
        ProgressEventType::Error => event
            .data
            .get("terminal")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        _ => false,
    }
}

async fn subscribe_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let id = InvestigationId::from_string(id);
    let (current, stream) = state.coordinator.subscribe(&id).await?;

    let sse_stream = async_stream::stream! {
        yield Ok(to_sse(&current));

        // Terminal investigations have no live bus; the current snapshot
        // is the whole story.
        let Some(mut events) = stream else {
            return;
        };
        while let Some(event) = events.next().await {
            let terminal = is_terminal(&event);
            yield Ok(to_sse(&event));
            if terminal {
                break;
            }
        }
    };

    Ok(Sse::new(sse_stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}
