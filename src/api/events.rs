//! Event ingestion endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::info;

use crate::api::{ApiError, AppState};
use crate::domain::validation::validate_event;
use crate::domain::Event;

fn parse_event(raw: &JsonValue) -> Result<Event, String> {
    serde_json::from_value(raw.clone()).map_err(|e| e.to_string())
}

/// POST /v1/events — ingest one event.
///
/// Validates the envelope, then appends to the ledger. A duplicate
/// event_id returns the originally assigned position.
pub async fn ingest_event(
    State(state): State<Arc<AppState>>,
    Json(body): Json<JsonValue>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    let event = parse_event(&body).map_err(|message| ApiError::validation("body", message))?;

    let report = validate_event(&event, Utc::now());
    if !report.is_valid() {
        return Err(ApiError::Validation(report.errors));
    }

    let global_position = state.ledger.append(&event).await?;

    info!(
        event_id = %event.event_id,
        event_type = %event.event_type,
        global_position = %global_position,
        "event ingested"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "event_id": event.event_id.to_string(),
            "global_position": global_position,
        })),
    ))
}

#[derive(Deserialize)]
pub struct BatchBody {
    pub events: Vec<JsonValue>,
}

/// POST /v1/events/batch — ingest up to 1000 events.
///
/// Each event is parsed and validated individually; valid events are
/// appended, errors are collected and returned alongside results.
pub async fn ingest_batch(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BatchBody>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    if body.events.is_empty() {
        return Err(ApiError::validation("events", "'events' must be a non-empty list"));
    }
    if body.events.len() > 1000 {
        return Err(ApiError::validation(
            "events",
            "'events' must contain at most 1000 items",
        ));
    }

    let now = Utc::now();
    let mut valid: Vec<Event> = Vec::new();
    let mut errors: Vec<JsonValue> = Vec::new();

    for (index, raw) in body.events.iter().enumerate() {
        match parse_event(raw) {
            Ok(event) => {
                let report = validate_event(&event, now);
                if report.is_valid() {
                    valid.push(event);
                } else {
                    let detail: Vec<_> = report
                        .errors
                        .iter()
                        .map(|e| json!({"field": e.field, "message": e.message}))
                        .collect();
                    errors.push(json!({
                        "index": index,
                        "event_id": event.event_id.to_string(),
                        "errors": detail,
                    }));
                }
            }
            Err(message) => {
                errors.push(json!({
                    "index": index,
                    "event_id": raw.get("event_id").and_then(JsonValue::as_str),
                    "errors": [{"field": "body", "message": message}],
                }));
            }
        }
    }

    let mut results: Vec<JsonValue> = Vec::new();
    if !valid.is_empty() {
        let positions = state.ledger.append_batch(&valid).await?;
        for (event, position) in valid.iter().zip(&positions) {
            results.push(json!({
                "event_id": event.event_id.to_string(),
                "global_position": position,
            }));
        }
    }

    info!(
        accepted = results.len(),
        rejected = errors.len(),
        total = body.events.len(),
        "batch ingested"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "accepted": results.len(),
            "rejected": errors.len(),
            "results": results,
            "errors": errors,
        })),
    ))
}
