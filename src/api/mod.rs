//! HTTP surface: thin axum adapters over the core
//!
//! Routes validate and translate; all behavior lives in the ledger,
//! graph, and domain layers. Every response carries its server-side
//! timing in `X-Request-Time-Ms`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{Config, IntentWeightMatrix};
use crate::graph::GraphStore;
use crate::ledger::RedisLedger;

pub mod admin;
pub mod context;
pub mod entities;
pub mod error;
pub mod events;
pub mod health;
pub mod lineage;
pub mod query;
pub mod users;

pub use error::ApiError;

/// Shared state for all route handlers
pub struct AppState {
    pub ledger: RedisLedger,
    pub graph: GraphStore,
    pub config: Config,
    pub intent_weights: IntentWeightMatrix,
}

async fn timing_middleware(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let mut response = next.run(request).await;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    if let Ok(value) = HeaderValue::from_str(&format!("{elapsed_ms:.1}")) {
        response.headers_mut().insert("X-Request-Time-Ms", value);
    }
    response
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/events", post(events::ingest_event))
        .route("/v1/events/batch", post(events::ingest_batch))
        .route("/v1/context/{session_id}", get(context::session_context))
        .route("/v1/query/subgraph", post(query::subgraph))
        .route("/v1/nodes/{node_id}/lineage", get(lineage::lineage))
        .route("/v1/entities/{entity_id}", get(entities::entity))
        .route("/v1/health", get(health::health))
        .route("/v1/admin/reconsolidate", post(admin::reconsolidate))
        .route("/v1/admin/stats", get(admin::stats))
        .route("/v1/admin/prune", post(admin::prune))
        .route("/v1/admin/health/detailed", get(admin::health_detailed))
        .route("/v1/users/{user_id}/profile", get(users::profile))
        .route("/v1/users/{user_id}/preferences", get(users::preferences))
        .route("/v1/users/{user_id}/skills", get(users::skills))
        .route("/v1/users/{user_id}/patterns", get(users::patterns))
        .route("/v1/users/{user_id}/interests", get(users::interests))
        .route("/v1/users/{user_id}/data-export", get(users::data_export))
        .route("/v1/users/{user_id}", delete(users::delete_user))
        .layer(middleware::from_fn(timing_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
