//! HTTP surface of the capture daemon
//!
//! `POST /exchange` is the ingest boundary: a thin addon inside the
//! intercepting proxy forwards each captured exchange here. The read
//! endpoints serve the downstream training/export consumer.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path as AxumPath, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use matchbook_common::db::Repository;
use matchbook_common::model::{Label, Person, PhotoStatus};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::classify::ClassifierMiddleware;
use crate::error::{ApiError, ApiResult};
use crate::exchange::Exchange;
use crate::fetch::validate_image;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub middleware: Arc<ClassifierMiddleware>,
    pub repo: Repository,
    /// Root of the image tree, for dataset export
    pub image_root: PathBuf,
    /// Service startup timestamp for uptime tracking
    pub started_at: DateTime<Utc>,
}

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/exchange", post(ingest_exchange))
        .route("/people", get(list_people))
        .route("/people/:id", get(get_person))
        .route("/dataset", get(export_dataset))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// One captured exchange as forwarded by the proxy addon
#[derive(Debug, Deserialize)]
pub struct ExchangePayload {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub host: String,
    /// Response body, when captured; assumed JSON-encoded when present
    pub response_body: Option<String>,
}

impl ExchangePayload {
    fn into_exchange(self) -> Exchange {
        Exchange {
            method: self.method,
            path: self.path,
            host: self.host,
            response_body: self.response_body.map(String::into_bytes),
        }
    }
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    accepted: bool,
}

/// POST /exchange
///
/// Classification failures surface only as log entries; there is no
/// synchronous caller awaiting a result.
async fn ingest_exchange(
    State(state): State<AppState>,
    Json(payload): Json<ExchangePayload>,
) -> Json<IngestResponse> {
    let exchange = payload.into_exchange();
    state.middleware.handle_request(&exchange);
    state.middleware.handle_response(&exchange);
    Json(IngestResponse { accepted: true })
}

/// GET /people — full person/photo graph
async fn list_people(State(state): State<AppState>) -> ApiResult<Json<Vec<Person>>> {
    Ok(Json(state.repo.get_all().await?))
}

/// GET /people/:id
async fn get_person(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<Person>> {
    state
        .repo
        .get_person(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("person {id}")))
}

/// One row of the training dataset: a validated local image and the
/// effective label of its owner
#[derive(Debug, Serialize)]
struct DatasetEntry {
    image: String,
    label: Label,
}

/// GET /dataset
///
/// Downloaded photos that still pass image validation, labeled with their
/// owner's effective label (match collapses to like).
async fn export_dataset(State(state): State<AppState>) -> ApiResult<Json<Vec<DatasetEntry>>> {
    let people = state.repo.get_all().await?;

    let mut entries = Vec::new();
    for person in &people {
        for photo in &person.photos {
            if photo.status != PhotoStatus::Downloaded {
                continue;
            }
            let path = photo.path_under(&state.image_root);
            if validate_image(&path) {
                entries.push(DatasetEntry {
                    image: path.to_string_lossy().into_owned(),
                    label: person.label.effective(),
                });
            }
        }
    }

    Ok(Json(entries))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    module: String,
    version: String,
    uptime_seconds: u64,
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.started_at);

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "matchbook-ingest".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
    })
}
