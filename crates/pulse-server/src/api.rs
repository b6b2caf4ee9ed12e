use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use pulse_collector::{HealthStatus, Pipeline};
use pulse_metrics::{AlertEngine, PipelineMetrics};
use pulse_types::{EventMessage, MetricMessage};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error};

/// HTTP 处理器共享的状态
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub engine: Arc<AlertEngine>,
    pub metrics: Arc<PipelineMetrics>,
}

/// 请求体可以是单条消息，也可以是数组
#[derive(Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(export_metrics))
        .route("/api/v1/events", post(ingest_events))
        .route("/api/v1/metrics", post(ingest_metrics))
        .route("/api/v1/alerts", get(list_alerts))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.pipeline.statistics();
    let status = match snapshot.health.status {
        HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (status, Json(snapshot))
}

async fn ingest_events(
    State(state): State<AppState>,
    Json(body): Json<OneOrMany<EventMessage>>,
) -> impl IntoResponse {
    let accepted = state.pipeline.events().ingest_batch(body.into_vec());
    debug!(accepted, "Events received over HTTP");
    (StatusCode::ACCEPTED, Json(json!({ "accepted": accepted })))
}

async fn ingest_metrics(
    State(state): State<AppState>,
    Json(body): Json<OneOrMany<MetricMessage>>,
) -> impl IntoResponse {
    let accepted = state.pipeline.metrics().ingest_batch(body.into_vec());
    debug!(accepted, "Metrics received over HTTP");
    (StatusCode::ACCEPTED, Json(json!({ "accepted": accepted })))
}

async fn list_alerts(State(state): State<AppState>) -> impl IntoResponse {
    let alerts = state.engine.active_alerts().await;
    Json(json!({ "count": alerts.len(), "alerts": alerts }))
}

async fn export_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.export() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        ),
        Err(e) => {
            error!(error = %e, "Failed to export metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                e.to_string(),
            )
        }
    }
}
