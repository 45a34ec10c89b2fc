//! Metrics, version and health endpoints.

use std::sync::Arc;

use axum::{Json, body::Body, extract::State, http::StatusCode, response::Response};
use s3s_telemetry::{BuildInfo, Metrics, MetricsSnapshot};
use serde::Serialize;
use tracing::error;

use crate::error::HttpError;

/// Shared state handed to every handler.
pub(crate) struct ServerState {
    pub(crate) metrics: Metrics,
    pub(crate) build: BuildInfo,
}

#[derive(Debug, Serialize)]
pub(crate) struct VersionResponse {
    pub(crate) version: &'static str,
    pub(crate) build_time: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) version: &'static str,
    pub(crate) metrics: MetricsSnapshot,
}

pub(crate) async fn metrics(State(state): State<Arc<ServerState>>) -> Result<Response, HttpError> {
    match state.metrics.render() {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )
            .body(Body::from(body))
            .map_err(|err| {
                error!(error = %err, "failed to build metrics response");
                HttpError::internal("failed to build metrics response")
            }),
        Err(err) => {
            error!(error = %err, "failed to render metrics");
            Err(HttpError::internal("failed to render metrics"))
        }
    }
}

pub(crate) async fn version(State(state): State<Arc<ServerState>>) -> Json<VersionResponse> {
    Json(VersionResponse {
        version: state.build.version,
        build_time: state.build.build_time,
    })
}

pub(crate) async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: state.build.version,
        metrics: state.metrics.snapshot(),
    })
}
