//! HTTP surface: `POST /diagnose` and `GET /health`.
//!
//! 400 for an empty complaint, 500 with `{detail}` when the embedder or the
//! index fails. Generation problems never reach the caller as errors; the
//! pipeline answers with its fallback instead.
use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

use dxrag_core::types::DiagnosisResponse;
use dxrag_pipeline::{DiagnosisPipeline, PipelineError};

/// `[server]` configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self { Self { bind: "0.0.0.0:8000".to_string() } }
}

#[derive(Debug, Deserialize)]
pub struct DiagnoseRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody { detail: detail.into() }))
}

async fn handle_diagnose(
    State(pipeline): State<Arc<DiagnosisPipeline>>,
    Json(body): Json<DiagnoseRequest>,
) -> Result<Json<DiagnosisResponse>, ApiError> {
    if body.text.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "text must be non-empty"));
    }
    match pipeline.diagnose(&body.text).await {
        Ok(outcome) => Ok(Json(outcome.into_response())),
        Err(PipelineError::EmptyQuery) => Err(api_error(StatusCode::BAD_REQUEST, "text must be non-empty")),
        Err(e) => {
            tracing::error!(event = "server.diagnose.failed", error = %e, "diagnose request failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

async fn health() -> Json<HealthResponse> { Json(HealthResponse { status: "ok" }) }

pub fn router(pipeline: Arc<DiagnosisPipeline>) -> Router {
    Router::new()
        .route("/diagnose", post(handle_diagnose))
        .route("/health", get(health))
        .with_state(pipeline)
}

pub async fn serve(bind: &str, pipeline: Arc<DiagnosisPipeline>) -> Result<()> {
    let listener = TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "dxrag server listening");
    axum::serve(listener, router(pipeline)).await?;
    Ok(())
}
