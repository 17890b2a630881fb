//! Liveness and readiness probes.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backend::BackendKind;
use crate::state::AppState;

/// Which collaborators are live (not mocked).
#[derive(Debug, Serialize)]
pub struct Services {
    pub database: bool,
    pub supabase: bool,
    pub firestore: bool,
    pub stripe: bool,
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub message: &'static str,
    pub timestamp: DateTime<Utc>,
    pub version: &'static str,
    pub environment: String,
    pub backend: &'static str,
    pub services: Services,
}

/// Liveness health check endpoint.
///
/// Reports configuration only; does not contact the backend.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let kind = state.backend().kind();
    Json(HealthResponse {
        success: true,
        message: "Backend server is running",
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config().environment.clone(),
        backend: kind.as_str(),
        services: Services {
            database: kind != BackendKind::Mock,
            supabase: kind == BackendKind::Supabase,
            firestore: kind == BackendKind::Firestore,
            stripe: state.payments().is_live(),
        },
    })
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the backend is not reachable.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.backend().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
