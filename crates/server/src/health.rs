use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use crate::http::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub checked_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub counter_store: HealthCheck,
    pub checked_at: String,
}

pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "ok", checked_at: Utc::now().to_rfc3339() })
}

pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let counter_store = match state.store.healthy().await {
        Ok(()) => HealthCheck { status: "ready", detail: "counter store answered".to_string() },
        Err(error) => {
            warn!(
                event_name = "system.health.store_unreachable",
                error = %error,
                "readiness check could not reach the counter store"
            );
            HealthCheck {
                status: "degraded",
                detail: format!("counter store check failed: {error}"),
            }
        }
    };
    let ready = counter_store.status == "ready";

    let payload = ReadinessResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "fomo-server runtime initialized".to_string(),
        },
        counter_store,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}
