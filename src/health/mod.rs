/*!
 * # Health Check Module
 *
 * Endpoints for probing the ShopDesk API:
 *
 * - `/health` - overall status with a database round trip
 * - `/health/live` - process liveness, never touches the database
 * - `/health/version` - build version
 */

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::{db, AppState};

/// Basic health status
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Health check detail
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HealthDetail {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Overall health information
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HealthInfo {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub checks: HashMap<String, HealthDetail>,
}

impl HealthInfo {
    fn status_code(&self) -> StatusCode {
        match self.status {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Health check with a database round trip
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service healthy", body = HealthInfo),
        (status = 503, description = "Database unreachable", body = HealthInfo)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match db::check_connection(&state.db).await {
        Ok(latency) => HealthDetail {
            status: HealthStatus::Healthy,
            latency_ms: Some(latency.as_secs_f64() * 1000.0),
            message: None,
        },
        Err(e) => {
            warn!(error = %e, "Health check found database unreachable");
            HealthDetail {
                status: HealthStatus::Unhealthy,
                latency_ms: None,
                message: Some("database unreachable".to_string()),
            }
        }
    };

    let status = database.status;
    let health = HealthInfo {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        checks: HashMap::from([("database".to_string(), database)]),
    };
    debug!(status = ?health.status, "Health check served");

    (health.status_code(), Json(health))
}

/// Liveness check endpoint
pub async fn liveness_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "alive": true,
            "uptime_seconds": state.started_at.elapsed().as_secs(),
            "timestamp": Utc::now(),
        })),
    )
}

/// Returns build and version information
pub async fn version_info() -> impl IntoResponse {
    Json(json!({
        "service": "shopdesk-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness_check))
        .route("/health/version", get(version_info))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unhealthy_maps_to_503() {
        let info = HealthInfo {
            status: HealthStatus::Unhealthy,
            version: "0.0.0".into(),
            timestamp: Utc::now(),
            uptime_seconds: 1,
            checks: HashMap::new(),
        };
        assert_eq!(info.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            serde_json::to_value(info.status).unwrap(),
            serde_json::json!("unhealthy")
        );
    }
}
