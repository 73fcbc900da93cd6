use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::persistence::FormRepository;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub backend: String,
}

pub struct HealthHandler {
    repository: Arc<dyn FormRepository>,
    start_time: std::time::Instant,
}

impl HealthHandler {
    pub fn new(repository: Arc<dyn FormRepository>) -> Self {
        Self {
            repository,
            start_time: std::time::Instant::now(),
        }
    }

    /// Basic health check - returns 200 if server is running
    pub async fn health(&self) -> impl IntoResponse {
        let status = HealthStatus {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            backend: self.repository.backend().name().to_string(),
        };

        (StatusCode::OK, Json(status))
    }

    /// Readiness check - returns 200 once the database answers
    pub async fn ready(&self) -> impl IntoResponse {
        match self.repository.ping().await {
            Ok(()) => (
                StatusCode::OK,
                Json(serde_json::json!({
                    "status": "ready",
                    "message": "Server is ready to accept requests"
                })),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "Readiness check failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(serde_json::json!({
                        "status": "not_ready",
                        "message": e.to_string()
                    })),
                )
            }
        }
    }

    /// Liveness check - returns 200 if server is alive
    pub async fn live(&self) -> impl IntoResponse {
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "alive",
                "message": "Server is alive"
            })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryFormRepository;

    fn handler() -> HealthHandler {
        HealthHandler::new(Arc::new(InMemoryFormRepository::new()))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = handler().health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_endpoint() {
        let response = handler().ready().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_live_endpoint() {
        let response = handler().live().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
