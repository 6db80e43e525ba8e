//! Liveness endpoint for container health checks.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use serde::Serialize;
use tokio::sync::watch;

use crate::session::Liveness;

pub type HealthState = watch::Receiver<Liveness>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub print_state: String,
    pub print_running: bool,
    pub timestamp: String,
}

/// Router serving `GET /health`; everything else is a 404.
pub fn create_router(liveness: HealthState) -> Router {
    Router::new()
        .route("/health", get(get_health).fallback(not_found))
        .fallback(not_found)
        .with_state(liveness)
}

async fn get_health(State(liveness): State<HealthState>) -> Json<HealthResponse> {
    let current = liveness.borrow().clone();
    Json(HealthResponse {
        status: "healthy",
        print_state: current.print_state,
        print_running: current.print_running,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    fn state(print_state: &str, running: bool) -> HealthState {
        let (_tx, rx) = watch::channel(Liveness {
            print_state: print_state.to_string(),
            print_running: running,
        });
        rx
    }

    #[tokio::test]
    async fn reports_print_state() {
        let app = create_router(state("RUNNING", true));
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["printState"], "RUNNING");
        assert_eq!(json["printRunning"], true);
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn other_paths_and_methods_are_not_found() {
        let app = create_router(state("IDLE", false));

        let wrong_path = Request::builder().uri("/status").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(wrong_path).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let wrong_method = Request::builder()
            .method("POST")
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(wrong_method).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
