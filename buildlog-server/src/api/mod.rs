//! API Module
//!
//! HTTP API layer for the server.
//! Each submodule handles endpoints for a specific domain.

pub mod build;
pub mod error;
pub mod health;

use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::repository::{MemoryLogSource, MemoryRegistry};
use crate::service::BuildLogService;

/// Shared state of all handlers
#[derive(Clone)]
pub struct AppState {
    pub logs: Arc<BuildLogService>,
    pub registry: Arc<MemoryRegistry>,
    /// Set only when step logs are kept in memory and can be pushed
    pub memory_logs: Option<Arc<MemoryLogSource>>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Build log endpoint
        .route(
            "/namespaces/{namespace}/builds/{name}/log",
            get(build::get_build_log),
        )
        // Registry endpoints
        .route("/namespaces/{namespace}/builds/{name}", put(build::put_build))
        .route("/namespaces/{namespace}/units/{name}", put(build::put_unit))
        .route(
            "/namespaces/{namespace}/units/{name}/steps/{step}/log",
            post(build::append_step_log),
        )
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use buildlog_core::domain::build::{Build, BuildPhase};
    use buildlog_core::domain::unit::{ExecutionUnit, Step, UnitPhase};
    use tower::ServiceExt;

    use crate::repository::PodmanLogSource;

    fn memory_app() -> Router {
        let registry = Arc::new(MemoryRegistry::new());
        let memory_logs = Arc::new(MemoryLogSource::new());
        let service = BuildLogService::new(registry.clone(), registry.clone(), memory_logs.clone());

        create_router(AppState {
            logs: Arc::new(service),
            registry,
            memory_logs: Some(memory_logs),
        })
    }

    fn put_json(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = memory_app().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn test_unknown_build_is_404() {
        let response = memory_app()
            .oneshot(get("/namespaces/ci/builds/ghost/log"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("\"error\""));
    }

    #[tokio::test]
    async fn test_invalid_options_are_400() {
        let response = memory_app()
            .oneshot(get("/namespaces/ci/builds/app-1/log?tailLines=-1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = memory_app()
            .oneshot(get("/namespaces/ci/builds/app-1/log?previous=true&version=2"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_push_objects_then_stream_log() {
        let app = memory_app();

        let build = Build::new("ci", "app-1").with_phase(BuildPhase::Complete);
        let response = app
            .clone()
            .oneshot(put_json(
                "/namespaces/ci/builds/app-1",
                serde_json::to_string(&build).unwrap(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let unit = ExecutionUnit::new("ci", "app-1-build")
            .with_init_step(Step::terminated("git-clone", 0))
            .with_main_step(Step::terminated("sti-build", 0))
            .with_phase(UnitPhase::Succeeded);
        let response = app
            .clone()
            .oneshot(put_json(
                "/namespaces/ci/units/app-1-build",
                serde_json::to_string(&unit).unwrap(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        for (step, text) in [("git-clone", "cloned\n"), ("sti-build", "built\n")] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri(format!("/namespaces/ci/units/app-1-build/steps/{}/log", step))
                        .body(Body::from(text))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }

        let response = app
            .oneshot(get("/namespaces/ci/builds/app-1/log?follow=true"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_text(response).await, "cloned\nbuilt\n");
    }

    #[tokio::test]
    async fn test_queued_build_with_no_wait_is_empty() {
        let app = memory_app();
        let build = Build::new("ci", "app-1").with_phase(BuildPhase::Pending);
        app.clone()
            .oneshot(put_json(
                "/namespaces/ci/builds/app-1",
                serde_json::to_string(&build).unwrap(),
            ))
            .await
            .unwrap();

        let response = app
            .oneshot(get("/namespaces/ci/builds/app-1/log?noWait=true"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "");
    }

    #[tokio::test]
    async fn test_path_and_body_must_agree() {
        let build = Build::new("ci", "app-2");
        let response = memory_app()
            .oneshot(put_json(
                "/namespaces/ci/builds/app-1",
                serde_json::to_string(&build).unwrap(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_pushing_logs_needs_memory_backend() {
        let registry = Arc::new(MemoryRegistry::new());
        let service = BuildLogService::new(
            registry.clone(),
            registry.clone(),
            Arc::new(PodmanLogSource::default()),
        );
        let app = create_router(AppState {
            logs: Arc::new(service),
            registry,
            memory_logs: None,
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/namespaces/ci/units/app-1-build/steps/sti-build/log")
                    .body(Body::from("x"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
