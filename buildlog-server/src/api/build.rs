//! Build API Handlers
//!
//! HTTP endpoints for streaming build logs and for feeding the in-memory
//! registry with builds, execution units and step logs.

use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use buildlog_core::domain::build::Build;
use buildlog_core::domain::unit::ExecutionUnit;
use buildlog_core::dto::log::BuildLogOptions;
use futures::StreamExt;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

// =============================================================================
// Build Log Endpoint
// =============================================================================

/// GET /namespaces/{namespace}/builds/{name}/log
/// Stream the aggregated log of a build
pub async fn get_build_log(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Query(options): Query<BuildLogOptions>,
) -> ApiResult<Response> {
    tracing::debug!("Log requested for build {}/{}: {:?}", namespace, name, options);

    let cancel = CancellationToken::new();
    let stream = state
        .logs
        .get(&namespace, &name, &options, cancel.clone())
        .await?;

    // Dropping the body (client gone or stream done) cancels the background loop
    let guard = cancel.drop_guard();
    let body = ReaderStream::new(stream).map(move |chunk| {
        let _ = &guard;
        chunk
    });

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response())
}

// =============================================================================
// Registry Endpoints
// =============================================================================

/// PUT /namespaces/{namespace}/builds/{name}
/// Create or replace a build
pub async fn put_build(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Json(build): Json<Build>,
) -> ApiResult<Json<Build>> {
    check_identity(&namespace, &name, &build.namespace, &build.name)?;

    let stored = state.registry.upsert_build(build).await;
    tracing::info!(
        "Build {} stored in phase {}",
        stored.qualified_name(),
        stored.phase
    );

    Ok(Json(stored))
}

/// PUT /namespaces/{namespace}/units/{name}
/// Create or replace an execution unit
pub async fn put_unit(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Json(unit): Json<ExecutionUnit>,
) -> ApiResult<Json<ExecutionUnit>> {
    check_identity(&namespace, &name, &unit.namespace, &unit.name)?;

    let stored = state.registry.upsert_unit(unit).await;
    tracing::info!("Unit {}/{} stored in phase {}", namespace, name, stored.phase);

    Ok(Json(stored))
}

/// POST /namespaces/{namespace}/units/{name}/steps/{step}/log
/// Append raw output to the log of a step
pub async fn append_step_log(
    State(state): State<AppState>,
    Path((namespace, unit, step)): Path<(String, String, String)>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let logs = state.memory_logs.as_ref().ok_or_else(|| {
        ApiError::BadRequest("step logs can only be pushed to the memory log backend".to_string())
    })?;

    logs.append(&namespace, &unit, &step, &body).await;
    tracing::debug!(
        "Appended {} bytes to step {} of unit {}/{}",
        body.len(),
        step,
        namespace,
        unit
    );

    Ok(StatusCode::NO_CONTENT)
}

fn check_identity(
    path_namespace: &str,
    path_name: &str,
    namespace: &str,
    name: &str,
) -> ApiResult<()> {
    if path_namespace != namespace || path_name != name {
        return Err(ApiError::BadRequest(format!(
            "object {}/{} does not match path {}/{}",
            namespace, name, path_namespace, path_name
        )));
    }
    Ok(())
}
