use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use super::AppState;
use crate::models::*;
use crate::scoring::PipelineError;

// ============================================================
// Error Handling
// ============================================================

/// Log an internal error and return a sanitized response to the client.
///
/// Missing records and locked sessions are safe to expose and keep their
/// message; everything else becomes a generic 500.
fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    let msg = e.to_string();

    if msg.contains("not found") {
        tracing::warn!("Not found: {}", msg);
        return (StatusCode::NOT_FOUND, msg);
    }
    if msg.contains("locked for scoring") {
        tracing::warn!("Conflict: {}", msg);
        return (StatusCode::CONFLICT, msg);
    }

    tracing::error!("Internal error: {}", msg);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn session_not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Session not found".to_string())
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Targets
// ============================================================

pub async fn random_target(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Target>), (StatusCode, String)> {
    let acquired = state.targets.acquire_target().await;
    if acquired.fallback {
        tracing::warn!("Handing out the sentinel target");
    }
    state
        .db
        .create_target(&acquired)
        .map(|t| (StatusCode::CREATED, Json(t)))
        .map_err(internal_error)
}

pub async fn get_target(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Target>, (StatusCode, String)> {
    state
        .db
        .get_target(&id)
        .map_err(internal_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Target not found".to_string()))
}

// ============================================================
// Sessions
// ============================================================

pub async fn create_session(
    State(state): State<AppState>,
    Json(input): Json<CreateSessionInput>,
) -> Result<(StatusCode, Json<Session>), (StatusCode, String)> {
    let session = state
        .db
        .create_session(&input.target_id)
        .map_err(internal_error)?;
    tracing::info!("Session {} created on target {}", session.id, session.target_id);
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<Session>>, (StatusCode, String)> {
    let unfinished_only = match query.status.as_deref() {
        None => false,
        Some("unfinished") => true,
        Some(other) => {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Unknown session status filter: {}", other),
            ))
        }
    };
    state
        .db
        .list_sessions(unfinished_only)
        .map(Json)
        .map_err(internal_error)
}

pub async fn unfinished_session(
    State(state): State<AppState>,
) -> Result<Json<Session>, (StatusCode, String)> {
    state
        .db
        .find_unfinished_session()
        .map_err(internal_error)?
        .map(Json)
        .ok_or((
            StatusCode::NOT_FOUND,
            "No unfinished session".to_string(),
        ))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Session>, (StatusCode, String)> {
    state
        .db
        .get_session(id)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(session_not_found)
}

pub async fn append_note(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<AppendNoteInput>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state
        .db
        .append_note(id, input.stage, &input.text)
        .map_err(internal_error)?
    {
        tracing::info!("Session {}: note recorded for stage {}", id, input.stage);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(session_not_found())
    }
}

/// Lock the notes and start scoring in the background.
pub async fn finish_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<FinishResponse>), (StatusCode, String)> {
    match state.pipeline.begin(id) {
        Ok(status) => Ok((StatusCode::ACCEPTED, Json(FinishResponse { status }))),
        Err(PipelineError::SessionNotFound(_)) => Err(session_not_found()),
        Err(e) => Err(internal_error(e)),
    }
}
