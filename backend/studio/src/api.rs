//! Axum handlers for the read-only share API.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::error;

use crate::backend::Backend;
use crate::errors::StudioError;
use crate::models::{CompilationRecord, Deployment, Project};

#[derive(Clone)]
pub struct ApiState {
    pub backend: Backend,
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct SharedProjectResponse {
    pub project: Project,
    pub author: Option<String>,
    pub compilation: Option<CompilationRecord>,
}

#[derive(Serialize)]
pub struct DeploymentsResponse {
    pub project_id: String,
    pub count: usize,
    pub deployments: Vec<Deployment>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Project not found or is private".into(),
        }),
    )
        .into_response()
}

fn internal(e: StudioError) -> Response {
    error!("Share API error: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

/// A project visible through the share API, or the response to send.
async fn public_project(state: &ApiState, project_id: &str) -> Result<Project, Response> {
    match state.backend.get_project(project_id).await {
        Ok(p) if p.is_public => Ok(p),
        Ok(_) | Err(StudioError::NotFound(_)) => Err(not_found()),
        Err(e) => Err(internal(e)),
    }
}

async fn shared_details(
    state: &ApiState,
    project: &mut Project,
) -> Result<(Option<String>, Option<CompilationRecord>), StudioError> {
    if state.backend.record_view(&project.id).await? {
        project.view_count += 1;
    }
    let author = state.backend.get_user(&project.user_id).await?.map(|u| u.email);
    let compilation = state.backend.latest_successful_compilation(&project.id).await?;
    Ok((author, compilation))
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /shared/:id`
///
/// A public project with its author and last successful build. Each
/// request counts as a view.
pub async fn get_shared_project(
    State(state): State<Arc<ApiState>>,
    Path(project_id): Path<String>,
) -> Response {
    let mut project = match public_project(&state, &project_id).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    match shared_details(&state, &mut project).await {
        Ok((author, compilation)) => (
            StatusCode::OK,
            Json(SharedProjectResponse {
                project,
                author,
                compilation,
            }),
        )
            .into_response(),
        Err(e) => internal(e),
    }
}

/// `GET /shared/:id/deployments`
pub async fn get_shared_deployments(
    State(state): State<Arc<ApiState>>,
    Path(project_id): Path<String>,
) -> Response {
    if let Err(resp) = public_project(&state, &project_id).await {
        return resp;
    }
    match state.backend.list_deployments(&project_id).await {
        Ok(deployments) => (
            StatusCode::OK,
            Json(DeploymentsResponse {
                project_id,
                count: deployments.len(),
                deployments,
            }),
        )
            .into_response(),
        Err(e) => internal(e),
    }
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/shared/:id", get(get_shared_project))
        .route("/shared/:id/deployments", get(get_shared_deployments))
        .with_state(state)
}
