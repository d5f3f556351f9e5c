//! Issue submission and triage endpoints

use super::actor::{MaybeStaff, Staff};
use crate::db::Issue;
use crate::error::{ApiError, ApiResult};
use crate::types::IssueId;
use crate::workflow::{NewSubmission, SimilarIssue, SubmissionOutcome};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use civic_common::{Department, IssueStatus};
use serde::Deserialize;

/// POST /issues body
#[derive(Debug, Deserialize)]
pub struct CreateIssueRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Base64-encoded image bytes
    pub image_base64: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListIssuesQuery {
    pub department: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    pub threshold: Option<f32>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pub department: String,
}

/// POST /issues
pub async fn create_issue(
    State(state): State<AppState>,
    Json(request): Json<CreateIssueRequest>,
) -> ApiResult<(StatusCode, Json<SubmissionOutcome>)> {
    let image = BASE64
        .decode(request.image_base64.trim())
        .map_err(|e| ApiError::BadRequest(format!("image_base64 is not valid base64: {}", e)))?;

    let outcome = state
        .pipeline
        .submit(NewSubmission {
            title: request.title,
            description: request.description,
            latitude: request.latitude,
            longitude: request.longitude,
            image,
            content_type: request.content_type,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET /issues
pub async fn list_issues(
    State(state): State<AppState>,
    MaybeStaff(actor): MaybeStaff,
    Query(query): Query<ListIssuesQuery>,
) -> ApiResult<Json<Vec<Issue>>> {
    let department = query
        .department
        .as_deref()
        .map(str::parse::<Department>)
        .transpose()?;
    let status = query
        .status
        .as_deref()
        .map(str::parse::<IssueStatus>)
        .transpose()?;

    let issues = state
        .pipeline
        .list_issues(actor.as_ref(), department, status, query.limit, query.offset)
        .await?;
    Ok(Json(issues))
}

/// GET /issues/:id
pub async fn get_issue(
    State(state): State<AppState>,
    Path(id): Path<IssueId>,
) -> ApiResult<Json<Issue>> {
    Ok(Json(state.pipeline.get_issue(id).await?))
}

/// GET /issues/:id/similar
pub async fn similar_issues(
    State(state): State<AppState>,
    Path(id): Path<IssueId>,
    Query(query): Query<SimilarQuery>,
) -> ApiResult<Json<Vec<SimilarIssue>>> {
    let similar = state
        .pipeline
        .find_similar(id, query.threshold, query.limit)
        .await?;
    Ok(Json(similar))
}

/// PATCH /issues/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    Staff(actor): Staff,
    Path(id): Path<IssueId>,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<Json<Issue>> {
    let status: IssueStatus = request.status.parse()?;
    Ok(Json(state.pipeline.update_status(&actor, id, status).await?))
}

/// PATCH /issues/:id/department
pub async fn reassign_department(
    State(state): State<AppState>,
    Staff(actor): Staff,
    Path(id): Path<IssueId>,
    Json(request): Json<ReassignRequest>,
) -> ApiResult<Json<Issue>> {
    let department: Department = request.department.parse()?;
    Ok(Json(
        state
            .pipeline
            .reassign_department(&actor, id, department)
            .await?,
    ))
}

pub fn issue_routes() -> Router<AppState> {
    Router::new()
        .route("/issues", get(list_issues).post(create_issue))
        .route("/issues/:id", get(get_issue))
        .route("/issues/:id/similar", get(similar_issues))
        .route("/issues/:id/status", patch(update_status))
        .route("/issues/:id/department", patch(reassign_department))
}
