//! Vote and comment endpoints

use crate::db::Comment;
use crate::error::ApiResult;
use crate::types::IssueId;
use crate::workflow::VoteStatus;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use civic_common::VoteType;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub citizen_token: String,
    pub vote_type: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub citizen_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub citizen_token: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentPageQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// POST /issues/:id/vote
pub async fn cast_vote(
    State(state): State<AppState>,
    Path(id): Path<IssueId>,
    Json(request): Json<VoteRequest>,
) -> ApiResult<Json<VoteStatus>> {
    let vote_type: VoteType = request.vote_type.parse()?;
    Ok(Json(
        state
            .pipeline
            .cast_vote(id, &request.citizen_token, vote_type)
            .await?,
    ))
}

/// DELETE /issues/:id/vote?citizen_token=
pub async fn remove_vote(
    State(state): State<AppState>,
    Path(id): Path<IssueId>,
    Query(query): Query<TokenQuery>,
) -> ApiResult<Json<VoteStatus>> {
    let token = query.citizen_token.unwrap_or_default();
    Ok(Json(state.pipeline.remove_vote(id, &token).await?))
}

/// GET /issues/:id/vote
pub async fn vote_status(
    State(state): State<AppState>,
    Path(id): Path<IssueId>,
    Query(query): Query<TokenQuery>,
) -> ApiResult<Json<VoteStatus>> {
    Ok(Json(
        state
            .pipeline
            .vote_status(id, query.citizen_token.as_deref())
            .await?,
    ))
}

/// POST /issues/:id/comments
pub async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<IssueId>,
    Json(request): Json<CommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let comment = state
        .pipeline
        .add_comment(id, &request.citizen_token, &request.text)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /issues/:id/comments
pub async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<IssueId>,
    Query(query): Query<CommentPageQuery>,
) -> ApiResult<Json<Vec<Comment>>> {
    Ok(Json(
        state
            .pipeline
            .list_comments(id, query.skip, query.limit)
            .await?,
    ))
}

/// DELETE /issues/:id/comments/:comment_id?citizen_token=
pub async fn delete_comment(
    State(state): State<AppState>,
    Path((id, comment_id)): Path<(IssueId, i64)>,
    Query(query): Query<TokenQuery>,
) -> ApiResult<StatusCode> {
    let token = query.citizen_token.unwrap_or_default();
    state.pipeline.delete_comment(id, comment_id, &token).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn engagement_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/issues/:id/vote",
            get(vote_status).post(cast_vote).delete(remove_vote),
        )
        .route("/issues/:id/comments", get(list_comments).post(add_comment))
        .route("/issues/:id/comments/:comment_id", delete(delete_comment))
}
