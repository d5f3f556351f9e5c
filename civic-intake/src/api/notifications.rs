//! Citizen notification inbox, addressed by tracking token

use crate::db::{Notification, NotificationCounts};
use crate::error::ApiResult;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    pub token: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub id: i64,
    pub is_read: bool,
}

/// GET /notifications?token=
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<InboxQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    let token = query.token.unwrap_or_default();
    Ok(Json(
        state
            .pipeline
            .list_notifications(&token, query.limit)
            .await?,
    ))
}

/// GET /notifications/count?token=
pub async fn notification_count(
    State(state): State<AppState>,
    Query(query): Query<InboxQuery>,
) -> ApiResult<Json<NotificationCounts>> {
    let token = query.token.unwrap_or_default();
    Ok(Json(state.pipeline.notification_counts(&token).await?))
}

/// PATCH /notifications/:id/read?token=
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<InboxQuery>,
) -> ApiResult<Json<MarkReadResponse>> {
    let token = query.token.unwrap_or_default();
    state.pipeline.mark_notification_read(id, &token).await?;
    Ok(Json(MarkReadResponse { id, is_read: true }))
}

/// PATCH /notifications/read-all?token=
pub async fn mark_all_read(
    State(state): State<AppState>,
    Query(query): Query<InboxQuery>,
) -> ApiResult<Json<MarkAllReadResponse>> {
    let token = query.token.unwrap_or_default();
    let updated = state.pipeline.mark_all_notifications_read(&token).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/count", get(notification_count))
        .route("/notifications/read-all", patch(mark_all_read))
        .route("/notifications/:id/read", patch(mark_read))
}
