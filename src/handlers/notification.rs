use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::json;
use crate::errors::{AppError, AppResult};
use crate::middleware::Claims;
use crate::models::NotificationQuery;
use crate::state::AppState;
use super::{json::ApiJson, parse_object_id};

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Response> {
    let user = claims.user_id()?;
    let notifications = state.mongo.list_notifications(&user, query.unread).await?;
    tracing::debug!("Listing {} notifications for {}", notifications.len(), claims.sub);
    Ok(ApiJson(notifications).into_response())
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Response> {
    let count = state.mongo.unread_count(&claims.user_id()?).await?;
    Ok(Json(json!({ "count": count })).into_response())
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(notification_id): Path<String>,
) -> AppResult<Response> {
    let id = parse_object_id(&notification_id, "notification")?;
    if !state.mongo.mark_notification_read(&id, &claims.user_id()?).await? {
        return Err(AppError::NotFound(format!("Notification {} not found", notification_id)));
    }
    Ok(Json(json!({ "updated": 1 })).into_response())
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Response> {
    let updated = state.mongo.mark_all_notifications_read(&claims.user_id()?).await?;
    tracing::debug!("Marked {} notifications read for {}", updated, claims.sub);
    Ok(Json(json!({ "updated": updated })).into_response())
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(notification_id): Path<String>,
) -> AppResult<Response> {
    let id = parse_object_id(&notification_id, "notification")?;
    // Scoped to the caller, so someone else's notification reads as missing.
    if !state.mongo.delete_notification(&id, &claims.user_id()?).await? {
        return Err(AppError::NotFound(format!("Notification {} not found", notification_id)));
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}
