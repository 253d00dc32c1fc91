use axum::{
    extract::{Multipart, Path, Query, State},
    response::{IntoResponse, Response},
    Extension, Json,
};
use mongodb::bson::{doc, oid::ObjectId, Document};
use serde::Serialize;
use crate::errors::{AppError, AppResult};
use crate::middleware::Claims;
use crate::models::{
    Decision, DocumentChange, FileRecord, ReviewDecision, ReviewForm, ReviewRecord, ReviewStage,
    Role, Task, TaskAction, TaskQuery, TaskStatus,
};
use crate::services::notifier;
use crate::state::AppState;
use super::{
    file::{discard_blob, read_upload_form, save_version, Categorization},
    json::ApiJson,
    parse_object_id, stored_id,
};

#[derive(Serialize)]
struct UploadResponse {
    task: Task,
    file: FileRecord,
}

pub(super) async fn load_task(state: &AppState, task_id: &str) -> AppResult<Task> {
    let id = parse_object_id(task_id, "task")?;
    state
        .mongo
        .get_task(&id)
        .await?
        .ok_or_else(|| {
            tracing::warn!("Task not found: {}", task_id);
            AppError::NotFound(format!("Task {} not found", task_id))
        })
}

/// Filter selecting the tasks a caller may see.
fn visibility_filter(role: Role, user: ObjectId) -> Document {
    match role {
        Role::Admin => Document::new(),
        Role::Viewer => doc! { "status": TaskStatus::Completed.as_str() },
        Role::User => doc! { "$or": [ { "initiator": user }, { "reviewer": user } ] },
    }
}

// Course bookkeeping trails the task itself; a failure here is logged
// rather than undoing a status change that is already stored.
async fn sync_course_document(state: &AppState, task: &Task, change: DocumentChange) {
    if let Err(e) = state
        .mongo
        .update_course_document(&task.course, &task.doc_type, change)
        .await
    {
        tracing::error!(
            "Failed to update {} document {} for task {:?}: {}",
            task.course_code,
            task.doc_type,
            task.id,
            e
        );
    }
}

fn review_decision(decision: Decision) -> ReviewDecision {
    match decision {
        Decision::Approve => ReviewDecision::Approved,
        Decision::Reject => ReviewDecision::Rejected,
    }
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<TaskQuery>,
) -> AppResult<Response> {
    let user = claims.user_id()?;
    let mut filter = visibility_filter(claims.role, user);

    if let Some(status) = query.status.as_deref() {
        let status = TaskStatus::parse(status)
            .ok_or_else(|| AppError::Validation(format!("Unknown status: {}", status)))?;
        if claims.role == Role::Viewer && status != TaskStatus::Completed {
            return Ok(ApiJson(Vec::<Task>::new()).into_response());
        }
        filter.insert("status", status.as_str());
    }

    let tasks = state.mongo.list_tasks(filter).await?;
    tracing::debug!("Listing {} tasks for {}", tasks.len(), claims.sub);
    Ok(ApiJson(tasks).into_response())
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(task_id): Path<String>,
) -> AppResult<Response> {
    let task = load_task(&state, &task_id).await?;
    if !task.visible_to(&claims.user_id()?, claims.role) {
        return Err(AppError::Forbidden(format!("Task {} is not visible to you", task_id)));
    }
    Ok(ApiJson(task).into_response())
}

pub async fn upload_task_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(task_id): Path<String>,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let user = stored_id(state.current_user(&claims).await?.id, "user")?;
    let mut task = load_task(&state, &task_id).await?;

    if task.initiator != user {
        return Err(AppError::Forbidden("Only the task's initiator can upload its file".into()));
    }
    // Refuse before any bytes reach GridFS.
    task.status.apply(TaskAction::Upload)?;

    let mut blob = None;
    if let Err(e) = read_upload_form(&state, &mut multipart, &mut blob).await {
        discard_blob(&state, blob).await;
        return Err(e);
    }
    let blob = blob.ok_or_else(|| AppError::Upload("No file uploaded".into()))?;

    let meta = Categorization {
        year: task.year.clone(),
        course_code: Some(task.course_code.clone()),
        doc_type: Some(task.doc_type.clone()),
        ..Categorization::default()
    };
    let record = save_version(&state, blob, meta, user, task.id).await?;

    let expected = task.advance(TaskAction::Upload, user, None)?;
    task.file = record.id;
    state.mongo.save_task_transition(&task, expected).await?;

    let file = stored_id(record.id, "file")?;
    let file_id = record.file_id.clone();
    sync_course_document(&state, &task, DocumentChange::Submit { file, file_id, task: task.id })
        .await;
    state
        .notifier
        .send(notifier::upload_notices(&task, &record.filename))
        .await;

    tracing::info!(
        "{} uploaded {} v{} for task {}",
        claims.name,
        record.file_id,
        record.version,
        task_id
    );
    Ok(ApiJson(UploadResponse { task, file: record }).into_response())
}

pub async fn review_task(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(task_id): Path<String>,
    Json(form): Json<ReviewForm>,
) -> AppResult<Response> {
    let user = stored_id(state.current_user(&claims).await?.id, "user")?;
    let mut task = load_task(&state, &task_id).await?;

    if task.reviewer != user {
        return Err(AppError::Forbidden("Only the task's reviewer can review it".into()));
    }

    let action = match form.decision {
        Decision::Approve => TaskAction::ReviewerApprove,
        Decision::Reject => TaskAction::ReviewerReject,
    };
    let expected = task.advance(action, user, form.comment)?;
    state.mongo.save_task_transition(&task, expected).await?;

    let review = ReviewRecord {
        reviewer: user,
        stage: ReviewStage::Reviewer,
        decision: review_decision(form.decision),
        comment: task.reviewer_comment.clone(),
        at: task.updated_at,
    };
    sync_course_document(&state, &task, DocumentChange::Review(review)).await;

    let admins = state.mongo.admin_ids().await.unwrap_or_else(|e| {
        tracing::error!("Failed to look up admins for task {}: {}", task_id, e);
        Vec::new()
    });
    let approved = form.decision == Decision::Approve;
    state
        .notifier
        .send(notifier::review_notices(
            &task,
            approved,
            task.reviewer_comment.as_deref(),
            &admins,
        ))
        .await;

    tracing::info!("{} reviewed task {}: {}", claims.name, task_id, task.status);
    Ok(ApiJson(task).into_response())
}

pub async fn admin_review_task(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(task_id): Path<String>,
    Json(form): Json<ReviewForm>,
) -> AppResult<Response> {
    let user = stored_id(state.confirm_admin(&claims).await?.id, "user")?;
    let mut task = load_task(&state, &task_id).await?;

    let action = match form.decision {
        Decision::Approve => TaskAction::AdminApprove,
        Decision::Reject => TaskAction::AdminReject,
    };
    let expected = task.advance(action, user, form.comment)?;
    state.mongo.save_task_transition(&task, expected).await?;

    let review = ReviewRecord {
        reviewer: user,
        stage: ReviewStage::Admin,
        decision: review_decision(form.decision),
        comment: task.admin_comment.clone(),
        at: task.updated_at,
    };
    sync_course_document(&state, &task, DocumentChange::Review(review)).await;

    let approved = form.decision == Decision::Approve;
    state
        .notifier
        .send(notifier::admin_notices(&task, approved, task.admin_comment.as_deref()))
        .await;

    tracing::info!("{} gave admin decision on task {}: {}", claims.name, task_id, task.status);
    Ok(ApiJson(task).into_response())
}

pub async fn complete_task(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(task_id): Path<String>,
) -> AppResult<Response> {
    let user = stored_id(state.confirm_admin(&claims).await?.id, "user")?;
    let mut task = load_task(&state, &task_id).await?;

    let expected = task.advance(TaskAction::Complete, user, None)?;
    state.mongo.save_task_transition(&task, expected).await?;

    sync_course_document(&state, &task, DocumentChange::Touch).await;
    state.notifier.send(notifier::completion_notices(&task)).await;

    tracing::info!("{} completed task {}", claims.name, task_id);
    Ok(ApiJson(task).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_filters_by_role() {
        let user = ObjectId::new();

        assert!(visibility_filter(Role::Admin, user).is_empty());
        assert_eq!(
            visibility_filter(Role::Viewer, user),
            doc! { "status": "completed" }
        );

        let filter = visibility_filter(Role::User, user);
        let branches = filter.get_array("$or").unwrap();
        assert_eq!(branches.len(), 2);
    }

    #[test]
    fn decisions_map_to_review_outcomes() {
        assert_eq!(review_decision(Decision::Approve), ReviewDecision::Approved);
        assert_eq!(review_decision(Decision::Reject), ReviewDecision::Rejected);
    }
}
