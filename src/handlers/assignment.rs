use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime as ChronoDateTime, Utc};
use mongodb::bson::{oid::ObjectId, DateTime, Document};
use crate::errors::{AppError, AppResult};
use crate::middleware::Claims;
use crate::models::{
    normalize_doc_type, AssignmentForm, AssignmentQuery, AssignmentUpdateForm, DocumentChange,
    SubRole, Task, TaskStatus, User,
};
use crate::services::notifier;
use crate::state::AppState;
use super::{clean, json::ApiJson, parse_object_id, stored_id, task::load_task};

fn future_deadline(deadline: ChronoDateTime<Utc>) -> AppResult<DateTime> {
    if deadline <= Utc::now() {
        return Err(AppError::Validation(format!(
            "Deadline {} is not in the future",
            deadline.to_rfc3339()
        )));
    }
    Ok(DateTime::from_millis(deadline.timestamp_millis()))
}

async fn load_participant(state: &AppState, user_id: &str, subrole: SubRole) -> AppResult<User> {
    let id = parse_object_id(user_id, subrole.as_str())?;
    let user = state
        .mongo
        .get_user(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

    if !user.has_subrole(subrole) {
        return Err(AppError::Validation(format!(
            "{} is not registered as a {}",
            user.email, subrole
        )));
    }
    Ok(user)
}

pub async fn create_assignment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(form): Json<AssignmentForm>,
) -> AppResult<Response> {
    claims.require_admin()?;

    let doc_type = normalize_doc_type(&form.doc_type);
    if doc_type.is_empty() {
        return Err(AppError::Validation("Document type is required".into()));
    }
    let deadline = future_deadline(form.deadline)?;
    if form.initiator_id.trim() == form.reviewer_id.trim() {
        return Err(AppError::Validation("Initiator and reviewer must be different users".into()));
    }

    let course_id = parse_object_id(&form.course_id, "course")?;
    state.confirm_admin(&claims).await?;
    let course = state
        .mongo
        .get_course(&course_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Course {} not found", form.course_id)))?;
    let initiator = load_participant(&state, &form.initiator_id, SubRole::Initiator).await?;
    let reviewer = load_participant(&state, &form.reviewer_id, SubRole::Reviewer).await?;

    let now = DateTime::now();
    let task = Task {
        id: Some(ObjectId::new()),
        title: clean(form.title).unwrap_or_else(|| format!("{} {}", course.code, doc_type)),
        description: clean(form.description),
        course: course_id,
        course_code: course.code.clone(),
        doc_type: doc_type.clone(),
        year: course.year.clone(),
        initiator: stored_id(initiator.id, "user")?,
        reviewer: stored_id(reviewer.id, "user")?,
        assigned_by: claims.user_id()?,
        deadline,
        status: TaskStatus::Assigned,
        file: None,
        reviewer_comment: None,
        admin_comment: None,
        history: Vec::new(),
        overdue_notified: false,
        created_at: now,
        updated_at: now,
    };

    state.mongo.insert_task(&task).await?;
    state
        .mongo
        .update_course_document(
            &course_id,
            &doc_type,
            DocumentChange::Assign { task: stored_id(task.id, "task")? },
        )
        .await?;
    state.notifier.send(notifier::assignment_notices(&task)).await;

    tracing::info!(
        "{} assigned {} {} to {} (reviewer {})",
        claims.name,
        task.course_code,
        task.doc_type,
        initiator.email,
        reviewer.email
    );
    Ok((StatusCode::CREATED, ApiJson(task)).into_response())
}

pub async fn list_assignments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<AssignmentQuery>,
) -> AppResult<Response> {
    state.confirm_admin(&claims).await?;

    let mut filter = Document::new();
    if let Some(status) = query.status.as_deref() {
        let status = TaskStatus::parse(status)
            .ok_or_else(|| AppError::Validation(format!("Unknown status: {}", status)))?;
        filter.insert("status", status.as_str());
    }
    if let Some(course_id) = query.course_id.as_deref() {
        filter.insert("course", parse_object_id(course_id, "course")?);
    }

    let tasks = state.mongo.list_tasks(filter).await?;
    tracing::debug!("Listing {} assignments", tasks.len());
    Ok(ApiJson(tasks).into_response())
}

/// Extends the deadline or swaps participants of an open task. Newly added
/// participants are notified as if freshly assigned.
pub async fn update_assignment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(task_id): Path<String>,
    Json(form): Json<AssignmentUpdateForm>,
) -> AppResult<Response> {
    state.confirm_admin(&claims).await?;
    let current = load_task(&state, &task_id).await?;

    if current.status.is_terminal() {
        return Err(AppError::Conflict(format!("Task {} is already completed", task_id)));
    }

    let deadline = form.deadline.map(future_deadline).transpose()?;
    let mut initiator = None;
    if let Some(initiator_id) = form.initiator_id.as_deref() {
        let user = load_participant(&state, initiator_id, SubRole::Initiator).await?;
        initiator = Some(stored_id(user.id, "user")?).filter(|id| *id != current.initiator);
    }
    let mut reviewer = None;
    if let Some(reviewer_id) = form.reviewer_id.as_deref() {
        let user = load_participant(&state, reviewer_id, SubRole::Reviewer).await?;
        reviewer = Some(stored_id(user.id, "user")?).filter(|id| *id != current.reviewer);
    }
    if initiator.unwrap_or(current.initiator) == reviewer.unwrap_or(current.reviewer) {
        return Err(AppError::Validation("Initiator and reviewer must be different users".into()));
    }

    let id = stored_id(current.id, "task")?;
    let task = state
        .mongo
        .update_assignment_fields(&id, deadline, initiator, reviewer)
        .await?;

    let newcomers: Vec<ObjectId> = initiator.into_iter().chain(reviewer).collect();
    let notices = notifier::assignment_notices(&task)
        .into_iter()
        .filter(|n| newcomers.contains(&n.recipient))
        .collect();
    state.notifier.send(notices).await;

    tracing::info!("{} updated assignment {}", claims.name, task_id);
    Ok(ApiJson(task).into_response())
}

pub async fn delete_assignment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(task_id): Path<String>,
) -> AppResult<Response> {
    state.confirm_admin(&claims).await?;
    let task = load_task(&state, &task_id).await?;

    if task.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "Task {} is completed and cannot be cancelled",
            task_id
        )));
    }

    let id = stored_id(task.id, "task")?;
    state.mongo.delete_task(&id).await?;
    let removed = state.mongo.delete_task_notifications(&id).await?;

    let course_exists = state.mongo.get_course(&task.course).await?.is_some();
    if course_exists {
        state
            .mongo
            .update_course_document(&task.course, &task.doc_type, DocumentChange::Unlink { task: id })
            .await?;
    }

    tracing::info!(
        "{} cancelled task {} ({} notifications removed)",
        claims.name,
        task_id,
        removed
    );
    Ok(StatusCode::NO_CONTENT.into_response())
}
