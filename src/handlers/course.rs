use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use mongodb::bson::{self, doc, oid::ObjectId, DateTime, Document};
use crate::errors::{AppError, AppResult};
use crate::middleware::Claims;
use crate::models::{Course, CourseForm};
use crate::state::AppState;
use super::{clean, json::ApiJson, parse_object_id};

fn validate_course(form: &CourseForm) -> AppResult<()> {
    if form.code.trim().is_empty() || form.name.trim().is_empty() {
        return Err(AppError::Validation("Course code and name are required".into()));
    }
    if !form.ltp.is_valid() {
        return Err(AppError::Validation("LTP hours cannot be negative".into()));
    }
    Ok(())
}

async fn load_course(state: &AppState, course_id: &str) -> AppResult<Course> {
    let id = parse_object_id(course_id, "course")?;
    state
        .mongo
        .get_course(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Course {} not found", course_id)))
}

pub async fn list_courses(State(state): State<AppState>) -> AppResult<Response> {
    let courses = state.mongo.list_courses().await?;
    tracing::debug!("Listing {} courses", courses.len());
    Ok(ApiJson(courses).into_response())
}

pub async fn get_course(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> AppResult<Response> {
    let course = load_course(&state, &course_id).await?;
    Ok(ApiJson(course).into_response())
}

pub async fn create_course(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(form): Json<CourseForm>,
) -> AppResult<Response> {
    claims.require_admin()?;
    validate_course(&form)?;
    state.confirm_admin(&claims).await?;

    let now = DateTime::now();
    let mut course = Course {
        id: Some(ObjectId::new()),
        code: form.code.trim().to_uppercase(),
        name: form.name.trim().to_string(),
        department: clean(form.department),
        year: clean(form.year),
        semester: clean(form.semester),
        ltp: form.ltp,
        credits: form.ltp.credits(),
        documents: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    for doc_type in form.documents.iter().filter(|d| !d.trim().is_empty()) {
        course.ensure_document(doc_type);
    }

    state.mongo.insert_course(&course).await?;

    tracing::info!("{} created course {} ({} documents)", claims.name, course.code, course.documents.len());
    Ok((StatusCode::CREATED, ApiJson(course)).into_response())
}

/// Top-level fields a course update may change. Document entries and their
/// review history are not part of it.
fn editable_fields(form: &CourseForm) -> AppResult<Document> {
    Ok(doc! {
        "code": form.code.trim().to_uppercase(),
        "name": form.name.trim(),
        "department": clean(form.department.clone()),
        "year": clean(form.year.clone()),
        "semester": clean(form.semester.clone()),
        "ltp": bson::to_bson(&form.ltp)?,
        "credits": form.ltp.credits(),
        "updated_at": DateTime::now(),
    })
}

/// Replaces the editable fields. Listed document types that are new get
/// pending entries; existing entries keep their status and reviews.
pub async fn update_course(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<String>,
    Json(form): Json<CourseForm>,
) -> AppResult<Response> {
    claims.require_admin()?;
    validate_course(&form)?;
    let id = parse_object_id(&course_id, "course")?;
    state.confirm_admin(&claims).await?;

    state.mongo.update_course_fields(&id, editable_fields(&form)?).await?;
    for doc_type in form.documents.iter().filter(|d| !d.trim().is_empty()) {
        state.mongo.add_course_document(&id, doc_type).await?;
    }

    let course = load_course(&state, &course_id).await?;
    tracing::info!("{} updated course {}", claims.name, course.code);
    Ok(ApiJson(course).into_response())
}

pub async fn delete_course(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<String>,
) -> AppResult<Response> {
    claims.require_admin()?;
    let id = parse_object_id(&course_id, "course")?;
    state.confirm_admin(&claims).await?;

    let tasks = state.mongo.count_tasks(doc! { "course": id }).await?;
    if tasks > 0 {
        return Err(AppError::Conflict(format!(
            "Course {} is referenced by {} task(s)",
            course_id, tasks
        )));
    }

    if !state.mongo.delete_course(&id).await? {
        return Err(AppError::NotFound(format!("Course {} not found", course_id)));
    }

    tracing::info!("{} deleted course {}", claims.name, course_id);
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ltp;

    fn form(code: &str, ltp: Ltp) -> CourseForm {
        CourseForm {
            code: code.into(),
            name: "Data Structures".into(),
            department: None,
            year: Some("2024".into()),
            semester: Some("3".into()),
            ltp,
            documents: vec!["syllabus".into()],
        }
    }

    #[test]
    fn course_needs_code_and_name() {
        let ltp = Ltp { lecture: 3, tutorial: 1, practical: 2 };
        assert!(validate_course(&form("CS201", ltp)).is_ok());
        assert!(matches!(
            validate_course(&form("  ", ltp)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn negative_hours_are_rejected() {
        let ltp = Ltp { lecture: 3, tutorial: -1, practical: 0 };
        assert!(validate_course(&form("CS201", ltp)).is_err());
    }

    #[test]
    fn course_edit_leaves_document_entries_alone() {
        let ltp = Ltp { lecture: 3, tutorial: 0, practical: 2 };
        let fields = editable_fields(&form(" cs201 ", ltp)).unwrap();
        assert_eq!(fields.get_str("code").unwrap(), "CS201");
        assert_eq!(fields.get_f64("credits").unwrap(), 4.0);
        assert!(!fields.contains_key("documents"));
        assert!(!fields.contains_key("created_at"));
    }
}
