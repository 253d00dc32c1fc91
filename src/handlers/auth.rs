use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use bcrypt::{hash, verify};
use mongodb::bson::{doc, oid::ObjectId, Document};
use serde::Serialize;
use crate::errors::{AppError, AppResult};
use crate::middleware::{issue_token, Claims};
use crate::models::{
    LoginForm, RegisterForm, Role, SubRole, UpdateUserForm, User, UserQuery, UserView,
};
use crate::state::AppState;
use super::{clean, json::ApiJson, parse_object_id};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    user: UserView,
}

pub async fn login(
    State(state): State<AppState>,
    Json(form): Json<LoginForm>,
) -> AppResult<Response> {
    if form.email.trim().is_empty() || form.password.is_empty() {
        return Err(AppError::Validation("Email and password are required".into()));
    }

    tracing::info!("Login attempt for {}", form.email.trim());

    let user = match state.mongo.find_user_by_email(&form.email).await? {
        Some(user) => user,
        None => {
            tracing::info!("Unknown email: {}", form.email.trim());
            return Err(AppError::Auth("Invalid email or password".into()));
        }
    };

    if !verify(&form.password, &user.password_hash)? {
        tracing::info!("Invalid password for {}", user.email);
        return Err(AppError::Auth("Invalid email or password".into()));
    }

    let claims = Claims::for_user(&user, state.config.auth.token_ttl_hours)?;
    let token = issue_token(&claims, &state.config.auth.jwt_secret)?;

    tracing::info!("User {} logged in as {}", user.email, user.role);
    Ok(ApiJson(LoginResponse { token, user: user.into() }).into_response())
}

fn check_subrole(role: Role, subrole: Option<SubRole>) -> AppResult<()> {
    if subrole.is_some() && role != Role::User {
        return Err(AppError::Validation(format!(
            "A subrole can only be given to role 'user', not '{}'",
            role
        )));
    }
    Ok(())
}

fn validate_registration(form: &RegisterForm) -> AppResult<()> {
    if form.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".into()));
    }
    let email = form.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation(format!("Invalid email: {}", form.email)));
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    check_subrole(form.role, form.subrole)
}

pub async fn register(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(form): Json<RegisterForm>,
) -> AppResult<Response> {
    claims.require_admin()?;
    validate_registration(&form)?;
    state.confirm_admin(&claims).await?;

    let password_hash = hash(form.password.as_bytes(), state.config.auth.bcrypt_cost)?;
    let user = User::new(
        form.name.trim().to_string(),
        &form.email,
        password_hash,
        form.role,
        form.subrole,
        clean(form.department),
    );

    state.mongo.insert_user(&user).await?;

    tracing::info!("{} registered {} as {}", claims.name, user.email, user.role);
    Ok((StatusCode::CREATED, ApiJson(UserView::from(user))).into_response())
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Response> {
    let user = state
        .mongo
        .get_user(&claims.user_id()?)
        .await?
        .ok_or_else(|| AppError::Auth("User no longer exists".into()))?;

    Ok(ApiJson(UserView::from(user)).into_response())
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<UserQuery>,
) -> AppResult<Response> {
    state.confirm_admin(&claims).await?;

    let mut filter = Document::new();
    if let Some(role) = query.role {
        filter.insert("role", role.as_str());
    }
    if let Some(subrole) = query.subrole {
        filter.insert("subrole", subrole.as_str());
    }

    let users: Vec<UserView> = state
        .mongo
        .list_users(filter)
        .await?
        .into_iter()
        .map(UserView::from)
        .collect();

    tracing::debug!("Listing {} users", users.len());
    Ok(ApiJson(users).into_response())
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
    Json(form): Json<UpdateUserForm>,
) -> AppResult<Response> {
    claims.require_admin()?;
    let id = parse_object_id(&user_id, "user")?;
    state.confirm_admin(&claims).await?;

    let mut user = state
        .mongo
        .get_user(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

    if let Some(name) = clean(form.name) {
        user.name = name;
    }
    if let Some(role) = form.role {
        user.role = role;
        if role != Role::User {
            user.subrole = None;
        }
    }
    if form.subrole.is_some() {
        check_subrole(user.role, form.subrole)?;
        user.subrole = form.subrole;
    }
    if form.department.is_some() {
        user.department = clean(form.department);
    }

    state.mongo.replace_user(&user).await?;

    tracing::info!("{} updated user {}", claims.name, user.email);
    Ok(ApiJson(UserView::from(user)).into_response())
}

fn participant_filter(user: &ObjectId) -> Document {
    doc! { "$or": [ { "initiator": user }, { "reviewer": user } ] }
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
) -> AppResult<Response> {
    claims.require_admin()?;
    let id = parse_object_id(&user_id, "user")?;

    if id == claims.user_id()? {
        return Err(AppError::Validation("Admins cannot delete their own account".into()));
    }
    state.confirm_admin(&claims).await?;

    // Completed tasks count too; they keep naming their participants.
    let tasks = state.mongo.count_tasks(participant_filter(&id)).await?;
    if tasks > 0 {
        return Err(AppError::Conflict(format!(
            "User {} is named on {} task(s)",
            user_id, tasks
        )));
    }

    if !state.mongo.delete_user(&id).await? {
        return Err(AppError::NotFound(format!("User {} not found", user_id)));
    }

    tracing::info!("{} deleted user {}", claims.name, user_id);
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> RegisterForm {
        RegisterForm {
            name: "Meera".into(),
            email: "meera@college.edu".into(),
            password: "s3cret!".into(),
            role: Role::User,
            subrole: Some(SubRole::Reviewer),
            department: None,
        }
    }

    #[test]
    fn accepts_valid_registration() {
        assert!(validate_registration(&form()).is_ok());
    }

    #[test]
    fn rejects_short_password_and_bad_email() {
        let mut short = form();
        short.password = "abc".into();
        assert!(matches!(validate_registration(&short), Err(AppError::Validation(_))));

        let mut email = form();
        email.email = "meera.college.edu".into();
        assert!(matches!(validate_registration(&email), Err(AppError::Validation(_))));
    }

    #[test]
    fn subrole_requires_user_role() {
        let mut viewer = form();
        viewer.role = Role::Viewer;
        assert!(matches!(validate_registration(&viewer), Err(AppError::Validation(_))));

        viewer.subrole = None;
        assert!(validate_registration(&viewer).is_ok());
    }

    #[test]
    fn deletion_check_covers_every_task_status() {
        let user = ObjectId::new();
        let filter = participant_filter(&user);
        assert!(!filter.contains_key("status"));
        assert_eq!(filter.get_array("$or").unwrap().len(), 2);
    }
}
