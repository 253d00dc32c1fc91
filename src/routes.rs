use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use crate::{handlers, middleware, state::AppState};

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin else {
        return CorsLayer::permissive();
    };
    match origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(e) => {
            tracing::warn!("Ignoring invalid CORS origin {:?}: {}", origin, e);
            CorsLayer::permissive()
        }
    }
}

pub fn router(state: AppState) -> Router {
    let max_body = state.config.upload.max_file_size;
    let cors = cors_layer(state.config.server.cors_origin.as_deref());

    Router::new()
        .route("/health", get(handlers::health))

        // Auth & users
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/me", get(handlers::me))
        .route("/api/auth/users", get(handlers::list_users))
        .route(
            "/api/auth/users/:user_id",
            patch(handlers::update_user).delete(handlers::delete_user),
        )

        // Courses
        .route(
            "/api/courses",
            get(handlers::list_courses).post(handlers::create_course),
        )
        .route(
            "/api/courses/:course_id",
            get(handlers::get_course)
                .put(handlers::update_course)
                .delete(handlers::delete_course),
        )

        // Assignments
        .route(
            "/api/assignments",
            get(handlers::list_assignments).post(handlers::create_assignment),
        )
        .route(
            "/api/assignments/:task_id",
            patch(handlers::update_assignment).delete(handlers::delete_assignment),
        )

        // Task workflow
        .route("/api/tasks", get(handlers::list_tasks))
        .route("/api/tasks/:task_id", get(handlers::get_task))
        .route("/api/tasks/:task_id/upload", post(handlers::upload_task_file))
        .route("/api/tasks/:task_id/review", post(handlers::review_task))
        .route("/api/tasks/:task_id/approve", post(handlers::admin_review_task))
        .route("/api/tasks/:task_id/complete", post(handlers::complete_task))

        // Files
        .route("/api/files", get(handlers::list_files))
        .route("/api/files/upload", post(handlers::upload_file))
        .route(
            "/api/files/:file_id",
            get(handlers::get_file).delete(handlers::delete_file),
        )
        .route("/api/files/:file_id/download", get(handlers::download_file))
        .route("/api/files/:file_id/versions", get(handlers::file_versions))

        // Notifications
        .route("/api/notifications", get(handlers::list_notifications))
        .route("/api/notifications/unread-count", get(handlers::unread_count))
        .route("/api/notifications/read-all", patch(handlers::mark_all_read))
        .route("/api/notifications/:notification_id/read", patch(handlers::mark_read))
        .route(
            "/api/notifications/:notification_id",
            axum::routing::delete(handlers::delete_notification),
        )

        .layer(from_fn_with_state(state.clone(), middleware::require_auth))

        // Upload size limit from config
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
