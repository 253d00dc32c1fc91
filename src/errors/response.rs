use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use crate::errors::{AppError, WorkflowError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(_) | AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::Upload(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Workflow(err) => workflow_status(err),
            AppError::Database(_)
            | AppError::BsonEncode(_)
            | AppError::BsonDecode(_)
            | AppError::Hash(_)
            | AppError::File(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn workflow_status(err: &WorkflowError) -> StatusCode {
    match err {
        WorkflowError::CommentRequired => StatusCode::BAD_REQUEST,
        WorkflowError::InvalidTransition { .. } | WorkflowError::StaleStatus(_) => {
            StatusCode::CONFLICT
        }
    }
}

// Converts AppError into a JSON error body; internal failures are logged and masked.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            AppError::Token(e) => format!("Invalid token: {}", e),
            AppError::Auth(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Conflict(msg)
            | AppError::Upload(msg) => msg.clone(),
            AppError::Workflow(e) => e.to_string(),
            internal => {
                tracing::error!("Internal error: {}", internal);
                "Internal server error".to_string()
            }
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message,
        });

        (status, body).into_response()
    }
}
