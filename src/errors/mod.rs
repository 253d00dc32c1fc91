// Application-wide error type and result alias built on thiserror.
use thiserror::Error;

pub mod response;
pub mod workflow;

pub use workflow::{WorkflowError, WorkflowResult};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("BSON encoding error: {0}")]
    BsonEncode(#[from] mongodb::bson::ser::Error),

    #[error("BSON decoding error: {0}")]
    BsonDecode(#[from] mongodb::bson::de::Error),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),
}

pub type AppResult<T> = Result<T, AppError>;
