mod mongo_service;
mod user_store;
mod task_store;
mod notification_store;
mod file_store;
mod course_store;
mod grid_fs;
pub mod notifier;

pub use mongo_service::MongoService;
pub use grid_fs::{BlobWriter, GridFsService};
pub use notifier::Notifier;
