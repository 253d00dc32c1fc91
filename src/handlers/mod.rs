mod auth;
mod course;
mod assignment;
mod task;
mod file;
mod notification;
mod health;
pub mod json;

pub use auth::{login, register, me, list_users, update_user, delete_user};
pub use course::{list_courses, get_course, create_course, update_course, delete_course};
pub use assignment::{create_assignment, list_assignments, update_assignment, delete_assignment};
pub use task::{list_tasks, get_task, upload_task_file, review_task, admin_review_task, complete_task};
pub use file::{upload_file, list_files, get_file, download_file, file_versions, delete_file};
pub use notification::{
    list_notifications, unread_count, mark_read, mark_all_read, delete_notification,
};
pub use health::health;

use mongodb::bson::oid::ObjectId;
use crate::errors::{AppError, AppResult};

pub(crate) fn parse_object_id(value: &str, what: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(value.trim())
        .map_err(|_| AppError::Validation(format!("Invalid {} id: {}", what, value)))
}

/// Id of a document read back from MongoDB, which always carries one.
pub(crate) fn stored_id(id: Option<ObjectId>, what: &str) -> AppResult<ObjectId> {
    id.ok_or_else(|| AppError::Validation(format!("Stored {} has no id", what)))
}

/// Trims optional free text, treating blank input as absent.
pub(crate) fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_ids_are_validated() {
        assert!(parse_object_id("65f3c1a2b4d5e6f708192a3b", "task").is_ok());
        let err = parse_object_id("not-an-id", "task").unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("task")));
    }

    #[test]
    fn blank_text_is_dropped() {
        assert_eq!(clean(Some("  ".into())), None);
        assert_eq!(clean(Some(" CSE ".into())).as_deref(), Some("CSE"));
        assert_eq!(clean(None), None);
    }
}
