use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    TaskAssigned,
    FileUploaded,
    ReviewerApproved,
    ReviewerRejected,
    AdminApproved,
    AdminRejected,
    TaskCompleted,
    DeadlineOverdue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub recipient: ObjectId,
    pub task: Option<ObjectId>,
    pub kind: NotificationKind,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime,
}

impl Notification {
    pub const COLLECTION: &'static str = "notifications";

    pub fn new(
        recipient: ObjectId,
        task: Option<ObjectId>,
        kind: NotificationKind,
        message: String,
    ) -> Self {
        Self {
            id: Some(ObjectId::new()),
            recipient,
            task,
            kind,
            message,
            read: false,
            created_at: DateTime::now(),
        }
    }
}
