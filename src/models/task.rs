use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use crate::errors::{WorkflowError, WorkflowResult};
use super::user::Role;

/// Position of a task in the approval pipeline.
///
/// The happy path is strictly linear:
/// `assigned -> file-uploaded -> approved-by-reviewer -> approved-by-admin -> completed`.
/// Either approval stage may reject, and a rejected task only moves again
/// when the initiator uploads a new file.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Assigned,
    FileUploaded,
    ApprovedByReviewer,
    ApprovedByAdmin,
    Completed,
    Rejected,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TaskAction {
    Upload,
    ReviewerApprove,
    ReviewerReject,
    AdminApprove,
    AdminReject,
    Complete,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Assigned,
        TaskStatus::FileUploaded,
        TaskStatus::ApprovedByReviewer,
        TaskStatus::ApprovedByAdmin,
        TaskStatus::Completed,
        TaskStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Assigned => "assigned",
            TaskStatus::FileUploaded => "file-uploaded",
            TaskStatus::ApprovedByReviewer => "approved-by-reviewer",
            TaskStatus::ApprovedByAdmin => "approved-by-admin",
            TaskStatus::Completed => "completed",
            TaskStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    pub fn apply(self, action: TaskAction) -> WorkflowResult<TaskStatus> {
        use TaskAction as A;
        use TaskStatus as S;

        let next = match (self, action) {
            (S::Assigned | S::Rejected, A::Upload) => S::FileUploaded,
            (S::FileUploaded, A::ReviewerApprove) => S::ApprovedByReviewer,
            (S::FileUploaded, A::ReviewerReject) => S::Rejected,
            (S::ApprovedByReviewer, A::AdminApprove) => S::ApprovedByAdmin,
            (S::ApprovedByReviewer, A::AdminReject) => S::Rejected,
            (S::ApprovedByAdmin, A::Complete) => S::Completed,
            (from, action) => return Err(WorkflowError::InvalidTransition { from, action }),
        };
        Ok(next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }

    /// Statuses in which someone still owes work before the deadline.
    pub fn awaits_action(&self) -> bool {
        matches!(
            self,
            TaskStatus::Assigned
                | TaskStatus::FileUploaded
                | TaskStatus::ApprovedByReviewer
                | TaskStatus::Rejected
        )
    }
}

impl TaskAction {
    pub fn is_rejection(&self) -> bool {
        matches!(self, TaskAction::ReviewerReject | TaskAction::AdminReject)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            TaskAction::Upload => "upload a file to",
            TaskAction::ReviewerApprove | TaskAction::ReviewerReject => "review",
            TaskAction::AdminApprove | TaskAction::AdminReject => "give admin approval to",
            TaskAction::Complete => "complete",
        };
        f.write_str(verb)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub by: ObjectId,
    pub comment: Option<String>,
    pub at: DateTime,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Task {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub description: Option<String>,
    pub course: ObjectId,
    pub course_code: String,
    pub doc_type: String,
    pub year: Option<String>,
    pub initiator: ObjectId,
    pub reviewer: ObjectId,
    pub assigned_by: ObjectId,
    pub deadline: DateTime,
    pub status: TaskStatus,
    pub file: Option<ObjectId>,
    pub reviewer_comment: Option<String>,
    pub admin_comment: Option<String>,
    #[serde(default)]
    pub history: Vec<StatusChange>,
    #[serde(default)]
    pub overdue_notified: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Task {
    pub const COLLECTION: &'static str = "tasks";

    /// Moves the task one step along the pipeline and records who did it.
    ///
    /// Returns the status the task had before, which callers use as the
    /// expected value when persisting.
    pub fn advance(
        &mut self,
        action: TaskAction,
        by: ObjectId,
        comment: Option<String>,
    ) -> WorkflowResult<TaskStatus> {
        let comment = comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if action.is_rejection() && comment.is_none() {
            return Err(WorkflowError::CommentRequired);
        }

        let from = self.status;
        let to = from.apply(action)?;
        let now = DateTime::now();

        match action {
            TaskAction::ReviewerApprove | TaskAction::ReviewerReject => {
                self.reviewer_comment = comment.clone();
            }
            TaskAction::AdminApprove | TaskAction::AdminReject => {
                self.admin_comment = comment.clone();
            }
            TaskAction::Upload | TaskAction::Complete => {}
        }

        self.history.push(StatusChange { from, to, by, comment, at: now });
        self.status = to;
        self.updated_at = now;
        Ok(from)
    }

    pub fn visible_to(&self, user: &ObjectId, role: Role) -> bool {
        match role {
            Role::Admin => true,
            Role::Viewer => self.status == TaskStatus::Completed,
            Role::User => &self.initiator == user || &self.reviewer == user,
        }
    }

    pub fn is_overdue(&self, now: DateTime) -> bool {
        self.status.awaits_action() && self.deadline < now
    }
}
