//! Workflow notifications.
//!
//! The builders here are pure: they decide who hears about an event and
//! what the message says. [`Notifier`] persists them. A failed insert is
//! logged and swallowed so that a status change never rolls back because
//! a notification could not be written.

use mongodb::bson::{oid::ObjectId, DateTime};
use crate::models::{Notification, NotificationKind, Task};
use super::mongo_service::MongoService;

#[derive(Clone)]
pub struct Notifier {
    mongo: MongoService,
}

impl Notifier {
    pub fn new(mongo: MongoService) -> Self {
        Self { mongo }
    }

    pub async fn send(&self, notifications: Vec<Notification>) {
        let count = notifications.len();
        match self.mongo.insert_notifications(&notifications).await {
            Ok(()) => tracing::debug!("Stored {} notification(s)", count),
            Err(e) => tracing::error!("Failed to store {} notification(s): {}", count, e),
        }
    }
}

fn format_deadline(deadline: DateTime) -> String {
    chrono::DateTime::from_timestamp_millis(deadline.timestamp_millis())
        .map(|d| d.format("%d %b %Y").to_string())
        .unwrap_or_else(|| "an unknown date".to_string())
}

fn label(task: &Task) -> String {
    format!("'{}' ({} {})", task.title, task.course_code, task.doc_type)
}

fn with_comment(message: String, comment: Option<&str>) -> String {
    match comment {
        Some(c) => format!("{} Comment: {}", message, c),
        None => message,
    }
}

pub fn assignment_notices(task: &Task) -> Vec<Notification> {
    let due = format_deadline(task.deadline);
    vec![
        Notification::new(
            task.initiator,
            task.id,
            NotificationKind::TaskAssigned,
            format!("You have been assigned {}. Upload the document by {}.", label(task), due),
        ),
        Notification::new(
            task.reviewer,
            task.id,
            NotificationKind::TaskAssigned,
            format!("You will review {} once it is uploaded (due {}).", label(task), due),
        ),
    ]
}

pub fn upload_notices(task: &Task, filename: &str) -> Vec<Notification> {
    vec![Notification::new(
        task.reviewer,
        task.id,
        NotificationKind::FileUploaded,
        format!("{} was uploaded for {} and is ready for your review.", filename, label(task)),
    )]
}

pub fn review_notices(
    task: &Task,
    approved: bool,
    comment: Option<&str>,
    admins: &[ObjectId],
) -> Vec<Notification> {
    if !approved {
        return vec![Notification::new(
            task.initiator,
            task.id,
            NotificationKind::ReviewerRejected,
            with_comment(
                format!("The reviewer rejected {}. Please upload a revised file.", label(task)),
                comment,
            ),
        )];
    }

    let mut notices = vec![Notification::new(
        task.initiator,
        task.id,
        NotificationKind::ReviewerApproved,
        with_comment(
            format!("The reviewer approved {}. It now awaits admin approval.", label(task)),
            comment,
        ),
    )];
    notices.extend(admins.iter().map(|admin| {
        Notification::new(
            *admin,
            task.id,
            NotificationKind::ReviewerApproved,
            format!("{} was approved by the reviewer and needs admin approval.", label(task)),
        )
    }));
    notices
}

pub fn admin_notices(task: &Task, approved: bool, comment: Option<&str>) -> Vec<Notification> {
    let (kind, message) = if approved {
        (
            NotificationKind::AdminApproved,
            format!("The admin approved {}.", label(task)),
        )
    } else {
        (
            NotificationKind::AdminRejected,
            format!("The admin rejected {}. A revised file is needed.", label(task)),
        )
    };
    let message = with_comment(message, comment);

    [task.initiator, task.reviewer]
        .into_iter()
        .map(|recipient| Notification::new(recipient, task.id, kind, message.clone()))
        .collect()
}

pub fn completion_notices(task: &Task) -> Vec<Notification> {
    let message = format!("{} is complete.", label(task));
    [task.initiator, task.reviewer]
        .into_iter()
        .map(|recipient| {
            Notification::new(recipient, task.id, NotificationKind::TaskCompleted, message.clone())
        })
        .collect()
}

/// Overdue tasks are chased with whoever currently holds them.
pub fn overdue_notices(task: &Task) -> Vec<Notification> {
    use crate::models::TaskStatus;

    let due = format_deadline(task.deadline);
    let (recipient, message) = match task.status {
        TaskStatus::Assigned | TaskStatus::Rejected => (
            task.initiator,
            format!("{} was due on {} and still needs an upload.", label(task), due),
        ),
        TaskStatus::FileUploaded => (
            task.reviewer,
            format!("{} was due on {} and still needs your review.", label(task), due),
        ),
        _ => (
            task.assigned_by,
            format!("{} was due on {} and still awaits admin approval.", label(task), due),
        ),
    };
    vec![Notification::new(recipient, task.id, NotificationKind::DeadlineOverdue, message)]
}
