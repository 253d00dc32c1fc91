use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, oid::ObjectId, DateTime, Document},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
};
use crate::errors::{AppError, AppResult, WorkflowError};
use crate::models::{Task, TaskStatus};
use super::mongo_service::MongoService;

pub(crate) fn transition_filter(id: &ObjectId, expected: TaskStatus) -> Document {
    doc! { "_id": id, "status": expected.as_str() }
}

/// Fields written by a status step. Assignment fields (deadline,
/// participants) are left alone so a concurrent edit survives.
pub(crate) fn transition_update(task: &Task) -> Result<Document, bson::ser::Error> {
    let mut update = doc! {
        "$set": {
            "status": task.status.as_str(),
            "file": task.file,
            "reviewer_comment": task.reviewer_comment.as_deref(),
            "admin_comment": task.admin_comment.as_deref(),
            "updated_at": task.updated_at,
        }
    };
    if let Some(change) = task.history.last() {
        update.insert("$push", doc! { "history": bson::to_bson(change)? });
    }
    Ok(update)
}

pub(crate) fn open_task_filter(id: &ObjectId) -> Document {
    doc! { "_id": id, "status": { "$ne": TaskStatus::Completed.as_str() } }
}

/// `$set` for an assignment edit, holding only the fields that changed.
/// A new deadline re-arms the overdue reminder.
pub(crate) fn assignment_update(
    deadline: Option<DateTime>,
    initiator: Option<ObjectId>,
    reviewer: Option<ObjectId>,
    now: DateTime,
) -> Document {
    let mut set = doc! { "updated_at": now };
    if let Some(deadline) = deadline {
        set.insert("deadline", deadline);
        set.insert("overdue_notified", false);
    }
    if let Some(initiator) = initiator {
        set.insert("initiator", initiator);
    }
    if let Some(reviewer) = reviewer {
        set.insert("reviewer", reviewer);
    }
    doc! { "$set": set }
}

impl MongoService {
    pub async fn get_task(&self, id: &ObjectId) -> AppResult<Option<Task>> {
        Ok(self.tasks().find_one(doc! { "_id": id }, None).await?)
    }

    pub async fn insert_task(&self, task: &Task) -> AppResult<()> {
        self.tasks().insert_one(task, None).await?;
        Ok(())
    }

    pub async fn list_tasks(&self, filter: Document) -> AppResult<Vec<Task>> {
        let options = FindOptions::builder()
            .sort(doc! { "deadline": 1, "created_at": -1 })
            .build();
        let cursor = self.tasks().find(filter, options).await?;
        Ok(cursor.try_collect().await?)
    }

    /// Persists the status step `task` just took away from `expected`. The
    /// write only lands if nobody else changed the status since the task was
    /// read, and it touches only the fields a step changes.
    pub async fn save_task_transition(&self, task: &Task, expected: TaskStatus) -> AppResult<()> {
        let id = task
            .id
            .ok_or_else(|| AppError::Validation("Task has no id".into()))?;
        let result = self
            .tasks()
            .update_one(transition_filter(&id, expected), transition_update(task)?, None)
            .await?;

        if result.matched_count == 0 {
            tracing::warn!("Task {} changed status concurrently (expected {})", id, expected);
            return Err(WorkflowError::StaleStatus(expected).into());
        }
        Ok(())
    }

    /// Applies an admin's assignment edit to a task that is not completed
    /// and returns the task as stored afterwards.
    pub async fn update_assignment_fields(
        &self,
        id: &ObjectId,
        deadline: Option<DateTime>,
        initiator: Option<ObjectId>,
        reviewer: Option<ObjectId>,
    ) -> AppResult<Task> {
        let update = assignment_update(deadline, initiator, reviewer, DateTime::now());
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.tasks()
            .find_one_and_update(open_task_filter(id), update, options)
            .await?
            .ok_or_else(|| AppError::Conflict(format!("Task {} is completed or no longer exists", id)))
    }

    pub async fn delete_task(&self, id: &ObjectId) -> AppResult<bool> {
        let result = self.tasks().delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }

    pub async fn count_tasks(&self, filter: Document) -> AppResult<u64> {
        Ok(self.tasks().count_documents(filter, None).await?)
    }

    /// Tasks past their deadline that still wait on someone and have not
    /// been flagged yet.
    pub async fn overdue_tasks(&self, now: DateTime) -> AppResult<Vec<Task>> {
        let waiting: Vec<&str> = TaskStatus::ALL
            .iter()
            .filter(|s| s.awaits_action())
            .map(|s| s.as_str())
            .collect();

        self.list_tasks(doc! {
            "deadline": { "$lt": now },
            "overdue_notified": false,
            "status": { "$in": waiting },
        })
        .await
    }

    pub async fn mark_overdue_notified(&self, id: &ObjectId) -> AppResult<()> {
        self.tasks()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "overdue_notified": true } },
                None,
            )
            .await?;
        Ok(())
    }
}
