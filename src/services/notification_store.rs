use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId},
    options::FindOptions,
};
use crate::errors::AppResult;
use crate::models::Notification;
use super::mongo_service::MongoService;

impl MongoService {
    pub async fn insert_notifications(&self, notifications: &[Notification]) -> AppResult<()> {
        if notifications.is_empty() {
            return Ok(());
        }
        self.notifications().insert_many(notifications, None).await?;
        Ok(())
    }

    pub async fn list_notifications(
        &self,
        recipient: &ObjectId,
        unread_only: bool,
    ) -> AppResult<Vec<Notification>> {
        let mut filter = doc! { "recipient": recipient };
        if unread_only {
            filter.insert("read", false);
        }
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let cursor = self.notifications().find(filter, options).await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn unread_count(&self, recipient: &ObjectId) -> AppResult<u64> {
        Ok(self
            .notifications()
            .count_documents(doc! { "recipient": recipient, "read": false }, None)
            .await?)
    }

    pub async fn mark_notification_read(&self, id: &ObjectId, recipient: &ObjectId) -> AppResult<bool> {
        let result = self
            .notifications()
            .update_one(
                doc! { "_id": id, "recipient": recipient },
                doc! { "$set": { "read": true } },
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    pub async fn mark_all_notifications_read(&self, recipient: &ObjectId) -> AppResult<u64> {
        let result = self
            .notifications()
            .update_many(
                doc! { "recipient": recipient, "read": false },
                doc! { "$set": { "read": true } },
                None,
            )
            .await?;
        Ok(result.modified_count)
    }

    pub async fn delete_notification(&self, id: &ObjectId, recipient: &ObjectId) -> AppResult<bool> {
        let result = self
            .notifications()
            .delete_one(doc! { "_id": id, "recipient": recipient }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    pub async fn delete_task_notifications(&self, task: &ObjectId) -> AppResult<u64> {
        let result = self
            .notifications()
            .delete_many(doc! { "task": task }, None)
            .await?;
        Ok(result.deleted_count)
    }
}
