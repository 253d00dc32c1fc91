use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    options::FindOptions,
};
use crate::errors::{AppError, AppResult};
use crate::models::{Role, User};
use super::mongo_service::{is_duplicate_key, MongoService};

impl MongoService {
    pub async fn get_user(&self, id: &ObjectId) -> AppResult<Option<User>> {
        Ok(self.users().find_one(doc! { "_id": id }, None).await?)
    }

    pub async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let email = email.trim().to_lowercase();
        Ok(self.users().find_one(doc! { "email": email }, None).await?)
    }

    pub async fn insert_user(&self, user: &User) -> AppResult<()> {
        match self.users().insert_one(user, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(AppError::Conflict(format!(
                "A user with email {} already exists",
                user.email
            ))),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_users(&self, filter: Document) -> AppResult<Vec<User>> {
        let options = FindOptions::builder().sort(doc! { "name": 1 }).build();
        let cursor = self.users().find(filter, options).await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn replace_user(&self, user: &User) -> AppResult<()> {
        let id = user
            .id
            .ok_or_else(|| AppError::Validation("User has no id".into()))?;
        let result = self.users().replace_one(doc! { "_id": id }, user, None).await?;
        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }
        Ok(())
    }

    pub async fn delete_user(&self, id: &ObjectId) -> AppResult<bool> {
        let result = self.users().delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }

    pub async fn admin_ids(&self) -> AppResult<Vec<ObjectId>> {
        let admins = self.list_users(doc! { "role": Role::Admin.as_str() }).await?;
        Ok(admins.into_iter().filter_map(|u| u.id).collect())
    }

    pub async fn admin_exists(&self) -> AppResult<bool> {
        let count = self
            .users()
            .count_documents(doc! { "role": Role::Admin.as_str() }, None)
            .await?;
        Ok(count > 0)
    }
}
