use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, oid::ObjectId, DateTime, Document},
    options::{FindOptions, UpdateOptions},
};
use crate::errors::{AppError, AppResult};
use crate::models::{normalize_doc_type, Course, CourseDocument, DocumentChange};
use super::mongo_service::{is_duplicate_key, MongoService};

/// Matches the course only while it has no entry for `doc_type`, so two
/// callers adding the same entry cannot both succeed.
pub(crate) fn missing_entry_filter(course_id: &ObjectId, doc_type: &str) -> Document {
    doc! {
        "_id": course_id,
        "documents.doc_type": { "$ne": normalize_doc_type(doc_type) },
    }
}

impl MongoService {
    pub async fn get_course(&self, id: &ObjectId) -> AppResult<Option<Course>> {
        Ok(self.courses().find_one(doc! { "_id": id }, None).await?)
    }

    pub async fn list_courses(&self) -> AppResult<Vec<Course>> {
        let options = FindOptions::builder().sort(doc! { "code": 1 }).build();
        let cursor = self.courses().find(None, options).await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn insert_course(&self, course: &Course) -> AppResult<()> {
        match self.courses().insert_one(course, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(AppError::Conflict(format!(
                "Course {} already exists",
                course.code
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Sets top-level course fields. Embedded document entries are untouched.
    pub async fn update_course_fields(&self, id: &ObjectId, fields: Document) -> AppResult<()> {
        let result = match self
            .courses()
            .update_one(doc! { "_id": id }, doc! { "$set": fields }, None)
            .await
        {
            Ok(result) => result,
            Err(e) if is_duplicate_key(&e) => {
                return Err(AppError::Conflict("Another course already uses that code".into()))
            }
            Err(e) => return Err(e.into()),
        };
        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("Course {} not found", id)));
        }
        Ok(())
    }

    /// Appends a pending entry for `doc_type` if the course has none.
    /// Returns whether an entry was added.
    pub async fn add_course_document(&self, id: &ObjectId, doc_type: &str) -> AppResult<bool> {
        let entry = bson::to_bson(&CourseDocument::pending(doc_type))?;
        let result = self
            .courses()
            .update_one(
                missing_entry_filter(id, doc_type),
                doc! {
                    "$push": { "documents": entry },
                    "$set": { "updated_at": DateTime::now() },
                },
                None,
            )
            .await?;
        Ok(result.modified_count > 0)
    }

    /// Applies one workflow step to the course's entry for `doc_type`,
    /// creating the entry first when the step needs one.
    pub async fn update_course_document(
        &self,
        course_id: &ObjectId,
        doc_type: &str,
        change: DocumentChange,
    ) -> AppResult<()> {
        if change.creates_entry() && self.add_course_document(course_id, doc_type).await? {
            tracing::debug!("Added {} entry to course {}", doc_type, course_id);
        }

        let options = UpdateOptions::builder()
            .array_filters(vec![change.array_filter(doc_type)])
            .build();
        let result = self
            .courses()
            .update_one(doc! { "_id": course_id }, change.update(DateTime::now())?, options)
            .await?;
        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("Course {} not found", course_id)));
        }
        Ok(())
    }

    pub async fn delete_course(&self, id: &ObjectId) -> AppResult<bool> {
        let result = self.courses().delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entry_filter_uses_normalized_doc_type() {
        let id = ObjectId::new();
        assert_eq!(
            missing_entry_filter(&id, "Lab  Manual"),
            doc! { "_id": id, "documents.doc_type": { "$ne": "lab-manual" } }
        );
    }
}
