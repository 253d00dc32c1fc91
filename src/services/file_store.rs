use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    options::{FindOneOptions, FindOptions},
};
use crate::errors::{AppError, AppResult};
use crate::models::FileRecord;
use super::mongo_service::{is_duplicate_key, MongoService};

pub(crate) fn next_version(newest: Option<&FileRecord>) -> i32 {
    newest.map(|f| f.version + 1).unwrap_or(1)
}

/// Earlier versions still flagged latest once `version` is stored.
pub(crate) fn demotion_filter(file_id: &str, version: i32) -> Document {
    doc! {
        "file_id": file_id,
        "is_latest": true,
        "version": { "$lt": version },
    }
}

/// The record that inherits the latest flag after `deleted` is removed.
pub(crate) fn promotion_target(deleted: &FileRecord, newest: Option<&FileRecord>) -> Option<ObjectId> {
    if !deleted.is_latest {
        return None;
    }
    newest
        .filter(|f| f.file_id == deleted.file_id && f.id != deleted.id)
        .and_then(|f| f.id)
}

impl MongoService {
    pub async fn get_file(&self, id: &ObjectId) -> AppResult<Option<FileRecord>> {
        Ok(self.files().find_one(doc! { "_id": id }, None).await?)
    }

    async fn newest_version(&self, file_id: &str) -> AppResult<Option<FileRecord>> {
        let options = FindOneOptions::builder().sort(doc! { "version": -1 }).build();
        Ok(self
            .files()
            .find_one(doc! { "file_id": file_id }, options)
            .await?)
    }

    /// Stores `record` as the newest version of its `file_id`.
    ///
    /// The record is inserted as latest before anything else is touched, so
    /// a failed insert leaves the previous latest in place. Demotion then only
    /// reaches lower versions, which keeps the highest one latest when
    /// uploads overlap.
    pub async fn insert_file_version(&self, mut record: FileRecord) -> AppResult<FileRecord> {
        let previous = self.newest_version(&record.file_id).await?;
        record.version = next_version(previous.as_ref());
        record.is_latest = true;

        match self.files().insert_one(&record, None).await {
            Ok(_) => {}
            Err(e) if is_duplicate_key(&e) => {
                return Err(AppError::Conflict(format!(
                    "Version {} of {} was stored concurrently, retry the upload",
                    record.version, record.file_id
                )));
            }
            Err(e) => return Err(e.into()),
        }

        let demoted = self
            .files()
            .update_many(
                demotion_filter(&record.file_id, record.version),
                doc! { "$set": { "is_latest": false } },
                None,
            )
            .await?;

        tracing::debug!(
            "Stored {} v{} (demoted {} earlier version(s))",
            record.file_id,
            record.version,
            demoted.modified_count
        );
        Ok(record)
    }

    pub async fn list_files(&self, filter: Document) -> AppResult<Vec<FileRecord>> {
        let options = FindOptions::builder()
            .sort(doc! { "uploaded_at": -1 })
            .build();
        let cursor = self.files().find(filter, options).await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn file_versions(&self, file_id: &str) -> AppResult<Vec<FileRecord>> {
        let options = FindOptions::builder().sort(doc! { "version": -1 }).build();
        let cursor = self.files().find(doc! { "file_id": file_id }, options).await?;
        Ok(cursor.try_collect().await?)
    }

    /// Removes a metadata record. When it was the latest version, the highest
    /// remaining version takes over the flag.
    pub async fn delete_file_record(&self, record: &FileRecord) -> AppResult<()> {
        let id = record
            .id
            .ok_or_else(|| AppError::Validation("File has no id".into()))?;
        self.files().delete_one(doc! { "_id": id }, None).await?;

        if !record.is_latest {
            return Ok(());
        }
        let newest = self.newest_version(&record.file_id).await?;
        if let Some(successor) = promotion_target(record, newest.as_ref()) {
            self.files()
                .update_one(
                    doc! { "_id": successor },
                    doc! { "$set": { "is_latest": true } },
                    None,
                )
                .await?;
            tracing::debug!("Promoted {} to latest {}", successor, record.file_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::DateTime;

    fn version(n: i32, is_latest: bool) -> FileRecord {
        FileRecord {
            id: Some(ObjectId::new()),
            file_id: "2024_CS101_syllabus".into(),
            filename: format!("syllabus-v{}.pdf", n),
            content_type: "application/pdf".into(),
            size: 1024,
            gridfs_id: ObjectId::new(),
            bucket: "documents".into(),
            year: Some("2024".into()),
            course_code: Some("CS101".into()),
            doc_type: Some("syllabus".into()),
            department: None,
            semester: None,
            version: n,
            is_latest,
            uploaded_by: ObjectId::new(),
            task: None,
            uploaded_at: DateTime::now(),
        }
    }

    #[test]
    fn versions_count_up_from_one() {
        assert_eq!(next_version(None), 1);
        assert_eq!(next_version(Some(&version(3, true))), 4);
    }

    #[test]
    fn demotion_never_reaches_the_new_version() {
        assert_eq!(
            demotion_filter("2024_CS101_syllabus", 3),
            doc! {
                "file_id": "2024_CS101_syllabus",
                "is_latest": true,
                "version": { "$lt": 3 },
            }
        );
    }

    #[test]
    fn deleting_latest_promotes_highest_remaining() {
        let deleted = version(3, true);
        let remaining = version(2, false);
        assert_eq!(promotion_target(&deleted, Some(&remaining)), remaining.id);
        assert_eq!(promotion_target(&deleted, None), None);
    }

    #[test]
    fn deleting_an_older_version_promotes_nothing() {
        let deleted = version(1, false);
        assert_eq!(promotion_target(&deleted, Some(&version(3, true))), None);
    }
}
