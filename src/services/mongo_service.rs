use mongodb::{
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Collection, Database, IndexModel,
};
use crate::errors::AppResult;
use crate::models::{Course, FileRecord, Notification, Task, User};

const DUPLICATE_KEY: i32 = 11000;

/// Typed access to the portal's collections. Cheap to clone; the driver
/// pools connections internally.
#[derive(Clone)]
pub struct MongoService {
    db: Database,
}

impl MongoService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub(crate) fn users(&self) -> Collection<User> {
        self.db.collection(User::COLLECTION)
    }

    pub(crate) fn tasks(&self) -> Collection<Task> {
        self.db.collection(Task::COLLECTION)
    }

    pub(crate) fn notifications(&self) -> Collection<Notification> {
        self.db.collection(Notification::COLLECTION)
    }

    pub(crate) fn files(&self) -> Collection<FileRecord> {
        self.db.collection(FileRecord::COLLECTION)
    }

    pub(crate) fn courses(&self) -> Collection<Course> {
        self.db.collection(Course::COLLECTION)
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.users()
            .create_index(
                IndexModel::builder().keys(doc! { "email": 1 }).options(unique()).build(),
                None,
            )
            .await?;
        self.courses()
            .create_index(
                IndexModel::builder().keys(doc! { "code": 1 }).options(unique()).build(),
                None,
            )
            .await?;
        self.files()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "file_id": 1, "version": -1 })
                    .options(unique())
                    .build(),
                None,
            )
            .await?;
        self.tasks()
            .create_index(
                IndexModel::builder().keys(doc! { "initiator": 1, "status": 1 }).build(),
                None,
            )
            .await?;
        self.tasks()
            .create_index(
                IndexModel::builder().keys(doc! { "reviewer": 1, "status": 1 }).build(),
                None,
            )
            .await?;
        self.notifications()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "recipient": 1, "created_at": -1 })
                    .build(),
                None,
            )
            .await?;

        tracing::info!("MongoDB indexes are in place");
        Ok(())
    }
}

pub(crate) fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}
