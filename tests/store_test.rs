//! Store behaviour against a live MongoDB.
//!
//! Run with `MONGO_URL=mongodb://localhost:27017 cargo test -- --ignored`.

use iqac_portal::{
    errors::{AppError, WorkflowError},
    models::{
        Course, CourseDocument, DocumentChange, DocumentStatus, FileRecord, Ltp, ReviewDecision,
        ReviewRecord, ReviewStage, Task, TaskAction, TaskStatus,
    },
    services::MongoService,
};
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime},
    Client, Database,
};

async fn database() -> Database {
    let url = std::env::var("MONGO_URL").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let client = Client::with_uri_str(&url).await.unwrap();
    client.database(&format!("iqac_store_test_{}", ObjectId::new()))
}

async fn store() -> (MongoService, Database) {
    let db = database().await;
    let mongo = MongoService::new(db.clone());
    mongo.ensure_indexes().await.unwrap();
    (mongo, db)
}

fn file(n: i32) -> FileRecord {
    FileRecord {
        id: None,
        file_id: "2024_CS101_syllabus".into(),
        filename: format!("syllabus-{}.pdf", n),
        content_type: "application/pdf".into(),
        size: 10,
        gridfs_id: ObjectId::new(),
        bucket: "documents".into(),
        year: Some("2024".into()),
        course_code: Some("CS101".into()),
        doc_type: Some("syllabus".into()),
        department: None,
        semester: None,
        version: 0,
        is_latest: false,
        uploaded_by: ObjectId::new(),
        task: None,
        uploaded_at: DateTime::now(),
    }
}

fn task() -> Task {
    let now = DateTime::now();
    Task {
        id: Some(ObjectId::new()),
        title: "Syllabus".into(),
        description: None,
        course: ObjectId::new(),
        course_code: "CS101".into(),
        doc_type: "syllabus".into(),
        year: Some("2024".into()),
        initiator: ObjectId::new(),
        reviewer: ObjectId::new(),
        assigned_by: ObjectId::new(),
        deadline: DateTime::from_millis(now.timestamp_millis() + 86_400_000),
        status: TaskStatus::Assigned,
        file: None,
        reviewer_comment: None,
        admin_comment: None,
        history: Vec::new(),
        overdue_notified: false,
        created_at: now,
        updated_at: now,
    }
}

fn course() -> Course {
    let now = DateTime::now();
    Course {
        id: Some(ObjectId::new()),
        code: "CS101".into(),
        name: "Programming".into(),
        department: None,
        year: Some("2024".into()),
        semester: None,
        ltp: Ltp::default(),
        credits: 0.0,
        documents: vec![CourseDocument::pending("syllabus")],
        created_at: now,
        updated_at: now,
    }
}

fn latest(files: &[FileRecord]) -> Vec<i32> {
    files.iter().filter(|f| f.is_latest).map(|f| f.version).collect()
}

#[tokio::test]
#[ignore]
async fn concurrent_uploads_leave_one_latest_version() {
    let (mongo, db) = store().await;

    let uploads = (0..4).map(|n| mongo.insert_file_version(file(n)));
    let results = futures::future::join_all(uploads).await;
    assert!(results.iter().any(|r| r.is_ok()));
    for result in &results {
        if let Err(e) = result {
            assert!(matches!(e, AppError::Conflict(_)), "{:?}", e);
        }
    }

    // Rejected uploads leave nothing behind.
    let versions = mongo.file_versions("2024_CS101_syllabus").await.unwrap();
    assert_eq!(versions.len(), results.iter().filter(|r| r.is_ok()).count());
    let highest = versions.iter().map(|f| f.version).max().unwrap();
    assert_eq!(latest(&versions), vec![highest]);

    db.drop(None).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn deleting_latest_promotes_the_next_highest() {
    let (mongo, db) = store().await;
    for n in 1..=3 {
        mongo.insert_file_version(file(n)).await.unwrap();
    }
    let versions = mongo.file_versions("2024_CS101_syllabus").await.unwrap();
    let newest = versions.iter().find(|f| f.version == 3).unwrap().clone();

    mongo.delete_file_record(&newest).await.unwrap();

    let versions = mongo.file_versions("2024_CS101_syllabus").await.unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(latest(&versions), vec![2]);

    db.drop(None).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn stale_transition_is_refused() {
    let (mongo, db) = store().await;
    let stored = task();
    mongo.insert_task(&stored).await.unwrap();

    let mut first = stored.clone();
    let mut second = stored.clone();
    first.advance(TaskAction::Upload, first.initiator, None).unwrap();
    second.advance(TaskAction::Upload, second.initiator, None).unwrap();

    mongo.save_task_transition(&first, TaskStatus::Assigned).await.unwrap();
    let err = mongo
        .save_task_transition(&second, TaskStatus::Assigned)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Workflow(WorkflowError::StaleStatus(TaskStatus::Assigned))));

    let saved = mongo.get_task(&stored.id.unwrap()).await.unwrap().unwrap();
    assert_eq!(saved.history.len(), 1);

    db.drop(None).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn assignment_edit_and_status_step_both_survive() {
    let (mongo, db) = store().await;
    let stored = task();
    let id = stored.id.unwrap();
    mongo.insert_task(&stored).await.unwrap();

    // Status step computed from the pre-edit read.
    let mut stepped = stored.clone();
    stepped.advance(TaskAction::Upload, stepped.initiator, None).unwrap();

    let reviewer = ObjectId::new();
    let edited = mongo
        .update_assignment_fields(&id, None, None, Some(reviewer))
        .await
        .unwrap();
    assert_eq!(edited.reviewer, reviewer);

    mongo.save_task_transition(&stepped, TaskStatus::Assigned).await.unwrap();

    let saved = mongo.get_task(&id).await.unwrap().unwrap();
    assert_eq!(saved.status, TaskStatus::FileUploaded);
    assert_eq!(saved.reviewer, reviewer);

    db.drop(None).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn completed_task_assignment_is_frozen() {
    let (mongo, db) = store().await;
    let mut stored = task();
    stored.status = TaskStatus::Completed;
    mongo.insert_task(&stored).await.unwrap();

    let err = mongo
        .update_assignment_fields(&stored.id.unwrap(), None, Some(ObjectId::new()), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    db.drop(None).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn course_edit_and_review_do_not_clobber_each_other() {
    let (mongo, db) = store().await;
    let stored = course();
    let id = stored.id.unwrap();
    mongo.insert_course(&stored).await.unwrap();

    let review = ReviewRecord {
        reviewer: ObjectId::new(),
        stage: ReviewStage::Reviewer,
        decision: ReviewDecision::Rejected,
        comment: Some("Missing outcomes".into()),
        at: DateTime::now(),
    };
    let (edit, step) = tokio::join!(
        mongo.update_course_fields(&id, doc! { "name": "Programming I" }),
        mongo.update_course_document(&id, "syllabus", DocumentChange::Review(review)),
    );
    edit.unwrap();
    step.unwrap();
    mongo
        .update_course_document(
            &id,
            "lab manual",
            DocumentChange::Assign { task: ObjectId::new() },
        )
        .await
        .unwrap();

    let saved = mongo.get_course(&id).await.unwrap().unwrap();
    assert_eq!(saved.name, "Programming I");
    assert_eq!(saved.documents.len(), 2);
    let syllabus = saved.documents.iter().find(|d| d.doc_type == "syllabus").unwrap();
    assert_eq!(syllabus.status, DocumentStatus::Rejected);
    assert_eq!(syllabus.reviews.len(), 1);

    // A second entry request for the same type is a no-op.
    assert!(!mongo.add_course_document(&id, "Lab Manual").await.unwrap());

    db.drop(None).await.unwrap();
}
