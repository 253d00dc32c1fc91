use mongodb::bson::{self, doc, oid::ObjectId, Bson, DateTime, Document};
use serde::{Deserialize, Serialize};
use super::file::normalize_doc_type;

/// Weekly lecture / tutorial / practical hours.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ltp {
    pub lecture: i32,
    pub tutorial: i32,
    pub practical: i32,
}

impl Ltp {
    pub fn credits(&self) -> f64 {
        self.lecture as f64 + self.tutorial as f64 + self.practical as f64 / 2.0
    }

    pub fn is_valid(&self) -> bool {
        self.lecture >= 0 && self.tutorial >= 0 && self.practical >= 0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Submitted,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStage {
    Reviewer,
    Admin,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub reviewer: ObjectId,
    pub stage: ReviewStage,
    pub decision: ReviewDecision,
    pub comment: Option<String>,
    pub at: DateTime,
}

impl ReviewRecord {
    /// A reviewer approval keeps the document `submitted` until the admin
    /// signs off.
    pub fn resulting_status(&self) -> DocumentStatus {
        match (self.stage, self.decision) {
            (_, ReviewDecision::Rejected) => DocumentStatus::Rejected,
            (ReviewStage::Reviewer, ReviewDecision::Approved) => DocumentStatus::Submitted,
            (ReviewStage::Admin, ReviewDecision::Approved) => DocumentStatus::Approved,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseDocument {
    pub doc_type: String,
    pub status: DocumentStatus,
    pub file: Option<ObjectId>,
    pub file_id: Option<String>,
    pub task: Option<ObjectId>,
    #[serde(default)]
    pub reviews: Vec<ReviewRecord>,
    pub updated_at: DateTime,
}

impl CourseDocument {
    pub fn pending(doc_type: &str) -> Self {
        Self {
            doc_type: normalize_doc_type(doc_type),
            status: DocumentStatus::Pending,
            file: None,
            file_id: None,
            task: None,
            reviews: Vec::new(),
            updated_at: DateTime::now(),
        }
    }
}

/// One workflow step applied to a course's embedded document entry.
///
/// Changes are written in place with an array filter on the entry's doc
/// type, so concurrent steps on the same course never overwrite each other.
#[derive(Debug, Clone)]
pub enum DocumentChange {
    Assign { task: ObjectId },
    Submit { file: ObjectId, file_id: String, task: Option<ObjectId> },
    Review(ReviewRecord),
    Touch,
    /// Clears the task link, but only if it still points at `task`.
    Unlink { task: ObjectId },
}

const ENTRY: &str = "documents.$[d]";

impl DocumentChange {
    pub fn status(&self) -> Option<DocumentStatus> {
        match self {
            DocumentChange::Assign { .. } => Some(DocumentStatus::Pending),
            DocumentChange::Submit { .. } => Some(DocumentStatus::Submitted),
            DocumentChange::Review(review) => Some(review.resulting_status()),
            DocumentChange::Touch | DocumentChange::Unlink { .. } => None,
        }
    }

    /// Whether a missing entry should be created before applying.
    pub fn creates_entry(&self) -> bool {
        !matches!(self, DocumentChange::Unlink { .. })
    }

    /// Selects the entry the update touches through the `d` identifier.
    pub fn array_filter(&self, doc_type: &str) -> Document {
        let mut filter = doc! { "d.doc_type": normalize_doc_type(doc_type) };
        if let DocumentChange::Unlink { task } = self {
            filter.insert("d.task", *task);
        }
        filter
    }

    pub fn update(&self, now: DateTime) -> Result<Document, bson::ser::Error> {
        let field = |name: &str| format!("{}.{}", ENTRY, name);

        let mut set = doc! { "updated_at": now };
        if let Some(status) = self.status() {
            set.insert(field("status"), bson::to_bson(&status)?);
        }

        let mut push = None;
        match self {
            DocumentChange::Assign { task } => {
                set.insert(field("task"), *task);
                set.insert(field("updated_at"), now);
            }
            DocumentChange::Submit { file, file_id, task } => {
                set.insert(field("file"), *file);
                set.insert(field("file_id"), file_id.as_str());
                if let Some(task) = task {
                    set.insert(field("task"), *task);
                }
                set.insert(field("updated_at"), now);
            }
            DocumentChange::Review(review) => {
                set.insert(field("updated_at"), review.at);
                let mut reviews = Document::new();
                reviews.insert(field("reviews"), bson::to_bson(review)?);
                push = Some(reviews);
            }
            DocumentChange::Touch => {
                set.insert(field("updated_at"), now);
            }
            DocumentChange::Unlink { .. } => {
                set.insert(field("task"), Bson::Null);
            }
        }

        let mut update = doc! { "$set": set };
        if let Some(push) = push {
            update.insert("$push", push);
        }
        Ok(update)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub code: String,       // stored uppercased
    pub name: String,
    pub department: Option<String>,
    pub year: Option<String>,
    pub semester: Option<String>,
    pub ltp: Ltp,
    pub credits: f64,
    #[serde(default)]
    pub documents: Vec<CourseDocument>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Course {
    pub const COLLECTION: &'static str = "courses";

    /// Adds a pending entry for `doc_type` unless the course already lists it.
    pub fn ensure_document(&mut self, doc_type: &str) {
        let key = normalize_doc_type(doc_type);
        if !self.documents.iter().any(|d| d.doc_type == key) {
            self.documents.push(CourseDocument::pending(&key));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
            documents: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn review(stage: ReviewStage, decision: ReviewDecision) -> ReviewRecord {
        ReviewRecord {
            reviewer: ObjectId::new(),
            stage,
            decision,
            comment: Some("ok".into()),
            at: DateTime::from_millis(1_710_460_800_000),
        }
    }

    #[test]
    fn credits_count_half_for_practicals() {
        let ltp = Ltp { lecture: 3, tutorial: 1, practical: 2 };
        assert_eq!(ltp.credits(), 5.0);
        assert_eq!(Ltp { lecture: 0, tutorial: 0, practical: 3 }.credits(), 1.5);
        assert!(!Ltp { lecture: -1, tutorial: 0, practical: 0 }.is_valid());
    }

    #[test]
    fn ensure_document_reuses_existing_entry() {
        let mut course = course();
        course.ensure_document("Lab Manual");
        course.ensure_document("lab   manual");
        assert_eq!(course.documents.len(), 1);
        assert_eq!(course.documents[0].doc_type, "lab-manual");
        assert_eq!(course.documents[0].status, DocumentStatus::Pending);
    }

    #[test]
    fn reviews_drive_document_status() {
        let status = |stage, decision| review(stage, decision).resulting_status();
        assert_eq!(status(ReviewStage::Reviewer, ReviewDecision::Approved), DocumentStatus::Submitted);
        assert_eq!(status(ReviewStage::Reviewer, ReviewDecision::Rejected), DocumentStatus::Rejected);
        assert_eq!(status(ReviewStage::Admin, ReviewDecision::Rejected), DocumentStatus::Rejected);
        assert_eq!(status(ReviewStage::Admin, ReviewDecision::Approved), DocumentStatus::Approved);
    }

    #[test]
    fn review_is_pushed_onto_the_matching_entry_only() {
        let now = DateTime::now();
        let record = review(ReviewStage::Admin, ReviewDecision::Approved);
        let change = DocumentChange::Review(record.clone());

        let update = change.update(now).unwrap();
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("documents.$[d].status").unwrap(), "approved");
        assert_eq!(set.get_datetime("documents.$[d].updated_at").unwrap(), &record.at);
        assert_eq!(set.get_datetime("updated_at").unwrap(), &now);

        // Appended, never rewritten as a whole array.
        let push = update.get_document("$push").unwrap();
        let pushed = push.get_document("documents.$[d].reviews").unwrap();
        assert_eq!(pushed.get_str("decision").unwrap(), "approved");
        assert!(!set.contains_key("documents"));

        assert_eq!(change.array_filter("Lab Manual"), doc! { "d.doc_type": "lab-manual" });
    }

    #[test]
    fn submit_sets_file_and_keeps_reviews() {
        let file = ObjectId::new();
        let task = ObjectId::new();
        let change = DocumentChange::Submit {
            file,
            file_id: "2024_CS101_syllabus".into(),
            task: Some(task),
        };

        let update = change.update(DateTime::now()).unwrap();
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("documents.$[d].status").unwrap(), "submitted");
        assert_eq!(set.get_object_id("documents.$[d].file").unwrap(), file);
        assert_eq!(set.get_object_id("documents.$[d].task").unwrap(), task);
        assert!(!set.contains_key("documents.$[d].reviews"));
        assert!(update.get("$push").is_none());
        assert!(change.creates_entry());
    }

    #[test]
    fn unlink_only_matches_the_linked_task() {
        let task = ObjectId::new();
        let change = DocumentChange::Unlink { task };

        assert!(!change.creates_entry());
        assert_eq!(change.status(), None);
        assert_eq!(
            change.array_filter("syllabus"),
            doc! { "d.doc_type": "syllabus", "d.task": task }
        );
        let update = change.update(DateTime::now()).unwrap();
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get("documents.$[d].task"), Some(&Bson::Null));
        assert!(!set.contains_key("documents.$[d].status"));
    }
}
