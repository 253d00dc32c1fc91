use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Metadata for one stored version of a document. The bytes live in GridFS
/// under `gridfs_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub file_id: String,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    pub gridfs_id: ObjectId,
    pub bucket: String,
    pub year: Option<String>,
    pub course_code: Option<String>,
    pub doc_type: Option<String>,
    pub department: Option<String>,
    pub semester: Option<String>,
    pub version: i32,
    pub is_latest: bool,
    pub uploaded_by: ObjectId,
    pub task: Option<ObjectId>,
    pub uploaded_at: DateTime,
}

impl FileRecord {
    pub const COLLECTION: &'static str = "files";
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Lowercases a document type and joins its words with `-`.
pub fn normalize_doc_type(doc_type: &str) -> String {
    doc_type
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Builds the logical file identifier `{year}_{COURSE}_{doc-type}`.
///
/// Returns `None` unless all three parts are present, in which case the
/// caller falls back to the record's own ObjectId.
pub fn derive_file_id(
    year: Option<&str>,
    course_code: Option<&str>,
    doc_type: Option<&str>,
) -> Option<String> {
    let year = non_blank(year)?;
    let course_code = non_blank(course_code)?.to_uppercase();
    let doc_type = normalize_doc_type(non_blank(doc_type)?);
    Some(format!("{}_{}_{}", year, course_code, doc_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_id_is_deterministic() {
        let a = derive_file_id(Some("2024"), Some("cs101"), Some("Course File"));
        let b = derive_file_id(Some(" 2024 "), Some(" CS101"), Some("course   file"));
        assert_eq!(a.as_deref(), Some("2024_CS101_course-file"));
        assert_eq!(a, b);
    }

    #[test]
    fn file_id_needs_every_part() {
        assert_eq!(derive_file_id(None, Some("CS101"), Some("syllabus")), None);
        assert_eq!(derive_file_id(Some("2024"), Some("  "), Some("syllabus")), None);
        assert_eq!(derive_file_id(Some("2024"), Some("CS101"), None), None);
    }

    #[test]
    fn doc_type_normalization() {
        assert_eq!(normalize_doc_type("  Lab   Manual "), "lab-manual");
        assert_eq!(normalize_doc_type("syllabus"), "syllabus");
    }
}
