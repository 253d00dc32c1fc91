use chrono::{DateTime, Utc};
use serde::Deserialize;
use super::course::Ltp;
use super::user::{Role, SubRole};

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub subrole: Option<SubRole>,
    pub department: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateUserForm {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub subrole: Option<SubRole>,
    pub department: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UserQuery {
    pub role: Option<Role>,
    pub subrole: Option<SubRole>,
}

#[derive(Debug, Deserialize)]
pub struct CourseForm {
    pub code: String,
    pub name: String,
    pub department: Option<String>,
    pub year: Option<String>,
    pub semester: Option<String>,
    #[serde(default)]
    pub ltp: Ltp,
    #[serde(default)]
    pub documents: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignmentForm {
    pub course_id: String,
    pub doc_type: String,
    pub initiator_id: String,
    pub reviewer_id: String,
    pub deadline: DateTime<Utc>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AssignmentUpdateForm {
    pub deadline: Option<DateTime<Utc>>,
    pub initiator_id: Option<String>,
    pub reviewer_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AssignmentQuery {
    pub status: Option<String>,
    pub course_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    pub decision: Decision,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct TaskQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct FileQuery {
    pub course_code: Option<String>,
    pub doc_type: Option<String>,
    pub year: Option<String>,
    #[serde(default)]
    pub all_versions: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
}
