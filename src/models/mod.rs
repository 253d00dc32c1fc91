mod user;
mod task;
mod notification;
mod file;
mod course;
mod forms;

pub use user::{Role, SubRole, User, UserView};
pub use task::{StatusChange, Task, TaskAction, TaskStatus};
pub use notification::{Notification, NotificationKind};
pub use file::{derive_file_id, normalize_doc_type, FileRecord};
pub use course::{
    Course, CourseDocument, DocumentChange, DocumentStatus, Ltp, ReviewDecision, ReviewRecord,
    ReviewStage,
};
pub use forms::{
    AssignmentForm, AssignmentQuery, AssignmentUpdateForm, CourseForm, Decision, FileQuery,
    LoginForm, NotificationQuery, RegisterForm, ReviewForm, TaskQuery, UpdateUserForm, UserQuery,
};
