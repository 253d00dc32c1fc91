use thiserror::Error;
use crate::models::{TaskAction, TaskStatus};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("cannot {action} a task that is {from}")]
    InvalidTransition { from: TaskStatus, action: TaskAction },

    #[error("a comment is required when rejecting")]
    CommentRequired,

    // Another request moved the task between our read and our write.
    #[error("task is no longer {0}")]
    StaleStatus(TaskStatus),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
