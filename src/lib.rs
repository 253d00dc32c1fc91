//! IQAC document workflow portal.
//!
//! Administrators assign course-document tasks to initiators and reviewers;
//! uploaded files go to GridFS and each task moves through
//! upload → review → admin approval → completion, raising notifications
//! along the way.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod worker;

pub use routes::router;
pub use state::AppState;
