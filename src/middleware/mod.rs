mod auth;

pub use auth::{ensure_current, issue_token, require_auth, verify_token, Claims};
