use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Viewer,
}

/// Part a `user` plays in the document workflow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubRole {
    Initiator,
    Reviewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Viewer => "viewer",
        }
    }
}

impl SubRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubRole::Initiator => "initiator",
            SubRole::Reviewer => "reviewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SubRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub email: String,       // stored lowercased
    pub password_hash: String,
    pub role: Role,
    pub subrole: Option<SubRole>,
    pub department: Option<String>,
    pub created_at: DateTime,
}

impl User {
    pub const COLLECTION: &'static str = "users";

    pub fn new(
        name: String,
        email: &str,
        password_hash: String,
        role: Role,
        subrole: Option<SubRole>,
        department: Option<String>,
    ) -> Self {
        Self {
            id: Some(ObjectId::new()),
            name,
            email: email.trim().to_lowercase(),
            password_hash,
            role,
            subrole,
            department,
            created_at: DateTime::now(),
        }
    }

    pub fn has_subrole(&self, subrole: SubRole) -> bool {
        self.role == Role::User && self.subrole == Some(subrole)
    }
}

/// User as returned by the API, without the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: Option<ObjectId>,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub subrole: Option<SubRole>,
    pub department: Option<String>,
    pub created_at: DateTime,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            subrole: user.subrole,
            department: user.department,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_normalizes_email() {
        let user = User::new(
            "Asha".into(),
            "  Asha.K@College.EDU ",
            "hash".into(),
            Role::User,
            Some(SubRole::Initiator),
            None,
        );
        assert_eq!(user.email, "asha.k@college.edu");
        assert!(user.id.is_some());
        assert!(user.has_subrole(SubRole::Initiator));
        assert!(!user.has_subrole(SubRole::Reviewer));
    }

    #[test]
    fn view_drops_password_hash() {
        let user = User::new("A".into(), "a@b.c", "secret-hash".into(), Role::Admin, None, None);
        let json = serde_json::to_string(&UserView::from(user)).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"role\":\"admin\""));
    }
}
