//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An account that can sign in to manage content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Check if the user is an administrator
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Admins may modify anything; everyone else only rows they own.
    pub fn can_modify(&self, owner_id: i64) -> bool {
        self.is_admin() || self.id == owner_id
    }
}

/// User role for authorization.
///
/// - Admin: full access
/// - Author: may create media and testimonials and edit their own rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    Author,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Author => "author",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "author" => Ok(UserRole::Author),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Input for creating a new user
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, role: UserRole) -> User {
        User {
            id,
            username: format!("user{}", id),
            email: format!("user{}@example.edu", id),
            password_hash: "hash".to_string(),
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_role_roundtrip() {
        for role in [UserRole::Admin, UserRole::Author] {
            assert_eq!(role.to_string().parse::<UserRole>().unwrap(), role);
        }
        assert_eq!("ADMIN".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert!("editor".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_can_modify() {
        let admin = user(1, UserRole::Admin);
        let author = user(2, UserRole::Author);

        assert!(admin.can_modify(2));
        assert!(author.can_modify(2));
        assert!(!author.can_modify(1));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_string(&user(1, UserRole::Author)).unwrap();
        assert!(!json.contains("password_hash"));
    }
}
