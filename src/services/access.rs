//! Capability checks shared by the resource services

use crate::models::User;
use crate::services::ServiceError;

pub fn ensure_admin(actor: &User) -> Result<(), ServiceError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::Permission("Admin privileges required".to_string()))
    }
}

/// Admins pass; everyone else must own the row
pub fn ensure_can_modify(actor: &User, owner_id: i64) -> Result<(), ServiceError> {
    if actor.can_modify(owner_id) {
        Ok(())
    } else {
        Err(ServiceError::Permission(
            "You can only modify your own content".to_string(),
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::UserRole;
    use chrono::Utc;

    pub(crate) fn actor(id: i64, role: UserRole) -> User {
        User {
            id,
            username: format!("user{}", id),
            email: format!("user{}@example.edu", id),
            password_hash: String::new(),
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_checks() {
        let admin = actor(1, UserRole::Admin);
        let author = actor(2, UserRole::Author);

        assert!(ensure_admin(&admin).is_ok());
        assert!(matches!(ensure_admin(&author), Err(ServiceError::Permission(_))));
        assert!(ensure_can_modify(&author, 2).is_ok());
        assert!(ensure_can_modify(&admin, 2).is_ok());
        assert!(ensure_can_modify(&author, 1).is_err());
    }
}
