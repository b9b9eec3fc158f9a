//! Session model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A signed-in session, addressed by its opaque token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session token
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A session for `user_id` that lasts `days` from now
    pub fn new(id: String, user_id: i64, days: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            expires_at: now + Duration::days(days),
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_live() {
        let session = Session::new("token".to_string(), 1, 7);
        assert!(!session.is_expired());
        assert_eq!((session.expires_at - session.created_at).num_days(), 7);
    }

    #[test]
    fn test_expired_session() {
        let mut session = Session::new("token".to_string(), 1, 7);
        session.expires_at = Utc::now() - Duration::seconds(1);
        assert!(session.is_expired());
    }
}
