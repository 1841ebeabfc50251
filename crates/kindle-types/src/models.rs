use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Coarse lifecycle of a connection. The only transition is
/// `Exploring -> Connected`, taken when the first message is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Exploring,
    Connected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exploring => "exploring",
            Self::Connected => "connected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "exploring" => Some(Self::Exploring),
            "connected" => Some(Self::Connected),
            _ => None,
        }
    }
}

/// A conversation thread between two users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: Uuid,
    pub user_a: Uuid,
    pub user_b: Uuid,
    pub status: ConnectionStatus,
    /// Cached aggregate, recomputed from the message list on every view.
    pub message_count: i64,
    pub quality_score: f64,
    pub created_at: DateTime<Utc>,
}

impl Connection {
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }
}

/// Messages are immutable once stored; `is_repetitive` is decided at send time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub connection_id: Uuid,
    pub sender_id: Uuid,
    pub text: String,
    pub length_chars: i64,
    pub is_repetitive: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_storage_form() {
        for status in [ConnectionStatus::Exploring, ConnectionStatus::Connected] {
            assert_eq!(ConnectionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ConnectionStatus::parse("matched"), None);
    }

    #[test]
    fn involvement() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let conn = Connection {
            id: Uuid::new_v4(),
            user_a: a,
            user_b: b,
            status: ConnectionStatus::Exploring,
            message_count: 0,
            quality_score: 0.0,
            created_at: Utc::now(),
        };
        assert!(conn.involves(a));
        assert!(conn.involves(b));
        assert!(!conn.involves(Uuid::new_v4()));
    }
}
