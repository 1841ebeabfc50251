//! Database row types. These map directly to SQLite rows.
//! Distinct from kindle-types models to keep the DB layer independent.

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use kindle_types::models::{Connection, ConnectionStatus, Message, User};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub created_at: String,
}

pub struct ConnectionRow {
    pub id: String,
    pub user_a: String,
    pub user_b: String,
    pub status: String,
    pub message_count: i64,
    pub quality_score: f64,
    pub created_at: String,
}

/// A message about to be stored. Its repetition flag is decided inside the
/// write transaction, against the history as it stands at that moment.
pub struct NewMessage<'a> {
    pub id: &'a str,
    pub connection_id: &'a str,
    pub sender_id: &'a str,
    pub text: &'a str,
    pub length_chars: i64,
}

pub struct MessageRow {
    pub id: String,
    pub connection_id: String,
    pub sender_id: String,
    pub text: String,
    pub length_chars: i64,
    pub is_repetitive: bool,
    pub created_at: String,
}

/// Parse a stored timestamp. New rows are RFC 3339; plain `datetime('now')`
/// values ("YYYY-MM-DD HH:MM:SS") are read as naive UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| anyhow!("Corrupt timestamp '{}': {}", raw, e))
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    raw.parse().map_err(|e| anyhow!("Corrupt {} '{}': {}", what, raw, e))
}

impl UserRow {
    pub fn into_model(self) -> Result<User> {
        Ok(User {
            id: parse_id(&self.id, "user id")?,
            username: self.username,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl ConnectionRow {
    pub fn into_model(self) -> Result<Connection> {
        let status = ConnectionStatus::parse(&self.status).ok_or_else(|| {
            anyhow!("Corrupt status '{}' on connection '{}'", self.status, self.id)
        })?;
        Ok(Connection {
            id: parse_id(&self.id, "connection id")?,
            user_a: parse_id(&self.user_a, "user_a")?,
            user_b: parse_id(&self.user_b, "user_b")?,
            status,
            message_count: self.message_count,
            quality_score: self.quality_score,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl MessageRow {
    pub fn into_model(self) -> Result<Message> {
        Ok(Message {
            id: parse_id(&self.id, "message id")?,
            connection_id: parse_id(&self.connection_id, "connection_id")?,
            sender_id: parse_id(&self.sender_id, "sender_id")?,
            length_chars: self.length_chars,
            is_repetitive: self.is_repetitive,
            created_at: parse_timestamp(&self.created_at)?,
            text: self.text,
        })
    }
}
