use crate::models::{ConnectionRow, MessageRow, NewMessage, UserRow};
use crate::Database;
use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row};

const CONNECTION_COLUMNS: &str =
    "id, user_a, user_b, status, message_count, quality_score, created_at";

const MESSAGE_COLUMNS: &str =
    "id, connection_id, sender_id, text, length_chars, is_repetitive, created_at";

impl Database {
    // -- Users --

    /// Mirror a token-authenticated user locally. Existing rows are kept.
    pub fn ensure_user(&self, id: &str, username: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO users (id, username) VALUES (?1, ?2)",
                (id, username),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, username, created_at FROM users WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(UserRow {
                            id: row.get(0)?,
                            username: row.get(1)?,
                            created_at: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Connections --

    /// The connection between two users in either direction, created as
    /// `exploring` when none exists. Lookup and insert share one transaction,
    /// and the pair index rejects a second row for the same two users.
    /// The flag is true when a new row was created.
    pub fn find_or_create_connection(
        &self,
        id: &str,
        user_a: &str,
        user_b: &str,
    ) -> Result<(ConnectionRow, bool)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if let Some(existing) = query_connection_between(&tx, user_a, user_b)? {
                return Ok((existing, false));
            }

            insert_connection(&tx, id, user_a, user_b)?;
            let row = query_connection(&tx, id)?
                .ok_or_else(|| anyhow!("Connection {} missing after insert", id))?;
            tx.commit()?;
            Ok((row, true))
        })
    }

    pub fn get_connection(&self, id: &str) -> Result<Option<ConnectionRow>> {
        self.with_conn(|conn| query_connection(conn, id))
    }

    pub fn list_connections_for_user(&self, user_id: &str) -> Result<Vec<ConnectionRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {CONNECTION_COLUMNS} FROM connections
                 WHERE user_a = ?1 OR user_b = ?1
                 ORDER BY created_at DESC, rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], connection_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Messages --

    /// Store a message in one transaction: `classify` sees the newest
    /// `window` messages (oldest first) and decides the repetition flag, the
    /// row is inserted and the connection moves `exploring -> connected`.
    /// Returns the stored row and whether the status changed.
    pub fn append_message<F>(
        &self,
        new: &NewMessage<'_>,
        window: u32,
        classify: F,
    ) -> Result<(MessageRow, bool)>
    where
        F: FnOnce(&[MessageRow]) -> Result<bool>,
    {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let recent = query_recent_messages(&tx, new.connection_id, window)?;
            let is_repetitive = classify(&recent)?;

            tx.execute(
                "INSERT INTO messages
                     (id, connection_id, sender_id, text, length_chars, is_repetitive)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    new.id,
                    new.connection_id,
                    new.sender_id,
                    new.text,
                    new.length_chars,
                    is_repetitive
                ],
            )?;
            let connected = tx.execute(
                "UPDATE connections SET status = 'connected'
                 WHERE id = ?1 AND status = 'exploring'",
                [new.connection_id],
            )? > 0;

            let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
            let row = tx.query_row(&sql, [new.id], message_from_row)?;
            tx.commit()?;
            Ok((row, connected))
        })
    }

    /// Every message of a connection, oldest first.
    pub fn get_messages(&self, connection_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE connection_id = ?1
                 ORDER BY created_at ASC, rowid ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([connection_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Avatar state --

    /// Stored evolution for a user; 0.0 when nothing has been recorded yet.
    pub fn get_avatar_evolution(&self, user_id: &str) -> Result<f64> {
        self.with_conn(|conn| query_avatar_evolution(conn, user_id))
    }

    /// Persist the recomputed aggregate of a connection and ratchet every
    /// participant's avatar in one transaction. `ratchet` maps a user and
    /// their stored evolution to the value to keep; the upsert never lowers
    /// it. Returns each participant's `(previous, stored)` evolution, in the
    /// order given.
    pub fn record_conversation_view<F>(
        &self,
        connection_id: &str,
        message_count: i64,
        quality_score: f64,
        participants: &[&str],
        mut ratchet: F,
    ) -> Result<Vec<(f64, f64)>>
    where
        F: FnMut(&str, f64) -> f64,
    {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE connections SET message_count = ?2, quality_score = ?3 WHERE id = ?1",
                rusqlite::params![connection_id, message_count, quality_score],
            )?;

            let mut results = Vec::with_capacity(participants.len());
            for &user_id in participants {
                let previous = query_avatar_evolution(&tx, user_id)?;
                let stored = upsert_avatar(&tx, user_id, ratchet(user_id, previous))?;
                results.push((previous, stored));
            }

            tx.commit()?;
            Ok(results)
        })
    }
}

fn insert_connection(conn: &Connection, id: &str, user_a: &str, user_b: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO connections (id, user_a, user_b) VALUES (?1, ?2, ?3)",
        (id, user_a, user_b),
    )?;
    Ok(())
}

fn query_connection(conn: &Connection, id: &str) -> Result<Option<ConnectionRow>> {
    let sql = format!("SELECT {CONNECTION_COLUMNS} FROM connections WHERE id = ?1");
    let row = conn.query_row(&sql, [id], connection_from_row).optional()?;
    Ok(row)
}

fn query_connection_between(
    conn: &Connection,
    a: &str,
    b: &str,
) -> Result<Option<ConnectionRow>> {
    let sql = format!(
        "SELECT {CONNECTION_COLUMNS} FROM connections
         WHERE (user_a = ?1 AND user_b = ?2) OR (user_a = ?2 AND user_b = ?1)"
    );
    let row = conn.query_row(&sql, [a, b], connection_from_row).optional()?;
    Ok(row)
}

/// The newest `limit` messages of a connection, oldest first.
fn query_recent_messages(
    conn: &Connection,
    connection_id: &str,
    limit: u32,
) -> Result<Vec<MessageRow>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM (
             SELECT *, rowid AS seq FROM messages
             WHERE connection_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2
         ) ORDER BY created_at ASC, seq ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params![connection_id, limit], message_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_avatar_evolution(conn: &Connection, user_id: &str) -> Result<f64> {
    let evolution = conn
        .query_row(
            "SELECT evolution FROM avatar_state WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(evolution.unwrap_or(0.0))
}

fn upsert_avatar(conn: &Connection, user_id: &str, evolution: f64) -> Result<f64> {
    conn.execute(
        "INSERT INTO avatar_state (user_id, evolution) VALUES (?1, ?2)
         ON CONFLICT(user_id) DO UPDATE SET
             updated_at = CASE WHEN excluded.evolution > evolution
                               THEN excluded.updated_at ELSE updated_at END,
             evolution = MAX(evolution, excluded.evolution)",
        rusqlite::params![user_id, evolution],
    )?;
    query_avatar_evolution(conn, user_id)
}

fn connection_from_row(row: &Row<'_>) -> rusqlite::Result<ConnectionRow> {
    Ok(ConnectionRow {
        id: row.get(0)?,
        user_a: row.get(1)?,
        user_b: row.get(2)?,
        status: row.get(3)?,
        message_count: row.get(4)?,
        quality_score: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        connection_id: row.get(1)?,
        sender_id: row.get(2)?,
        text: row.get(3)?,
        length_chars: row.get(4)?,
        is_repetitive: row.get(5)?,
        created_at: row.get(6)?,
    })
}
