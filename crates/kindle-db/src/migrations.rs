use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);",
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        migrate_v1(conn)?;
    }

    if version < 2 {
        info!("Running migration v2 (one connection per user pair)");
        migrate_v2(conn)?;
    }

    info!("Database migrations complete");
    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE TABLE connections (
            id              TEXT PRIMARY KEY,
            user_a          TEXT NOT NULL REFERENCES users(id),
            user_b          TEXT NOT NULL REFERENCES users(id),
            status          TEXT NOT NULL DEFAULT 'exploring',
            message_count   INTEGER NOT NULL DEFAULT 0,
            quality_score   REAL NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            CHECK (user_a != user_b)
        );

        CREATE INDEX idx_connections_user_a ON connections(user_a);
        CREATE INDEX idx_connections_user_b ON connections(user_b);

        CREATE TABLE messages (
            id              TEXT PRIMARY KEY,
            connection_id   TEXT NOT NULL REFERENCES connections(id) ON DELETE CASCADE,
            sender_id       TEXT NOT NULL REFERENCES users(id),
            text            TEXT NOT NULL,
            length_chars    INTEGER NOT NULL,
            is_repetitive   INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE INDEX idx_messages_connection
            ON messages(connection_id, created_at);

        CREATE TABLE avatar_state (
            user_id     TEXT PRIMARY KEY REFERENCES users(id),
            evolution   REAL NOT NULL DEFAULT 0,
            updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )?;
    Ok(())
}

/// Folds duplicate connections of the same unordered pair into the oldest
/// one, then makes the pair unique.
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        UPDATE messages SET connection_id = (
            SELECT keep.id FROM connections dup
            JOIN connections keep
              ON min(keep.user_a, keep.user_b) = min(dup.user_a, dup.user_b)
             AND max(keep.user_a, keep.user_b) = max(dup.user_a, dup.user_b)
            WHERE dup.id = messages.connection_id
            ORDER BY keep.created_at ASC, keep.rowid ASC
            LIMIT 1
        );

        DELETE FROM connections WHERE id NOT IN (
            SELECT c.id FROM connections c
            WHERE NOT EXISTS (
                SELECT 1 FROM connections older
                WHERE min(older.user_a, older.user_b) = min(c.user_a, c.user_b)
                  AND max(older.user_a, older.user_b) = max(c.user_a, c.user_b)
                  AND (older.created_at < c.created_at
                       OR (older.created_at = c.created_at AND older.rowid < c.rowid))
            )
        );

        UPDATE connections SET status = 'connected'
        WHERE status = 'exploring'
          AND EXISTS (SELECT 1 FROM messages WHERE connection_id = connections.id);

        CREATE UNIQUE INDEX idx_connections_pair
            ON connections(min(user_a, user_b), max(user_a, user_b));

        INSERT INTO schema_version (version) VALUES (2);
        ",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(conn: &Connection) -> i64 {
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn fresh_database_reaches_latest_version() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        assert_eq!(version(&conn), 2);

        // Re-running is a no-op
        run(&conn).unwrap();
        assert_eq!(version(&conn), 2);
    }

    #[test]
    fn duplicate_pairs_are_merged_into_the_oldest() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE schema_version (version INTEGER NOT NULL);")
            .unwrap();
        migrate_v1(&conn).unwrap();

        conn.execute_batch(
            "
            INSERT INTO users (id, username) VALUES ('a', 'ada'), ('b', 'bo'), ('c', 'cy');
            INSERT INTO connections (id, user_a, user_b, created_at)
                VALUES ('ab-old', 'a', 'b', '2024-01-01T00:00:00.000Z'),
                       ('ba-new', 'b', 'a', '2024-01-02T00:00:00.000Z'),
                       ('ac', 'a', 'c', '2024-01-03T00:00:00.000Z');
            INSERT INTO messages (id, connection_id, sender_id, text, length_chars)
                VALUES ('m1', 'ab-old', 'a', 'first hello there', 17),
                       ('m2', 'ba-new', 'b', 'a reply on the duplicate', 24);
            ",
        )
        .unwrap();

        run(&conn).unwrap();
        assert_eq!(version(&conn), 2);

        let ids: Vec<String> = conn
            .prepare("SELECT id FROM connections ORDER BY id")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(ids, ["ab-old", "ac"]);

        let moved: String = conn
            .query_row("SELECT connection_id FROM messages WHERE id = 'm2'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(moved, "ab-old");

        let status: String = conn
            .query_row("SELECT status FROM connections WHERE id = 'ab-old'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(status, "connected");

        // Either direction of an existing pair now violates the index
        assert!(
            conn.execute(
                "INSERT INTO connections (id, user_a, user_b) VALUES ('x', 'b', 'a')",
                [],
            )
            .is_err()
        );
    }
}
