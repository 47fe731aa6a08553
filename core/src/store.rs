//! The only code that writes committed state.
//!
//! Every write runs in its own transaction and is committed before the call
//! returns, so a failure later in a file never discards earlier records.

use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::error::CoreError;
use crate::importer::normalize::NormalizedMessage;

/// Runs `write` in a transaction of its own and commits it.
pub fn commit_one<T, F>(conn: &Connection, write: F) -> Result<T, CoreError>
where
    F: FnOnce(&Transaction) -> Result<T, CoreError>,
{
    let tx = conn.unchecked_transaction()?;
    let out = write(&tx)?;
    tx.commit()?;
    Ok(out)
}

/// Dedup gate: false when a message with this fingerprint is already stored.
pub fn should_ingest(conn: &Connection, fingerprint: &str) -> Result<bool, CoreError> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM messages WHERE fingerprint = ?1 LIMIT 1;",
            params![fingerprint],
            |row| row.get(0),
        )
        .optional()?;
    Ok(existing.is_none())
}

/// Inserts the message once. Returns `None` when the fingerprint was claimed
/// in the meantime.
pub fn insert_message(
    conn: &Connection,
    message: &NormalizedMessage,
    conversation_id: i64,
    sender_id: Option<i64>,
) -> Result<Option<i64>, CoreError> {
    commit_one(conn, |tx| {
        let changes = tx.execute(
            "INSERT OR IGNORE INTO messages \
             (fingerprint, conversation_id, sender_id, timestamp, kind, body, is_from_me, status, read, \
              date_sent, date_received, subject) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                message.fingerprint,
                conversation_id,
                sender_id,
                message.timestamp,
                message.kind.as_str(),
                message.body,
                message.is_from_me,
                message.status,
                message.read,
                message.date_sent,
                message.date_received,
                message.subject,
            ],
        )?;
        if changes == 0 {
            return Ok(None);
        }
        Ok(Some(tx.last_insert_rowid()))
    })
}

pub struct NewAttachment<'a> {
    pub message_id: i64,
    pub content_type: Option<&'a str>,
    pub file_name: &'a str,
    pub file_path: &'a str,
    pub source_url: &'a str,
}

pub fn insert_attachment(conn: &Connection, attachment: &NewAttachment<'_>) -> Result<bool, CoreError> {
    commit_one(conn, |tx| {
        let changes = tx.execute(
            "INSERT OR IGNORE INTO attachments (message_id, content_type, file_name, file_path, source_url) \
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                attachment.message_id,
                attachment.content_type,
                attachment.file_name,
                attachment.file_path,
                attachment.source_url,
            ],
        )?;
        Ok(changes > 0)
    })
}

pub fn begin_import(conn: &Connection, import_id: &str, started_at: i64, source_path: &str) -> Result<(), CoreError> {
    commit_one(conn, |tx| {
        tx.execute(
            "INSERT INTO imports (id, imported_at, source_path, status, stats_json) \
             VALUES (?1, ?2, ?3, 'running', NULL);",
            params![import_id, started_at, source_path],
        )?;
        Ok(())
    })
}

pub fn finish_import(conn: &Connection, import_id: &str, status: &str, stats_json: &str) -> Result<(), CoreError> {
    commit_one(conn, |tx| {
        tx.execute(
            "UPDATE imports SET status = ?2, stats_json = ?3 WHERE id = ?1;",
            params![import_id, status, stats_json],
        )?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::apply_migrations;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().expect("memory db");
        apply_migrations(&conn).expect("migrate");
        conn.execute(
            "INSERT INTO conversations (id, thread_id, title) VALUES (1, 1, 'Thread 1');",
            [],
        )
        .expect("conversation");
        conn
    }

    #[test]
    fn failed_write_rolls_back_only_itself() {
        let conn = setup();
        commit_one(&conn, |tx| {
            tx.execute("INSERT INTO contacts (phone_number) VALUES ('+1');", [])?;
            Ok(())
        })
        .expect("first");
        let err = commit_one(&conn, |tx| {
            tx.execute("INSERT INTO contacts (phone_number) VALUES ('+2');", [])?;
            tx.execute("INSERT INTO contacts (phone_number) VALUES ('+1');", [])?;
            Ok(())
        });
        assert!(err.is_err());
        let count: i64 = conn
            .query_row("SELECT COUNT(1) FROM contacts;", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }

    #[test]
    fn gate_closes_after_insert() {
        let conn = setup();
        conn.execute(
            "INSERT INTO messages (fingerprint, conversation_id, timestamp, kind) VALUES ('abc', 1, 1, 'sms');",
            [],
        )
        .expect("message");
        assert!(!should_ingest(&conn, "abc").expect("gate"));
        assert!(should_ingest(&conn, "def").expect("gate"));
    }

    #[test]
    fn attachment_paths_are_unique_but_empty_paths_repeat() {
        let conn = setup();
        conn.execute(
            "INSERT INTO messages (id, fingerprint, conversation_id, timestamp, kind) VALUES (1, 'a', 1, 1, 'mms');",
            [],
        )
        .expect("message");
        let failed = |url: &'static str| NewAttachment {
            message_id: 1,
            content_type: Some("image/png"),
            file_name: "x.png",
            file_path: "",
            source_url: url,
        };
        assert!(insert_attachment(&conn, &failed("http://a/1.png")).expect("first"));
        assert!(insert_attachment(&conn, &failed("http://a/2.png")).expect("second"));
        assert!(!insert_attachment(&conn, &failed("http://a/2.png")).expect("repeat"));
    }
}
