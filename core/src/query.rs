use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::CoreError;
use crate::identity::NaturalEntity;
use crate::models::{ArchiveStats, Attachment, Contact, Conversation, Message, MessageKind};

pub fn archive_stats(conn: &Connection) -> Result<ArchiveStats, CoreError> {
    let count = |table: &str| -> Result<i64, CoreError> {
        Ok(conn.query_row(&format!("SELECT COUNT(1) FROM {};", table), [], |row| row.get(0))?)
    };
    Ok(ArchiveStats {
        contacts: count("contacts")?,
        conversations: count("conversations")?,
        messages: count("messages")?,
        attachments: count("attachments")?,
    })
}

pub fn contact_by_phone(conn: &Connection, phone_number: &str) -> Result<Option<Contact>, CoreError> {
    let contact = conn
        .query_row(Contact::SELECT_SQL, params![phone_number], Contact::from_row)
        .optional()?;
    Ok(contact)
}

pub fn conversation_by_thread(conn: &Connection, thread_id: i64) -> Result<Option<Conversation>, CoreError> {
    let conversation = conn
        .query_row(Conversation::SELECT_SQL, params![thread_id], Conversation::from_row)
        .optional()?;
    Ok(conversation)
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let raw_kind: String = row.get(5)?;
    let kind = MessageKind::parse(&raw_kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            Type::Text,
            format!("unknown message kind: {}", raw_kind).into(),
        )
    })?;
    Ok(Message {
        id: row.get(0)?,
        fingerprint: row.get(1)?,
        conversation_id: row.get(2)?,
        sender_id: row.get(3)?,
        timestamp: row.get(4)?,
        kind,
        body: row.get(6)?,
        is_from_me: row.get::<_, i64>(7)? != 0,
        status: row.get(8)?,
        read: row.get::<_, i64>(9)? != 0,
        date_sent: row.get(10)?,
        date_received: row.get(11)?,
        subject: row.get(12)?,
    })
}

pub fn message_by_fingerprint(conn: &Connection, fingerprint: &str) -> Result<Option<Message>, CoreError> {
    let message = conn
        .query_row(
            "SELECT id, fingerprint, conversation_id, sender_id, timestamp, kind, body, is_from_me, status, read, \
                    date_sent, date_received, subject \
             FROM messages WHERE fingerprint = ?1;",
            params![fingerprint],
            message_from_row,
        )
        .optional()?;
    Ok(message)
}

pub fn attachments_for_message(conn: &Connection, message_id: i64) -> Result<Vec<Attachment>, CoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, message_id, content_type, file_name, file_path, source_url \
         FROM attachments WHERE message_id = ?1 ORDER BY id ASC;",
    )?;
    let rows = stmt.query_map(params![message_id], |row| {
        Ok(Attachment {
            id: row.get(0)?,
            message_id: row.get(1)?,
            content_type: row.get(2)?,
            file_name: row.get(3)?,
            file_path: row.get(4)?,
            source_url: row.get(5)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::apply_migrations;

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().expect("memory db");
        apply_migrations(&conn).expect("migrate");
        conn.execute("INSERT INTO conversations (thread_id, title) VALUES (1, 'Thread 1');", [])
            .expect("conversation");
        conn.execute(
            "INSERT INTO messages (fingerprint, conversation_id, timestamp, kind, body) VALUES ('fp', 1, 5, 'mms', 'x');",
            [],
        )
        .expect("message");
        conn
    }

    #[test]
    fn message_row_maps_kind() {
        let conn = seeded();
        let message = message_by_fingerprint(&conn, "fp").expect("query").expect("message");
        assert_eq!(message.kind, MessageKind::Mms);
        assert_eq!(message.timestamp, 5);
        assert!(message_by_fingerprint(&conn, "other").expect("query").is_none());
    }

    #[test]
    fn unknown_kind_is_a_conversion_error() {
        let conn = seeded();
        // bypass the CHECK constraint to simulate a foreign row
        conn.execute_batch("PRAGMA ignore_check_constraints = ON;").expect("pragma");
        conn.execute("UPDATE messages SET kind = 'fax' WHERE fingerprint = 'fp';", [])
            .expect("update");
        let err = message_by_fingerprint(&conn, "fp").expect_err("bad kind");
        assert!(matches!(
            err,
            CoreError::Sqlite(rusqlite::Error::FromSqlConversionFailure(5, Type::Text, _))
        ));
    }
}
