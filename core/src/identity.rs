use rusqlite::types::Value;
use rusqlite::Row;
use tracing::debug;

use crate::db::ArchiveDb;
use crate::error::CoreError;
use crate::models::{Contact, Conversation};
use crate::store::commit_one;

/// An entity that is upserted by a business key instead of a row id.
pub trait NaturalEntity: Sized {
    /// Values needed to create the entity when it does not exist yet.
    type Seed;

    /// `INSERT OR IGNORE` statement taking `insert_params` in order.
    const INSERT_SQL: &'static str;
    /// Lookup by natural key, taking `key` as its only parameter.
    const SELECT_SQL: &'static str;

    fn insert_params(seed: &Self::Seed) -> Vec<Value>;
    fn key(seed: &Self::Seed) -> Value;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Insert-if-absent then fetch, in one committed transaction. The first
/// writer's attributes win; later seeds for the same key are ignored.
pub fn get_or_create<E: NaturalEntity>(db: &ArchiveDb, seed: &E::Seed) -> Result<E, CoreError> {
    commit_one(&db.conn, |tx| {
        let created = tx.execute(E::INSERT_SQL, rusqlite::params_from_iter(E::insert_params(seed)))?;
        if created > 0 {
            debug!(key = ?E::key(seed), "created entity");
        }
        let entity = tx.query_row(E::SELECT_SQL, [E::key(seed)], E::from_row)?;
        Ok(entity)
    })
}

pub struct ContactSeed {
    pub phone_number: String,
    pub name: Option<String>,
}

impl NaturalEntity for Contact {
    type Seed = ContactSeed;

    const INSERT_SQL: &'static str =
        "INSERT OR IGNORE INTO contacts (phone_number, name) VALUES (?1, ?2);";
    const SELECT_SQL: &'static str =
        "SELECT id, phone_number, name, email FROM contacts WHERE phone_number = ?1;";

    fn insert_params(seed: &Self::Seed) -> Vec<Value> {
        vec![
            Value::from(seed.phone_number.clone()),
            seed.name.clone().map(Value::from).unwrap_or(Value::Null),
        ]
    }

    fn key(seed: &Self::Seed) -> Value {
        Value::from(seed.phone_number.clone())
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Contact {
            id: row.get(0)?,
            phone_number: row.get(1)?,
            name: row.get(2)?,
            email: row.get(3)?,
        })
    }
}

impl NaturalEntity for Conversation {
    type Seed = i64;

    const INSERT_SQL: &'static str =
        "INSERT OR IGNORE INTO conversations (thread_id, title) VALUES (?1, ?2);";
    const SELECT_SQL: &'static str =
        "SELECT id, thread_id, title FROM conversations WHERE thread_id = ?1;";

    fn insert_params(thread_id: &i64) -> Vec<Value> {
        vec![Value::from(*thread_id), Value::from(default_title(*thread_id))]
    }

    fn key(thread_id: &i64) -> Value {
        Value::from(*thread_id)
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Conversation {
            id: row.get(0)?,
            thread_id: row.get(1)?,
            title: row.get(2)?,
        })
    }
}

pub fn default_title(thread_id: i64) -> String {
    format!("Thread {}", thread_id)
}

pub fn resolve_contact(db: &ArchiveDb, phone_number: &str, name: Option<&str>) -> Result<Contact, CoreError> {
    let seed = ContactSeed {
        phone_number: phone_number.to_string(),
        name: name.map(str::to_string),
    };
    get_or_create::<Contact>(db, &seed)
}

pub fn resolve_conversation(db: &ArchiveDb, thread_id: i64) -> Result<Conversation, CoreError> {
    get_or_create::<Conversation>(db, &thread_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_archive;
    use tempfile::tempdir;

    #[test]
    fn first_contact_name_wins() {
        let tmp = tempdir().expect("temp");
        let db = open_archive(tmp.path().join("archive.sqlite")).expect("open");
        let first = resolve_contact(&db, "+15555550123", Some("Alice")).expect("first");
        let second = resolve_contact(&db, "+15555550123", Some("Alicia")).expect("second");
        assert_eq!(first, second);
        assert_eq!(second.name.as_deref(), Some("Alice"));
    }

    #[test]
    fn contact_without_name_is_created() {
        let tmp = tempdir().expect("temp");
        let db = open_archive(tmp.path().join("archive.sqlite")).expect("open");
        let contact = resolve_contact(&db, "+15550001111", None).expect("contact");
        assert_eq!(contact.name, None);
        assert_eq!(contact.email, None);
    }

    #[test]
    fn conversation_gets_default_title_once() {
        let tmp = tempdir().expect("temp");
        let db = open_archive(tmp.path().join("archive.sqlite")).expect("open");
        let a = resolve_conversation(&db, 7).expect("a");
        let b = resolve_conversation(&db, 7).expect("b");
        assert_eq!(a, b);
        assert_eq!(a.title, "Thread 7");
        let count: i64 = db
            .conn
            .query_row("SELECT COUNT(1) FROM conversations;", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }
}
