pub const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS imports (
      id TEXT PRIMARY KEY,
      imported_at INTEGER NOT NULL,
      source_path TEXT NOT NULL,
      status TEXT NOT NULL,
      stats_json TEXT
    );

    CREATE TABLE IF NOT EXISTS contacts (
      id INTEGER PRIMARY KEY,
      phone_number TEXT NOT NULL UNIQUE,
      name TEXT,
      email TEXT
    );

    CREATE TABLE IF NOT EXISTS conversations (
      id INTEGER PRIMARY KEY,
      thread_id INTEGER NOT NULL UNIQUE,
      title TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS messages (
      id INTEGER PRIMARY KEY,
      fingerprint TEXT NOT NULL UNIQUE,
      conversation_id INTEGER NOT NULL REFERENCES conversations(id),
      sender_id INTEGER REFERENCES contacts(id) ON DELETE SET NULL,
      timestamp INTEGER NOT NULL,
      kind TEXT NOT NULL CHECK (kind IN ('sms', 'mms')),
      body TEXT NOT NULL DEFAULT '',
      is_from_me INTEGER NOT NULL DEFAULT 0,
      status TEXT,
      read INTEGER NOT NULL DEFAULT 1,
      date_sent INTEGER,
      date_received INTEGER,
      subject TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_messages_conversation
      ON messages(conversation_id, timestamp DESC);
    CREATE INDEX IF NOT EXISTS idx_messages_sender_id ON messages(sender_id);

    CREATE TABLE IF NOT EXISTS attachments (
      id INTEGER PRIMARY KEY,
      message_id INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
      content_type TEXT,
      file_name TEXT NOT NULL,
      file_path TEXT NOT NULL DEFAULT '',
      source_url TEXT NOT NULL,
      data_base64 TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_attachments_message_id ON attachments(message_id);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_attachments_message_source
      ON attachments(message_id, source_url);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_attachments_file_path
      ON attachments(file_path) WHERE file_path <> '';
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_imports_status ON imports(status);
    "#,
];
