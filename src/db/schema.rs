//! Database schema for the settings store

pub const MIGRATIONS: &str = r#"
-- Single-row schedule settings
CREATE TABLE IF NOT EXISTS schedule_settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    start_time TEXT NOT NULL DEFAULT '',
    end_time TEXT NOT NULL DEFAULT '',
    days TEXT NOT NULL DEFAULT '[]',
    reply_message TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 0 CHECK (is_active IN (0, 1)),
    updated_at INTEGER NOT NULL
);
"#;
