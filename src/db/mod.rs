//! Settings persistence

mod models;
mod schema;

pub use models::*;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Durable storage for [`ScheduleSettings`]
///
/// The store is the only persistence boundary. Callers serialize
/// read-modify-write sequences through the scheduler lock.
pub trait SettingsStore {
    /// Current settings, or defaults when nothing is stored
    fn read(&self) -> Result<ScheduleSettings>;

    fn write(&self, settings: &ScheduleSettings) -> Result<()>;

    fn clear(&self) -> Result<()>;

    /// Update only the active flag
    fn set_active(&self, active: bool) -> Result<()> {
        let mut settings = self.read()?;
        settings.is_active = active;
        self.write(&settings)
    }
}

impl<S: SettingsStore + ?Sized> SettingsStore for Arc<S> {
    fn read(&self) -> Result<ScheduleSettings> {
        (**self).read()
    }

    fn write(&self, settings: &ScheduleSettings) -> Result<()> {
        (**self).write(settings)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }

    fn set_active(&self, active: bool) -> Result<()> {
        (**self).set_active(active)
    }
}

/// SQLite-backed settings store
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database at `path`; ":memory:" gives a private
    /// in-memory database
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open settings database at {}", path))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run database migrations
    pub fn migrate(&self) -> Result<()> {
        self.conn()
            .execute_batch(schema::MIGRATIONS)
            .context("Failed to run settings migrations")?;
        info!("Database migrations complete");
        Ok(())
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        crate::services::lock(&self.conn)
    }
}

impl SettingsStore for Database {
    fn read(&self) -> Result<ScheduleSettings> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT start_time, end_time, days, reply_message, is_active
             FROM schedule_settings WHERE id = 1",
        )?;
        let row = stmt
            .query_row([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, bool>(4)?,
                ))
            })
            .optional()?;

        let Some((start_time, end_time, days, reply_message, is_active)) = row else {
            debug!("No stored settings, using defaults");
            return Ok(ScheduleSettings::default());
        };

        let days: BTreeSet<String> = serde_json::from_str(&days)
            .with_context(|| format!("Corrupt day list in settings: {}", days))?;

        Ok(ScheduleSettings {
            start_time,
            end_time,
            days,
            reply_message,
            is_active,
        })
    }

    fn write(&self, settings: &ScheduleSettings) -> Result<()> {
        let days = serde_json::to_string(&settings.days)?;
        let now = chrono::Utc::now().timestamp();
        self.conn().execute(
            "INSERT OR REPLACE INTO schedule_settings
             (id, start_time, end_time, days, reply_message, is_active, updated_at)
             VALUES (1, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                settings.start_time,
                settings.end_time,
                days,
                settings.reply_message,
                settings.is_active,
                now,
            ],
        )?;
        debug!("Saved settings (active: {})", settings.is_active);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.conn().execute("DELETE FROM schedule_settings", [])?;
        info!("Settings cleared");
        Ok(())
    }

    fn set_active(&self, active: bool) -> Result<()> {
        let updated = self.conn().execute(
            "UPDATE schedule_settings SET is_active = ?, updated_at = ? WHERE id = 1",
            rusqlite::params![active, chrono::Utc::now().timestamp()],
        )?;
        if updated == 0 {
            // nothing stored yet; persist defaults carrying the flag
            let settings = ScheduleSettings {
                is_active: active,
                ..Default::default()
            };
            self.write(&settings)?;
        }
        debug!("Saved active state: {}", active);
        Ok(())
    }
}

// Re-export Optional from rusqlite for query_row
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn open() -> Database {
        let db = Database::new(":memory:").unwrap();
        db.migrate().unwrap();
        db
    }

    fn sample() -> ScheduleSettings {
        ScheduleSettings {
            start_time: "10:00 PM".to_string(),
            end_time: "07:00 AM".to_string(),
            days: ["Mon", "Fri"].iter().map(|d| d.to_string()).collect(),
            reply_message: "Sleeping, call later".to_string(),
            is_active: false,
        }
    }

    #[test]
    fn test_empty_store_reads_defaults() {
        let db = open();
        assert_eq!(db.read().unwrap(), ScheduleSettings::default());
    }

    #[test]
    fn test_write_then_read() {
        let db = open();
        db.write(&sample()).unwrap();
        assert_eq!(db.read().unwrap(), sample());

        let mut changed = sample();
        changed.days.insert("Sat".to_string());
        db.write(&changed).unwrap();
        assert_eq!(db.read().unwrap(), changed);
    }

    #[test]
    fn test_set_active() {
        let db = open();
        db.set_active(true).unwrap();
        assert!(db.read().unwrap().is_active);

        db.write(&sample()).unwrap();
        db.set_active(true).unwrap();
        let stored = db.read().unwrap();
        assert!(stored.is_active);
        assert_eq!(stored.days, sample().days);
    }

    #[test]
    fn test_clear() {
        let db = open();
        db.write(&sample()).unwrap();
        db.clear().unwrap();
        db.clear().unwrap();
        assert_eq!(db.read().unwrap(), ScheduleSettings::default());
    }

    #[test]
    fn test_migrations_are_repeatable() {
        let db = open();
        db.write(&sample()).unwrap();
        db.migrate().unwrap();
        assert_eq!(db.read().unwrap(), sample());
    }
}
