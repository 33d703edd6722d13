use crate::schema::MIGRATIONS;
use anyhow::{bail, Result};
use log::info;
use rusqlite::Connection;
use std::path::Path;

pub struct Db {
    pub conn: Connection,
}

impl Db {
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        // journal_mode answers with the resulting mode, so it needs the checked variant
        let _mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |r| r.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        let db = Db { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Db { conn: Connection::open_in_memory()? };
        db.migrate()?;
        Ok(db)
    }

    pub fn schema_version(&self) -> Result<u32> {
        Ok(self.conn.pragma_query_value(None, "user_version", |r| r.get(0))?)
    }

    /// Apply every migration newer than the file's `user_version`.
    fn migrate(&self) -> Result<()> {
        let current = self.schema_version()? as usize;
        if current > MIGRATIONS.len() {
            bail!("session database schema v{} is newer than this build (v{})", current, MIGRATIONS.len());
        }
        for (i, sql) in MIGRATIONS.iter().enumerate().skip(current) {
            self.conn.execute_batch(sql)?;
            self.conn.pragma_update(None, "user_version", (i + 1) as u32)?;
            info!("session database migrated to v{}", i + 1);
        }
        Ok(())
    }
}
