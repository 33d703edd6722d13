use crate::Db;
use anyhow::Result;
use session_store::{split_applications, StoredSession};

impl Db {
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let mut stmt = self.conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
        Ok(stmt.exists([name])?)
    }

    pub fn sessions(&self) -> Result<Vec<StoredSession>> {
        let mut stmt = self.conn.prepare(
            "SELECT device, start_time, end_time, duration_s, applications FROM sessions ORDER BY position",
        )?;
        let rows = stmt.query_map([], |r| {
            let apps: String = r.get(4)?;
            Ok(StoredSession {
                device: r.get(0)?,
                start_time: r.get(1)?,
                end_time: r.get(2)?,
                duration_secs: r.get(3)?,
                applications: split_applications(&apps),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
