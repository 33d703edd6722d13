use crate::Db;
use log::debug;
use rusqlite::params;
use session_store::{rows_from_snapshot, SessionStore, StoreError, StoredSession};
use std::path::Path;
use wifitrack_core::{DeviceId, SessionRecord};

/// Session store kept in a single `sessions` table, replaced wholesale on every flush.
pub struct SqliteSessionStore {
    db: Db,
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl SqliteSessionStore {
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(SqliteSessionStore { db: Db::open_or_create(path).map_err(backend)? })
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    fn replace_all(&mut self, rows: &[StoredSession]) -> rusqlite::Result<()> {
        let tx = self.db.conn.transaction()?;
        tx.execute("DELETE FROM sessions", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sessions(position,device,start_time,end_time,duration_s,applications) VALUES (?,?,?,?,?,?)",
            )?;
            for (i, r) in rows.iter().enumerate() {
                stmt.execute(params![i as i64, r.device, r.start_time, r.end_time, r.duration_secs, r.applications_joined()])?;
            }
        }
        tx.commit()
    }
}

impl SessionStore for SqliteSessionStore {
    fn flush(&mut self, snapshot: &[(DeviceId, SessionRecord)]) -> Result<(), StoreError> {
        let rows = rows_from_snapshot(snapshot)?;
        self.replace_all(&rows).map_err(backend)?;
        debug!("flushed {} sessions to sqlite", rows.len());
        Ok(())
    }

    fn load(&self) -> Result<Vec<StoredSession>, StoreError> {
        self.db.sessions().map_err(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Duration, OffsetDateTime};

    fn record(start: i64, end: i64, services: &[&str]) -> SessionRecord {
        let mut r = SessionRecord::new(OffsetDateTime::UNIX_EPOCH + Duration::seconds(start));
        r.last_activity = OffsetDateTime::UNIX_EPOCH + Duration::seconds(end);
        r.duration = Duration::seconds(end - start);
        r.services = services.iter().map(|s| s.to_string()).collect();
        r
    }

    #[test]
    fn open_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteSessionStore::open_or_create(dir.path().join("s.db")).unwrap();
        assert!(store.db().table_exists("sessions").unwrap());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn flush_replaces_and_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteSessionStore::open_or_create(dir.path().join("s.db")).unwrap();
        let snap = vec![
            (DeviceId::from("bb"), record(0, 10, &["Port 22", "SSH"])),
            (DeviceId::from("aa"), record(3, 3, &[])),
        ];
        store.flush(&snap).unwrap();
        store.flush(&snap).unwrap();
        let rows = store.load().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].device, "bb");
        assert_eq!(rows[0].duration_secs, 10.0);
        assert_eq!(rows[0].applications, vec!["Port 22", "SSH"]);
        assert!(rows[1].applications.is_empty());

        store.flush(&snap[1..]).unwrap();
        let rows = store.load().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].device, "aa");
    }

    #[test]
    fn reopen_sees_previous_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.db");
        SqliteSessionStore::open_or_create(&path)
            .unwrap()
            .flush(&[(DeviceId::from("aa"), record(0, 1, &["HTTP"]))])
            .unwrap();
        let store = SqliteSessionStore::open_or_create(&path).unwrap();
        assert_eq!(store.load().unwrap()[0].applications, vec!["HTTP"]);
    }
}
