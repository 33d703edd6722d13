use crate::{rows_from_snapshot, split_applications, SessionStore, StoreError, StoredSession, HEADER};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use wifitrack_core::{DeviceId, SessionRecord};

/// Session sheet kept as a CSV file with a fixed header row.
pub struct CsvSessionStore {
    path: PathBuf,
}

impl CsvSessionStore {
    /// Open `path`, creating a header-only file when it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = CsvSessionStore { path: path.as_ref().to_path_buf() };
        if !store.path.exists() {
            store.write_rows(&[])?;
            info!("created session store {}", store.path.display());
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut p = self.path.clone().into_os_string();
        p.push(".tmp");
        PathBuf::from(p)
    }

    // Written beside the target then renamed over it, so readers never see a partial sheet.
    fn write_rows(&self, rows: &[StoredSession]) -> Result<(), StoreError> {
        let tmp = self.tmp_path();
        let mut wtr = csv::Writer::from_path(&tmp)?;
        wtr.write_record(HEADER)?;
        for r in rows {
            let duration = format!("{:.3}", r.duration_secs);
            let apps = r.applications_joined();
            wtr.write_record([
                r.device.as_str(),
                r.start_time.as_str(),
                r.end_time.as_str(),
                duration.as_str(),
                apps.as_str(),
            ])?;
        }
        wtr.flush()?;
        drop(wtr);
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SessionStore for CsvSessionStore {
    fn flush(&mut self, snapshot: &[(DeviceId, SessionRecord)]) -> Result<(), StoreError> {
        let rows = rows_from_snapshot(snapshot)?;
        self.write_rows(&rows)?;
        debug!("flushed {} sessions to {}", rows.len(), self.path.display());
        Ok(())
    }

    fn load(&self) -> Result<Vec<StoredSession>, StoreError> {
        let mut rdr = csv::Reader::from_path(&self.path)?;
        let mut out = Vec::new();
        for rec in rdr.records() {
            let rec = rec?;
            if rec.len() < HEADER.len() {
                return Err(StoreError::Corrupt(format!("expected {} columns, got {}", HEADER.len(), rec.len())));
            }
            let duration_secs: f64 = rec[3]
                .trim()
                .parse()
                .map_err(|_| StoreError::Corrupt(format!("bad duration {:?}", &rec[3])))?;
            out.push(StoredSession {
                device: rec[0].to_string(),
                start_time: rec[1].to_string(),
                end_time: rec[2].to_string(),
                duration_secs,
                applications: split_applications(&rec[4]),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wifitrack_core::Timestamp;

    fn snapshot() -> Vec<(DeviceId, SessionRecord)> {
        let mut a = SessionRecord::new(Timestamp::UNIX_EPOCH);
        a.last_activity = Timestamp::UNIX_EPOCH + time::Duration::seconds(5);
        a.duration = time::Duration::seconds(5);
        a.services.insert("Port 80".into());
        a.services.insert("HTTP".into());
        let b = SessionRecord::new(Timestamp::UNIX_EPOCH + time::Duration::seconds(3));
        vec![(DeviceId::from("aa:bb:cc:dd:ee:01"), a), (DeviceId::from("aa:bb:cc:dd:ee:02"), b)]
    }

    #[test]
    fn new_store_has_only_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wifi_usage.csv");
        let store = CsvSessionStore::open(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["Device,Start Time,End Time,Duration (s),Applications"]);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn flush_twice_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wifi_usage.csv");
        let mut store = CsvSessionStore::open(&path).unwrap();
        let snap = snapshot();
        store.flush(&snap).unwrap();
        let first = fs::read(&path).unwrap();
        store.flush(&snap).unwrap();
        assert_eq!(first, fs::read(&path).unwrap());
        assert!(!store.tmp_path().exists());
    }

    #[test]
    fn flush_replaces_previous_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CsvSessionStore::open(dir.path().join("s.csv")).unwrap();
        let snap = snapshot();
        store.flush(&snap).unwrap();
        store.flush(&snap[..1]).unwrap();
        let rows = store.load().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].device, "aa:bb:cc:dd:ee:01");
        assert_eq!(rows[0].duration_secs, 5.0);
        assert_eq!(rows[0].applications, vec!["HTTP", "Port 80"]);
        assert_eq!(rows[0].end_time, "1970-01-01T00:00:05Z");
    }

    #[test]
    fn existing_store_is_not_truncated_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.csv");
        CsvSessionStore::open(&path).unwrap().flush(&snapshot()).unwrap();
        let reopened = CsvSessionStore::open(&path).unwrap();
        assert_eq!(reopened.load().unwrap().len(), 2);
    }

    #[test]
    fn flush_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CsvSessionStore { path: dir.path().join("gone").join("s.csv") };
        assert!(store.flush(&snapshot()).is_err());
    }
}
