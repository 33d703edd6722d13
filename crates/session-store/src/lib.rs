//! Persistence of session snapshots.
//!
//! A store always receives the full current snapshot and replaces what it held before,
//! so a failed flush leaves nothing half-written that the next flush would not overwrite.

mod csv_store;
mod reopen;

pub use csv_store::CsvSessionStore;
pub use reopen::ReopeningStore;

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use wifitrack_core::{DeviceId, SessionRecord};

/// Column titles shared by every backend.
pub const HEADER: [&str; 5] = ["Device", "Start Time", "End Time", "Duration (s)", "Applications"];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("timestamp formatting failed: {0}")]
    Format(#[from] time::error::Format),
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("corrupt stored row: {0}")]
    Corrupt(String),
}

/// One persisted row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    pub device: String,
    /// RFC 3339 time of the first observation.
    pub start_time: String,
    /// RFC 3339 time of the most recent renewal.
    pub end_time: String,
    pub duration_secs: f64,
    pub applications: Vec<String>,
}

impl StoredSession {
    pub fn from_record(id: &DeviceId, rec: &SessionRecord) -> Result<Self, StoreError> {
        Ok(StoredSession {
            device: id.to_string(),
            start_time: rec.first_seen.format(&Rfc3339)?,
            end_time: rec.last_activity.format(&Rfc3339)?,
            duration_secs: rec.duration_secs(),
            applications: rec.services.iter().cloned().collect(),
        })
    }

    pub fn applications_joined(&self) -> String {
        self.applications.join(APPLICATION_SEPARATOR)
    }
}

/// Joins service labels in the Applications column. Labels must not contain it.
pub const APPLICATION_SEPARATOR: &str = ", ";

pub fn rows_from_snapshot(snapshot: &[(DeviceId, SessionRecord)]) -> Result<Vec<StoredSession>, StoreError> {
    snapshot.iter().map(|(id, rec)| StoredSession::from_record(id, rec)).collect()
}

pub fn split_applications(joined: &str) -> Vec<String> {
    joined.split(APPLICATION_SEPARATOR).map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}

/// Where the tracker flushes its session table.
pub trait SessionStore: Send {
    /// Replace the stored rows with `snapshot`.
    fn flush(&mut self, snapshot: &[(DeviceId, SessionRecord)]) -> Result<(), StoreError>;

    /// Read back whatever the last successful flush wrote.
    fn load(&self) -> Result<Vec<StoredSession>, StoreError>;
}
