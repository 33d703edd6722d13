//! In-memory per-device session state.
//!
//! The table is the single owner of every [`SessionRecord`]. All operations take `&self`
//! and run under one mutex, so a [`SessionTable::snapshot`] never observes a half-applied
//! update. Share it between the ingestor and the refresh loop through an `Arc`.

use log::debug;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use wifitrack_core::{DeviceId, SessionRecord, Timestamp};

/// What a renewal did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renewal {
    /// First sighting; a fresh record was created.
    Inserted,
    /// Known device; the gap since the last renewal was added to its duration.
    Extended,
    /// Known device but the event is older than its last activity; nothing was added.
    Clamped,
}

#[derive(Default)]
struct Inner {
    entries: Vec<(DeviceId, SessionRecord)>,
    index: HashMap<DeviceId, usize>,
}

#[derive(Default)]
pub struct SessionTable {
    inner: Mutex<Inner>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation is applied as a whole while the guard is held, so a poisoned
    // lock still protects consistent data.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Establish or extend the session of `id` at time `at`.
    pub fn record_renewal(&self, id: &DeviceId, at: Timestamp) -> Renewal {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match inner.index.get(id).copied() {
            Some(i) => {
                let rec = &mut inner.entries[i].1;
                let delta = at - rec.last_activity;
                rec.last_activity = at;
                if !delta.is_negative() {
                    rec.duration += delta;
                    Renewal::Extended
                } else {
                    Renewal::Clamped
                }
            }
            None => {
                debug!("new device {}", id);
                inner.index.insert(id.clone(), inner.entries.len());
                inner.entries.push((id.clone(), SessionRecord::new(at)));
                Renewal::Inserted
            }
        }
    }

    /// Union `labels` into the services of a known device.
    ///
    /// Returns `false` (and changes nothing) when `id` has no session yet.
    pub fn record_service_usage(&self, id: &DeviceId, labels: BTreeSet<String>) -> bool {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match inner.index.get(id).copied() {
            Some(i) => {
                inner.entries[i].1.services.extend(labels);
                true
            }
            None => false,
        }
    }

    /// Point-in-time copy of every session, in first-seen order.
    pub fn snapshot(&self) -> Vec<(DeviceId, SessionRecord)> {
        self.lock().entries.clone()
    }

    pub fn get(&self, id: &DeviceId) -> Option<SessionRecord> {
        let inner = self.lock();
        inner.index.get(id).map(|&i| inner.entries[i].1.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every session.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.index.clear();
    }
}
