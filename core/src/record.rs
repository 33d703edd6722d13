use crate::Timestamp;
use std::collections::BTreeSet;
use time::Duration;

/// Per-device session state. Owned by the session table; everything else sees copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub first_seen: Timestamp,
    pub last_activity: Timestamp,
    /// Sum of gaps between consecutive renewals, kept in whole nanoseconds. Never decreases.
    pub duration: Duration,
    /// Raw `Port <n>` tokens and resolved service names.
    pub services: BTreeSet<String>,
}

impl SessionRecord {
    pub fn new(at: Timestamp) -> Self {
        SessionRecord { first_seen: at, last_activity: at, duration: Duration::ZERO, services: BTreeSet::new() }
    }

    /// Accumulated duration in (fractional) seconds.
    pub fn duration_secs(&self) -> f64 {
        self.duration.as_seconds_f64()
    }

    /// True when any recorded service mentions port 443.
    pub fn uses_port_443(&self) -> bool {
        self.services.iter().any(|s| s.contains("443"))
    }
}
