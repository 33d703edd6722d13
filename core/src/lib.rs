//! Core utilities and shared types for the usage tracker.

use std::fmt;

pub mod cancel;
pub mod error;
pub mod event;
pub mod record;

pub use cancel::Cancellation;
pub use error::{EventSourceError, MalformedEvent};
pub use event::{NetworkEvent, RawEvent};
pub use record::SessionRecord;

/// Wall-clock instant attached to every observed event.
pub type Timestamp = time::OffsetDateTime;

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Link-layer hardware address identifying one device.
///
/// Stored lowercased and trimmed so `AA:BB:..` and `aa:bb:..` are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(raw: &str) -> Self {
        DeviceId(raw.trim().to_ascii_lowercase())
    }

    /// Like [`DeviceId::new`] but rejects blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let id = Self::new(raw);
        if id.0.is_empty() { None } else { Some(id) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        DeviceId::new(s)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!version().is_empty());
    }

    #[test]
    fn device_id_is_case_normalized() {
        assert_eq!(DeviceId::from("AA:BB:CC:DD:EE:01"), DeviceId::from(" aa:bb:cc:dd:ee:01 "));
        assert_eq!(DeviceId::from("AA:BB:CC:DD:EE:01").to_string(), "aa:bb:cc:dd:ee:01");
    }

    #[test]
    fn blank_device_id_is_rejected() {
        assert!(DeviceId::parse("   ").is_none());
        assert!(DeviceId::parse("aa:bb:cc:dd:ee:ff").is_some());
    }
}
