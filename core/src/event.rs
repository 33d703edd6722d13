//! Observed network events and their loosely-typed wire form.

use crate::{DeviceId, MalformedEvent, Timestamp};
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// ARP announcement; establishes or renews the sender's session.
    AddressAnnouncement { device: DeviceId, at: Timestamp },
    /// TCP connection attempt from a device towards `destination_port`.
    ConnectionAttempt { source: DeviceId, destination_port: u16, at: Timestamp },
}

impl NetworkEvent {
    pub fn at(&self) -> Timestamp {
        match self {
            NetworkEvent::AddressAnnouncement { at, .. } => *at,
            NetworkEvent::ConnectionAttempt { at, .. } => *at,
        }
    }

    pub fn device(&self) -> &DeviceId {
        match self {
            NetworkEvent::AddressAnnouncement { device, .. } => device,
            NetworkEvent::ConnectionAttempt { source, .. } => source,
        }
    }
}

/// One event as read from a JSON-lines capture log, e.g.
/// `{"kind":"tcp","device":"aa:bb:cc:dd:ee:01","port":443,"at":"2024-05-01T10:00:02Z"}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEvent {
    pub kind: Option<String>,
    #[serde(alias = "mac")]
    pub device: Option<String>,
    pub port: Option<u16>,
    #[serde(alias = "timestamp")]
    pub at: Option<String>,
}

impl RawEvent {
    pub fn validate(self) -> Result<NetworkEvent, MalformedEvent> {
        let kind = self
            .kind
            .as_deref()
            .map(|k| k.trim().to_ascii_lowercase())
            .ok_or_else(|| MalformedEvent::new("missing kind"))?;
        let device = self
            .device
            .as_deref()
            .and_then(DeviceId::parse)
            .ok_or_else(|| MalformedEvent::new("missing device address"))?;
        let at = match self.at.as_deref() {
            Some(s) => Timestamp::parse(s.trim(), &Rfc3339)
                .map_err(|e| MalformedEvent::new(format!("bad timestamp {:?}: {}", s, e)))?,
            None => return Err(MalformedEvent::new("missing timestamp")),
        };
        match kind.as_str() {
            "arp" | "announcement" => Ok(NetworkEvent::AddressAnnouncement { device, at }),
            "tcp" | "connection" => {
                let port = self.port.ok_or_else(|| MalformedEvent::new("connection without destination port"))?;
                Ok(NetworkEvent::ConnectionAttempt { source: device, destination_port: port, at })
            }
            other => Err(MalformedEvent::new(format!("unknown event kind {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(line: &str) -> RawEvent {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn announcement_parses() {
        let ev = raw(r#"{"kind":"arp","device":"AA:BB:CC:DD:EE:01","at":"1970-01-01T00:00:05Z"}"#).validate().unwrap();
        match ev {
            NetworkEvent::AddressAnnouncement { device, at } => {
                assert_eq!(device.as_str(), "aa:bb:cc:dd:ee:01");
                assert_eq!(at.unix_timestamp(), 5);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn connection_parses_with_aliases() {
        let ev = raw(r#"{"kind":"TCP","mac":"aa:bb:cc:dd:ee:01","port":443,"timestamp":"1970-01-01T00:00:02Z"}"#)
            .validate()
            .unwrap();
        assert_eq!(
            ev,
            NetworkEvent::ConnectionAttempt {
                source: DeviceId::from("aa:bb:cc:dd:ee:01"),
                destination_port: 443,
                at: Timestamp::from_unix_timestamp(2).unwrap(),
            }
        );
    }

    #[test]
    fn missing_fields_are_malformed() {
        assert!(raw(r#"{"device":"aa","at":"1970-01-01T00:00:00Z"}"#).validate().is_err());
        assert!(raw(r#"{"kind":"arp","at":"1970-01-01T00:00:00Z"}"#).validate().is_err());
        assert!(raw(r#"{"kind":"arp","device":"aa"}"#).validate().is_err());
        assert!(raw(r#"{"kind":"tcp","device":"aa","at":"1970-01-01T00:00:00Z"}"#).validate().is_err());
        assert!(raw(r#"{"kind":"udp","device":"aa","port":53,"at":"1970-01-01T00:00:00Z"}"#).validate().is_err());
        assert!(raw(r#"{"kind":"arp","device":"aa","at":"yesterday"}"#).validate().is_err());
    }
}
