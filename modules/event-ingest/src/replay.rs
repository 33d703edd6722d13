//! Replays events recorded as JSON lines.

use crate::{closed_channel, EventSource, SourceItem};
use log::{info, warn};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use wifitrack_core::{EventSourceError, MalformedEvent, RawEvent};

/// Event source backed by a JSON-lines log (one [`RawEvent`] per line).
///
/// Everything is delivered on the first `listen`; afterwards the source is exhausted.
pub struct ReplaySource {
    path: Option<PathBuf>,
    pending: Option<Vec<SourceItem>>,
}

impl ReplaySource {
    /// Reads `path` lazily on the first `listen`.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        ReplaySource { path: Some(path.as_ref().to_path_buf()), pending: None }
    }

    pub fn from_reader<R: BufRead>(reader: R) -> std::io::Result<Self> {
        Ok(ReplaySource { path: None, pending: Some(parse_lines(reader)?) })
    }
}

/// Parse every non-blank, non-comment line. Bad lines become [`MalformedEvent`]s.
pub fn parse_lines<R: BufRead>(reader: R) -> std::io::Result<Vec<SourceItem>> {
    let mut items = Vec::new();
    // Split on raw bytes so one undecodable line is dropped instead of failing the file.
    for (n, line) in reader.split(b'\n').enumerate() {
        let line = match String::from_utf8(line?) {
            Ok(line) => line,
            Err(_) => {
                items.push(Err(MalformedEvent::new(format!("line {}: invalid UTF-8", n + 1))));
                continue;
            }
        };
        let l = line.trim();
        if l.is_empty() || l.starts_with('#') { continue; }
        let item = match serde_json::from_str::<RawEvent>(l) {
            Ok(raw) => raw.validate(),
            Err(e) => Err(MalformedEvent::new(format!("line {}: {}", n + 1, e))),
        };
        items.push(item);
    }
    Ok(items)
}

impl EventSource for ReplaySource {
    fn listen(&mut self, interface: &str) -> Result<mpsc::Receiver<SourceItem>, EventSourceError> {
        if let Some(path) = self.path.take() {
            let fh = File::open(&path)
                .map_err(|e| EventSourceError::unavailable(interface, format!("{}: {}", path.display(), e)))?;
            let items = parse_lines(BufReader::new(fh))?;
            info!("replaying {} events from {}", items.len(), path.display());
            self.pending = Some(items);
        }
        let Some(items) = self.pending.take() else {
            return Ok(closed_channel());
        };
        let (tx, rx) = mpsc::channel(items.len().max(1));
        for item in items {
            if tx.try_send(item).is_err() {
                warn!("replay channel full; remaining events discarded");
                break;
            }
        }
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use wifitrack_core::NetworkEvent;

    const LOG: &str = r#"
# captured on en2
{"kind":"arp","device":"AA:BB:CC:DD:EE:01","at":"2024-05-01T10:00:00Z"}
{"kind":"tcp","device":"aa:bb:cc:dd:ee:01","port":80,"at":"2024-05-01T10:00:02Z"}
not json at all
{"kind":"arp","at":"2024-05-01T10:00:03Z"}
{"kind":"arp","device":"aa:bb:cc:dd:ee:01","at":"2024-05-01T10:00:05Z"}
"#;

    #[test]
    fn parse_keeps_order_and_flags_bad_lines() {
        let items = parse_lines(Cursor::new(LOG)).unwrap();
        assert_eq!(items.len(), 5);
        assert!(matches!(items[0], Ok(NetworkEvent::AddressAnnouncement { .. })));
        assert!(matches!(items[1], Ok(NetworkEvent::ConnectionAttempt { destination_port: 80, .. })));
        assert!(items[2].as_ref().unwrap_err().reason.starts_with("line 5"));
        assert!(items[3].is_err());
        assert!(items[4].is_ok());
    }

    #[test]
    fn invalid_utf8_line_is_malformed_not_fatal() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"{\"kind\":\"arp\",\"device\":\"aa\",\"at\":\"2024-05-01T10:00:00Z\"}\n");
        bytes.extend_from_slice(b"\xff\xfe garbage\r\n");
        bytes.extend_from_slice(b"{\"kind\":\"arp\",\"device\":\"aa\",\"at\":\"2024-05-01T10:00:01Z\"}");
        let items = parse_lines(Cursor::new(bytes)).unwrap();
        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok());
        assert_eq!(items[1].as_ref().unwrap_err().reason, "line 2: invalid UTF-8");
        assert!(items[2].is_ok());
    }

    #[tokio::test]
    async fn delivers_once_then_exhausted() {
        let mut src = ReplaySource::from_reader(Cursor::new(LOG)).unwrap();
        let mut rx = src.listen("en2").unwrap();
        let mut n = 0;
        while rx.recv().await.is_some() { n += 1; }
        assert_eq!(n, 5);
        let mut again = src.listen("en2").unwrap();
        assert!(again.recv().await.is_none());
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut src = ReplaySource::from_path(dir.path().join("nope.jsonl"));
        match src.listen("en2") {
            Err(EventSourceError::Unavailable { interface, .. }) => assert_eq!(interface, "en2"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn file_with_undecodable_line_still_opens() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"\xc3\x28\n{\"kind\":\"arp\",\"device\":\"aa\",\"at\":\"2024-05-01T10:00:00Z\"}\n").unwrap();
        let mut src = ReplaySource::from_path(f.path());
        let mut rx = src.listen("en2").unwrap();
        assert!(matches!(rx.recv().await, Some(Err(_))));
        assert!(matches!(rx.recv().await, Some(Ok(NetworkEvent::AddressAnnouncement { .. }))));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn reads_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{}", LOG).unwrap();
        let mut src = ReplaySource::from_path(f.path());
        let mut rx = src.listen("en2").unwrap();
        assert!(matches!(rx.recv().await, Some(Ok(NetworkEvent::AddressAnnouncement { .. }))));
    }
}
