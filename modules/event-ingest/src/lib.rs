//! Bounded-window ingestion of observed network events into the session table.

use log::debug;
use service_classifier::ServicePortTable;
use session_table::{Renewal, SessionTable};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use wifitrack_core::{EventSourceError, MalformedEvent, NetworkEvent};

#[cfg(feature = "capture")]
pub mod capture;
pub mod replay;

#[cfg(feature = "capture")]
pub use capture::LinkCapture;
pub use replay::ReplaySource;

/// What a source hands over: a decoded event, or the reason a frame/line could not be decoded.
pub type SourceItem = Result<NetworkEvent, MalformedEvent>;

/// Something that observes the network and delivers events over a channel.
///
/// The returned receiver closing means the source is exhausted (or its capture stopped);
/// callers may `listen` again to resume.
pub trait EventSource: Send {
    fn listen(&mut self, interface: &str) -> Result<mpsc::Receiver<SourceItem>, EventSourceError>;
}

/// Hands out a caller-supplied channel once; later calls yield an already-closed channel.
pub struct ChannelSource {
    rx: Option<mpsc::Receiver<SourceItem>>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<SourceItem>) -> Self {
        ChannelSource { rx: Some(rx) }
    }
}

impl EventSource for ChannelSource {
    fn listen(&mut self, _interface: &str) -> Result<mpsc::Receiver<SourceItem>, EventSourceError> {
        Ok(self.rx.take().unwrap_or_else(closed_channel))
    }
}

pub(crate) fn closed_channel() -> mpsc::Receiver<SourceItem> {
    let (_, rx) = mpsc::channel(1);
    rx
}

/// Counters for one ingestion window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub announcements: usize,
    pub connections: usize,
    /// Connection attempts from devices without a session yet.
    pub dropped_usage: usize,
    pub malformed: usize,
    /// Renewals older than the device's last activity.
    pub out_of_order: usize,
    /// The channel closed before the window elapsed.
    pub exhausted: bool,
}

impl IngestStats {
    pub fn merge(&mut self, other: &IngestStats) {
        self.announcements += other.announcements;
        self.connections += other.connections;
        self.dropped_usage += other.dropped_usage;
        self.malformed += other.malformed;
        self.out_of_order += other.out_of_order;
        self.exhausted |= other.exhausted;
    }
}

/// Apply one event to the table.
pub fn apply(event: NetworkEvent, table: &SessionTable, classifier: &ServicePortTable, stats: &mut IngestStats) {
    match event {
        NetworkEvent::AddressAnnouncement { device, at } => {
            stats.announcements += 1;
            if table.record_renewal(&device, at) == Renewal::Clamped {
                stats.out_of_order += 1;
            }
        }
        NetworkEvent::ConnectionAttempt { source, destination_port, .. } => {
            stats.connections += 1;
            if !table.record_service_usage(&source, classifier.classify(destination_port)) {
                stats.dropped_usage += 1;
            }
        }
    }
}

/// Consume events from `rx` until `window` elapses or the channel closes.
///
/// Can be called repeatedly on the same table to accumulate across cycles.
pub async fn ingest(
    rx: &mut mpsc::Receiver<SourceItem>,
    window: Duration,
    table: &SessionTable,
    classifier: &ServicePortTable,
) -> IngestStats {
    let deadline = Instant::now() + window;
    let mut stats = IngestStats::default();
    loop {
        match timeout_at(deadline, rx.recv()).await {
            Ok(Some(Ok(event))) => apply(event, table, classifier, &mut stats),
            Ok(Some(Err(bad))) => {
                debug!("dropping event: {}", bad);
                stats.malformed += 1;
            }
            Ok(None) => {
                stats.exhausted = true;
                break;
            }
            Err(_) => break,
        }
    }
    debug!("ingest window closed: {:?}", stats);
    stats
}
