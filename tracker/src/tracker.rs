//! The refresh loop: ingest a window, flush, render, repeat.

use crate::render::{project, render_snapshot, DeviceRow, PresentationSink};
use device_directory::Directory;
use event_ingest::{ingest, EventSource, IngestStats, SourceItem};
use log::{debug, info, warn};
use service_classifier::ServicePortTable;
use session_store::SessionStore;
use session_table::SessionTable;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use wifitrack_core::{Cancellation, EventSourceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    /// One-shot tracking finished.
    Stopped,
    /// Live mode ended on a cancellation request.
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
pub struct LiveSettings {
    /// Time between the starts of consecutive cycles.
    pub refresh: Duration,
    /// How long each cycle listens for events.
    pub window: Duration,
}

pub struct Tracker {
    source: Box<dyn EventSource>,
    store: Box<dyn SessionStore>,
    table: SessionTable,
    classifier: ServicePortTable,
    directory: Directory,
    interface: String,
    state: LoopState,
}

impl Tracker {
    pub fn new(
        source: Box<dyn EventSource>,
        store: Box<dyn SessionStore>,
        classifier: ServicePortTable,
        directory: Directory,
        interface: impl Into<String>,
    ) -> Self {
        Tracker {
            source,
            store,
            table: SessionTable::new(),
            classifier,
            directory,
            interface: interface.into(),
            state: LoopState::Idle,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Current sessions joined with directory metadata.
    pub fn rows(&self) -> Vec<DeviceRow> {
        project(&self.table.snapshot(), |id| self.directory.resolve(id))
    }

    // Failures are logged; the next flush rewrites the full snapshot anyway.
    fn flush(&mut self) {
        let snapshot = self.table.snapshot();
        if let Err(e) = self.store.flush(&snapshot) {
            warn!("session flush failed, keeping in-memory state: {}", e);
        }
    }

    fn log_window(stats: &IngestStats) {
        if stats.malformed > 0 {
            warn!("dropped {} malformed events", stats.malformed);
        }
        if stats.dropped_usage > 0 {
            debug!("ignored {} connections from devices without a session", stats.dropped_usage);
        }
        if stats.out_of_order > 0 {
            debug!("{} renewals arrived out of order", stats.out_of_order);
        }
    }

    /// Listen once for `window`, flush once, and stop.
    ///
    /// Fails only when the event source cannot be opened.
    pub async fn track_once(&mut self, window: Duration) -> Result<IngestStats, EventSourceError> {
        let mut rx = self.source.listen(&self.interface)?;
        info!("tracking on {} for {:?}", self.interface, window);
        let stats = ingest(&mut rx, window, &self.table, &self.classifier).await;
        Self::log_window(&stats);
        self.flush();
        self.state = LoopState::Stopped;
        info!("tracked {} devices", self.table.len());
        Ok(stats)
    }

    /// Refresh until `cancel` fires or the sink asks to quit.
    ///
    /// The source is opened before the first cycle and a failure there is returned.
    /// Later failures skip the cycle.
    pub async fn run_live(
        &mut self,
        sink: &mut dyn PresentationSink,
        settings: LiveSettings,
        cancel: &Cancellation,
    ) -> Result<IngestStats, EventSourceError> {
        let mut rx: Option<mpsc::Receiver<SourceItem>> = Some(self.source.listen(&self.interface)?);
        self.state = LoopState::Running;
        info!("live view on {} every {:?}", self.interface, settings.refresh);

        let mut ticker = interval(settings.refresh);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut total = IngestStats::default();
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancel.cancelled() => {}
            }
            if cancel.is_cancelled() {
                break;
            }

            if rx.is_none() {
                match self.source.listen(&self.interface) {
                    Ok(r) => rx = Some(r),
                    Err(e) => warn!("skipping cycle: {}", e),
                }
            }
            if let Some(r) = rx.as_mut() {
                let stats = ingest(r, settings.window, &self.table, &self.classifier).await;
                Self::log_window(&stats);
                if stats.exhausted {
                    rx = None;
                }
                total.merge(&stats);
            }

            self.flush();
            let snapshot = self.table.snapshot();
            if let Err(e) = render_snapshot(sink, &snapshot, |id| self.directory.resolve(id)) {
                warn!("render failed: {}", e);
            }
            if sink.quit_requested() {
                info!("quit requested");
                cancel.cancel();
            }
        }
        self.state = LoopState::Cancelled;
        Ok(total)
    }
}
