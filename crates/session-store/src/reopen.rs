use crate::{SessionStore, StoreError, StoredSession};
use log::{info, warn};
use wifitrack_core::{DeviceId, SessionRecord};

type Opener = Box<dyn FnMut() -> Result<Box<dyn SessionStore>, StoreError> + Send>;

/// A store that could not be opened yet. Each flush retries the open before writing.
pub struct ReopeningStore {
    open: Opener,
    inner: Option<Box<dyn SessionStore>>,
    label: String,
}

impl ReopeningStore {
    /// Try `open` once now; a failure is logged and left for the next flush.
    pub fn new<F>(label: impl Into<String>, open: F) -> Self
    where
        F: FnMut() -> Result<Box<dyn SessionStore>, StoreError> + Send + 'static,
    {
        let mut store = ReopeningStore { open: Box::new(open), inner: None, label: label.into() };
        if let Err(e) = store.ensure_open() {
            warn!("session store {} unavailable, will retry on flush: {}", store.label, e);
        }
        store
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    fn ensure_open(&mut self) -> Result<&mut Box<dyn SessionStore>, StoreError> {
        if self.inner.is_none() {
            let opened = (self.open)()?;
            info!("session store {} opened", self.label);
            self.inner = Some(opened);
        }
        self.inner.as_mut().ok_or_else(|| StoreError::Backend(format!("{} not open", self.label)))
    }
}

impl SessionStore for ReopeningStore {
    fn flush(&mut self, snapshot: &[(DeviceId, SessionRecord)]) -> Result<(), StoreError> {
        self.ensure_open()?.flush(snapshot)
    }

    fn load(&self) -> Result<Vec<StoredSession>, StoreError> {
        match &self.inner {
            Some(s) => s.load(),
            None => Err(StoreError::Backend(format!("{} not open", self.label))),
        }
    }
}
