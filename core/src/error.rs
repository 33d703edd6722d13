use thiserror::Error;

/// The event source could not deliver events.
///
/// Fatal when it happens before the first cycle; skipped and logged afterwards.
#[derive(Debug, Error)]
pub enum EventSourceError {
    #[error("interface {interface} unavailable: {reason}")]
    Unavailable { interface: String, reason: String },
    #[error("event source I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EventSourceError {
    pub fn unavailable(interface: &str, reason: impl Into<String>) -> Self {
        EventSourceError::Unavailable { interface: interface.to_string(), reason: reason.into() }
    }
}

/// An observation that is missing a field the tracker needs. Dropped and counted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed event: {reason}")]
pub struct MalformedEvent {
    pub reason: String,
}

impl MalformedEvent {
    pub fn new(reason: impl Into<String>) -> Self {
        MalformedEvent { reason: reason.into() }
    }
}
