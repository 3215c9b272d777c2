//! Transport boundary
//!
//! The session only needs "bytes out". Inbound bytes are pushed into the
//! session by whoever owns the link, so the trait has a single method.

use std::fmt;
use std::sync::{Arc, Mutex};

/// Failure reported by a transport collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub reason: String,
}

impl TransportError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport error: {}", self.reason)
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Outbound byte sink for one device link
pub trait Transport: Send {
    /// Send one complete frame
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).send_bytes(bytes)
    }
}

/// Recording transport for tests and the CLI
///
/// Clones share the same record, so a test can keep one handle while the
/// session owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Default)]
struct MockTransportInner {
    sent: Vec<Vec<u8>>,
    fail_with: Option<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames sent so far, in order
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.inner
            .lock()
            .map(|inner| inner.sent.clone())
            .unwrap_or_default()
    }

    /// Command byte of every frame sent so far
    pub fn sent_commands(&self) -> Vec<u8> {
        self.sent_frames()
            .iter()
            .filter_map(|frame| frame.get(1).copied())
            .collect()
    }

    pub fn clear_sent(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.sent.clear();
        }
    }

    /// Make every following send fail with `reason` (`None` to recover)
    pub fn set_failure(&self, reason: Option<&str>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_with = reason.map(str::to_string);
        }
    }
}

impl Transport for MockTransport {
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| TransportError::new("mock transport lock poisoned"))?;

        if let Some(reason) = &inner.fail_with {
            return Err(TransportError::new(reason.clone()));
        }
        inner.sent.push(bytes.to_vec());
        Ok(())
    }
}
