// Connection state tracking for the cache store
// Author: kelexine (https://github.com/kelexine)
//
// The store's reachability is a single shared flag. It only changes through
// `ConnectionEvent`s; warnings for repeated identical errors are suppressed so
// an outage produces one warning instead of one per request.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Lifecycle events reported by the store supervisor or by failed operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A connection attempt has started
    Connect,
    /// The store answered and is usable
    Ready,
    /// The store failed; carries the error message
    Error(String),
    /// The connection was closed for good
    End,
}

#[derive(Debug, Default)]
pub struct ConnectionState {
    connected: AtomicBool,
    last_warning: Mutex<Option<String>>,
    suppressed: AtomicU64,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Number of error events that were logged at debug instead of warn
    pub fn suppressed_warnings(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }

    /// Apply an event. Returns `true` when it logged a warning.
    pub fn handle(&self, event: ConnectionEvent) -> bool {
        match event {
            ConnectionEvent::Connect => {
                debug!("Connecting to cache store");
                false
            }
            ConnectionEvent::Ready => {
                let was_connected = self.connected.swap(true, Ordering::AcqRel);
                *self.last_warning.lock() = None;
                if !was_connected {
                    info!("Cache store connected");
                }
                false
            }
            ConnectionEvent::Error(message) => {
                self.connected.store(false, Ordering::Release);
                let mut last = self.last_warning.lock();
                if last.as_deref() == Some(message.as_str()) {
                    self.suppressed.fetch_add(1, Ordering::Relaxed);
                    debug!("Cache store error (repeated): {}", message);
                    false
                } else {
                    warn!("Cache store unavailable, continuing without cache: {}", message);
                    *last = Some(message);
                    true
                }
            }
            ConnectionEvent::End => {
                let was_connected = self.connected.swap(false, Ordering::AcqRel);
                if was_connected {
                    info!("Cache store connection closed");
                }
                false
            }
        }
    }
}
