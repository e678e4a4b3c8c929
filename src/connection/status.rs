//! Connection status reporting
//!
//! The registry publishes every transition of a buffer's connection to a
//! [`StatusReporter`]. Editors typically render the label in a status bar.

use super::BufferId;
use std::fmt;

/// State of a buffer's connection slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No slot for the buffer
    Disconnected,
    /// Connect attempt in flight
    Connecting,
    /// Connected; carries the target label
    Connected(String),
    /// Last attempt failed; carries the target label
    Error(String),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected(_))
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
            ConnectionStatus::Connecting => write!(f, "Connecting..."),
            ConnectionStatus::Connected(label) => write!(f, "Connected to {}", label),
            ConnectionStatus::Error(label) => write!(f, "Error: could not connect to {}", label),
        }
    }
}

/// Receives connection status transitions.
///
/// Called from worker tasks with the registry lock held; implementations
/// must not block or call back into the registry.
pub trait StatusReporter: Send + Sync {
    fn report(&self, buffer: &BufferId, status: &ConnectionStatus);
}

/// Default reporter: emits transitions as tracing events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl StatusReporter for TracingReporter {
    fn report(&self, buffer: &BufferId, status: &ConnectionStatus) {
        match status {
            ConnectionStatus::Error(_) => tracing::warn!(%buffer, %status, "connection status"),
            _ => tracing::info!(%buffer, %status, "connection status"),
        }
    }
}
