//! Diagnostics sink for check results
//!
//! Every `(permission, result)` pair a calculator returns is handed to the
//! sink. Sinks must never block the check path; the channel sink drops
//! records when its buffer is full.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

use permweave_core::{HolderId, QueryOptions};

use super::TristateResult;

/// A single completed permission check
#[derive(Debug, Clone)]
pub struct CheckRecord {
    pub holder: HolderId,
    pub query: QueryOptions,
    pub permission: String,
    pub result: TristateResult,
    pub checked_at: DateTime<Utc>,
}

/// Receives check records
pub trait DiagnosticsSink: Send + Sync {
    fn record(&self, record: CheckRecord);
}

/// Sink that forwards records over a bounded channel
#[derive(Debug)]
pub struct ChannelDiagnosticsSink {
    sender: mpsc::Sender<CheckRecord>,
    dropped: AtomicU64,
}

impl ChannelDiagnosticsSink {
    /// Creates the sink and the receiving end of its channel
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<CheckRecord>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let sink = Self {
            sender,
            dropped: AtomicU64::new(0),
        };
        (sink, receiver)
    }

    /// Records discarded because the channel was full or closed
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl DiagnosticsSink for ChannelDiagnosticsSink {
    fn record(&self, record: CheckRecord) {
        match self.sender.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                trace!("Diagnostics channel full, dropping check of {}", record.permission);
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
