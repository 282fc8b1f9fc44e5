//! Broker-to-stream dispatch loop.
//!
//! The router is the only consumer of the broker. Offsets advance when a
//! record is polled, before its bytes are durable on disk; a crash between
//! poll and flush loses those records. That at-most-once-after-ack gap is
//! the documented trade-off of this design.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::time::Duration;

use log::{error, warn};

use crate::source::{Record, RecordSource};

/// Counters for one router run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RouterStats {
    /// Records handed to a stream queue.
    pub delivered: u64,
    /// Records for streams with no registered queue, dropped.
    pub dropped: u64,
    /// Transient broker errors, logged and skipped.
    pub transport_errors: u64,
}

pub struct Router {
    routes: HashMap<String, SyncSender<Record>>,
    poll_timeout: Duration,
}

impl Router {
    pub fn new(poll_timeout: Duration) -> Self {
        Self {
            routes: HashMap::new(),
            poll_timeout,
        }
    }

    /// Register the bounded queue for a stream. Called once per configured
    /// stream at startup; the route table is fixed afterward.
    pub fn register(&mut self, stream: impl Into<String>, sender: SyncSender<Record>) {
        self.routes.insert(stream.into(), sender);
    }

    /// Consume records until `shutdown` is flagged.
    ///
    /// Enqueueing blocks when a stream's queue is full; that is the system's
    /// single backpressure point. An unknown stream is an operational
    /// anomaly, not a fatal error, and so is a transport error.
    pub fn run(&self, source: &mut dyn RecordSource, shutdown: &AtomicBool) -> RouterStats {
        let mut stats = RouterStats::default();

        while !shutdown.load(Ordering::Relaxed) {
            match source.poll(self.poll_timeout) {
                Ok(Some(record)) => self.dispatch(record, &mut stats),
                Ok(None) => {}
                Err(err) => {
                    error!("broker poll failed: {err}");
                    stats.transport_errors += 1;
                }
            }
        }
        stats
    }

    fn dispatch(&self, record: Record, stats: &mut RouterStats) {
        match self.routes.get(&record.stream) {
            Some(sender) => {
                let stream = record.stream.clone();
                if sender.send(record).is_err() {
                    // Drain task gone; treat like an unroutable record.
                    error!("stream {stream} queue receiver is gone, dropping record");
                    stats.dropped += 1;
                } else {
                    stats.delivered += 1;
                }
            }
            None => {
                warn!(
                    "dropping record for unregistered stream {} ({} bytes)",
                    record.stream,
                    record.payload.len()
                );
                stats.dropped += 1;
            }
        }
    }
}
