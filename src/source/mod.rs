//! Broker collaborators.

use std::time::Duration;

use crate::error::Result;

#[cfg(feature = "kafka")]
pub mod kafka;

#[cfg(feature = "kafka")]
pub use kafka::KafkaSource;

/// An opaque payload plus its owning stream. Consumed exactly once by the
/// router; not retained after being appended to a segment.
#[derive(Debug, Clone)]
pub struct Record {
    pub stream: String,
    pub payload: Vec<u8>,
}

/// Ordered record source under a consumer group.
///
/// A successful poll also performs the broker's own acknowledgment (offset
/// commit) as a side effect, so a record returned here is already acked
/// before it reaches disk.
pub trait RecordSource {
    /// Block up to `timeout` for the next record. `Ok(None)` means nothing
    /// was available; `Err` is a transport error the caller may retry.
    fn poll(&mut self, timeout: Duration) -> Result<Option<Record>>;
}
