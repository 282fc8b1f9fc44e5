//! Broker-to-object-store segment archiver.
//!
//! One router loop drains the broker and fans records out to per-stream
//! bounded queues. Each stream owns a local segment file; a rotation poller
//! seals the segment once it crosses a size threshold and hands it to a
//! fire-and-forget archive unit that compresses it, uploads it, and cleans
//! up local files on confirmed upload.
//!
//! Delivery contract: the broker commits offsets as a side effect of a
//! successful poll, before the record reaches stable storage. A crash
//! between poll and flush loses the in-flight records. This is a deliberate
//! at-most-once-after-ack trade-off; see [`router`].

pub mod archive;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod rotation;
pub mod router;
pub mod segment;
pub mod source;
pub mod store;

pub use archive::{ArchiveOptions, ArchivePipeline};
pub use config::{Config, StreamSpec};
pub use error::{Error, Result};
pub use pipeline::Pipeline;
pub use router::{Router, RouterStats};
pub use source::{Record, RecordSource};
pub use store::ObjectStore;
