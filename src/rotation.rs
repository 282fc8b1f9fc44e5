//! Size-triggered segment rotation.
//!
//! One controller per stream watches the active segment and, once the
//! threshold is crossed, swaps in a fresh segment and hands the sealed one
//! to the archive pipeline. The swap happens under the writer mutex, so a
//! concurrent append lands wholly in one segment or the other.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use log::{debug, error};

use crate::archive::ArchivePipeline;
use crate::config::StreamSpec;
use crate::error::Result;
use crate::segment::{ActiveSegment, SegmentWriter};

pub struct RotationController {
    spec: StreamSpec,
    dir: PathBuf,
    active: ActiveSegment,
    next_seq: AtomicU64,
    archive: ArchivePipeline,
}

impl RotationController {
    pub fn new(
        spec: StreamSpec,
        dir: PathBuf,
        active: ActiveSegment,
        archive: ArchivePipeline,
    ) -> Self {
        Self {
            spec,
            dir,
            active,
            // Sequence 0 is the initial segment opened by the pipeline.
            next_seq: AtomicU64::new(1),
            archive,
        }
    }

    /// One watch cycle: rotate if the active segment crossed the threshold.
    /// Returns whether a rotation happened.
    pub fn run_once(&self) -> Result<bool> {
        if self.active.size() < self.spec.threshold_bytes {
            return Ok(false);
        }
        self.rotate()?;
        Ok(true)
    }

    /// Fixed-interval poller, runs until `shutdown` is flagged. A failed
    /// cycle is logged and the next interval tries again; one stream's disk
    /// trouble never stops the process.
    pub fn run_loop(&self, shutdown: &AtomicBool) {
        debug!("rotation poller started for stream {}", self.spec.name);
        while !shutdown.load(Ordering::Relaxed) {
            if let Err(err) = self.run_once() {
                error!("rotation failed for stream {}: {err}", self.spec.name);
            }
            std::thread::sleep(self.spec.poll_interval);
        }
    }

    /// Detach the active segment and submit it for archiving.
    ///
    /// The fresh segment is created before the swap; if creation fails the
    /// current segment stays active and keeps accepting writes.
    pub fn rotate(&self) -> Result<()> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let fresh = SegmentWriter::open(&self.dir, &self.spec.name, seq, self.spec.fsync_on_write)?;

        let Some(old) = self.active.replace(fresh) else {
            return Ok(());
        };
        debug!(
            "rotating stream {}: {} ({} bytes)",
            self.spec.name,
            old.path().display(),
            old.size()
        );

        let rotated = old.seal()?;
        self.archive.submit(rotated);
        Ok(())
    }

    /// Shutdown path: archive a non-empty active segment regardless of
    /// threshold, discard an empty one. Closes the stream for writes.
    pub fn seal_remainder(&self) -> Result<()> {
        let Some(writer) = self.active.close() else {
            return Ok(());
        };
        if writer.size() == 0 {
            writer.discard();
            return Ok(());
        }
        let rotated = writer.seal()?;
        self.archive.submit(rotated);
        Ok(())
    }
}
