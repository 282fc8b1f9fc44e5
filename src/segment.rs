//! Segment files and the per-stream active-segment handle.
//!
//! A segment is owned by exactly one component at any instant: the active
//! writer, the rotation controller during a swap, or an archive unit after
//! rotation. Ownership transfers, never shares.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use log::warn;

use crate::error::{Error, Result};

/// Open segment file accumulating one stream's records.
pub struct SegmentWriter {
    stream: String,
    path: PathBuf,
    file: File,
    size: u64,
    fsync_on_write: bool,
}

impl SegmentWriter {
    /// Create a fresh empty segment for `stream` under `dir`.
    ///
    /// Filenames combine the stream name, creation time, and a per-stream
    /// sequence number so rotations never collide.
    pub fn open(dir: &Path, stream: &str, seq: u64, fsync_on_write: bool) -> Result<Self> {
        let path = dir.join(segment_file_name(stream, now_ms(), seq));
        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)?;
        Ok(Self {
            stream: stream.to_string(),
            path,
            file,
            size: 0,
            fsync_on_write,
        })
    }

    /// Append raw record bytes and advance the running size counter.
    ///
    /// On failure the segment is left in whatever partial state the
    /// underlying write achieved; no repair is attempted here.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.file.write_all(bytes)?;
        if self.fsync_on_write {
            self.file.sync_data()?;
        }
        self.size += bytes.len() as u64;
        Ok(())
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush to stable storage and seal. The segment is never reopened for
    /// writing afterward.
    pub fn seal(mut self) -> Result<RotatedSegment> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(RotatedSegment {
            stream: self.stream,
            path: self.path,
            size: self.size,
        })
    }

    /// Drop an empty segment, removing its file. Used at shutdown for the
    /// fresh segment nothing was ever written to.
    pub fn discard(self) {
        let path = self.path.clone();
        drop(self.file);
        if let Err(err) = std::fs::remove_file(&path) {
            warn!("failed to remove empty segment {}: {err}", path.display());
        }
    }
}

/// A sealed segment, handed off to the archive pipeline.
#[derive(Debug)]
pub struct RotatedSegment {
    pub stream: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Shared handle to a stream's one active segment.
///
/// Writes and the rotation swap go through the same mutex, so a write lands
/// fully in the old segment or fully in the new one, never split, and the
/// poller never observes a half-installed swap.
#[derive(Clone)]
pub struct ActiveSegment {
    slot: Arc<Mutex<Option<SegmentWriter>>>,
}

impl ActiveSegment {
    pub fn new(writer: SegmentWriter) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(writer))),
        }
    }

    /// Append through the shared handle. Exactly one drain task calls this
    /// per stream; the mutex exists for the rotation swap, not for writer
    /// concurrency.
    pub fn append(&self, bytes: &[u8]) -> Result<()> {
        let mut slot = self.lock();
        match slot.as_mut() {
            Some(writer) => writer.append(bytes),
            None => Err(Error::SegmentClosed),
        }
    }

    /// Current size of the active segment, or zero once closed.
    pub fn size(&self) -> u64 {
        self.lock().as_ref().map(SegmentWriter::size).unwrap_or(0)
    }

    /// Atomically install `fresh` and return the previous active segment.
    ///
    /// If the stream is already closed the fresh segment is discarded and
    /// `None` is returned.
    pub fn replace(&self, fresh: SegmentWriter) -> Option<SegmentWriter> {
        let mut slot = self.lock();
        match slot.take() {
            Some(old) => {
                *slot = Some(fresh);
                Some(old)
            }
            None => {
                drop(slot);
                fresh.discard();
                None
            }
        }
    }

    /// Take the active segment out, closing the stream for writes.
    pub fn close(&self) -> Option<SegmentWriter> {
        self.lock().take()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<SegmentWriter>> {
        self.slot.lock().expect("active segment lock poisoned")
    }
}

pub(crate) fn segment_file_name(stream: &str, created_ms: u64, seq: u64) -> String {
    format!("{stream}-{created_ms:013}-{seq:06}.seg")
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
