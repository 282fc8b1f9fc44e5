//! Finalize-compress-upload-cleanup units for rotated segments.
//!
//! Each rotated segment becomes one independent unit of work: gzip the
//! segment, upload the artifact under its deterministic key, then delete
//! local files. A failed unit logs, stops, and leaves everything it had on
//! disk for operator inspection or manual retry; no automatic retry.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::segment::RotatedSegment;
use crate::store::ObjectStore;

/// Archive policy knobs.
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Key prefix inside the bucket; empty means keys start at the stream name.
    pub prefix: String,
    /// Keep the raw rotated segment on disk after a confirmed upload.
    pub retain_raw: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            retain_raw: false,
        }
    }
}

/// Spawns and tracks finalize units. One instance serves every stream; the
/// units themselves are independent, so a stuck upload for one stream never
/// delays another. Cloning yields another handle to the same pipeline.
#[derive(Clone)]
pub struct ArchivePipeline {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn ObjectStore>,
    options: ArchiveOptions,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ArchivePipeline {
    pub fn new(store: Arc<dyn ObjectStore>, options: ArchiveOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                options,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Hand off a rotated segment as a fire-and-forget unit.
    pub fn submit(&self, segment: RotatedSegment) {
        let inner = Arc::clone(&self.inner);
        let handle = std::thread::spawn(move || {
            if let Err(err) = inner.finalize(&segment) {
                error!(
                    "archive unit failed for {} ({err}); local files retained",
                    segment.path.display()
                );
            }
        });

        let mut tasks = self.inner.tasks.lock().expect("archive task list poisoned");
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    /// Wait for every in-flight unit. Called at shutdown; a unit that fails
    /// leaves its files behind for recovery on restart.
    pub fn drain(&self) {
        let handles: Vec<_> = {
            let mut tasks = self.inner.tasks.lock().expect("archive task list poisoned");
            tasks.drain(..).collect()
        };
        for handle in handles {
            if handle.join().is_err() {
                error!("archive unit panicked");
            }
        }
    }
}

impl Inner {
    fn finalize(&self, segment: &RotatedSegment) -> Result<()> {
        debug!(
            "finalizing segment {} ({} bytes)",
            segment.path.display(),
            segment.size
        );

        let artifact = compress_artifact(&segment.path)?;
        let key = object_key(&self.options.prefix, &segment.stream, &artifact)?;

        self.store.put(&key, &artifact)?;
        info!("archived {} as {key}", segment.path.display());

        // Local cleanup only after the upload call returned success.
        std::fs::remove_file(&artifact)?;
        if !self.options.retain_raw {
            if let Err(err) = std::fs::remove_file(&segment.path) {
                warn!(
                    "failed to remove raw segment {}: {err}",
                    segment.path.display()
                );
            }
        }
        Ok(())
    }
}

/// Gzip `src` next to itself, publishing via temp file and rename so a
/// half-written artifact is never picked up under the final name. The raw
/// segment is left untouched.
pub fn compress_artifact(src: &Path) -> Result<PathBuf> {
    let dest = src.with_extension("seg.gz");
    let tmp = src.with_extension("seg.gz.tmp");
    let _ = std::fs::remove_file(&tmp);

    let mut input = File::open(src)?;
    let output = File::create(&tmp)?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    std::io::copy(&mut input, &mut encoder)?;
    encoder.finish()?.sync_all()?;

    std::fs::rename(&tmp, &dest)?;
    Ok(dest)
}

fn object_key(prefix: &str, stream: &str, artifact: &Path) -> Result<String> {
    let name = artifact
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::Upload(format!("artifact has no name: {}", artifact.display())))?;
    if prefix.is_empty() {
        Ok(format!("{stream}/{name}"))
    } else {
        Ok(format!("{prefix}/{stream}/{name}"))
    }
}
