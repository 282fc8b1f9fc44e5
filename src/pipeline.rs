//! Per-stream wiring and the whole-process facade.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, error, info};

use crate::archive::{ArchiveOptions, ArchivePipeline};
use crate::config::StreamSpec;
use crate::error::Result;
use crate::rotation::RotationController;
use crate::router::{Router, RouterStats};
use crate::segment::{ActiveSegment, SegmentWriter};
use crate::source::{Record, RecordSource};
use crate::store::ObjectStore;

/// One stream's drain task and rotation poller.
///
/// The drain thread is the sole writer to the stream's active segment; the
/// poller shares only the atomically swappable segment handle with it.
struct StreamWorker {
    name: String,
    controller: Arc<RotationController>,
    drain: JoinHandle<()>,
    poller: JoinHandle<()>,
}

impl StreamWorker {
    fn spawn(
        spec: StreamSpec,
        spool_dir: &Path,
        archive: ArchivePipeline,
        shutdown: Arc<AtomicBool>,
    ) -> Result<(SyncSender<Record>, Self)> {
        let dir = spool_dir.join(&spec.name);
        std::fs::create_dir_all(&dir)?;

        let writer = SegmentWriter::open(&dir, &spec.name, 0, spec.fsync_on_write)?;
        let active = ActiveSegment::new(writer);

        let controller = Arc::new(RotationController::new(
            spec.clone(),
            dir,
            active.clone(),
            archive,
        ));

        let (sender, receiver) = sync_channel::<Record>(spec.queue_capacity);

        let drain = {
            let active = active.clone();
            let name = spec.name.clone();
            std::thread::spawn(move || drain_loop(&name, receiver, active))
        };

        let poller = {
            let controller = Arc::clone(&controller);
            std::thread::spawn(move || controller.run_loop(&shutdown))
        };

        debug!("stream worker started for {}", spec.name);
        Ok((
            sender,
            Self {
                name: spec.name,
                controller,
                drain,
                poller,
            },
        ))
    }

    /// Join both threads, then archive whatever the final segment holds.
    /// Callers must have dropped the stream's sender and flagged shutdown.
    fn finish(self) {
        if self.drain.join().is_err() {
            error!("drain task for stream {} panicked", self.name);
        }
        if self.poller.join().is_err() {
            error!("rotation poller for stream {} panicked", self.name);
        }
        if let Err(err) = self.controller.seal_remainder() {
            error!("failed to seal final segment for stream {}: {err}", self.name);
        }
    }
}

/// Drains the bounded queue into the active segment, in arrival order.
/// Runs until the router drops the sending side.
fn drain_loop(stream: &str, receiver: Receiver<Record>, active: ActiveSegment) {
    for record in receiver {
        if let Err(err) = active.append(&record.payload) {
            // Record is already acked at the broker; it is lost. Keep
            // serving the queue so one bad write cannot wedge the stream.
            error!("segment write failed for stream {stream}: {err}");
        }
    }
    debug!("drain task for stream {stream} finished");
}

/// The assembled ingest-to-archive pipeline.
pub struct Pipeline {
    router: Router,
    workers: Vec<StreamWorker>,
    archive: ArchivePipeline,
    shutdown: Arc<AtomicBool>,
}

impl Pipeline {
    /// Wire up one worker per stream spec against a shared archive pipeline.
    pub fn build(
        specs: &[StreamSpec],
        spool_dir: impl Into<PathBuf>,
        options: ArchiveOptions,
        store: Arc<dyn ObjectStore>,
        poll_timeout: Duration,
    ) -> Result<Self> {
        let spool_dir = spool_dir.into();
        let archive = ArchivePipeline::new(store, options);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut router = Router::new(poll_timeout);
        let mut workers = Vec::with_capacity(specs.len());
        for spec in specs {
            let (sender, worker) = StreamWorker::spawn(
                spec.clone(),
                &spool_dir,
                archive.clone(),
                Arc::clone(&shutdown),
            )?;
            router.register(spec.name.clone(), sender);
            workers.push(worker);
        }

        info!("pipeline ready: {} stream(s)", workers.len());
        Ok(Self {
            router,
            workers,
            archive,
            shutdown,
        })
    }

    /// Flag observed by the router loop and the rotation pollers. Setting it
    /// makes [`run`](Self::run) return so [`shutdown`](Self::shutdown) can
    /// finish the job.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Run the router loop until the shutdown flag is set.
    pub fn run(&self, source: &mut dyn RecordSource) -> RouterStats {
        self.router.run(source, &self.shutdown)
    }

    /// Orderly teardown: stop the router and pollers, let the drain tasks
    /// flush their queues, archive final segments, and wait for in-flight
    /// archive units. A unit that fails leaves its files on disk.
    pub fn shutdown(self) -> Result<()> {
        self.shutdown.store(true, Ordering::Relaxed);
        // Dropping the router drops every stream sender, which ends the
        // drain loops once their queues are empty.
        drop(self.router);
        for worker in self.workers {
            worker.finish();
        }
        self.archive.drain();
        info!("pipeline shut down");
        Ok(())
    }
}
