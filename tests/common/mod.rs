#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use flate2::read::GzDecoder;
use granary::error::Error;
use granary::source::{Record, RecordSource};
use granary::store::ObjectStore;

pub fn record(stream: &str, payload: &[u8]) -> Record {
    Record {
        stream: stream.to_string(),
        payload: payload.to_vec(),
    }
}

pub fn gunzip(bytes: &[u8]) -> Vec<u8> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).expect("gunzip");
    out
}

/// In-memory object store capturing uploaded keys and bytes.
#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Uploaded payloads for one stream, decompressed, in rotation order
    /// (segment file names sort by creation time and sequence).
    pub fn stream_payloads(&self, stream: &str) -> Vec<Vec<u8>> {
        let mut objects: Vec<(String, Vec<u8>)> = self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.contains(&format!("/{stream}/")) || key.starts_with(&format!("{stream}/")))
            .cloned()
            .collect();
        objects.sort_by(|a, b| a.0.cmp(&b.0));
        objects.into_iter().map(|(_, bytes)| gunzip(&bytes)).collect()
    }
}

impl ObjectStore for MemoryStore {
    fn put(&self, key: &str, artifact: &Path) -> granary::Result<()> {
        let bytes = std::fs::read(artifact)?;
        self.objects.lock().unwrap().push((key.to_string(), bytes));
        Ok(())
    }
}

/// Fails every upload whose key contains the given fragment; everything else
/// goes to the inner store.
pub struct SelectiveFailStore {
    pub inner: Arc<MemoryStore>,
    pub fail_fragment: String,
}

impl ObjectStore for SelectiveFailStore {
    fn put(&self, key: &str, artifact: &Path) -> granary::Result<()> {
        if key.contains(&self.fail_fragment) {
            return Err(Error::Upload(format!("injected failure for {key}")));
        }
        self.inner.put(key, artifact)
    }
}

/// Blocks uploads whose key contains the gated fragment until opened.
pub struct GateStore {
    pub inner: Arc<MemoryStore>,
    pub gated_fragment: String,
    gate: Mutex<bool>,
    signal: Condvar,
}

impl GateStore {
    pub fn new(inner: Arc<MemoryStore>, gated_fragment: &str) -> Arc<Self> {
        Arc::new(Self {
            inner,
            gated_fragment: gated_fragment.to_string(),
            gate: Mutex::new(false),
            signal: Condvar::new(),
        })
    }

    pub fn open(&self) {
        *self.gate.lock().unwrap() = true;
        self.signal.notify_all();
    }
}

impl ObjectStore for GateStore {
    fn put(&self, key: &str, artifact: &Path) -> granary::Result<()> {
        if key.contains(&self.gated_fragment) {
            let mut open = self.gate.lock().unwrap();
            while !*open {
                open = self.signal.wait(open).unwrap();
            }
        }
        self.inner.put(key, artifact)
    }
}

/// Scripted record source: replays a fixed sequence of poll outcomes, then
/// flags shutdown once exhausted so a pipeline run terminates.
pub struct ScriptedSource {
    events: VecDeque<granary::Result<Record>>,
    stop: Arc<AtomicBool>,
    pace: Duration,
    pub polled: u64,
}

impl ScriptedSource {
    pub fn new(
        events: Vec<granary::Result<Record>>,
        stop: Arc<AtomicBool>,
        pace: Duration,
    ) -> Self {
        Self {
            events: events.into(),
            stop,
            pace,
            polled: 0,
        }
    }
}

impl RecordSource for ScriptedSource {
    fn poll(&mut self, _timeout: Duration) -> granary::Result<Option<Record>> {
        if !self.pace.is_zero() {
            std::thread::sleep(self.pace);
        }
        match self.events.pop_front() {
            Some(Ok(record)) => {
                // A successful poll is the broker's acknowledgment point.
                self.polled += 1;
                Ok(Some(record))
            }
            Some(Err(err)) => Err(err),
            None => {
                self.stop.store(true, Ordering::Relaxed);
                Ok(None)
            }
        }
    }
}

/// Spin until `predicate` holds or the deadline passes.
pub fn wait_for(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    predicate()
}
