//! Threshold scenario: 2000 bytes of 100-byte records at a 1024-byte
//! threshold yield two archived segments whose concatenation preserves
//! record order.

mod common;

use std::time::Duration;

use granary::archive::{ArchiveOptions, ArchivePipeline};
use granary::config::StreamSpec;
use granary::rotation::RotationController;
use granary::segment::{ActiveSegment, SegmentWriter};
use tempfile::TempDir;

use common::MemoryStore;

fn spec(threshold: u64) -> StreamSpec {
    StreamSpec {
        name: "orders".to_string(),
        queue_capacity: 8,
        threshold_bytes: threshold,
        poll_interval: Duration::from_millis(1),
        fsync_on_write: false,
    }
}

#[test]
fn two_rotations_for_2000_bytes_at_1024_threshold() -> granary::Result<()> {
    let temp = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let archive = ArchivePipeline::new(
        store.clone(),
        ArchiveOptions {
            prefix: "prefix".to_string(),
            retain_raw: false,
        },
    );

    let active = ActiveSegment::new(SegmentWriter::open(temp.path(), "orders", 0, false)?);
    let controller = RotationController::new(
        spec(1024),
        temp.path().to_path_buf(),
        active.clone(),
        archive.clone(),
    );

    // Feed 2000 bytes in 100-byte chunks, checking the threshold between
    // appends the way the poller does.
    let mut fed = Vec::new();
    for chunk in 0u8..20 {
        let payload = [chunk; 100];
        active.append(&payload)?;
        fed.extend_from_slice(&payload);
        controller.run_once()?;
    }
    controller.seal_remainder()?;
    archive.drain();

    let keys = store.keys();
    assert_eq!(keys.len(), 2, "expected exactly two uploads, got {keys:?}");
    for key in &keys {
        assert!(
            key.starts_with("prefix/orders/orders-") && key.ends_with(".seg.gz"),
            "unexpected key {key}"
        );
    }

    let payloads = store.stream_payloads("orders");
    assert_eq!(payloads.len(), 2);
    // First segment sealed at the first size check at or past the threshold.
    assert_eq!(payloads[0].len(), 1100);
    assert_eq!(payloads[1].len(), 900);

    // Concatenation in rotation order equals the fed byte sequence.
    let archived: Vec<u8> = payloads.concat();
    assert_eq!(archived, fed);

    // Confirmed uploads removed all local files.
    let leftovers: Vec<_> = std::fs::read_dir(temp.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "local files left behind: {leftovers:?}");
    Ok(())
}
