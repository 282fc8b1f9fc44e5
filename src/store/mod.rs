//! Object store collaborators.
//!
//! The archive pipeline talks to storage through the narrow [`ObjectStore`]
//! trait so tests can substitute fakes and deployments can pick a backend.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[cfg(feature = "s3")]
pub mod s3;

#[cfg(feature = "s3")]
pub use s3::S3Store;

/// Single put-object operation: write the file at `artifact` under `key`.
///
/// Uploads are all-or-nothing at the storage API level; a successful return
/// means the object is durably stored.
pub trait ObjectStore: Send + Sync {
    fn put(&self, key: &str, artifact: &Path) -> Result<()>;
}

/// Filesystem-backed store: keys become paths under a root directory.
///
/// Useful for smoke runs without object-store credentials; publishes via a
/// temp file and rename so a partially copied object is never visible under
/// its final key.
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ObjectStore for DirStore {
    fn put(&self, key: &str, artifact: &Path) -> Result<()> {
        let dest = self.root.join(key);
        let parent = dest
            .parent()
            .ok_or_else(|| Error::Upload(format!("key {key} has no parent")))?;
        std::fs::create_dir_all(parent)?;

        let tmp = dest.with_extension("tmp");
        let _ = std::fs::remove_file(&tmp);

        let mut input = File::open(artifact)?;
        let mut output = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        std::io::copy(&mut input, &mut output)?;
        output.sync_all()?;
        std::fs::rename(&tmp, &dest)?;
        Ok(())
    }
}
