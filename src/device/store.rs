//! Named-blob byte store
//!
//! Holds exactly two blobs in normal operation: the outbound clip and the
//! inbound response. The clip file is never open for read and write at the
//! same time; the writer handle must be closed before the upload phase
//! opens the blob for reading.

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use crate::{Error, Result};

/// Append-only handle to a blob being written
pub trait BlobWriter {
    /// Append bytes to the open blob
    ///
    /// # Errors
    ///
    /// Returns error if the underlying write fails.
    fn append(&mut self, bytes: &[u8]) -> Result<()>;

    /// Flush and close the blob
    ///
    /// # Errors
    ///
    /// Returns error if the final flush fails.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Named-blob storage for the audio clip and response
pub trait ByteStore {
    /// Whether a blob with this name exists
    fn exists(&self, name: &str) -> bool;

    /// Size of the named blob in bytes
    ///
    /// # Errors
    ///
    /// Returns error if the blob does not exist.
    fn len(&self, name: &str) -> Result<u64>;

    /// Read the entire named blob
    ///
    /// # Errors
    ///
    /// Returns error if the blob does not exist or cannot be read.
    fn read(&self, name: &str) -> Result<Vec<u8>>;

    /// Remove the named blob; removing a missing blob is not an error
    ///
    /// # Errors
    ///
    /// Returns error if the blob exists but cannot be removed.
    fn remove(&self, name: &str) -> Result<()>;

    /// Create (truncating) the named blob and return a write handle
    ///
    /// # Errors
    ///
    /// Returns error if the blob cannot be created.
    fn create(&self, name: &str) -> Result<Box<dyn BlobWriter>>;
}

/// Filesystem-backed byte store rooted at the data directory
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Initialize the store, creating the root directory.
    ///
    /// Storage initialization failure at boot is the one fatal error in the
    /// device: the caller is expected to halt on it.
    ///
    /// # Errors
    ///
    /// Returns error if the root directory cannot be created.
    pub fn init(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)
            .map_err(|e| Error::Storage(format!("cannot create {}: {e}", root.display())))?;
        tracing::info!(root = %root.display(), "byte store initialized");
        Ok(Self { root })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl ByteStore for FsStore {
    fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    fn len(&self, name: &str) -> Result<u64> {
        let meta = fs::metadata(self.path(name))
            .map_err(|e| Error::Storage(format!("stat {name}: {e}")))?;
        Ok(meta.len())
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        fs::read(self.path(name)).map_err(|e| Error::Storage(format!("read {name}: {e}")))
    }

    fn remove(&self, name: &str) -> Result<()> {
        let path = self.path(name);
        if !path.exists() {
            return Ok(());
        }
        fs::remove_file(&path).map_err(|e| Error::Storage(format!("remove {name}: {e}")))
    }

    fn create(&self, name: &str) -> Result<Box<dyn BlobWriter>> {
        let file = File::create(self.path(name))
            .map_err(|e| Error::Storage(format!("create {name}: {e}")))?;
        Ok(Box::new(FsBlobWriter { file }))
    }
}

struct FsBlobWriter {
    file: File,
}

impl BlobWriter for FsBlobWriter {
    fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.file
            .write_all(bytes)
            .map_err(|e| Error::Storage(format!("write: {e}")))
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.file
            .flush()
            .map_err(|e| Error::Storage(format!("flush: {e}")))
    }
}
