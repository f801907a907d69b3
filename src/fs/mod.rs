//! Read-only filesystem view over a ZIP archive.
//!
//! [`ZipFs`] parses the archive's central directory once and builds an
//! immutable directory tree from it. [`ZipFs::open`] resolves a path in that
//! tree and returns a [`FileHandle`] that can read, seek, stat and list,
//! which is what a static file server needs to answer plain, ranged and
//! directory-index requests.
//!
//! ```no_run
//! use std::io::Read;
//! use zipfs::ZipFs;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let fs = ZipFs::new("site.zip")?;
//! let mut index = fs.open("/index.html")?;
//! let mut html = String::new();
//! index.read_to_string(&mut html)?;
//! println!("{} bytes, modified {}", index.stat().size(), index.stat().mod_time());
//! # Ok(())
//! # }
//! ```

mod handle;
pub mod index;
mod metadata;
mod pool;

pub use handle::{DirPage, FileHandle};
pub use metadata::{FileInfo, FileType, MODE_DIR, MODE_FILE};
pub use pool::{BUFFER_SIZE, BufferPool};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, PathError, Result};
use crate::io::{LocalFileReader, ReadAt};
use crate::zip::ZipArchive;

use handle::Scratch;
use index::Index;

/// Settings for a [`ZipFs`].
#[derive(Debug, Clone)]
pub struct ZipFsOptions {
    /// Directory for temp files created when a handle seeks. `None` uses the
    /// system temp directory.
    pub temp_dir: Option<PathBuf>,
    /// File name prefix for those temp files.
    pub temp_prefix: String,
    /// Copy-buffer pool. `None` gives each filesystem its own.
    pub buffer_pool: Option<Arc<BufferPool>>,
}

impl Default for ZipFsOptions {
    fn default() -> Self {
        Self {
            temp_dir: None,
            temp_prefix: "zipfs".to_string(),
            buffer_pool: None,
        }
    }
}

impl ZipFsOptions {
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn temp_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.temp_prefix = prefix.into();
        self
    }

    pub fn buffer_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.buffer_pool = Some(pool);
        self
    }
}

/// A ZIP archive exposed as a read-only filesystem.
///
/// Lookups never mutate anything, so `&ZipFs` can be shared between threads
/// that open handles concurrently. Each [`FileHandle`] belongs to the caller
/// that opened it.
pub struct ZipFs {
    archive: Option<Arc<ZipArchive>>,
    index: Option<Index>,
    scratch: Arc<Scratch>,
}

impl ZipFs {
    /// Open the archive at `path` with default options.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_options(path, ZipFsOptions::default())
    }

    pub fn with_options(path: impl AsRef<Path>, options: ZipFsOptions) -> Result<Self> {
        let reader = LocalFileReader::new(path.as_ref())?;
        Self::from_reader(Arc::new(reader), options)
    }

    /// Build the filesystem over any random-access source: a local file, an
    /// [`HttpRangeReader`](crate::HttpRangeReader), or bytes in memory.
    pub fn from_reader(reader: Arc<dyn ReadAt>, options: ZipFsOptions) -> Result<Self> {
        let archive = Arc::new(ZipArchive::new(reader)?);
        let index = Index::build(archive.files());

        let pool = options
            .buffer_pool
            .clone()
            .unwrap_or_else(|| Arc::new(BufferPool::new()));

        Ok(Self {
            archive: Some(archive),
            index: Some(index),
            scratch: Arc::new(Scratch { options, pool }),
        })
    }

    /// Open `path` for reading. Leading slashes, `.` and `..` segments and a
    /// trailing slash on directories are accepted.
    pub fn open(&self, path: &str) -> std::result::Result<FileHandle, PathError> {
        let info = self.lookup("Open", path)?;
        Ok(FileHandle::new(path, info, Arc::clone(&self.scratch)))
    }

    /// Metadata for `path` without opening a handle.
    pub fn stat(&self, path: &str) -> std::result::Result<FileInfo, PathError> {
        self.lookup("Stat", path)
    }

    fn lookup(&self, op: &'static str, path: &str) -> std::result::Result<FileInfo, PathError> {
        let index = self
            .index
            .as_ref()
            .ok_or_else(|| PathError::new(op, path, Error::FileSystemClosed))?;
        index
            .resolve(path)
            .map_err(|e| PathError::new(op, path, e))
    }

    /// Release the archive and drop the index. Later calls to
    /// [`open`](ZipFs::open) fail with [`Error::FileSystemClosed`]; calling
    /// `close` again does nothing.
    ///
    /// Handles that are still open keep their own reference to the byte
    /// source and stay readable until they are closed.
    pub fn close(&mut self) {
        if self.archive.take().is_some() {
            tracing::debug!("closing zip filesystem");
        }
        self.index = None;
    }

    pub fn is_closed(&self) -> bool {
        self.index.is_none()
    }

    /// The parsed archive, until the filesystem is closed.
    pub fn archive(&self) -> Option<&Arc<ZipArchive>> {
        self.archive.as_ref()
    }
}

impl std::fmt::Debug for ZipFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipFs")
            .field("paths", &self.index.as_ref().map(Index::len))
            .field("options", &self.scratch.options)
            .finish()
    }
}
