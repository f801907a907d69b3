use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::zip::ZipFile;

use super::index::ROOT;

/// Modification time reported for directories the archive does not list
/// explicitly (2001-01-01T00:00:00Z).
const SYNTHETIC_DIR_SECS: i64 = 978_307_200;

/// Permission bits: read-only, directories traversable.
pub const MODE_DIR: u32 = 0o040_555;
pub const MODE_FILE: u32 = 0o100_444;

/// Whether a path names a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
}

/// A node in the directory tree. Built once by the index, never mutated.
pub(crate) struct Node {
    pub(crate) path: String,
    pub(crate) file: Option<ZipFile>,
    pub(crate) children: Vec<FileInfo>,
}

/// Metadata for one path in the archive.
///
/// Cheap to clone; clones share the same node.
#[derive(Clone)]
pub struct FileInfo {
    node: Arc<Node>,
}

impl FileInfo {
    pub(crate) fn new(node: Node) -> Self {
        Self {
            node: Arc::new(node),
        }
    }

    /// Base name, `"/"` for the root.
    pub fn name(&self) -> &str {
        if self.node.path == ROOT {
            return ROOT;
        }
        match self.node.path.rsplit_once('/') {
            Some((_, base)) => base,
            None => &self.node.path,
        }
    }

    /// Normalized path within the archive, without leading slash; `"/"` for
    /// the root.
    pub fn path(&self) -> &str {
        &self.node.path
    }

    /// Uncompressed size in bytes; zero for directories.
    ///
    /// The extended 64-bit size wins whenever it is set; otherwise the
    /// legacy 32-bit field is reported.
    pub fn size(&self) -> u64 {
        match &self.node.file {
            Some(file) if !self.is_dir() => {
                let entry = file.entry();
                if entry.uncompressed_size == 0 {
                    entry.uncompressed_size32 as u64
                } else {
                    entry.uncompressed_size
                }
            }
            _ => 0,
        }
    }

    pub fn mod_time(&self) -> DateTime<Utc> {
        match &self.node.file {
            Some(file) => file.entry().modified(),
            None => DateTime::from_timestamp(SYNTHETIC_DIR_SECS, 0).unwrap_or_default(),
        }
    }

    pub fn is_dir(&self) -> bool {
        match &self.node.file {
            Some(file) => file.entry().is_directory,
            None => true,
        }
    }

    pub fn file_type(&self) -> FileType {
        if self.is_dir() {
            FileType::Directory
        } else {
            FileType::File
        }
    }

    /// Unix-style mode bits. The write bits are never set.
    pub fn mode(&self) -> u32 {
        if self.is_dir() { MODE_DIR } else { MODE_FILE }
    }

    /// Children sorted by name; empty for files.
    pub fn children(&self) -> &[FileInfo] {
        &self.node.children
    }

    /// The archive entry behind this path, absent for synthetic directories.
    pub fn zip_file(&self) -> Option<&ZipFile> {
        self.node.file.as_ref()
    }

    pub(crate) fn read_dir(&self) -> Result<&[FileInfo], Error> {
        if !self.is_dir() {
            return Err(Error::NotDirectory);
        }
        Ok(&self.node.children)
    }
}

impl fmt::Debug for FileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileInfo")
            .field("path", &self.path())
            .field("size", &self.size())
            .field("dir", &self.is_dir())
            .field("children", &self.children().len())
            .finish()
    }
}
