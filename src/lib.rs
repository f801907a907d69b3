//! # zipfs
//!
//! A read-only filesystem view over a ZIP archive, shaped for serving
//! static content.
//!
//! The archive's flat entry list becomes a directory tree that can be
//! addressed by path. Opening a path yields a handle that reads the entry's
//! decompressed bytes, seeks (by copying the entry into a temporary file
//! the first time a real seek is needed), reports size and modification
//! time, and lists directories page by page.
//!
//! ## Features
//!
//! - Archives from the local filesystem, from HTTP/HTTPS URLs using Range
//!   requests, or from memory
//! - Support for ZIP64 format (archives larger than 4GB)
//! - Support for STORED (uncompressed) and DEFLATE compression methods
//! - Directories missing from the archive are synthesized
//! - Sorted, paginated directory listings
//!
//! ## Example
//!
//! ```no_run
//! use std::io::{Read, Seek, SeekFrom};
//! use zipfs::ZipFs;
//!
//! fn main() -> anyhow::Result<()> {
//!     let fs = ZipFs::new("assets.zip")?;
//!
//!     // List the top-level directory
//!     let mut root = fs.open("/")?;
//!     for info in root.readdir(0)?.entries {
//!         println!("{:>10}  {}", info.size(), info.name());
//!     }
//!
//!     // Read the tail of a file
//!     let mut file = fs.open("/css/site.css")?;
//!     file.seek(SeekFrom::End(-64))?;
//!     let mut tail = String::new();
//!     file.read_to_string(&mut tail)?;
//!     file.close()?;
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod fs;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use error::{Error, PathError, Result};
pub use fs::{BufferPool, DirPage, FileHandle, FileInfo, FileType, ZipFs, ZipFsOptions};
pub use io::{HttpRangeReader, LocalFileReader, ReadAt};
pub use zip::{ZipArchive, ZipFile, ZipFileEntry};
