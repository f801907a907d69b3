use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use tempfile::NamedTempFile;

use crate::error::{Error, PathError};
use crate::zip::{ZipFile, ZipFileReader};

use super::metadata::FileInfo;
use super::{BufferPool, ZipFsOptions};

/// Where materialized temp files go and which pool the copy borrows from.
pub(crate) struct Scratch {
    pub(crate) options: ZipFsOptions,
    pub(crate) pool: Arc<BufferPool>,
}

/// One page of a directory listing.
#[derive(Debug, Clone)]
pub struct DirPage {
    pub entries: Vec<FileInfo>,
    /// Set when the listing has no entries after this page.
    pub end: bool,
}

/// An open file or directory inside a [`ZipFs`](super::ZipFs).
///
/// Reads come straight from the entry's decompressing stream. Because that
/// stream only moves forward, any seek other than a rewind to the start
/// copies the entry into a temporary file once, and the handle serves all
/// later reads and seeks from that file. The temp file is deleted on
/// [`close`](FileHandle::close) or drop.
///
/// Errors from the `Read` and `Seek` implementations carry a [`PathError`];
/// use [`PathError::from_io_error`] to get at it.
pub struct FileHandle {
    name: String,
    info: FileInfo,
    scratch: Arc<Scratch>,
    stream: Option<ZipFileReader>,
    temp: Option<NamedTempFile>,
    closed: bool,
    dir_pos: Option<usize>,
}

impl FileHandle {
    pub(crate) fn new(name: &str, info: FileInfo, scratch: Arc<Scratch>) -> Self {
        Self {
            name: name.to_string(),
            info,
            scratch,
            stream: None,
            temp: None,
            closed: false,
            dir_pos: None,
        }
    }

    /// The path this handle was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stat(&self) -> FileInfo {
        self.info.clone()
    }

    /// List the directory.
    ///
    /// With `count == 0` the whole sorted listing is returned and `end` is
    /// never set. Otherwise at most `count` entries are returned per call,
    /// continuing where the previous call stopped; the call that returns the
    /// last entries, and every call after it, sets `end`.
    pub fn readdir(&mut self, count: usize) -> Result<DirPage, PathError> {
        if self.closed {
            return Err(self.path_error("Readdir", Error::FileClosed));
        }
        let children = self
            .info
            .read_dir()
            .map_err(|e| PathError::new("Readdir", self.name.as_str(), e))?;

        if count == 0 {
            return Ok(DirPage {
                entries: children.to_vec(),
                end: false,
            });
        }

        let pos = self.dir_pos.unwrap_or(0);
        let remaining = &children[pos.min(children.len())..];
        let page = if remaining.len() > count {
            DirPage {
                entries: remaining[..count].to_vec(),
                end: false,
            }
        } else {
            DirPage {
                entries: remaining.to_vec(),
                end: remaining.len() < count,
            }
        };
        self.dir_pos = Some(pos + page.entries.len());
        Ok(page)
    }

    /// Release the stream and delete the temp file.
    ///
    /// Only the first call does any work; later calls return `Ok(())`.
    /// Every cleanup step runs even if an earlier one failed, and the first
    /// failure is reported.
    pub fn close(&mut self) -> Result<(), PathError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.dir_pos = None;

        // dropping the stream cannot fail, removing the temp file can
        self.stream = None;
        let mut failure: Option<io::Error> = None;
        if let Some(temp) = self.temp.take() {
            let temp_path = temp.into_temp_path();
            let shown = temp_path.display().to_string();
            if let Err(e) = temp_path.close() {
                tracing::warn!(path = %shown, error = %e, "failed to remove temp file");
                failure = Some(e);
            }
        }

        match failure {
            Some(e) => Err(self.path_error("Close", e)),
            None => Ok(()),
        }
    }

    fn path_error(&self, op: &'static str, err: impl Into<Error>) -> PathError {
        PathError::new(op, self.name.as_str(), err)
    }

    fn archive_file(&self, op: &'static str) -> Result<&ZipFile, PathError> {
        if self.info.is_dir() {
            return Err(self.path_error(op, Error::IsDirectory));
        }
        self.info
            .zip_file()
            .ok_or_else(|| self.path_error(op, Error::IsDirectory))
    }

    fn open_stream(&self, op: &'static str) -> Result<ZipFileReader, PathError> {
        self.archive_file(op)?
            .open()
            .map_err(|e| self.path_error(op, e))
    }

    /// Copy the whole entry into a temp file, at most once per handle.
    fn materialize(&mut self, op: &'static str) -> Result<&mut NamedTempFile, PathError> {
        self.stream = None;
        let temp = match self.temp.take() {
            Some(temp) => temp,
            None => {
                let file = self.archive_file(op)?;
                create_temp_file(file, &self.scratch).map_err(|e| self.path_error(op, e))?
            }
        };
        Ok(self.temp.insert(temp))
    }
}

/// Decompress `file` into a new temp file and rewind it.
fn create_temp_file(file: &ZipFile, scratch: &Scratch) -> Result<NamedTempFile, Error> {
    let mut reader = file.open()?;

    let mut builder = tempfile::Builder::new();
    builder.prefix(&scratch.options.temp_prefix);
    let mut temp = match &scratch.options.temp_dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };

    let mut buf = scratch.pool.acquire();
    let copied = copy(&mut reader, temp.as_file_mut(), &mut buf);
    scratch.pool.release(Some(buf));
    // on error the temp file is removed when `temp` drops
    let copied = copied?;

    temp.as_file_mut().seek(SeekFrom::Start(0))?;
    tracing::debug!(
        entry = %file.entry().file_name,
        temp = %temp.path().display(),
        bytes = copied,
        "materialized entry for seeking"
    );
    Ok(temp)
}

fn copy(reader: &mut impl Read, writer: &mut impl Write, buf: &mut [u8]) -> io::Result<u64> {
    let mut total = 0u64;
    loop {
        let n = match reader.read(buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
    writer.flush()?;
    Ok(total)
}

impl Read for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(self.path_error("Read", Error::FileClosed).into());
        }
        if let Some(temp) = self.temp.as_mut() {
            let result = temp.as_file_mut().read(buf);
            return result.map_err(|e| self.path_error("Read", e).into());
        }
        if self.stream.is_none() {
            self.stream = Some(self.open_stream("Read")?);
        }
        let result = match self.stream.as_mut() {
            Some(stream) => stream.read(buf),
            None => Ok(0),
        };
        result.map_err(|e| self.path_error("Read", e).into())
    }
}

impl Seek for FileHandle {
    /// `SeekFrom::Start(0)` before any materialization just reopens the
    /// stream. Every other target materializes the entry.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if self.closed {
            return Err(self.path_error("Seek", Error::FileClosed).into());
        }
        self.stream = None;

        if self.temp.is_none() && pos == SeekFrom::Start(0) {
            self.stream = Some(self.open_stream("Seek")?);
            return Ok(0);
        }

        let temp = self.materialize("Seek")?;
        let result = temp.as_file_mut().seek(pos);
        result.map_err(|e| self.path_error("Seek", e).into())
    }
}

impl std::fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandle")
            .field("name", &self.name)
            .field("streaming", &self.stream.is_some())
            .field("materialized", &self.temp.is_some())
            .field("closed", &self.closed)
            .finish()
    }
}
