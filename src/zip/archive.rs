use flate2::read::DeflateDecoder;
use std::io::{self, Read};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::io::{ReadAt, SectionReader};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// A parsed ZIP archive: the central directory plus the byte source it
/// was read from.
pub struct ZipArchive {
    parser: ZipParser<dyn ReadAt>,
    entries: Vec<ZipFileEntry>,
}

impl ZipArchive {
    /// Parse the central directory of `reader`.
    pub fn new(reader: Arc<dyn ReadAt>) -> Result<Self> {
        let parser = ZipParser::new(reader);
        let entries = parser.list_files()?;
        Ok(Self { parser, entries })
    }

    /// Entries in central directory order.
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    /// Entries paired with a handle back to this archive, so each can be
    /// opened later without the caller keeping the archive around.
    pub fn files(self: &Arc<Self>) -> impl Iterator<Item = ZipFile> + '_ {
        self.entries
            .iter()
            .map(|entry| self.file_for(entry.clone()))
    }

    /// Pair an entry with this archive.
    pub fn file_for(self: &Arc<Self>, entry: ZipFileEntry) -> ZipFile {
        ZipFile {
            entry,
            archive: Arc::clone(self),
        }
    }

    /// Open a decompressing stream over `entry`'s data.
    pub fn open_entry(&self, entry: &ZipFileEntry) -> Result<ZipFileReader> {
        if entry.is_directory {
            return Err(Error::IsDirectory);
        }
        if entry.is_encrypted() {
            return Err(Error::Encrypted);
        }

        let data_offset = self.parser.get_data_offset(entry)?;
        let section = SectionReader::new(
            Arc::clone(self.parser.reader()),
            data_offset,
            entry.compressed_size,
        );

        let inner: Box<dyn Read + Send> = match entry.compression_method {
            CompressionMethod::Stored => Box::new(section),
            CompressionMethod::Deflate => Box::new(DeflateDecoder::new(section)),
            CompressionMethod::Unknown(method) => {
                return Err(Error::UnsupportedCompression(method));
            }
        };

        Ok(ZipFileReader {
            inner,
            hasher: crc32fast::Hasher::new(),
            read: 0,
            expected_size: entry.uncompressed_size,
            expected_crc: entry.crc32,
        })
    }
}

/// One archive entry with a back-reference to its archive.
#[derive(Clone)]
pub struct ZipFile {
    entry: ZipFileEntry,
    archive: Arc<ZipArchive>,
}

impl ZipFile {
    pub fn entry(&self) -> &ZipFileEntry {
        &self.entry
    }

    /// Open a fresh decompressing stream positioned at the start of the entry.
    pub fn open(&self) -> Result<ZipFileReader> {
        self.archive.open_entry(&self.entry)
    }
}

impl std::fmt::Debug for ZipFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ZipFile").field(&self.entry.file_name).finish()
    }
}

/// Forward-only decompressing reader over one entry.
///
/// On EOF the byte count and CRC32 are checked against the central
/// directory; a mismatch surfaces as an `InvalidData` error.
pub struct ZipFileReader {
    inner: Box<dyn Read + Send>,
    hasher: crc32fast::Hasher,
    read: u64,
    expected_size: u64,
    expected_crc: u32,
}

impl ZipFileReader {
    fn verify(&self) -> io::Result<()> {
        if self.read != self.expected_size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "entry truncated: read {} of {} bytes",
                    self.read, self.expected_size
                ),
            ));
        }
        let crc = self.hasher.clone().finalize();
        if self.expected_crc != 0 && crc != self.expected_crc {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "checksum mismatch",
            ));
        }
        Ok(())
    }
}

impl Read for ZipFileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 {
            if !buf.is_empty() {
                self.verify()?;
            }
            return Ok(0);
        }
        self.hasher.update(&buf[..n]);
        self.read += n as u64;
        if self.read > self.expected_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "entry larger than its declared size",
            ));
        }
        Ok(n)
    }
}
