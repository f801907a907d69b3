//! Main entry point for the zipfs CLI application.
//!
//! Opens a local or remote ZIP archive as a read-only filesystem and lists
//! directories or prints files from it.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use zipfs::{Cli, FileHandle, FileInfo, HttpRangeReader, LocalFileReader, ZipFs, ZipFsOptions};

/// Entries fetched per `readdir` call while listing.
const LIST_PAGE: usize = 64;

/// Application entry point.
///
/// Parses command-line arguments and dispatches to the appropriate handler
/// based on whether the input is a local file or HTTP URL.
fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut options = ZipFsOptions::default();
    if let Some(dir) = &cli.temp_dir {
        options = options.temp_dir(dir);
    }

    if cli.is_http_url() {
        // Handle remote ZIP file via HTTP Range requests
        let reader = Arc::new(HttpRangeReader::new(cli.file.clone())?);
        let transferred_before = reader.transferred_bytes();

        let fs = ZipFs::from_reader(reader.clone(), options)?;
        process(&fs, &cli)?;

        // Display network transfer statistics for HTTP sources
        if !cli.is_quiet() {
            let transferred = reader.transferred_bytes() - transferred_before;
            eprintln!("\nTotal bytes transferred: {}", format_size(transferred));
        }
    } else {
        let reader = LocalFileReader::new(Path::new(&cli.file))
            .with_context(|| format!("cannot open {}", cli.file))?;
        let fs = ZipFs::from_reader(Arc::new(reader), options)?;
        process(&fs, &cli)?;
    }

    Ok(())
}

/// Run the requested action for every path on the command line.
fn process(fs: &ZipFs, cli: &Cli) -> Result<()> {
    for path in cli.paths() {
        let mut handle = fs.open(path)?;

        let result = if cli.pipe {
            pipe(&mut handle, cli.offset)
        } else {
            list(&mut handle, cli)
        };

        // A failed close must not hide the error that came first.
        let closed = handle.close();
        result?;
        closed?;
    }
    Ok(())
}

/// Copy a file to stdout, optionally starting at `offset`.
fn pipe(handle: &mut FileHandle, offset: Option<u64>) -> Result<()> {
    if handle.stat().is_dir() {
        anyhow::bail!("{}: is a directory", handle.name());
    }
    if let Some(offset) = offset {
        handle.seek(SeekFrom::Start(offset))?;
    }

    let mut stdout = std::io::stdout().lock();
    std::io::copy(handle, &mut stdout)?;
    stdout.flush()?;
    Ok(())
}

/// List a directory, or describe a single file.
///
/// Supports two output formats:
/// - Simple format: just names, directories with a trailing slash
/// - Verbose format (`-v`): size, date and time, with a totals line
fn list(handle: &mut FileHandle, cli: &Cli) -> Result<()> {
    let info = handle.stat();
    let entries = if info.is_dir() {
        let mut entries = Vec::new();
        loop {
            let page = handle.readdir(LIST_PAGE)?;
            entries.extend(page.entries);
            if page.end {
                break;
            }
        }
        entries
    } else {
        vec![info]
    };

    if cli.verbose {
        println!("{:>10}  {:>10}  {:>5}  Name", "Length", "Date", "Time");
        println!("{}", "-".repeat(50));
    }

    let mut total_size = 0u64;
    let mut file_count = 0usize;

    for entry in &entries {
        if cli.verbose {
            print_verbose(entry);
            if !entry.is_dir() {
                total_size += entry.size();
                file_count += 1;
            }
        } else if entry.is_dir() {
            println!("{}/", entry.name());
        } else {
            println!("{}", entry.name());
        }
    }

    if cli.verbose && !cli.is_very_quiet() {
        println!("{}", "-".repeat(50));
        println!("{:>10}  {:>17}  {} files", total_size, "", file_count);
    }

    Ok(())
}

fn print_verbose(entry: &FileInfo) {
    let modified = entry.mod_time();
    let name = if entry.is_dir() {
        format!("{}/", entry.name())
    } else {
        entry.name().to_string()
    };
    println!(
        "{:>10}  {}  {}  {}",
        entry.size(),
        modified.format("%Y-%m-%d"),
        modified.format("%H:%M"),
        name
    );
}

/// Format a byte size into a human-readable string.
///
/// Automatically selects the appropriate unit (bytes, KB, MB, GB)
/// based on the size magnitude.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// assert_eq!(format_size(1048576), "1.00 MB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
