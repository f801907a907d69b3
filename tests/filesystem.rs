use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use tempfile::{TempDir, tempdir};
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime};

use zipfs::{BufferPool, Error, FileHandle, PathError, ZipFs, ZipFsOptions};

const INDEX_HTML: &[u8] = b"<html><body>hello from the archive</body></html>\n";
const SITE_CSS: &[u8] = b"body { color: #333; }\n";

fn app_js() -> Vec<u8> {
    // Larger than one copy buffer so materialization loops.
    (0..100_000u32)
        .map(|i| (i % 251) as u8)
        .collect()
}

fn entry_options(method: CompressionMethod) -> FileOptions {
    FileOptions::default()
        .compression_method(method)
        .last_modified_time(DateTime::from_date_and_time(2020, 5, 17, 10, 30, 24).unwrap())
}

fn site_zip() -> Vec<u8> {
    let deflated = entry_options(CompressionMethod::Deflated);
    let stored = entry_options(CompressionMethod::Stored);

    let mut zw = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zw.start_file("index.html", deflated).unwrap();
    zw.write_all(INDEX_HTML).unwrap();
    zw.add_directory("css/", stored).unwrap();
    zw.start_file("css/site.css", stored).unwrap();
    zw.write_all(SITE_CSS).unwrap();
    // js/ is never listed, so the index has to synthesize it
    zw.start_file("js/app.js", deflated).unwrap();
    zw.write_all(&app_js()).unwrap();
    for name in ["docs/e.txt", "docs/b.txt", "docs/d.txt", "docs/a.txt", "docs/c.txt"] {
        zw.start_file(name, deflated).unwrap();
        zw.write_all(name.as_bytes()).unwrap();
    }
    zw.start_file("empty.txt", stored).unwrap();
    zw.finish().unwrap().into_inner()
}

struct Fixture {
    _archive_dir: TempDir,
    archive_path: std::path::PathBuf,
    temp_dir: TempDir,
    fs: ZipFs,
}

fn fixture() -> Fixture {
    let archive_dir = tempdir().unwrap();
    let archive_path = archive_dir.path().join("site.zip");
    std::fs::write(&archive_path, site_zip()).unwrap();

    let temp_dir = tempdir().unwrap();
    let fs = ZipFs::with_options(
        &archive_path,
        ZipFsOptions::default().temp_dir(temp_dir.path()),
    )
    .unwrap();

    Fixture {
        _archive_dir: archive_dir,
        archive_path,
        temp_dir,
        fs,
    }
}

fn temp_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

fn read_all(handle: &mut FileHandle) -> Vec<u8> {
    let mut out = Vec::new();
    handle.read_to_end(&mut out).unwrap();
    out
}

fn names(handle: &mut FileHandle, count: usize) -> Vec<String> {
    handle
        .readdir(count)
        .unwrap()
        .entries
        .iter()
        .map(|info| info.name().to_string())
        .collect()
}

fn io_kind(err: &std::io::Error) -> &Error {
    PathError::from_io_error(err).unwrap().kind()
}

#[test]
fn stat_matches_archive_metadata() {
    let fx = fixture();
    let mut reference = zip::ZipArchive::new(std::fs::File::open(&fx.archive_path).unwrap()).unwrap();

    for i in 0..reference.len() {
        let entry = reference.by_index(i).unwrap();
        let info = fx.fs.open(entry.name()).unwrap().stat();
        assert_eq!(info.is_dir(), entry.is_dir(), "{}", entry.name());
        assert_eq!(info.size(), if entry.is_dir() { 0 } else { entry.size() });
        assert_eq!(info.mod_time().to_rfc3339(), "2020-05-17T10:30:24+00:00");
        assert_eq!(info.mode() & 0o222, 0);
    }

    let js = fx.fs.open("/js").unwrap().stat();
    assert!(js.is_dir());
    assert_eq!(js.size(), 0);
    assert_eq!(js.mod_time().to_rfc3339(), "2001-01-01T00:00:00+00:00");

    let app = fx.fs.open("js/app.js").unwrap().stat();
    assert_eq!(app.name(), "app.js");
    assert_eq!(app.size(), app_js().len() as u64);
}

#[test]
fn directory_aliases_resolve_to_the_same_entry() {
    let fx = fixture();
    for path in ["css", "css/", "/css", "/css/", "./css", "js/../css"] {
        let info = fx.fs.open(path).unwrap().stat();
        assert!(info.is_dir(), "{path}");
        assert_eq!(info.path(), "css");
    }
    assert_eq!(fx.fs.open("/").unwrap().stat().name(), "/");
    assert_eq!(fx.fs.open("").unwrap().stat().path(), "/");
}

#[test]
fn listings_are_sorted_and_stable() {
    let fx = fixture();
    let mut root = fx.fs.open("/").unwrap();
    let first = names(&mut root, 0);
    assert_eq!(first, ["css", "docs", "empty.txt", "index.html", "js"]);
    assert_eq!(names(&mut root, 0), first);

    let mut docs = fx.fs.open("docs").unwrap();
    assert_eq!(names(&mut docs, 0), ["a.txt", "b.txt", "c.txt", "d.txt", "e.txt"]);
    assert!(!docs.readdir(0).unwrap().end);
}

#[test]
fn paginated_listing_matches_full_listing() {
    let fx = fixture();
    let full = names(&mut fx.fs.open("docs").unwrap(), 0);

    for count in 1..=7 {
        let mut docs = fx.fs.open("docs").unwrap();
        let mut collected = Vec::new();
        let mut ends = 0;
        loop {
            let page = docs.readdir(count).unwrap();
            assert!(page.entries.len() <= count);
            collected.extend(page.entries.iter().map(|i| i.name().to_string()));
            if page.end {
                ends += 1;
                break;
            }
        }
        assert_eq!(collected, full, "count {count}");
        assert_eq!(ends, 1);

        // exhausted: empty pages that keep signalling the end
        let after = docs.readdir(count).unwrap();
        assert!(after.entries.is_empty());
        assert!(after.end);
    }
}

#[test]
fn short_final_page_carries_end_marker() {
    let fx = fixture();
    let mut docs = fx.fs.open("docs").unwrap();

    let page = docs.readdir(2).unwrap();
    assert_eq!(page.entries.len(), 2);
    assert!(!page.end);
    let page = docs.readdir(2).unwrap();
    assert_eq!(page.entries.len(), 2);
    assert!(!page.end);
    let page = docs.readdir(2).unwrap();
    assert_eq!(page.entries.len(), 1);
    assert!(page.end);

    // an exact fit only learns about the end on the next call
    let mut docs = fx.fs.open("docs").unwrap();
    let page = docs.readdir(5).unwrap();
    assert_eq!(page.entries.len(), 5);
    assert!(!page.end);
    let page = docs.readdir(5).unwrap();
    assert!(page.entries.is_empty());
    assert!(page.end);
}

#[test]
fn rewind_to_start_does_not_materialize() {
    let fx = fixture();
    let mut file = fx.fs.open("index.html").unwrap();

    let mut head = [0u8; 6];
    file.read_exact(&mut head).unwrap();
    assert_eq!(&head, b"<html>");

    assert_eq!(file.seek(SeekFrom::Start(0)).unwrap(), 0);
    assert_eq!(read_all(&mut file), INDEX_HTML);
    assert_eq!(temp_files(fx.temp_dir.path()), 0);
}

#[test]
fn seeking_materializes_exactly_once() {
    let fx = fixture();
    let dir = fx.temp_dir.path();
    let content = app_js();
    let mut file = fx.fs.open("js/app.js").unwrap();

    assert_eq!(file.seek(SeekFrom::Start(40_000)).unwrap(), 40_000);
    assert_eq!(temp_files(dir), 1);
    let mut chunk = [0u8; 16];
    file.read_exact(&mut chunk).unwrap();
    assert_eq!(&chunk[..], &content[40_000..40_016]);

    let pos = file.seek(SeekFrom::End(-10)).unwrap();
    assert_eq!(pos, content.len() as u64 - 10);
    assert_eq!(read_all(&mut file), &content[content.len() - 10..]);

    file.seek(SeekFrom::Current(-20)).unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();
    assert_eq!(read_all(&mut file), content);
    assert_eq!(temp_files(dir), 1);

    let name = std::fs::read_dir(dir).unwrap().next().unwrap().unwrap().file_name();
    assert!(name.to_string_lossy().starts_with("zipfs"));

    file.close().unwrap();
    assert_eq!(temp_files(dir), 0);
    file.close().unwrap();
}

#[test]
fn each_handle_gets_its_own_temp_file() {
    let fx = fixture();
    let mut a = fx.fs.open("js/app.js").unwrap();
    let mut b = fx.fs.open("js/app.js").unwrap();
    a.seek(SeekFrom::Start(1)).unwrap();
    b.seek(SeekFrom::Start(2)).unwrap();
    assert_eq!(temp_files(fx.temp_dir.path()), 2);

    drop(a);
    assert_eq!(temp_files(fx.temp_dir.path()), 1);
    b.close().unwrap();
    assert_eq!(temp_files(fx.temp_dir.path()), 0);
}

#[test]
fn materialized_content_matches_stream() {
    let fx = fixture();
    for path in ["index.html", "css/site.css", "js/app.js", "docs/c.txt", "empty.txt"] {
        let streamed = read_all(&mut fx.fs.open(path).unwrap());

        let mut file = fx.fs.open(path).unwrap();
        file.seek(SeekFrom::End(0)).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(read_all(&mut file), streamed, "{path}");
    }
    assert_eq!(read_all(&mut fx.fs.open("js/app.js").unwrap()), app_js());
    assert_eq!(read_all(&mut fx.fs.open("css/site.css").unwrap()), SITE_CSS);
}

#[test]
fn closed_handle_rejects_everything() {
    let fx = fixture();
    let mut file = fx.fs.open("index.html").unwrap();
    file.read_exact(&mut [0u8; 4]).unwrap();
    file.close().unwrap();

    let err = file.read(&mut [0u8; 4]).unwrap_err();
    assert!(matches!(io_kind(&err), Error::FileClosed));
    assert_eq!(PathError::from_io_error(&err).unwrap().op, "Read");

    let err = file.seek(SeekFrom::Start(0)).unwrap_err();
    assert!(matches!(io_kind(&err), Error::FileClosed));

    let mut dir = fx.fs.open("docs").unwrap();
    dir.close().unwrap();
    let err = dir.readdir(1).unwrap_err();
    assert!(matches!(err.kind(), Error::FileClosed));
    assert_eq!(err.path, "docs");

    assert!(file.close().is_ok());
    assert_eq!(file.stat().name(), "index.html");
}

#[test]
fn close_reports_temp_file_removal_failure() {
    let fx = fixture();
    let mut file = fx.fs.open("js/app.js").unwrap();
    file.seek(SeekFrom::Start(1_000)).unwrap();

    for entry in std::fs::read_dir(fx.temp_dir.path()).unwrap() {
        std::fs::remove_file(entry.unwrap().path()).unwrap();
    }

    let err = file.close().unwrap_err();
    assert_eq!(err.op, "Close");
    assert_eq!(err.path, "js/app.js");
    assert!(matches!(err.kind(), Error::Io(_)));

    assert!(file.close().is_ok());
    let err = file.read(&mut [0u8; 4]).unwrap_err();
    assert!(matches!(io_kind(&err), Error::FileClosed));
}

#[test]
fn closed_filesystem_rejects_open() {
    let mut fx = fixture();
    fx.fs.open("index.html").unwrap();
    fx.fs.close();
    fx.fs.close();
    assert!(fx.fs.is_closed());

    for path in ["index.html", "never/seen.txt", "/"] {
        let err = fx.fs.open(path).unwrap_err();
        assert!(matches!(err.kind(), Error::FileSystemClosed), "{path}");
        assert_eq!(err.op, "Open");
    }
    let err = fx.fs.stat("index.html").unwrap_err();
    assert!(matches!(err.kind(), Error::FileSystemClosed));
    assert_eq!(err.op, "Stat");
}

#[test]
fn open_handles_survive_filesystem_close() {
    let mut fx = fixture();
    let mut file = fx.fs.open("css/site.css").unwrap();
    fx.fs.close();
    assert_eq!(read_all(&mut file), SITE_CSS);
}

#[test]
fn missing_path_reports_the_path() {
    let fx = fixture();
    let err = fx.fs.open("/no/such/file.txt").unwrap_err();
    assert!(matches!(err.kind(), Error::NotFound));
    assert_eq!(err.op, "Open");
    assert!(err.to_string().contains("/no/such/file.txt"));

    let io: std::io::Error = err.into();
    assert_eq!(io.kind(), std::io::ErrorKind::NotFound);

    assert!(fx.fs.open("index.html/child").is_err());
    assert!(fx.fs.open("../../../../etc/passwd").is_err());

    let err = fx.fs.stat("/no/such/file.txt").unwrap_err();
    assert!(matches!(err.kind(), Error::NotFound));
    assert_eq!(err.op, "Stat");
    assert_eq!(err.path, "/no/such/file.txt");
}

#[test]
fn shape_errors() {
    let fx = fixture();

    for dir in ["css", "js"] {
        let mut handle = fx.fs.open(dir).unwrap();
        let err = handle.read(&mut [0u8; 8]).unwrap_err();
        assert!(matches!(io_kind(&err), Error::IsDirectory), "{dir}");
    }

    let mut file = fx.fs.open("index.html").unwrap();
    let err = file.readdir(0).unwrap_err();
    assert!(matches!(err.kind(), Error::NotDirectory));
    let err = file.readdir(3).unwrap_err();
    assert!(matches!(err.kind(), Error::NotDirectory));
    assert_eq!(err.op, "Readdir");
}

#[test]
fn concurrent_opens_share_the_index() {
    let fx = fixture();
    let fs = &fx.fs;
    let paths = ["index.html", "css/site.css", "js/app.js", "docs/a.txt", "docs/e.txt"];

    std::thread::scope(|s| {
        for path in paths {
            s.spawn(move || {
                for _ in 0..8 {
                    let mut handle = fs.open(path).unwrap();
                    let data = read_all(&mut handle);
                    assert_eq!(data.len() as u64, handle.stat().size());
                    handle.seek(SeekFrom::Start(1)).unwrap();
                    handle.close().unwrap();
                }
            });
        }
    });
    assert_eq!(temp_files(fx.temp_dir.path()), 0);
}

#[test]
fn shared_buffer_pool_is_reused() {
    let temp_dir = tempdir().unwrap();
    let pool = Arc::new(BufferPool::new());
    let fs = ZipFs::from_reader(
        Arc::new(site_zip()),
        ZipFsOptions::default()
            .temp_dir(temp_dir.path())
            .temp_prefix("pooled")
            .buffer_pool(Arc::clone(&pool)),
    )
    .unwrap();

    for _ in 0..3 {
        let mut file = fs.open("js/app.js").unwrap();
        file.seek(SeekFrom::Start(7)).unwrap();
        file.close().unwrap();
    }
    assert_eq!(pool.idle(), 1);
}

#[test]
fn invalid_archives_fail_construction() {
    let dir = tempdir().unwrap();

    let missing = ZipFs::new(dir.path().join("missing.zip")).unwrap_err();
    assert!(matches!(missing, Error::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));

    let garbage = dir.path().join("garbage.zip");
    std::fs::write(&garbage, b"this is not a zip file at all").unwrap();
    assert!(matches!(ZipFs::new(&garbage), Err(Error::InvalidArchive(_))));

    let empty = dir.path().join("empty.zip");
    std::fs::write(&empty, b"").unwrap();
    assert!(matches!(ZipFs::new(&empty), Err(Error::InvalidArchive(_))));
}

#[test]
fn corrupted_entry_fails_checksum() {
    let mut zw = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zw.start_file("hello.txt", entry_options(CompressionMethod::Stored))
        .unwrap();
    zw.write_all(b"hello, checksum").unwrap();
    let mut data = zw.finish().unwrap().into_inner();

    let at = data
        .windows(15)
        .position(|w| w == b"hello, checksum")
        .unwrap();
    data[at] = b'j';

    let fs = ZipFs::from_reader(Arc::new(data), ZipFsOptions::default()).unwrap();
    let mut file = fs.open("hello.txt").unwrap();
    let mut out = Vec::new();
    let err = file.read_to_end(&mut out).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    assert_eq!(PathError::from_io_error(&err).unwrap().path, "hello.txt");
}
