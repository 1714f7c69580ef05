use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;

use ecostress_fetch::client::ArchiveClient;
use ecostress_fetch::domain::DownloadTask;
use ecostress_fetch::download::{Downloader, TaskOutcome};
use ecostress_fetch::error::FetchError;

/// Hands out one scripted chunk per read, then zero-length reads.
struct ChunkedBody {
    chunks: VecDeque<Vec<u8>>,
}

impl Read for ChunkedBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.chunks.pop_front() {
            Some(chunk) => {
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
            None => Ok(0),
        }
    }
}

/// Fails partway through the body.
struct BrokenBody {
    sent: bool,
}

impl Read for BrokenBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.sent {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        }
        self.sent = true;
        buf[..4].copy_from_slice(b"part");
        Ok(4)
    }
}

#[derive(Default)]
struct MockArchive {
    bodies: HashMap<String, Vec<Vec<u8>>>,
    broken: Vec<String>,
    requests: Mutex<Vec<String>>,
}

impl MockArchive {
    fn with_body(mut self, url: &str, chunks: &[&[u8]]) -> Self {
        self.bodies.insert(
            url.to_string(),
            chunks.iter().map(|chunk| chunk.to_vec()).collect(),
        );
        self
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl ArchiveClient for MockArchive {
    fn get_text(&self, url: &str) -> Result<String, FetchError> {
        Err(FetchError::Transport(format!("unexpected get {url}")))
    }

    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        if self.broken.iter().any(|broken| broken == url) {
            return Ok(Box::new(BrokenBody { sent: false }));
        }
        match self.bodies.get(url) {
            Some(chunks) => Ok(Box::new(ChunkedBody {
                chunks: chunks.iter().cloned().collect(),
            })),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

fn task(url: &str, dir: &Path, name: &str) -> DownloadTask {
    DownloadTask {
        remote_url: url.to_string(),
        local_path: dir.join(name),
    }
}

#[test]
fn chunks_are_concatenated_until_empty_read() {
    let temp = tempfile::tempdir().unwrap();
    let client = Arc::new(MockArchive::default().with_body(
        "https://archive.test/data.h5",
        &[b"data_chunk1", b"data_chunk2"],
    ));
    let downloader = Downloader::new(Arc::clone(&client), 1);

    let report = downloader.fetch(vec![task(
        "https://archive.test/data.h5",
        temp.path(),
        "data.h5",
    )]);

    assert_eq!(
        report.items[0].outcome,
        TaskOutcome::Downloaded { bytes: 22 }
    );
    assert_eq!(
        fs::read(temp.path().join("data.h5")).unwrap(),
        b"data_chunk1data_chunk2"
    );
}

#[test]
fn short_chunks_do_not_end_the_stream() {
    let temp = tempfile::tempdir().unwrap();
    let client = Arc::new(
        MockArchive::default().with_body("https://archive.test/data.h5", &[b"a", b"bc", b"d"]),
    );
    let downloader = Downloader::new(client, 1);

    downloader.fetch(vec![task(
        "https://archive.test/data.h5",
        temp.path(),
        "data.h5",
    )]);

    assert_eq!(fs::read(temp.path().join("data.h5")).unwrap(), b"abcd");
}

#[test]
fn existing_file_costs_no_request() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("data.h5"), b"already here").unwrap();
    let client =
        Arc::new(MockArchive::default().with_body("https://archive.test/data.h5", &[b"new"]));
    let downloader = Downloader::new(Arc::clone(&client), 1);

    let report = downloader.fetch(vec![task(
        "https://archive.test/data.h5",
        temp.path(),
        "data.h5",
    )]);

    assert_eq!(report.items[0].outcome, TaskOutcome::Skipped);
    assert_eq!(client.request_count(), 0);
    assert_eq!(
        fs::read(temp.path().join("data.h5")).unwrap(),
        b"already here"
    );
}

#[test]
fn failed_task_does_not_stop_others() {
    let temp = tempfile::tempdir().unwrap();
    let mut archive = MockArchive::default()
        .with_body("https://archive.test/b.h5", &[b"b"])
        .with_body("https://archive.test/c.h5", &[b"c"]);
    archive.broken.push("https://archive.test/b.h5".to_string());
    let downloader = Downloader::new(Arc::new(archive), 1);

    let report = downloader.fetch(vec![
        task("https://archive.test/a.h5", temp.path(), "a.h5"),
        task("https://archive.test/b.h5", temp.path(), "b.h5"),
        task("https://archive.test/c.h5", temp.path(), "c.h5"),
    ]);

    assert_matches!(report.items[0].outcome, TaskOutcome::Failed { .. });
    assert_matches!(report.items[1].outcome, TaskOutcome::Failed { .. });
    assert_eq!(report.items[2].outcome, TaskOutcome::Downloaded { bytes: 1 });
    assert_eq!(report.failed(), 2);
    // A body that broke midway leaves nothing behind to be mistaken for a finished file.
    assert!(!temp.path().join("b.h5").exists());
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[test]
fn pool_keeps_task_order_and_writes_each_path_once() {
    let temp = tempfile::tempdir().unwrap();
    let mut archive = MockArchive::default();
    let mut tasks = Vec::new();
    for index in 0..12 {
        let url = format!("https://archive.test/{index}.h5");
        archive = archive.with_body(&url, &[format!("body {index}").as_bytes()]);
        tasks.push(task(&url, temp.path(), &format!("{index}.h5")));
    }
    tasks.push(task("https://archive.test/3.h5", temp.path(), "3.h5"));
    let client = Arc::new(archive);
    let downloader = Downloader::new(Arc::clone(&client), 4);

    let report = downloader.fetch(tasks);

    assert_eq!(report.items.len(), 13);
    assert_eq!(report.downloaded(), 12);
    assert_eq!(report.skipped(), 1);
    assert_eq!(client.request_count(), 12);
    for (index, item) in report.items.iter().take(12).enumerate() {
        assert_eq!(item.local_path, temp.path().join(format!("{index}.h5")));
        assert_eq!(
            fs::read(&item.local_path).unwrap(),
            format!("body {index}").into_bytes()
        );
    }
}
