use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use tempfile::Builder;

use crate::domain::basename;
use crate::error::FetchError;

const CHUNK_SIZE: usize = 64 * 1024;

/// Local layout for the metadata sidecar cache.
#[derive(Debug, Clone)]
pub struct Store {
    metadata_root: Utf8PathBuf,
}

impl Store {
    pub fn new() -> Result<Self, FetchError> {
        let metadata_root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(
                    dirs.cache_dir().join("ecostress-fetch").join("xml_files"),
                )
                .ok()
            })
            .ok_or_else(|| {
                FetchError::Filesystem("unable to resolve cache directory".to_string())
            })?;
        Ok(Self { metadata_root })
    }

    pub fn new_with_paths(metadata_root: Utf8PathBuf) -> Self {
        Self { metadata_root }
    }

    pub fn metadata_root(&self) -> &Utf8Path {
        &self.metadata_root
    }

    /// Cache location of a sidecar, keyed by the basename of its URL.
    pub fn metadata_path(&self, metadata_url: &str) -> Utf8PathBuf {
        self.metadata_root.join(basename(metadata_url))
    }

    pub fn ensure_metadata_root(&self) -> Result<(), FetchError> {
        ensure_dir(self.metadata_root.as_std_path())
    }
}

pub fn ensure_dir(path: &Path) -> Result<(), FetchError> {
    fs::create_dir_all(path)
        .map_err(|err| FetchError::Filesystem(format!("create {}: {err}", path.display())))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(u64),
    /// Another writer created the destination first; nothing was replaced.
    AlreadyPresent,
}

/// Streams `source` into `destination` through a temp file in the same
/// directory. The destination only appears once the body is complete and is
/// never overwritten.
pub fn write_stream_atomic(
    source: &mut dyn Read,
    destination: &Path,
) -> Result<WriteOutcome, FetchError> {
    let parent = destination
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = Builder::new()
        .prefix(".ecostress-fetch")
        .suffix(".part")
        .tempfile_in(parent)
        .map_err(|err| FetchError::Filesystem(err.to_string()))?;

    let written = copy_until_empty(source, temp.as_file_mut())?;
    temp.as_file_mut()
        .flush()
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|err| FetchError::Filesystem(err.to_string()))?;

    match temp.persist_noclobber(destination) {
        Ok(_) => Ok(WriteOutcome::Written(written)),
        Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
            Ok(WriteOutcome::AlreadyPresent)
        }
        Err(err) => Err(FetchError::Filesystem(format!(
            "persist {}: {}",
            destination.display(),
            err.error
        ))),
    }
}

/// Reads chunks until a read returns zero bytes, writing each one in full.
/// A short chunk is not treated as the end of the stream.
pub fn copy_until_empty(source: &mut dyn Read, sink: &mut dyn Write) -> Result<u64, FetchError> {
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let read = match source.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(FetchError::Transport(err.to_string())),
        };
        sink.write_all(&buffer[..read])
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        total += read as u64;
    }
    Ok(total)
}
