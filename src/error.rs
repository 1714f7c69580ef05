use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum FetchError {
    #[error("archive request failed: {0}")]
    Transport(String),

    #[error("archive returned status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("metadata document unavailable at {url}: {reason}")]
    MetadataUnavailable { url: String, reason: String },

    #[error("metadata document {path} is malformed: {reason}")]
    #[diagnostic(help(
        "delete the cached file to force a fresh download of the metadata document"
    ))]
    MetadataMalformed { path: PathBuf, reason: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid bounding box: {0}")]
    #[diagnostic(help("expected four comma separated numbers: minLon,minLat,maxLon,maxLat"))]
    InvalidBoundingBox(String),

    #[error("invalid timestamp: {0}")]
    #[diagnostic(help("expected YYYY-MM-DD, YYYY-MM-DDTHH:MM or YYYY-MM-DDTHH:MM:SS"))]
    InvalidTimestamp(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("missing config file ecostress-fetch.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("no Earthdata Login credentials available")]
    #[diagnostic(help(
        "register at https://urs.earthdata.nasa.gov/users/new, then set EARTHDATA_USERNAME and EARTHDATA_PASSWORD"
    ))]
    MissingCredentials,
}

impl FetchError {
    /// True for failures caused by the archive or the network rather than by local input.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            FetchError::Transport(_)
                | FetchError::Status { .. }
                | FetchError::MetadataUnavailable { .. }
        )
    }
}
