use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Inclusive acquisition window. `start <= end` is the caller's responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn contains(&self, time: NaiveDateTime) -> bool {
        self.start <= time && time <= self.end
    }

    /// Every calendar date from the start date through the end date, both
    /// included, regardless of the time-of-day carried by either bound.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let last = self.end.date();
        std::iter::successors(Some(self.start.date()), |day| day.checked_add_days(Days::new(1)))
            .take_while(move |day| *day <= last)
    }
}

/// Accepts `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM`
/// or a bare `YYYY-MM-DD`, which means midnight.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, FetchError> {
    let trimmed = value.trim();
    const FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"];
    for format in FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| FetchError::InvalidTimestamp(value.to_string()))
}

/// A candidate link discovered on a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteFile {
    pub url: String,
    pub filename: String,
    pub acquisition_time: Option<NaiveDateTime>,
}

impl RemoteFile {
    pub fn metadata_url(&self) -> String {
        format!("{}.xml", self.url)
    }

    pub fn download_task(&self, output_dir: &Path) -> DownloadTask {
        DownloadTask {
            remote_url: self.url.clone(),
            local_path: output_dir.join(&self.filename),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadTask {
    pub remote_url: String,
    pub local_path: PathBuf,
}

impl DownloadTask {
    /// A task is a no-op iff its local path already exists.
    pub fn is_satisfied(&self) -> bool {
        self.local_path.exists()
    }
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Last path segment of a URL, ignoring any query or fragment.
pub fn basename(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}
