use std::path::Path;

use chrono::NaiveDateTime;
use reqwest::Url;
use serde::Serialize;

use crate::client::{ArchiveClient, EarthdataHttpClient};
use crate::config::ResolvedConfig;
use crate::domain::{Credentials, DownloadTask, RemoteFile, TimeRange};
use crate::download::{DownloadReport, Downloader};
use crate::error::FetchError;
use crate::filter::DateRangeFilter;
use crate::geometry::BoundingBox;
use crate::store::ensure_dir;

/// Tasks a run would execute, without touching the output directory.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub selected: Vec<RemoteFile>,
    pub tasks: Vec<DownloadTask>,
}

pub struct EcostressCloud<C: ArchiveClient + Clone + 'static> {
    filter: DateRangeFilter<C>,
    downloader: Downloader<C>,
}

impl EcostressCloud<EarthdataHttpClient> {
    /// Builds the HTTP client once; every request of this instance reuses its session.
    pub fn connect(config: &ResolvedConfig, credentials: Credentials) -> Result<Self, FetchError> {
        let client = EarthdataHttpClient::new(Some(credentials), config.timeout)?;
        Self::new(client, config)
    }
}

impl<C: ArchiveClient + Clone + 'static> EcostressCloud<C> {
    pub fn new(client: C, config: &ResolvedConfig) -> Result<Self, FetchError> {
        let filter = DateRangeFilter::new(
            client.clone(),
            config.store(),
            &config.base_url,
            &config.product,
            config.metadata_policy,
        )?;
        Ok(Self {
            filter,
            downloader: Downloader::new(client, config.download_workers),
        })
    }

    pub fn day_urls(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Url>, FetchError> {
        self.filter.day_urls(&TimeRange::new(start, end))
    }

    pub fn select(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        bbox: &BoundingBox,
    ) -> Result<Vec<RemoteFile>, FetchError> {
        self.filter.select(&TimeRange::new(start, end), bbox)
    }

    pub fn plan(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        bbox: &BoundingBox,
        output_dir: &Path,
    ) -> Result<Plan, FetchError> {
        let selected = self.select(start, end, bbox)?;
        let tasks = selected
            .iter()
            .map(|file| file.download_task(output_dir))
            .collect();
        Ok(Plan { selected, tasks })
    }

    /// Selects every matching granule, then downloads the ones not already in
    /// `output_dir`. Selection errors abort before any download starts.
    pub fn download(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        bbox: &BoundingBox,
        output_dir: &Path,
    ) -> Result<DownloadReport, FetchError> {
        let tasks = self
            .filter
            .tasks(&TimeRange::new(start, end), bbox, output_dir)?;
        ensure_dir(output_dir)?;
        Ok(self.downloader.fetch(tasks))
    }
}
