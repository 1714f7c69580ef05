use std::path::Path;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::client::ArchiveClient;
use crate::domain::{DownloadTask, RemoteFile, TimeRange, basename};
use crate::error::FetchError;
use crate::geometry::{BoundingBox, Rectangle};
use crate::granule::parse_acquisition_time;
use crate::listing::ListingFetcher;
use crate::metadata::MetadataFetcher;
use crate::store::Store;

/// What to do when a candidate's sidecar cannot be fetched or parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataPolicy {
    /// Stop the whole selection on the first failure.
    #[default]
    Abort,
    /// Log a warning and leave only that file out.
    Skip,
}

pub struct DateRangeFilter<C: ArchiveClient + Clone> {
    product_url: Url,
    listing: ListingFetcher<C>,
    metadata: MetadataFetcher<C>,
    policy: MetadataPolicy,
}

impl<C: ArchiveClient + Clone> DateRangeFilter<C> {
    pub fn new(
        client: C,
        store: Store,
        base_url: &str,
        product: &str,
        policy: MetadataPolicy,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            product_url: product_url(base_url, product)?,
            listing: ListingFetcher::new(client.clone()),
            metadata: MetadataFetcher::new(client, store)?,
            policy,
        })
    }

    pub fn day_urls(&self, range: &TimeRange) -> Result<Vec<Url>, FetchError> {
        day_urls(&self.product_url, range)
    }

    /// Granules acquired within `range` whose footprint touches `bbox`, in
    /// listing order, day by day. Links repeated across pages are kept.
    pub fn select(
        &self,
        range: &TimeRange,
        bbox: &BoundingBox,
    ) -> Result<Vec<RemoteFile>, FetchError> {
        let target = bbox.to_rectangle();
        let mut selected = Vec::new();
        tracing::info!("selecting granules acquired {} to {}", range.start(), range.end());

        for day_url in self.day_urls(range)? {
            tracing::info!("listing {day_url}");
            let hrefs = self.listing.links(day_url.as_str())?;

            for href in hrefs.into_iter().flatten() {
                let Ok(link) = day_url.join(&href) else {
                    tracing::debug!("ignoring unresolvable link {href:?}");
                    continue;
                };
                let Some(acquired) = parse_acquisition_time(&href) else {
                    continue;
                };
                if !range.contains(acquired) {
                    continue;
                }

                let candidate = RemoteFile {
                    filename: basename(link.as_str()).to_string(),
                    url: link.into(),
                    acquisition_time: Some(acquired),
                };
                match self.overlaps(&candidate, &target) {
                    Ok(true) => selected.push(candidate),
                    Ok(false) => {
                        tracing::debug!("{} is outside the target box", candidate.filename)
                    }
                    Err(err) => match self.policy {
                        MetadataPolicy::Abort => return Err(err),
                        MetadataPolicy::Skip => {
                            tracing::warn!("skipping {}: {err}", candidate.filename);
                        }
                    },
                }
            }
        }

        tracing::info!("selected {} granules", selected.len());
        Ok(selected)
    }

    pub fn tasks(
        &self,
        range: &TimeRange,
        bbox: &BoundingBox,
        output_dir: &Path,
    ) -> Result<Vec<DownloadTask>, FetchError> {
        Ok(self
            .select(range, bbox)?
            .iter()
            .map(|file| file.download_task(output_dir))
            .collect())
    }

    fn overlaps(&self, file: &RemoteFile, target: &Rectangle) -> Result<bool, FetchError> {
        let footprint = self.metadata.bounding_box_of(&file.metadata_url())?;
        Ok(footprint.intersects(target))
    }
}

/// `<base>/<product>/`, with the trailing slash that later joins rely on.
pub fn product_url(base_url: &str, product: &str) -> Result<Url, FetchError> {
    let base = if base_url.ends_with('/') {
        Url::parse(base_url)
    } else {
        Url::parse(&format!("{base_url}/"))
    }
    .map_err(|err| FetchError::InvalidUrl(format!("{base_url}: {err}")))?;
    base.join(&format!("{}/", product.trim_matches('/')))
        .map_err(|err| FetchError::InvalidUrl(format!("{product}: {err}")))
}

/// One listing URL per calendar day of `range`, formatted `YYYY.MM.DD/`.
pub fn day_urls(product_url: &Url, range: &TimeRange) -> Result<Vec<Url>, FetchError> {
    range
        .days()
        .map(|day| {
            product_url
                .join(&day.format("%Y.%m.%d/").to_string())
                .map_err(|err| FetchError::InvalidUrl(err.to_string()))
        })
        .collect()
}
