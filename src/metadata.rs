use std::fs;
use std::path::Path;

use crate::client::ArchiveClient;
use crate::error::FetchError;
use crate::geometry::Rectangle;
use crate::store::{Store, WriteOutcome, write_stream_atomic};

const BOUNDING_RECTANGLE: &str = "BoundingRectangle";

/// Resolves granule footprints from their XML sidecars, keeping a local copy
/// of every sidecar it has seen. A cached copy is never refreshed.
pub struct MetadataFetcher<C: ArchiveClient> {
    client: C,
    store: Store,
}

impl<C: ArchiveClient> MetadataFetcher<C> {
    pub fn new(client: C, store: Store) -> Result<Self, FetchError> {
        store.ensure_metadata_root()?;
        Ok(Self { client, store })
    }

    pub fn bounding_box_of(&self, metadata_url: &str) -> Result<Rectangle, FetchError> {
        let path = self.store.metadata_path(metadata_url);
        if path.as_std_path().exists() {
            tracing::debug!("using cached metadata {path}");
        } else {
            self.fetch_into(metadata_url, path.as_std_path())?;
        }
        read_bounding_rectangle(path.as_std_path())
    }

    fn fetch_into(&self, metadata_url: &str, path: &Path) -> Result<(), FetchError> {
        let unavailable = |err: FetchError| FetchError::MetadataUnavailable {
            url: metadata_url.to_string(),
            reason: err.to_string(),
        };
        let mut body = self.client.open(metadata_url).map_err(unavailable)?;
        match write_stream_atomic(&mut body, path) {
            Ok(WriteOutcome::Written(bytes)) => {
                tracing::debug!("cached metadata {} ({bytes} bytes)", path.display());
                Ok(())
            }
            Ok(WriteOutcome::AlreadyPresent) => Ok(()),
            Err(err @ FetchError::Transport(_)) => Err(unavailable(err)),
            Err(err) => Err(err),
        }
    }
}

pub fn read_bounding_rectangle(path: &Path) -> Result<Rectangle, FetchError> {
    let content = fs::read_to_string(path).map_err(|err| FetchError::MetadataMalformed {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    parse_bounding_rectangle(&content).map_err(|reason| FetchError::MetadataMalformed {
        path: path.to_path_buf(),
        reason,
    })
}

/// Reads the first `BoundingRectangle` element of a granule metadata document.
pub fn parse_bounding_rectangle(xml: &str) -> Result<Rectangle, String> {
    let document = roxmltree::Document::parse(xml).map_err(|err| err.to_string())?;
    let rectangle = document
        .descendants()
        .find(|node| node.has_tag_name(BOUNDING_RECTANGLE))
        .ok_or_else(|| format!("missing {BOUNDING_RECTANGLE} element"))?;

    let coordinate = |name: &str| -> Result<f64, String> {
        let text = rectangle
            .children()
            .find(|child| child.has_tag_name(name))
            .ok_or_else(|| format!("missing {name}"))?
            .text()
            .unwrap_or_default()
            .trim();
        text.parse::<f64>()
            .map_err(|_| format!("{name} is not a number: {text:?}"))
    };

    Ok(Rectangle::from_bounds(
        coordinate("WestBoundingCoordinate")?,
        coordinate("NorthBoundingCoordinate")?,
        coordinate("EastBoundingCoordinate")?,
        coordinate("SouthBoundingCoordinate")?,
    ))
}
