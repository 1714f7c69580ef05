use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Read};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use ecostress_fetch::client::ArchiveClient;
use ecostress_fetch::error::FetchError;
use ecostress_fetch::geometry::BoundingBox;
use ecostress_fetch::metadata::MetadataFetcher;
use ecostress_fetch::store::Store;

const GRANULE_XML: &str = "ECOSTRESS_L2_CLOUD_21049_006_20220130T061531_0601_01.h5.xml";

fn sidecar_url() -> String {
    format!("https://archive.test/ECOSTRESS/ECO2CLD.001/2022.01.30/{GRANULE_XML}")
}

#[derive(Default)]
struct MockArchive {
    documents: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl MockArchive {
    fn with_fixture() -> Self {
        let body = fs::read(format!("tests/fixtures/{GRANULE_XML}")).unwrap();
        Self {
            documents: HashMap::from([(sidecar_url(), body)]),
            ..Self::default()
        }
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
        match self.documents.get(url) {
            Some(body) => Ok(Box::new(Cursor::new(body.clone()))),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

fn store_in(dir: &tempfile::TempDir) -> Store {
    Store::new_with_paths(Utf8PathBuf::from_path_buf(dir.path().join("xml_files")).unwrap())
}

#[test]
fn footprint_from_sidecar() {
    let temp = tempfile::tempdir().unwrap();
    let fetcher = MetadataFetcher::new(MockArchive::with_fixture(), store_in(&temp)).unwrap();

    let footprint = fetcher.bounding_box_of(&sidecar_url()).unwrap();
    assert_eq!(
        footprint.corners(),
        [
            (-122.778572, 38.030651),
            (-117.125183, 38.030651),
            (-117.125183, 32.858040),
            (-122.778572, 32.858040),
        ]
    );
    assert!(footprint.intersects(&BoundingBox::new(-120.0, 35.0, -118.0, 36.0).to_rectangle()));
    assert!(!footprint.intersects(&BoundingBox::new(-95.0, 35.0, -90.0, 36.0).to_rectangle()));
}

#[test]
fn sidecar_is_fetched_once() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp);
    let client = Arc::new(MockArchive::with_fixture());
    let fetcher = MetadataFetcher::new(Arc::clone(&client), store.clone()).unwrap();

    fetcher.bounding_box_of(&sidecar_url()).unwrap();
    fetcher.bounding_box_of(&sidecar_url()).unwrap();
    assert_eq!(client.request_count(), 1);
    assert!(store.metadata_path(&sidecar_url()).as_std_path().exists());

    let next_client = Arc::new(MockArchive::with_fixture());
    let next_run = MetadataFetcher::new(Arc::clone(&next_client), store).unwrap();
    next_run.bounding_box_of(&sidecar_url()).unwrap();
    assert_eq!(next_client.request_count(), 0);
}

#[test]
fn cached_copy_skips_network_even_if_stale() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp);
    store.ensure_metadata_root().unwrap();
    fs::write(
        store.metadata_path(&sidecar_url()).as_std_path(),
        "<G><BoundingRectangle>\
         <WestBoundingCoordinate>0</WestBoundingCoordinate>\
         <NorthBoundingCoordinate>1</NorthBoundingCoordinate>\
         <EastBoundingCoordinate>1</EastBoundingCoordinate>\
         <SouthBoundingCoordinate>0</SouthBoundingCoordinate>\
         </BoundingRectangle></G>",
    )
    .unwrap();

    let fetcher = MetadataFetcher::new(MockArchive::with_fixture(), store).unwrap();
    let footprint = fetcher.bounding_box_of(&sidecar_url()).unwrap();
    assert_eq!(footprint.corners()[0], (0.0, 1.0));
}

#[test]
fn missing_sidecar_is_unavailable() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp);
    let fetcher = MetadataFetcher::new(MockArchive::default(), store.clone()).unwrap();

    let err = fetcher.bounding_box_of(&sidecar_url()).unwrap_err();
    assert_matches!(err, FetchError::MetadataUnavailable { .. });
    assert!(!store.metadata_path(&sidecar_url()).as_std_path().exists());
}

#[test]
fn malformed_sidecar_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let client = MockArchive {
        documents: HashMap::from([(
            sidecar_url(),
            concat!(
                "<G><BoundingRectangle>",
                "<WestBoundingCoordinate>n/a</WestBoundingCoordinate>",
                "</BoundingRectangle></G>"
            )
            .as_bytes()
            .to_vec(),
        )]),
        ..MockArchive::default()
    };
    let fetcher = MetadataFetcher::new(client, store_in(&temp)).unwrap();

    let err = fetcher.bounding_box_of(&sidecar_url()).unwrap_err();
    assert_matches!(err, FetchError::MetadataMalformed { .. });
}

#[test]
fn sidecar_with_swapped_extents_still_covers_its_area() {
    let temp = tempfile::tempdir().unwrap();
    let client = MockArchive {
        documents: HashMap::from([(
            sidecar_url(),
            concat!(
                "<G><BoundingRectangle>",
                "<WestBoundingCoordinate>10</WestBoundingCoordinate>",
                "<NorthBoundingCoordinate>5</NorthBoundingCoordinate>",
                "<EastBoundingCoordinate>-10</EastBoundingCoordinate>",
                "<SouthBoundingCoordinate>0</SouthBoundingCoordinate>",
                "</BoundingRectangle></G>"
            )
            .as_bytes()
            .to_vec(),
        )]),
        ..MockArchive::default()
    };
    let fetcher = MetadataFetcher::new(client, store_in(&temp)).unwrap();

    let footprint = fetcher.bounding_box_of(&sidecar_url()).unwrap();
    assert!(!footprint.is_empty());
    assert!(footprint.intersects(&BoundingBox::new(-1.0, 1.0, 1.0, 2.0).to_rectangle()));
    assert!(!footprint.intersects(&BoundingBox::new(20.0, 1.0, 30.0, 2.0).to_rectangle()));
}
