use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::client::ArchiveClient;
use crate::error::FetchError;

static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

/// Every anchor's `href` in document order. Anchors without one yield `None`.
pub fn extract_links(html: &str) -> Vec<Option<String>> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR_SELECTOR)
        .map(|anchor| anchor.value().attr("href").map(str::to_string))
        .collect()
}

pub struct ListingFetcher<C: ArchiveClient> {
    client: C,
}

impl<C: ArchiveClient> ListingFetcher<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn links(&self, page_url: &str) -> Result<Vec<Option<String>>, FetchError> {
        let html = self.client.get_text(page_url)?;
        Ok(extract_links(&html))
    }
}
