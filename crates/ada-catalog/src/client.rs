//! Tile catalog listing.
//!
//! Maxar publishes one HTML index page per event. [`HttpCatalog`] fetches that
//! page and turns every `.tif` anchor into a [`TileLocator`].

use crate::{CatalogError, Result, TileLocator};
use regex::Regex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Base URL of the Maxar Open Data event pages.
pub const DEFAULT_CATALOG_URL: &str = "https://www.digitalglobe.com/ecosystem/open-data/";

/// Request timeout for listing pages.
const LISTING_TIMEOUT: Duration = Duration::from_secs(60);

/// Source of tile locators for a disaster event.
pub trait CatalogClient {
    /// List every tile published for `disaster`, in catalog order.
    fn list_tiles(&self, disaster: &str) -> Result<Vec<TileLocator>>;
}

/// Page slug for an event name: lowercased, spaces replaced by `-`.
pub fn disaster_slug(disaster: &str) -> String {
    disaster.trim().to_lowercase().replace(' ', "-")
}

/// Catalog backed by the Maxar Open Data HTML index pages.
pub struct HttpCatalog {
    base_url: String,
    client: reqwest::blocking::Client,
    parser: ListingParser,
}

impl std::fmt::Debug for HttpCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCatalog")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HttpCatalog {
    /// Catalog rooted at [`DEFAULT_CATALOG_URL`].
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_CATALOG_URL)
    }

    /// Catalog rooted at another base URL. A trailing `/` is added if missing.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(LISTING_TIMEOUT)
            .build()?;

        Ok(Self {
            base_url,
            client,
            parser: ListingParser::new()?,
        })
    }

    /// URL of the index page for `disaster`.
    pub fn page_url(&self, disaster: &str) -> String {
        format!("{}{}", self.base_url, disaster_slug(disaster))
    }
}

impl CatalogClient for HttpCatalog {
    fn list_tiles(&self, disaster: &str) -> Result<Vec<TileLocator>> {
        let url = self.page_url(disaster);
        info!(%url, "Fetching tile listing");

        let response = self.client.get(&url).send()?;
        if !response.status().is_success() {
            return Err(CatalogError::HttpStatus {
                url,
                status: response.status().as_u16(),
            });
        }

        let html = response.text()?;
        let tiles = self.parser.parse(&html);
        info!(%url, tiles = tiles.len(), "Listed tiles");
        Ok(tiles)
    }
}

/// Extracts tile locators from a listing page.
#[derive(Debug, Clone)]
pub struct ListingParser {
    href: Regex,
}

impl ListingParser {
    /// Parser matching anchors whose target ends in `.tif`.
    pub fn new() -> Result<Self> {
        let href = Regex::new(r#"(?i)href\s*=\s*["']([^"']+\.tif)["']"#)?;
        Ok(Self { href })
    }

    /// Every anchor target ending in `.tif`, in page order.
    pub fn links<'a>(&self, html: &'a str) -> Vec<&'a str> {
        self.href
            .captures_iter(html)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .collect()
    }

    /// Parse the `.tif` anchors of a page, skipping malformed entries.
    pub fn parse(&self, html: &str) -> Vec<TileLocator> {
        self.links(html)
            .into_iter()
            .filter_map(|href| match TileLocator::parse(href) {
                Ok(locator) => Some(locator),
                Err(e) => {
                    warn!(href, error = %e, "Skipping listing entry");
                    None
                }
            })
            .inspect(|locator| debug!(url = locator.url(), phase = %locator.phase(), "Listed tile"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Phase;

    const PAGE: &str = r#"
        <html><body>
        <textarea>
        <a href="https://opendata.digitalglobe.com/hurricane-michael/pre-event/2018-05-04/10300100786A1B00/031311102230.tif">pre</a>
        <a href='https://opendata.digitalglobe.com/hurricane-michael/post-event/2018-10-13/105001001244DB00/031311102230.tif'>post</a>
        <a HREF="https://opendata.digitalglobe.com/hurricane-michael/post-event/2018-10-13/105001001244DB00/031311102230.tif.ovr">ovr</a>
        <a href="https://opendata.digitalglobe.com/hurricane-michael/post-event/2018-10-13/105001001244DB00/031311102230-visual.png">png</a>
        <a href="https://opendata.digitalglobe.com/hurricane-michael/mosaic.tif">bad</a>
        </textarea>
        </body></html>
    "#;

    #[test]
    fn test_disaster_slug() {
        assert_eq!(disaster_slug("Hurricane Michael"), "hurricane-michael");
        assert_eq!(disaster_slug("  typhoon-mangkhut "), "typhoon-mangkhut");
    }

    #[test]
    fn test_extract_tile_links() {
        let links = ListingParser::new().unwrap().links(PAGE);
        assert_eq!(links.len(), 3);
        assert!(links.iter().all(|l| l.ends_with(".tif")));
    }

    #[test]
    fn test_parse_listing_skips_malformed() {
        let tiles = ListingParser::new().unwrap().parse(PAGE);
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[0].phase(), Phase::Pre);
        assert_eq!(tiles[1].phase(), Phase::Post);
        assert_eq!(tiles[0].cell_id(), tiles[1].cell_id());
    }

    #[test]
    fn test_page_url() {
        let catalog = HttpCatalog::with_base_url("http://localhost:8000/open-data").unwrap();
        assert_eq!(
            catalog.page_url("Hurricane Michael"),
            "http://localhost:8000/open-data/hurricane-michael"
        );
    }
}
