//! Tile locators parsed from catalog listing entries.
//!
//! Maxar Open Data lays tiles out as
//! `.../{event}/{pre|post}-event/{date}/{catalog id}/{quadkey}.tif`.
//! The parser reads three things out of that path, once, at the catalog
//! boundary:
//! - the cell identifier: the filename stem, shared by both phases of a cell
//! - the category: the directory segment right above the file
//! - the phase: the nearest ancestor directory named `pre-*` or `post-*`

use crate::{CatalogError, Result};
use std::fmt;
use std::str::FromStr;

/// File suffix of catalog tiles.
pub const TILE_SUFFIX: &str = ".tif";

/// Event phase of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// Imagery captured before the event.
    Pre,
    /// Imagery captured after the event.
    Post,
}

impl Phase {
    /// Local directory name for tiles of this phase.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Phase::Pre => "pre-event",
            Phase::Post => "post-event",
        }
    }

    /// Detect the phase from a directory segment name.
    fn from_segment(segment: &str) -> Option<Self> {
        if segment.starts_with("pre-") {
            Some(Phase::Pre)
        } else if segment.starts_with("post-") {
            Some(Phase::Post)
        } else {
            None
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A remote tile, identified by URL and classified by cell, phase and category.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileLocator {
    url: String,
    file_name: String,
    cell_id: String,
    phase: Phase,
    category: String,
}

impl TileLocator {
    /// Parse a listing entry.
    pub fn parse(locator: &str) -> Result<Self> {
        let invalid = |reason: &str| CatalogError::InvalidLocator {
            locator: locator.to_string(),
            reason: reason.to_string(),
        };

        let path = locator
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let (file_name, parents) = segments
            .split_last()
            .ok_or_else(|| invalid("empty path"))?;
        let cell_id = file_name
            .strip_suffix(TILE_SUFFIX)
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| invalid("not a .tif tile"))?;
        let (category, ancestors) = parents
            .split_last()
            .ok_or_else(|| invalid("no category directory"))?;
        let phase = ancestors
            .iter()
            .rev()
            .find_map(|segment| Phase::from_segment(segment))
            .ok_or_else(|| invalid("no pre-/post- phase directory"))?;

        Ok(Self {
            url: locator.to_string(),
            file_name: file_name.to_string(),
            cell_id: cell_id.to_string(),
            phase,
            category: category.to_string(),
        })
    }

    /// Full URL of the tile.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Remote filename, e.g. `031331232121.tif`.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Ground cell identifier (the filename stem).
    pub fn cell_id(&self) -> &str {
        &self.cell_id
    }

    /// Event phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Directory segment preceding the filename (the acquisition's catalog id).
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Filename used on disk: `{category}-{file_name}`.
    pub fn local_name(&self) -> String {
        format!("{}-{}", self.category, self.file_name)
    }
}

impl FromStr for TileLocator {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TileLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_maxar_url() {
        let url = "https://opendata.digitalglobe.com/typhoon-mangkhut/pre-event/2018-07-12/1030010083417A00/031331232121.tif";
        let locator = TileLocator::parse(url).expect("Should parse Maxar URL");

        assert_eq!(locator.url(), url);
        assert_eq!(locator.phase(), Phase::Pre);
        assert_eq!(locator.category(), "1030010083417A00");
        assert_eq!(locator.cell_id(), "031331232121");
        assert_eq!(locator.file_name(), "031331232121.tif");
        assert_eq!(locator.local_name(), "1030010083417A00-031331232121.tif");
    }

    #[test]
    fn test_parse_short_relative_path() {
        let locator: TileLocator = "a/post-event/x1/img1.tif".parse().unwrap();
        assert_eq!(locator.phase(), Phase::Post);
        assert_eq!(locator.category(), "x1");
        assert_eq!(locator.cell_id(), "img1");
    }

    #[test]
    fn test_parse_ignores_query_string() {
        let locator =
            TileLocator::parse("https://host/e/post-event/d/cat/cell.tif?sig=abc").unwrap();
        assert_eq!(locator.cell_id(), "cell");
    }

    #[test]
    fn test_parse_rejects_bad_entries() {
        assert!(TileLocator::parse("").is_err());
        assert!(TileLocator::parse("a/pre-event/x1/img1.jpg").is_err());
        assert!(TileLocator::parse("a/pre-event/x1/.tif").is_err());
        assert!(TileLocator::parse("img1.tif").is_err());
        // No phase directory above the category
        assert!(TileLocator::parse("a/b/x1/img1.tif").is_err());
        // The category directory itself is never read as the phase
        assert!(TileLocator::parse("a/pre-event/img1.tif").is_err());
    }

    #[test]
    fn test_phase_dir_name() {
        assert_eq!(Phase::Pre.to_string(), "pre-event");
        assert_eq!(Phase::Post.dir_name(), "post-event");
    }
}
