//! Pairing of pre-event and post-event tiles by ground cell.

use crate::{Phase, TileLocator};
use std::collections::{BTreeSet, HashSet};

/// Tiles retained after pairing, each list sorted by cell identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Pre-event tiles whose cell also has post-event imagery.
    pub pre: Vec<TileLocator>,
    /// Post-event tiles whose cell also has pre-event imagery.
    pub post: Vec<TileLocator>,
}

impl Selection {
    /// True when no cell is covered by both phases.
    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty()
    }

    /// Distinct cell identifiers of the pre-event list.
    pub fn pre_cells(&self) -> BTreeSet<&str> {
        self.pre.iter().map(TileLocator::cell_id).collect()
    }

    /// Distinct cell identifiers of the post-event list.
    pub fn post_cells(&self) -> BTreeSet<&str> {
        self.post.iter().map(TileLocator::cell_id).collect()
    }

    /// Keep at most `max_pre` pre-event and `max_post` post-event tiles.
    #[must_use]
    pub fn limit(mut self, max_pre: usize, max_post: usize) -> Self {
        self.pre.truncate(max_pre);
        self.post.truncate(max_post);
        self
    }
}

/// Split a mixed listing by phase, keeping catalog order.
pub fn partition<I>(locators: I) -> (Vec<TileLocator>, Vec<TileLocator>)
where
    I: IntoIterator<Item = TileLocator>,
{
    locators
        .into_iter()
        .partition(|locator| locator.phase() == Phase::Pre)
}

/// Keep the tiles of every cell that appears in both phases.
///
/// The match is on cell identifier (filename stem), never on the full URL.
/// Each output list is sorted by cell identifier; tiles sharing a cell keep
/// their catalog order. An empty intersection yields an empty selection.
pub fn select(pre: &[TileLocator], post: &[TileLocator]) -> Selection {
    let pre_ids: HashSet<&str> = pre.iter().map(TileLocator::cell_id).collect();
    let post_ids: HashSet<&str> = post.iter().map(TileLocator::cell_id).collect();

    Selection {
        pre: retain_paired(pre, &post_ids),
        post: retain_paired(post, &pre_ids),
    }
}

fn retain_paired(tiles: &[TileLocator], other_phase: &HashSet<&str>) -> Vec<TileLocator> {
    let mut kept: Vec<TileLocator> = tiles
        .iter()
        .filter(|tile| other_phase.contains(tile.cell_id()))
        .cloned()
        .collect();
    // Stable sort: ties stay in catalog order.
    kept.sort_by(|a, b| a.cell_id().cmp(b.cell_id()));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locators(urls: &[&str]) -> Vec<TileLocator> {
        urls.iter()
            .map(|url| TileLocator::parse(url).unwrap())
            .collect()
    }

    fn names(tiles: &[TileLocator]) -> Vec<&str> {
        tiles.iter().map(TileLocator::file_name).collect()
    }

    #[test]
    fn test_unmatched_pre_tile_dropped() {
        let pre = locators(&["a/pre-event/x1/img1.tif", "a/pre-event/x2/img2.tif"]);
        let post = locators(&["a/post-event/x1/img1.tif"]);

        let selection = select(&pre, &post);
        assert_eq!(names(&selection.pre), vec!["img1.tif"]);
        assert_eq!(names(&selection.post), vec!["img1.tif"]);
    }

    #[test]
    fn test_match_ignores_category() {
        let pre = locators(&["e/pre-event/d/catA/0313.tif"]);
        let post = locators(&["e/post-event/d/catB/0313.tif"]);

        let selection = select(&pre, &post);
        assert_eq!(selection.pre.len(), 1);
        assert_eq!(selection.post.len(), 1);
        assert_eq!(selection.post[0].category(), "catB");
    }

    #[test]
    fn test_sorted_by_cell_with_stable_ties() {
        let pre = locators(&[
            "e/pre-event/d/c2/0300.tif",
            "e/pre-event/d/c1/0200.tif",
            "e/pre-event/d/c1/0300.tif",
        ]);
        let post = locators(&["e/post-event/d/c9/0300.tif", "e/post-event/d/c9/0200.tif"]);

        let selection = select(&pre, &post);
        let order: Vec<(&str, &str)> = selection
            .pre
            .iter()
            .map(|t| (t.cell_id(), t.category()))
            .collect();
        assert_eq!(order, vec![("0200", "c1"), ("0300", "c2"), ("0300", "c1")]);
    }

    #[test]
    fn test_empty_intersection() {
        let pre = locators(&["e/pre-event/d/c/1.tif"]);
        let post = locators(&["e/post-event/d/c/2.tif"]);
        let selection = select(&pre, &post);
        assert!(selection.is_empty());

        assert!(select(&[], &post).is_empty());
    }

    #[test]
    fn test_cells_match_and_equal_intersection() {
        let pre = locators(&[
            "e/pre-event/d/c/1.tif",
            "e/pre-event/d/c/2.tif",
            "e/pre-event/d/k/2.tif",
            "e/pre-event/d/c/3.tif",
        ]);
        let post = locators(&[
            "e/post-event/d/c/2.tif",
            "e/post-event/d/c/3.tif",
            "e/post-event/d/c/4.tif",
        ]);

        let selection = select(&pre, &post);
        let expected: BTreeSet<&str> = ["2", "3"].into_iter().collect();
        assert_eq!(selection.pre_cells(), expected);
        assert_eq!(selection.post_cells(), expected);
        assert_eq!(selection.pre.len(), 3);
    }

    #[test]
    fn test_select_is_idempotent() {
        let pre = locators(&[
            "e/pre-event/d/c/9.tif",
            "e/pre-event/d/c/1.tif",
            "e/pre-event/d/c/5.tif",
        ]);
        let post = locators(&["e/post-event/d/c/5.tif", "e/post-event/d/c/9.tif"]);

        let once = select(&pre, &post);
        let twice = select(&once.pre, &once.post);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_partition_and_limit() {
        let all = locators(&[
            "e/post-event/d/c/1.tif",
            "e/pre-event/d/c/1.tif",
            "e/pre-event/d/c/2.tif",
            "e/post-event/d/c/2.tif",
        ]);
        let (pre, post) = partition(all);
        assert!(pre.iter().all(|t| t.phase() == Phase::Pre));
        assert!(post.iter().all(|t| t.phase() == Phase::Post));

        let selection = select(&pre, &post).limit(1, 5);
        assert_eq!(selection.pre.len(), 1);
        assert_eq!(selection.post.len(), 2);
    }
}
