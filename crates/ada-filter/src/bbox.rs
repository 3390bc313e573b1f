//! Bounding-box crop.

use crate::pipeline::{FilterStage, TileState};
use crate::{DiscardReason, FilterError, FilterResult, Result};
use ada_raster::Raster;
use geo::{coord, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Axis-aligned ground rectangle in the raster's own reference system.
///
/// Deserializes from `[min_x, min_y, max_x, max_y]`; the command line takes the
/// same four numbers comma-separated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl BoundingBox {
    /// Create a bounding box. Corners must be finite with min < max on both axes.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        if ![min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite()) {
            return Err(FilterError::InvalidBoundingBox(
                "coordinates must be finite".to_string(),
            ));
        }
        if min_x >= max_x || min_y >= max_y {
            return Err(FilterError::InvalidBoundingBox(format!(
                "expected min < max, got ({min_x}, {min_y}) - ({max_x}, {max_y})"
            )));
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    /// Western edge.
    pub fn min_x(&self) -> f64 {
        self.min_x
    }

    /// Southern edge.
    pub fn min_y(&self) -> f64 {
        self.min_y
    }

    /// Eastern edge.
    pub fn max_x(&self) -> f64 {
        self.max_x
    }

    /// Northern edge.
    pub fn max_y(&self) -> f64 {
        self.max_y
    }

    /// As a `geo` rectangle.
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.min_x, y: self.min_y },
            coord! { x: self.max_x, y: self.max_y },
        )
    }
}

impl TryFrom<[f64; 4]> for BoundingBox {
    type Error = FilterError;

    fn try_from([min_x, min_y, max_x, max_y]: [f64; 4]) -> Result<Self> {
        Self::new(min_x, min_y, max_x, max_y)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(bbox: BoundingBox) -> Self {
        [bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y]
    }
}

impl FromStr for BoundingBox {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        let values = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| FilterError::InvalidBoundingBox(format!("'{s}': {e}")))?;

        let corners: [f64; 4] = values.try_into().map_err(|_| {
            FilterError::InvalidBoundingBox(format!("'{s}': expected min_x,min_y,max_x,max_y"))
        })?;
        Self::try_from(corners)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

/// Intersection of two rectangles, `None` when it has no area.
pub(crate) fn intersect(a: &Rect<f64>, b: &Rect<f64>) -> Option<Rect<f64>> {
    let min_x = a.min().x.max(b.min().x);
    let min_y = a.min().y.max(b.min().y);
    let max_x = a.max().x.min(b.max().x);
    let max_y = a.max().y.min(b.max().y);

    (max_x > min_x && max_y > min_y)
        .then(|| Rect::new(coord! { x: min_x, y: min_y }, coord! { x: max_x, y: max_y }))
}

/// Clip `raster` to the part of it inside `bbox`.
///
/// The output is the smallest whole-pixel window covering the intersection,
/// with the geotransform moved to the window origin. A tile that only touches
/// the box along an edge, or misses it, is discarded.
pub fn crop_to_bbox(raster: &Raster, bbox: &BoundingBox) -> Result<FilterResult> {
    let Some(overlap) = intersect(&raster.bounds(), &bbox.to_rect()) else {
        return Ok(FilterResult::Discarded(DiscardReason::NoOverlap));
    };
    let Some(window) = raster.window_for_bounds(&overlap) else {
        return Ok(FilterResult::Discarded(DiscardReason::NoOverlap));
    };

    debug!(
        col_off = window.col_off,
        row_off = window.row_off,
        width = window.width,
        height = window.height,
        "bbox window"
    );
    Ok(FilterResult::Cropped(raster.read_window(&window)?))
}

/// Pipeline stage clipping every tile to one bounding box.
#[derive(Debug, Clone, Copy)]
pub struct BoundingBoxCropper {
    bbox: BoundingBox,
}

impl BoundingBoxCropper {
    /// Stage cropping to `bbox`.
    pub fn new(bbox: BoundingBox) -> Self {
        Self { bbox }
    }

    /// The configured box.
    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }
}

impl FilterStage for BoundingBoxCropper {
    fn name(&self) -> &'static str {
        "bbox"
    }

    fn artifact_suffix(&self) -> &'static str {
        "bbox"
    }

    fn completed_state(&self) -> TileState {
        TileState::BBoxFiltered
    }

    fn apply(&self, raster: Raster) -> Result<FilterResult> {
        crop_to_bbox(&raster, &self.bbox)
    }
}
