//! Nodata border trim.

use crate::pipeline::{FilterStage, TileState};
use crate::{DiscardReason, FilterResult, Result};
use ada_raster::{Raster, Window};
use tracing::debug;

/// Shrink `raster` to the smallest window holding every valid pixel of band 1.
///
/// Pixels equal to the nodata value, and NaN samples, are not valid. A raster
/// without a nodata value, or without a nodata pixel on its border, comes back
/// unchanged; one with no valid pixel at all is discarded.
pub fn trim_nodata(raster: &Raster) -> Result<FilterResult> {
    if raster.nodata().is_none() {
        return Ok(FilterResult::Cropped(raster.clone()));
    }

    let Some(window) = raster.data_window(0) else {
        return Ok(FilterResult::Discarded(DiscardReason::EmptyRaster));
    };
    if window == Window::full(raster.width(), raster.height()) {
        return Ok(FilterResult::Cropped(raster.clone()));
    }

    debug!(
        col_off = window.col_off,
        row_off = window.row_off,
        width = window.width,
        height = window.height,
        "data window"
    );
    Ok(FilterResult::Cropped(raster.read_window(&window)?))
}

/// Final pipeline stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodataTrimmer;

impl NodataTrimmer {
    /// Create the stage.
    pub fn new() -> Self {
        Self
    }
}

impl FilterStage for NodataTrimmer {
    fn name(&self) -> &'static str {
        "trim"
    }

    fn artifact_suffix(&self) -> &'static str {
        "ntl"
    }

    fn completed_state(&self) -> TileState {
        TileState::Trimmed
    }

    fn apply(&self, raster: Raster) -> Result<FilterResult> {
        trim_nodata(&raster)
    }
}
