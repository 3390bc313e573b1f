//! Results of a filter stage.

use ada_raster::{Crs, Raster};
use std::fmt;

/// Why a tile left the pipeline early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// The tile does not intersect the bounding box.
    NoOverlap,
    /// No mask polygon touches the tile.
    NoPopulatedArea,
    /// The tile holds no valid pixel after clipping.
    EmptyRaster,
    /// The tile is in a different reference system than the mask.
    CrsMismatch {
        /// Raster reference system.
        raster: Crs,
        /// Mask reference system.
        mask: Crs,
    },
    /// Reading or writing the tile failed; the message is the cause.
    IoFailure(String),
}

impl DiscardReason {
    /// True for reasons decided by the data, false for failures.
    pub fn is_filtered(&self) -> bool {
        !matches!(self, DiscardReason::IoFailure(_))
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            DiscardReason::NoOverlap => "no_overlap",
            DiscardReason::NoPopulatedArea => "no_populated_area",
            DiscardReason::EmptyRaster => "empty_raster",
            DiscardReason::CrsMismatch { .. } => "crs_mismatch",
            DiscardReason::IoFailure(_) => "io_failure",
        }
    }
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscardReason::NoOverlap => f.write_str("no overlap"),
            DiscardReason::NoPopulatedArea => f.write_str("no populated area present"),
            DiscardReason::EmptyRaster => f.write_str("empty raster, discard"),
            DiscardReason::CrsMismatch { raster, mask } => {
                write!(f, "tile is in {raster} but the mask is in {mask}")
            }
            DiscardReason::IoFailure(cause) => write!(f, "I/O failure: {cause}"),
        }
    }
}

/// Output of one filter stage.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterResult {
    /// The stage produced a (possibly unchanged) raster.
    Cropped(Raster),
    /// The tile is dropped.
    Discarded(DiscardReason),
}

impl FilterResult {
    /// The raster, if the tile survived.
    pub fn raster(&self) -> Option<&Raster> {
        match self {
            FilterResult::Cropped(raster) => Some(raster),
            FilterResult::Discarded(_) => None,
        }
    }

    /// Consume into the raster, if the tile survived.
    pub fn into_raster(self) -> Option<Raster> {
        match self {
            FilterResult::Cropped(raster) => Some(raster),
            FilterResult::Discarded(_) => None,
        }
    }

    /// The discard reason, if the tile was dropped.
    pub fn discard_reason(&self) -> Option<&DiscardReason> {
        match self {
            FilterResult::Cropped(_) => None,
            FilterResult::Discarded(reason) => Some(reason),
        }
    }

    /// True if the tile was dropped.
    pub fn is_discarded(&self) -> bool {
        matches!(self, FilterResult::Discarded(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_messages() {
        assert_eq!(DiscardReason::NoOverlap.to_string(), "no overlap");
        assert_eq!(
            DiscardReason::NoPopulatedArea.to_string(),
            "no populated area present"
        );
        assert_eq!(DiscardReason::EmptyRaster.to_string(), "empty raster, discard");
        assert!(DiscardReason::IoFailure("disk full".into())
            .to_string()
            .contains("disk full"));
    }

    #[test]
    fn test_reason_kinds() {
        assert!(DiscardReason::EmptyRaster.is_filtered());
        assert!(!DiscardReason::IoFailure(String::new()).is_filtered());
        assert_eq!(DiscardReason::NoPopulatedArea.label(), "no_populated_area");

        let mismatch = DiscardReason::CrsMismatch {
            raster: Crs::Projected(32636),
            mask: Crs::Geographic(4326),
        };
        assert!(mismatch.is_filtered());
        assert_eq!(mismatch.label(), "crs_mismatch");
    }

    #[test]
    fn test_discarded_has_no_raster() {
        let result = FilterResult::Discarded(DiscardReason::NoOverlap);
        assert!(result.is_discarded());
        assert!(result.raster().is_none());
        assert_eq!(result.discard_reason(), Some(&DiscardReason::NoOverlap));
        assert!(result.into_raster().is_none());
    }
}
