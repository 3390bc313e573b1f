//! Per-tile filter orchestration.
//!
//! A tile moves through `Fetched -> BBoxFiltered -> MaskFiltered -> Trimmed ->
//! Final`, or drops into `Discarded` at any stage. Each stage's output is
//! written next to the source tile as `{stem}-{suffix}.tif` before the artifact
//! it supersedes is deleted; the last artifact is finally renamed over the
//! source tile.

use crate::bbox::{BoundingBox, BoundingBoxCropper};
use crate::mask::{AreaMaskFilter, MaskSet};
use crate::trim::NodataTrimmer;
use crate::{DiscardReason, FilterResult, Result};
use ada_metrics::{metric_defs, metrics, TileLabels};
use ada_raster::{Raster, RasterStore};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Where a tile is in the filter chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileState {
    /// Downloaded, no stage run yet.
    Fetched,
    /// Cropped to the bounding box.
    BBoxFiltered,
    /// Clipped to the area mask.
    MaskFiltered,
    /// Nodata border removed.
    Trimmed,
    /// Final raster stored at the source path.
    Final,
    /// Dropped; no file remains for the tile.
    Discarded,
}

impl fmt::Display for TileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TileState::Fetched => "fetched",
            TileState::BBoxFiltered => "bbox-filtered",
            TileState::MaskFiltered => "mask-filtered",
            TileState::Trimmed => "trimmed",
            TileState::Final => "final",
            TileState::Discarded => "discarded",
        };
        f.write_str(name)
    }
}

/// One step of the filter chain.
pub trait FilterStage {
    /// Stage name used in logs, metrics and outcomes.
    fn name(&self) -> &'static str;

    /// Suffix of the stage's artifact, `{stem}-{suffix}.tif`.
    fn artifact_suffix(&self) -> &'static str;

    /// State a tile is in once this stage has kept it.
    fn completed_state(&self) -> TileState;

    /// Run the stage on one raster.
    fn apply(&self, raster: Raster) -> Result<FilterResult>;
}

/// Where a tile ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct TileOutcome {
    /// Source tile path (also the final raster path when saved).
    pub path: PathBuf,
    /// `Final` or `Discarded`.
    pub state: TileState,
    /// Last state reached before the outcome.
    pub reached: TileState,
    /// Stage and reason, for discarded tiles.
    pub discard: Option<(&'static str, DiscardReason)>,
}

impl TileOutcome {
    /// True if the final raster is on disk.
    pub fn is_saved(&self) -> bool {
        self.state == TileState::Final
    }
}

/// Path of a stage artifact: `{dir}/{stem}-{suffix}.tif`.
pub fn artifact_path(source: &Path, suffix: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    source.with_file_name(format!("{stem}-{suffix}.tif"))
}

/// Phase directory of a tile, for metric labels.
fn phase_label(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Runs the configured stages over tiles held by a [`RasterStore`].
///
/// Stages always run bbox, then mask, then trim; the first two are optional.
pub struct FilterPipeline<S: RasterStore> {
    store: S,
    bbox: Option<BoundingBoxCropper>,
    mask: Option<AreaMaskFilter>,
    trim: NodataTrimmer,
}

impl<S: RasterStore> fmt::Debug for FilterPipeline<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterPipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl<S: RasterStore> FilterPipeline<S> {
    /// Pipeline that only trims nodata borders.
    pub fn new(store: S) -> Self {
        Self {
            store,
            bbox: None,
            mask: None,
            trim: NodataTrimmer::new(),
        }
    }

    /// Enable the bounding-box stage.
    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(BoundingBoxCropper::new(bbox));
        self
    }

    /// Enable the area-mask stage.
    pub fn with_mask(mut self, mask: Arc<MaskSet>) -> Self {
        self.mask = Some(AreaMaskFilter::new(mask));
        self
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Enabled stages, in execution order.
    pub fn stages(&self) -> Vec<&dyn FilterStage> {
        let mut stages: Vec<&dyn FilterStage> = Vec::with_capacity(3);
        if let Some(bbox) = &self.bbox {
            stages.push(bbox);
        }
        if let Some(mask) = &self.mask {
            stages.push(mask);
        }
        stages.push(&self.trim);
        stages
    }

    /// Names of the enabled stages, in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages().iter().map(|stage| stage.name()).collect()
    }

    /// Filter every tile in order. A failing tile never stops the batch.
    pub fn process_batch<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<TileOutcome> {
        paths.iter().map(|path| self.process(path.as_ref())).collect()
    }

    /// Run one tile through the chain.
    pub fn process(&self, source: &Path) -> TileOutcome {
        let labels = TileLabels::new(phase_label(source));

        let mut raster = match self.store.read(source) {
            Ok(raster) => raster,
            Err(e) => {
                warn!(tile = %source.display(), error = %e, "Failed to read tile, skipping");
                return self.discarded(
                    source,
                    TileState::Fetched,
                    "read",
                    DiscardReason::IoFailure(e.to_string()),
                    &labels,
                );
            }
        };

        let mut state = TileState::Fetched;
        let mut artifact: Option<PathBuf> = None;

        for stage in self.stages() {
            let stage_labels = labels.clone().with_stage(stage.name());
            let started = Instant::now();
            let result = stage.apply(raster);
            metrics::histogram!(metric_defs::STAGE_TIME.name, &[("stage", stage.name())])
                .record(started.elapsed().as_secs_f64() * 1000.0);

            let output = match result {
                Ok(FilterResult::Cropped(output)) => output,
                Ok(FilterResult::Discarded(reason)) => {
                    info!(tile = %source.display(), stage = stage.name(), %reason, "Tile discarded");
                    self.remove_quietly(artifact.as_deref());
                    self.remove_quietly(Some(source));
                    return self.discarded(source, state, stage.name(), reason, &stage_labels);
                }
                Err(e) => {
                    warn!(tile = %source.display(), stage = stage.name(), error = %e, "Filter failed, keeping original");
                    self.remove_quietly(artifact.as_deref());
                    return self.discarded(
                        source,
                        state,
                        stage.name(),
                        DiscardReason::IoFailure(e.to_string()),
                        &stage_labels,
                    );
                }
            };

            let next = artifact_path(source, stage.artifact_suffix());
            if let Err(e) = self.store.write(&output, &next) {
                warn!(tile = %source.display(), stage = stage.name(), error = %e, "Failed to write stage output");
                self.remove_quietly(artifact.as_deref());
                return self.discarded(
                    source,
                    state,
                    stage.name(),
                    DiscardReason::IoFailure(e.to_string()),
                    &stage_labels,
                );
            }
            // The superseded artifact goes only once its successor is on disk
            self.remove_quietly(artifact.as_deref());
            artifact = Some(next);
            state = stage.completed_state();
            raster = output;
        }

        if let Some(last) = &artifact {
            if let Err(e) = self.store.rename(last, source) {
                warn!(tile = %source.display(), error = %e, "Failed to replace original tile");
                self.remove_quietly(Some(last));
                return self.discarded(
                    source,
                    state,
                    "finalize",
                    DiscardReason::IoFailure(e.to_string()),
                    &labels,
                );
            }
        }

        metrics::counter!(metric_defs::TILES_SAVED.name, &labels.to_labels()).increment(1);
        info!(
            tile = %source.display(),
            width = raster.width(),
            height = raster.height(),
            "Tile saved"
        );
        TileOutcome {
            path: source.to_path_buf(),
            state: TileState::Final,
            reached: state,
            discard: None,
        }
    }

    fn discarded(
        &self,
        source: &Path,
        reached: TileState,
        stage: &'static str,
        reason: DiscardReason,
        labels: &TileLabels,
    ) -> TileOutcome {
        let labels = labels.clone().with_stage(stage);
        metrics::counter!(metric_defs::TILES_DISCARDED.name, &labels.with_reason(reason.label()))
            .increment(1);
        TileOutcome {
            path: source.to_path_buf(),
            state: TileState::Discarded,
            reached,
            discard: Some((stage, reason)),
        }
    }

    fn remove_quietly(&self, path: Option<&Path>) {
        let Some(path) = path else { return };
        if self.store.exists(path) {
            if let Err(e) = self.store.remove(path) {
                warn!(path = %path.display(), error = %e, "Failed to remove artifact");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_path() {
        let source = Path::new("dest/post-event/105001001244DB00-031311102230.tif");
        assert_eq!(
            artifact_path(source, "ntl-mask"),
            PathBuf::from("dest/post-event/105001001244DB00-031311102230-ntl-mask.tif")
        );
    }

    #[test]
    fn test_phase_label() {
        assert_eq!(phase_label(Path::new("out/pre-event/a.tif")), "pre-event");
        assert_eq!(phase_label(Path::new("a.tif")), "unknown");
    }

    #[test]
    fn test_state_names() {
        assert_eq!(TileState::BBoxFiltered.to_string(), "bbox-filtered");
        assert_eq!(TileState::Discarded.to_string(), "discarded");
    }
}
