//! Batch filter driver over a downloaded event directory.

use crate::{FilterConfig, Result, RunSummary};
use ada_catalog::Phase;
use ada_filter::{FilterPipeline, MaskSource};
use ada_raster::GeoTiffStore;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Suffixes of stage artifacts left behind by an interrupted run.
const STALE_ARTIFACTS: &[&str] = &["-bbox.tif", "-ntl-mask.tif", "-ntl.tif"];

/// Tiles under `{dir}/pre-event` and `{dir}/post-event`, sorted per phase.
///
/// A missing phase directory is skipped with a warning. Leftover stage
/// artifacts are not tiles and are left out.
pub fn collect_tiles(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut tiles = Vec::new();
    for phase in [Phase::Pre, Phase::Post] {
        let phase_dir = dir.join(phase.dir_name());
        if !phase_dir.is_dir() {
            warn!(dir = %phase_dir.display(), "Phase directory missing, skipping");
            continue;
        }

        let mut found = Vec::new();
        for entry in fs::read_dir(&phase_dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !path.is_file() || !name.ends_with(".tif") {
                continue;
            }
            if STALE_ARTIFACTS.iter().any(|suffix| name.ends_with(suffix)) {
                debug!(path = %path.display(), "Skipping stage artifact");
                continue;
            }
            found.push(path);
        }
        found.sort();
        tiles.extend(found);
    }
    Ok(tiles)
}

/// The mask source a config asks for, or `None` when the mask stage is off.
pub fn mask_source(config: &FilterConfig) -> Result<Option<MaskSource>> {
    let Some(mask_path) = config.mask_stage() else {
        return Ok(None);
    };

    let mut source =
        MaskSource::open(mask_path)?.with_country_property(config.country_property.as_str());
    if let Some(boundaries) = &config.boundaries_path {
        source = source.with_boundaries(boundaries.clone());
    }
    if let Some(cache_dir) = &config.cache_dir {
        source = source.with_cache_dir(cache_dir.clone());
    }
    Ok(Some(source))
}

/// Build the on-disk pipeline for `config`.
///
/// Resolving the mask may derive a country subset; that happens once here,
/// before any tile is touched.
pub fn build_pipeline(config: &FilterConfig) -> Result<FilterPipeline<GeoTiffStore>> {
    let mut pipeline = FilterPipeline::new(GeoTiffStore::new());
    if let Some(bbox) = config.bbox_stage() {
        pipeline = pipeline.with_bbox(bbox);
    }
    if let Some(source) = mask_source(config)? {
        let mask = source.mask_for(config.country.as_deref())?;
        info!(
            polygons = mask.len(),
            country = config.country.as_deref().unwrap_or("all"),
            "Mask loaded"
        );
        pipeline = pipeline.with_mask(mask);
    }
    Ok(pipeline)
}

/// Filter every tile of a downloaded event in place.
///
/// Per-tile failures end up in the summary; only setup errors (bad mask,
/// unreadable directory) are returned.
pub fn filter_event(dir: &Path, config: &FilterConfig) -> Result<RunSummary> {
    let pipeline = build_pipeline(config)?;
    let tiles = collect_tiles(dir)?;
    info!(
        dir = %dir.display(),
        tiles = tiles.len(),
        stages = ?pipeline.stage_names(),
        "Filtering tiles"
    );

    let outcomes = pipeline.process_batch(&tiles);
    let summary = RunSummary::from_outcomes(dir, &pipeline.stage_names(), &outcomes);
    info!(
        saved = summary.totals.saved,
        discarded = summary.totals.discarded,
        failed = summary.totals.failed,
        "Filtering finished"
    );
    Ok(summary)
}
