//! Night-lights area mask.
//!
//! A [`MaskSet`] holds the populated-area polygons; [`apply_mask`] clips a tile
//! to the union of the polygons touching it and blanks every pixel outside
//! them.

use crate::bbox::intersect;
use crate::pipeline::{FilterStage, TileState};
use crate::rasterize::rasterize;
use crate::{DiscardReason, FilterError, FilterResult, Result};
use ada_raster::{Crs, Raster, Window};
use geo::{coord, BoundingRect, Geometry, Polygon, Rect};
use std::sync::Arc;
use tracing::debug;

/// Reference system of GeoJSON coordinates.
pub const GEOJSON_CRS: Crs = Crs::Geographic(4326);

/// Fill value for masked pixels when the raster declares no nodata value.
pub const DEFAULT_MASK_NODATA: f64 = 0.0;

/// Ordered polygons with their bounding rectangles.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskSet {
    polygons: Vec<Polygon<f64>>,
    extents: Vec<Rect<f64>>,
    crs: Crs,
}

impl MaskSet {
    /// Build a mask from polygons in `crs`. Polygons with no extent are dropped.
    pub fn new(polygons: Vec<Polygon<f64>>, crs: Crs) -> Self {
        let (polygons, extents) = polygons
            .into_iter()
            .filter_map(|polygon| polygon.bounding_rect().map(|rect| (polygon, rect)))
            .unzip();
        Self {
            polygons,
            extents,
            crs,
        }
    }

    /// Flatten geometries into a mask. Non-areal members are ignored.
    pub fn from_geometries<I>(geometries: I, crs: Crs) -> Self
    where
        I: IntoIterator<Item = Geometry<f64>>,
    {
        let mut polygons = Vec::new();
        for geometry in geometries {
            collect_polygons(geometry, &mut polygons);
        }
        Self::new(polygons, crs)
    }

    /// All polygons, in source order.
    pub fn polygons(&self) -> &[Polygon<f64>] {
        &self.polygons
    }

    /// Reference system of the polygon coordinates.
    pub fn crs(&self) -> Crs {
        self.crs
    }

    /// Number of polygons.
    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    /// True if the mask holds no polygon.
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Polygons whose bounding rectangle is not disjoint from `area`.
    ///
    /// Rectangles that only touch `area` along an edge still count.
    pub fn candidates<'a>(&'a self, area: &'a Rect<f64>) -> impl Iterator<Item = &'a Polygon<f64>> + 'a {
        self.polygons
            .iter()
            .zip(&self.extents)
            .filter(move |(_, extent)| !disjoint(extent, area))
            .map(|(polygon, _)| polygon)
    }

    /// Combined bounding rectangle of the candidates for `area`.
    fn candidate_extent(&self, area: &Rect<f64>) -> Option<Rect<f64>> {
        self.extents
            .iter()
            .filter(|extent| !disjoint(extent, area))
            .copied()
            .reduce(|a, b| {
                Rect::new(
                    coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                    coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
                )
            })
    }
}

fn disjoint(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.max().x < b.min().x || b.max().x < a.min().x || a.max().y < b.min().y || b.max().y < a.min().y
}

pub(crate) fn collect_polygons(geometry: Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(polygon) => out.push(polygon),
        Geometry::MultiPolygon(multi) => out.extend(multi.0),
        Geometry::Rect(rect) => out.push(rect.to_polygon()),
        Geometry::Triangle(triangle) => out.push(triangle.to_polygon()),
        Geometry::GeometryCollection(collection) => {
            for member in collection.0 {
                collect_polygons(member, out);
            }
        }
        _ => {}
    }
}

/// Clip `raster` to the mask polygons touching it.
///
/// Polygons whose extent is disjoint from the tile are ignored; if none is
/// left the tile is discarded as having no populated area. Otherwise the tile
/// is cropped to the combined extent of the remaining polygons and every pixel
/// whose centre lies outside all of them is set to the raster's nodata value
/// (or [`DEFAULT_MASK_NODATA`], which the output then declares). The result is
/// shrunk to its valid pixels, so a mask covering the whole tile gives the same
/// raster as [`trim_nodata`](crate::trim_nodata). A clip that keeps no valid
/// pixel discards the tile as empty.
///
/// A raster declaring a different reference system than the mask is an error
/// here; the pipeline stage turns it into a discard.
pub fn apply_mask(raster: &Raster, mask: &MaskSet) -> Result<FilterResult> {
    if let Some(raster_crs) = raster.crs() {
        if raster_crs != mask.crs() {
            return Err(FilterError::CrsMismatch {
                raster: raster_crs,
                mask: mask.crs(),
            });
        }
    }

    let bounds = raster.bounds();
    let Some(extent) = mask.candidate_extent(&bounds) else {
        return Ok(FilterResult::Discarded(DiscardReason::NoPopulatedArea));
    };

    let window = intersect(&extent, &bounds).and_then(|area| raster.window_for_bounds(&area));
    let Some(window) = window else {
        return Ok(FilterResult::Discarded(DiscardReason::EmptyRaster));
    };

    let mut clipped = raster.read_window(&window)?;
    let keep = rasterize(
        mask.candidates(&bounds),
        clipped.geotransform(),
        clipped.width(),
        clipped.height(),
    );
    if !keep.iter().any(|&inside| inside) {
        return Ok(FilterResult::Discarded(DiscardReason::EmptyRaster));
    }

    let fill = raster.nodata().unwrap_or(DEFAULT_MASK_NODATA);
    let filled = clipped.fill_where(&keep, fill)?;
    if raster.nodata().is_none() {
        clipped.set_nodata(Some(DEFAULT_MASK_NODATA));
    }

    let Some(data) = clipped.data_window(0) else {
        return Ok(FilterResult::Discarded(DiscardReason::EmptyRaster));
    };
    if data != Window::full(clipped.width(), clipped.height()) {
        clipped = clipped.read_window(&data)?;
    }

    debug!(
        width = clipped.width(),
        height = clipped.height(),
        filled,
        "masked tile"
    );
    Ok(FilterResult::Cropped(clipped))
}

/// Pipeline stage applying one shared mask.
#[derive(Debug, Clone)]
pub struct AreaMaskFilter {
    mask: Arc<MaskSet>,
}

impl AreaMaskFilter {
    /// Stage masking with `mask`.
    pub fn new(mask: Arc<MaskSet>) -> Self {
        Self { mask }
    }

    /// The mask in use.
    pub fn mask(&self) -> &MaskSet {
        &self.mask
    }
}

impl FilterStage for AreaMaskFilter {
    fn name(&self) -> &'static str {
        "mask"
    }

    fn artifact_suffix(&self) -> &'static str {
        "ntl-mask"
    }

    fn completed_state(&self) -> TileState {
        TileState::MaskFiltered
    }

    fn apply(&self, raster: Raster) -> Result<FilterResult> {
        match apply_mask(&raster, &self.mask) {
            // Unusable against this mask; dropped like any other filtered tile
            Err(FilterError::CrsMismatch { raster, mask }) => Ok(FilterResult::Discarded(
                DiscardReason::CrsMismatch { raster, mask },
            )),
            result => result,
        }
    }
}
