//! In-memory raster tile representation.

use crate::{RasterError, Result};
use geo::{coord, Rect};
use std::fmt;

/// Tolerance, in pixels, used when snapping ground coordinates to the pixel grid.
///
/// Bounds that sit on a pixel edge up to floating point noise must not pull in
/// an extra row or column.
const PIXEL_SNAP_EPSILON: f64 = 1e-6;

/// Affine mapping from pixel indices to ground coordinates.
///
/// Only north-up grids are represented (no rotation terms). For the usual
/// north-up raster `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// Ground x of the upper-left corner of pixel (0, 0).
    pub origin_x: f64,
    /// Ground y of the upper-left corner of pixel (0, 0).
    pub origin_y: f64,
    /// Ground units per column.
    pub pixel_width: f64,
    /// Ground units per row (negative for north-up).
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Create a new geotransform.
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Ground coordinate of a (fractional) pixel position.
    pub fn pixel_to_ground(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width,
            self.origin_y + row * self.pixel_height,
        )
    }

    /// Fractional pixel position of a ground coordinate.
    pub fn ground_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// Geotransform of a window of this grid: same pixel size, origin moved to
    /// the window's upper-left corner.
    pub fn for_window(&self, window: &Window) -> Self {
        let (origin_x, origin_y) =
            self.pixel_to_ground(window.col_off as f64, window.row_off as f64);
        Self {
            origin_x,
            origin_y,
            ..*self
        }
    }
}

/// A rectangular pixel window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    /// First column.
    pub col_off: usize,
    /// First row.
    pub row_off: usize,
    /// Number of columns.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
}

impl Window {
    /// Create a new window.
    pub fn new(col_off: usize, row_off: usize, width: usize, height: usize) -> Self {
        Self {
            col_off,
            row_off,
            width,
            height,
        }
    }

    /// Window covering a whole `width` x `height` grid.
    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    /// One past the last column.
    pub fn col_end(&self) -> usize {
        self.col_off + self.width
    }

    /// One past the last row.
    pub fn row_end(&self) -> usize {
        self.row_off + self.height
    }

    /// True when the window has no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Coordinate reference system, as recorded in the GeoKey directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Crs {
    /// Geographic system (e.g. EPSG:4326).
    Geographic(u16),
    /// Projected system (e.g. a UTM zone).
    Projected(u16),
}

impl Crs {
    /// EPSG code of the system.
    pub fn epsg(&self) -> u16 {
        match self {
            Crs::Geographic(code) | Crs::Projected(code) => *code,
        }
    }

    /// True for geographic (lat/lon) systems.
    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::Geographic(_))
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

/// Element type of a sample buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    /// Unsigned 8-bit.
    U8,
    /// Unsigned 16-bit.
    U16,
    /// 32-bit IEEE float.
    F32,
}

/// Band-interleaved pixel samples (`row * width * bands + col * bands + band`).
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    /// 8-bit unsigned samples.
    U8(Vec<u8>),
    /// 16-bit unsigned samples.
    U16(Vec<u16>),
    /// 32-bit float samples.
    F32(Vec<f32>),
}

impl Samples {
    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            Samples::U8(v) => v.len(),
            Samples::U16(v) => v.len(),
            Samples::F32(v) => v.len(),
        }
    }

    /// True if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type.
    pub fn sample_type(&self) -> SampleType {
        match self {
            Samples::U8(_) => SampleType::U8,
            Samples::U16(_) => SampleType::U16,
            Samples::F32(_) => SampleType::F32,
        }
    }

    /// Sample at a flat index, widened to f64.
    pub fn get(&self, index: usize) -> f64 {
        match self {
            Samples::U8(v) => v[index] as f64,
            Samples::U16(v) => v[index] as f64,
            Samples::F32(v) => v[index] as f64,
        }
    }

    /// Overwrite the sample at a flat index (saturating for integer types).
    pub fn set(&mut self, index: usize, value: f64) {
        match self {
            Samples::U8(v) => v[index] = value as u8,
            Samples::U16(v) => v[index] = value as u16,
            Samples::F32(v) => v[index] = value as f32,
        }
    }

    fn window(&self, raster_width: usize, bands: usize, window: &Window) -> Samples {
        match self {
            Samples::U8(v) => Samples::U8(copy_window(v, raster_width, bands, window)),
            Samples::U16(v) => Samples::U16(copy_window(v, raster_width, bands, window)),
            Samples::F32(v) => Samples::F32(copy_window(v, raster_width, bands, window)),
        }
    }
}

fn copy_window<T: Copy>(data: &[T], raster_width: usize, bands: usize, window: &Window) -> Vec<T> {
    let row_len = window.width * bands;
    let mut out = Vec::with_capacity(row_len * window.height);
    for row in window.row_off..window.row_end() {
        let start = (row * raster_width + window.col_off) * bands;
        out.extend_from_slice(&data[start..start + row_len]);
    }
    out
}

/// A georeferenced raster tile.
///
/// The ground bounds are never stored: [`Raster::bounds`] derives them from the
/// geotransform and the pixel dimensions every time.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: usize,
    height: usize,
    bands: usize,
    samples: Samples,
    geotransform: GeoTransform,
    crs: Option<Crs>,
    nodata: Option<f64>,
}

impl Raster {
    /// Create a raster, checking that the sample buffer matches the dimensions.
    pub fn new(
        width: usize,
        height: usize,
        bands: usize,
        samples: Samples,
        geotransform: GeoTransform,
    ) -> Result<Self> {
        let expected = width * height * bands;
        if samples.len() != expected {
            return Err(RasterError::DimensionMismatch {
                width,
                height,
                bands,
                expected,
                actual: samples.len(),
            });
        }

        Ok(Self {
            width,
            height,
            bands,
            samples,
            geotransform,
            crs: None,
            nodata: None,
        })
    }

    /// Set the coordinate reference system.
    #[must_use]
    pub fn with_crs(mut self, crs: Option<Crs>) -> Self {
        self.crs = crs;
        self
    }

    /// Set the nodata sentinel.
    #[must_use]
    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata;
        self
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// (width, height) in pixels.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Number of bands.
    pub fn bands(&self) -> usize {
        self.bands
    }

    /// Raw samples.
    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    /// Geotransform.
    pub fn geotransform(&self) -> &GeoTransform {
        &self.geotransform
    }

    /// Coordinate reference system, if declared.
    pub fn crs(&self) -> Option<Crs> {
        self.crs
    }

    /// Nodata sentinel, if declared.
    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// Replace the nodata sentinel.
    pub fn set_nodata(&mut self, nodata: Option<f64>) {
        self.nodata = nodata;
    }

    /// Ground rectangle covered by the raster.
    pub fn bounds(&self) -> Rect<f64> {
        let (x0, y0) = self.geotransform.pixel_to_ground(0.0, 0.0);
        let (x1, y1) = self
            .geotransform
            .pixel_to_ground(self.width as f64, self.height as f64);
        Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 })
    }

    fn index(&self, band: usize, col: usize, row: usize) -> usize {
        (row * self.width + col) * self.bands + band
    }

    /// Sample value of `band` at pixel (col, row).
    pub fn value(&self, band: usize, col: usize, row: usize) -> f64 {
        self.samples.get(self.index(band, col, row))
    }

    /// True unless the sample equals the nodata sentinel (or is NaN).
    pub fn is_valid(&self, band: usize, col: usize, row: usize) -> bool {
        let value = self.value(band, col, row);
        if value.is_nan() {
            return false;
        }
        match self.nodata {
            // Float rasters carry the sentinel at f32 precision.
            Some(nodata) => value != nodata && value as f32 != nodata as f32,
            None => true,
        }
    }

    /// Smallest pixel window covering `area`, clipped to the raster.
    ///
    /// Returns `None` when the clipped window has no pixels.
    pub fn window_for_bounds(&self, area: &Rect<f64>) -> Option<Window> {
        let gt = &self.geotransform;
        let (c0, r0) = gt.ground_to_pixel(area.min().x, area.max().y);
        let (c1, r1) = gt.ground_to_pixel(area.max().x, area.min().y);

        let col_start = (c0.min(c1) + PIXEL_SNAP_EPSILON).floor().max(0.0);
        let col_end = (c0.max(c1) - PIXEL_SNAP_EPSILON).ceil().min(self.width as f64);
        let row_start = (r0.min(r1) + PIXEL_SNAP_EPSILON).floor().max(0.0);
        let row_end = (r0.max(r1) - PIXEL_SNAP_EPSILON).ceil().min(self.height as f64);

        if !(col_end > col_start && row_end > row_start) {
            return None;
        }

        Some(Window::new(
            col_start as usize,
            row_start as usize,
            (col_end - col_start) as usize,
            (row_end - row_start) as usize,
        ))
    }

    /// Copy a window out into a new raster with a re-derived geotransform.
    pub fn read_window(&self, window: &Window) -> Result<Raster> {
        if window.col_end() > self.width || window.row_end() > self.height {
            return Err(RasterError::WindowOutOfBounds {
                col_off: window.col_off,
                row_off: window.row_off,
                width: window.width,
                height: window.height,
                raster_width: self.width,
                raster_height: self.height,
            });
        }

        Ok(Raster {
            width: window.width,
            height: window.height,
            bands: self.bands,
            samples: self.samples.window(self.width, self.bands, window),
            geotransform: self.geotransform.for_window(window),
            crs: self.crs,
            nodata: self.nodata,
        })
    }

    /// Smallest window containing every valid pixel of `band`.
    ///
    /// Returns `None` when the band holds no valid pixel.
    pub fn data_window(&self, band: usize) -> Option<Window> {
        let mut min_col = usize::MAX;
        let mut max_col = 0;
        let mut min_row = usize::MAX;
        let mut max_row = 0;

        for row in 0..self.height {
            for col in 0..self.width {
                if self.is_valid(band, col, row) {
                    min_col = min_col.min(col);
                    max_col = max_col.max(col);
                    min_row = min_row.min(row);
                    max_row = max_row.max(row);
                }
            }
        }

        if min_col == usize::MAX {
            return None;
        }

        Some(Window::new(
            min_col,
            min_row,
            max_col - min_col + 1,
            max_row - min_row + 1,
        ))
    }

    /// Set every band to `fill` wherever `keep` is false.
    ///
    /// `keep` is row-major with one entry per pixel. Returns the number of
    /// pixels overwritten.
    pub fn fill_where(&mut self, keep: &[bool], fill: f64) -> Result<usize> {
        let pixels = self.width * self.height;
        if keep.len() != pixels {
            return Err(RasterError::DimensionMismatch {
                width: self.width,
                height: self.height,
                bands: 1,
                expected: pixels,
                actual: keep.len(),
            });
        }

        let mut filled = 0;
        for (pixel, _) in keep.iter().enumerate().filter(|(_, k)| !**k) {
            for band in 0..self.bands {
                self.samples.set(pixel * self.bands + band, fill);
            }
            filled += 1;
        }
        Ok(filled)
    }
}
