//! Scanline polygon rasterization.
//!
//! A pixel is inside a polygon when its centre is. Each polygon is filled with
//! the even-odd rule over all of its rings, so holes stay empty; the result for
//! several polygons is their union.

use ada_raster::GeoTransform;
use geo::{LineString, Polygon};

/// Row-major coverage mask for a `width` x `height` grid.
///
/// `true` marks pixels whose centre falls inside at least one polygon.
pub fn rasterize<'a, I>(polygons: I, transform: &GeoTransform, width: usize, height: usize) -> Vec<bool>
where
    I: IntoIterator<Item = &'a Polygon<f64>>,
{
    let mut covered = vec![false; width * height];
    if width == 0 || height == 0 {
        return covered;
    }

    let polygons: Vec<&Polygon<f64>> = polygons.into_iter().collect();
    let mut crossings = Vec::new();

    for row in 0..height {
        let (_, y) = transform.pixel_to_ground(0.5, row as f64 + 0.5);
        let line = &mut covered[row * width..(row + 1) * width];

        for polygon in &polygons {
            crossings.clear();
            ring_crossings(polygon.exterior(), y, &mut crossings);
            for interior in polygon.interiors() {
                ring_crossings(interior, y, &mut crossings);
            }
            if crossings.len() < 2 {
                continue;
            }
            crossings.sort_by(|a, b| a.total_cmp(b));

            for span in crossings.chunks_exact(2) {
                fill_span(line, transform, span[0], span[1]);
            }
        }
    }

    covered
}

/// X coordinates where `ring` crosses the horizontal line at `y`.
///
/// Edges are treated as half-open in y so a vertex on the line counts once.
fn ring_crossings(ring: &LineString<f64>, y: f64, out: &mut Vec<f64>) {
    for edge in ring.lines() {
        let (start, end) = (edge.start, edge.end);
        if (start.y > y) != (end.y > y) {
            let t = (y - start.y) / (end.y - start.y);
            out.push(start.x + t * (end.x - start.x));
        }
    }
}

/// Mark the pixels of one row whose centre x lies in `[x_start, x_end)`.
fn fill_span(line: &mut [bool], transform: &GeoTransform, x_start: f64, x_end: f64) {
    let width = line.len() as f64;
    let (c0, _) = transform.ground_to_pixel(x_start, transform.origin_y);
    let (c1, _) = transform.ground_to_pixel(x_end, transform.origin_y);
    // Column c has its centre at c + 0.5.
    let (lo, hi) = if c0 <= c1 { (c0, c1) } else { (c1, c0) };
    let first = (lo - 0.5).ceil().clamp(0.0, width);
    let last = (hi - 0.5).ceil().clamp(0.0, width);

    for cell in &mut line[first as usize..last as usize] {
        *cell = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn unit_grid() -> GeoTransform {
        // 10x10 grid of 1-unit pixels, upper-left at (0, 10)
        GeoTransform::new(0.0, 10.0, 1.0, -1.0)
    }

    fn count(mask: &[bool]) -> usize {
        mask.iter().filter(|&&c| c).count()
    }

    #[test]
    fn test_square_covers_centres() {
        let square = polygon![
            (x: 2.0, y: 2.0),
            (x: 6.0, y: 2.0),
            (x: 6.0, y: 5.0),
            (x: 2.0, y: 5.0),
        ];
        let mask = rasterize([&square], &unit_grid(), 10, 10);
        assert_eq!(count(&mask), 12);
        // Pixel (col 2, row 5) has centre (2.5, 4.5)
        assert!(mask[5 * 10 + 2]);
        assert!(!mask[5 * 10 + 6]);
        assert!(!mask[4 * 10 + 2]);
    }

    #[test]
    fn test_hole_left_empty() {
        let donut = polygon!(
            exterior: [
                (x: 0.0, y: 0.0),
                (x: 10.0, y: 0.0),
                (x: 10.0, y: 10.0),
                (x: 0.0, y: 10.0),
            ],
            interiors: [[
                (x: 3.0, y: 3.0),
                (x: 7.0, y: 3.0),
                (x: 7.0, y: 7.0),
                (x: 3.0, y: 7.0),
            ]],
        );
        let mask = rasterize([&donut], &unit_grid(), 10, 10);
        assert_eq!(count(&mask), 100 - 16);
        assert!(!mask[5 * 10 + 5]);
    }

    #[test]
    fn test_union_of_overlapping_polygons() {
        let a = polygon![
            (x: 0.0, y: 0.0),
            (x: 5.0, y: 0.0),
            (x: 5.0, y: 10.0),
            (x: 0.0, y: 10.0),
        ];
        let b = polygon![
            (x: 3.0, y: 0.0),
            (x: 8.0, y: 0.0),
            (x: 8.0, y: 10.0),
            (x: 3.0, y: 10.0),
        ];
        let mask = rasterize([&a, &b], &unit_grid(), 10, 10);
        assert_eq!(count(&mask), 80);
    }

    #[test]
    fn test_polygon_between_centres_covers_nothing() {
        let sliver = polygon![
            (x: 2.6, y: 0.0),
            (x: 3.4, y: 0.0),
            (x: 3.4, y: 10.0),
            (x: 2.6, y: 10.0),
        ];
        let mask = rasterize([&sliver], &unit_grid(), 10, 10);
        assert_eq!(count(&mask), 0);
    }

    #[test]
    fn test_triangle() {
        let triangle = polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 0.0, y: 10.0),
        ];
        let mask = rasterize([&triangle], &unit_grid(), 10, 10);
        // Centres strictly below the diagonal x + y = 10
        assert_eq!(count(&mask), 45);
    }
}
