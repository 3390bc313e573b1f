//! Mask sources and per-country mask subsets.
//!
//! The global night-lights mask is large; filtering tiles of one country only
//! needs the polygons near that country. [`MaskSource::mask_for`] derives that
//! subset once per country: the national boundary is grown by 10% around its
//! centroid and the global mask is clipped to it. The result is written to
//! `{cache_dir}/ntl-{slug}.geojson` and later runs load it from there.
//!
//! ## Thread Safety
//!
//! `MaskSource` is `Send + Sync`. Concurrent requests for the same country
//! coordinate through an in-flight tracker: one caller derives, the others
//! wait on a condition variable and share its result.

use crate::mask::{collect_polygons, MaskSet, GEOJSON_CRS};
use crate::{FilterError, Result};
use ada_metrics::{metric_defs, metrics};
use geo::{BooleanOps, BoundingRect, Centroid, MultiPolygon, Polygon, Scale};
use geojson::{Feature, FeatureCollection, GeoJson};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use tracing::{debug, info};

/// Growth factor applied to the national boundary before clipping.
pub const BOUNDARY_SCALE: f64 = 1.1;

/// Boundary property holding the country name, unless configured otherwise.
pub const DEFAULT_COUNTRY_PROPERTY: &str = "NAME";

/// Cache key for a country.
///
/// Names are matched ignoring ASCII case, so the key is built from the trimmed,
/// ASCII-lowercased name: letters and digits are kept, spaces become `-`, and
/// every other character is written as `_` plus two hex digits per UTF-8 byte.
/// Distinct names therefore never share a key or a cache file.
pub fn country_slug(country: &str) -> String {
    let mut slug = String::with_capacity(country.len());
    for c in country.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if c == ' ' {
            slug.push('-');
        } else {
            let mut utf8 = [0u8; 4];
            for byte in c.encode_utf8(&mut utf8).bytes() {
                slug.push_str(&format!("_{byte:02x}"));
            }
        }
    }
    slug
}

/// Cache file of `country`'s subset under `cache_dir`.
pub fn country_cache_path(cache_dir: &Path, country: &str) -> PathBuf {
    cache_dir.join(format!("ntl-{}.geojson", country_slug(country)))
}

/// Default cache directory for a mask file: the directory holding it.
pub fn default_cache_dir(mask_path: &Path) -> PathBuf {
    mask_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Read a GeoJSON file into `geo` geometries.
///
/// Features without a geometry are skipped.
pub fn read_geometries(path: &Path) -> Result<Vec<geo::Geometry<f64>>> {
    let geojson: GeoJson = fs::read_to_string(path)?.parse()?;
    let geometries = match geojson {
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .filter_map(|feature| feature.geometry)
            .map(geo::Geometry::<f64>::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?,
        GeoJson::Feature(feature) => feature
            .geometry
            .map(geo::Geometry::<f64>::try_from)
            .transpose()?
            .into_iter()
            .collect(),
        GeoJson::Geometry(geometry) => vec![geo::Geometry::<f64>::try_from(geometry)?],
    };
    Ok(geometries)
}

/// Load a mask file. GeoJSON coordinates are always EPSG:4326.
pub fn load_mask(path: &Path) -> Result<MaskSet> {
    let mask = MaskSet::from_geometries(read_geometries(path)?, GEOJSON_CRS);
    info!(path = %path.display(), polygons = mask.len(), "Loaded mask");
    Ok(mask)
}

/// Write `mask` as a GeoJSON feature collection, one polygon per feature.
///
/// The file is written next to `path` first and renamed into place.
pub fn write_mask(mask: &MaskSet, path: &Path) -> Result<()> {
    let features = mask
        .polygons()
        .iter()
        .map(|polygon| Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(polygon))),
            id: None,
            properties: None,
            foreign_members: None,
        })
        .collect();
    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    fs::write(&staging, GeoJson::FeatureCollection(collection).to_string())?;
    fs::rename(&staging, path)?;
    Ok(())
}

/// Find the boundary of `country` in a boundaries GeoJSON file.
///
/// `property` is compared case-insensitively.
pub fn find_country(path: &Path, property: &str, country: &str) -> Result<MultiPolygon<f64>> {
    let not_found = || FilterError::CountryNotFound {
        country: country.to_string(),
        property: property.to_string(),
    };

    let geojson: GeoJson = fs::read_to_string(path)?.parse()?;
    let features = match geojson {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(_) => return Err(not_found()),
    };

    let feature = features
        .into_iter()
        .find(|feature| {
            feature
                .property(property)
                .and_then(|value| value.as_str())
                .is_some_and(|name| name.eq_ignore_ascii_case(country.trim()))
        })
        .ok_or_else(not_found)?;

    let geometry = feature
        .geometry
        .ok_or_else(|| FilterError::InvalidGeometry(format!("boundary of '{country}' has no geometry")))?;
    let mut polygons = Vec::new();
    collect_polygons(geo::Geometry::<f64>::try_from(geometry)?, &mut polygons);
    if polygons.is_empty() {
        return Err(FilterError::InvalidGeometry(format!(
            "boundary of '{country}' has no polygon"
        )));
    }
    Ok(MultiPolygon::new(polygons))
}

/// Clip `mask` to `boundary` grown by [`BOUNDARY_SCALE`] around its centroid.
pub fn derive_country_mask(mask: &MaskSet, boundary: &MultiPolygon<f64>) -> Result<MaskSet> {
    let centroid = boundary
        .centroid()
        .ok_or_else(|| FilterError::InvalidGeometry("boundary has no centroid".to_string()))?;
    let region = boundary.scale_around_point(BOUNDARY_SCALE, BOUNDARY_SCALE, centroid);
    let Some(extent) = region.bounding_rect() else {
        return Err(FilterError::InvalidGeometry("boundary has no extent".to_string()));
    };

    let clipped: Vec<Polygon<f64>> = mask
        .candidates(&extent)
        .flat_map(|polygon| MultiPolygon::new(vec![polygon.clone()]).intersection(&region))
        .collect();
    Ok(MaskSet::new(clipped, mask.crs()))
}

/// Status of a country derivation.
#[derive(Clone)]
enum Derivation {
    /// A caller is deriving or loading the subset.
    InProgress,
    /// Subset available.
    Ready(Arc<MaskSet>),
}

/// Derivation statistics for this source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DerivationStats {
    /// Country subsets computed from the global mask.
    pub derivations: usize,
    /// Country subsets loaded from the persistent cache.
    pub cache_hits: usize,
}

/// Claim on an `InProgress` entry.
///
/// Dropping it without [`InFlight::finish`], e.g. while unwinding from a
/// panicking derivation, clears the entry and wakes the waiters so one of
/// them takes over.
struct InFlight<'a> {
    source: &'a MaskSource,
    key: Option<String>,
}

impl<'a> InFlight<'a> {
    fn new(source: &'a MaskSource, key: String) -> Self {
        Self {
            source,
            key: Some(key),
        }
    }

    /// Publish a successful result. Failures clear the entry so waiters retry
    /// on their own.
    fn finish(mut self, result: &Result<Arc<MaskSet>>) {
        let Some(key) = self.key.take() else { return };
        {
            let mut derived = self
                .source
                .derived
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match result {
                Ok(mask) => {
                    derived.insert(key, Derivation::Ready(Arc::clone(mask)));
                }
                Err(_) => {
                    derived.remove(&key);
                }
            }
        }
        self.source.derivation_done.notify_all();
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else { return };
        self.source
            .derived
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        self.source.derivation_done.notify_all();
    }
}

/// The global mask plus the means to derive country subsets of it.
pub struct MaskSource {
    global: Arc<MaskSet>,
    boundaries: Option<PathBuf>,
    country_property: String,
    cache_dir: PathBuf,
    derived: Mutex<HashMap<String, Derivation>>,
    derivation_done: Condvar,
    derivations: AtomicUsize,
    cache_hits: AtomicUsize,
}

impl std::fmt::Debug for MaskSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskSource")
            .field("polygons", &self.global.len())
            .field("boundaries", &self.boundaries)
            .field("country_property", &self.country_property)
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

impl MaskSource {
    /// Source over an already loaded mask. Country subsets are cached in the
    /// current directory until [`MaskSource::with_cache_dir`] says otherwise.
    pub fn new(global: MaskSet) -> Self {
        Self {
            global: Arc::new(global),
            boundaries: None,
            country_property: DEFAULT_COUNTRY_PROPERTY.to_string(),
            cache_dir: PathBuf::from("."),
            derived: Mutex::new(HashMap::new()),
            derivation_done: Condvar::new(),
            derivations: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
        }
    }

    /// Load the mask GeoJSON at `path`; subsets are cached next to it.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(load_mask(path)?).with_cache_dir(default_cache_dir(path)))
    }

    /// National boundaries GeoJSON used for country subsets.
    pub fn with_boundaries(mut self, path: impl Into<PathBuf>) -> Self {
        self.boundaries = Some(path.into());
        self
    }

    /// Boundary property holding the country name.
    pub fn with_country_property(mut self, property: impl Into<String>) -> Self {
        self.country_property = property.into();
        self
    }

    /// Directory for cached country subsets.
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    /// The whole mask.
    pub fn global(&self) -> Arc<MaskSet> {
        Arc::clone(&self.global)
    }

    /// Cache file of `country`'s subset.
    pub fn cache_path(&self, country: &str) -> PathBuf {
        country_cache_path(&self.cache_dir, country)
    }

    /// Derivation statistics for this source.
    pub fn stats(&self) -> DerivationStats {
        DerivationStats {
            derivations: self.derivations.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }

    /// The mask to filter with: the global mask, or `country`'s subset.
    pub fn mask_for(&self, country: Option<&str>) -> Result<Arc<MaskSet>> {
        let mask = match country {
            None => self.global(),
            Some(country) => self.country_mask(country)?,
        };
        metrics::gauge!(metric_defs::MASK_POLYGONS.name).set(mask.len() as f64);
        Ok(mask)
    }

    /// `country`'s subset, derived at most once per cache directory.
    pub fn country_mask(&self, country: &str) -> Result<Arc<MaskSet>> {
        let key = country_slug(country);

        loop {
            let mut derived = self
                .derived
                .lock()
                .map_err(|_| FilterError::CacheLockPoisoned)?;

            match derived.get(&key) {
                Some(Derivation::InProgress) => {
                    // Another caller is on it; the loop re-checks after waking
                    let _woken = self
                        .derivation_done
                        .wait(derived)
                        .map_err(|_| FilterError::CacheLockPoisoned)?;
                    continue;
                }
                Some(Derivation::Ready(mask)) => return Ok(Arc::clone(mask)),
                None => {
                    derived.insert(key.clone(), Derivation::InProgress);
                    break;
                }
            }
        }

        let claim = InFlight::new(self, key);
        let result = self.load_or_derive(country).map(Arc::new);
        claim.finish(&result);
        result
    }

    fn load_or_derive(&self, country: &str) -> Result<MaskSet> {
        let cache_path = self.cache_path(country);
        let labels = [("country", country_slug(country))];

        if cache_path.exists() {
            let mask = MaskSet::from_geometries(read_geometries(&cache_path)?, self.global.crs());
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(metric_defs::MASK_CACHE_HITS.name, &labels).increment(1);
            info!(country, path = %cache_path.display(), polygons = mask.len(), "Loaded cached country mask");
            return Ok(mask);
        }

        let boundaries = self
            .boundaries
            .as_deref()
            .ok_or_else(|| FilterError::MissingBoundaries(country.to_string()))?;
        let boundary = find_country(boundaries, &self.country_property, country)?;
        debug!(country, parts = boundary.0.len(), "Found country boundary");

        let mask = derive_country_mask(&self.global, &boundary)?;
        write_mask(&mask, &cache_path)?;
        self.derivations.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(metric_defs::MASK_DERIVATIONS.name, &labels).increment(1);
        info!(country, path = %cache_path.display(), polygons = mask.len(), "Derived country mask");
        Ok(mask)
    }
}
