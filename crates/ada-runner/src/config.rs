//! Filter configuration.
//!
//! A run is configured from an optional YAML file, then from command-line
//! flags, which win over the file:
//!
//! ```yaml
//! bbox: [39.0, -20.5, 39.5, -19.5]
//! mask_path: data/ntl.geojson
//! boundaries_path: data/countries.geojson
//! country: Mozambique
//! enable_bbox: true
//! enable_mask: true
//! ```

use crate::{Result, RunnerError};
use ada_filter::{country_cache_path, default_cache_dir, BoundingBox, DEFAULT_COUNTRY_PROPERTY};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_true() -> bool {
    true
}

fn default_country_property() -> String {
    DEFAULT_COUNTRY_PROPERTY.to_string()
}

/// Settings for the filter stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    /// Ground rectangle to crop to, `[min_x, min_y, max_x, max_y]`.
    #[serde(default)]
    pub bbox: Option<BoundingBox>,

    /// Night-lights mask GeoJSON.
    #[serde(default)]
    pub mask_path: Option<PathBuf>,

    /// National boundaries GeoJSON, needed when `country` is set.
    #[serde(default)]
    pub boundaries_path: Option<PathBuf>,

    /// Restrict the mask to this country.
    #[serde(default)]
    pub country: Option<String>,

    /// Boundary property holding the country name.
    #[serde(default = "default_country_property")]
    pub country_property: String,

    /// Where derived country masks are cached. Defaults to the mask's directory.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Run the bounding-box stage when a bbox is configured.
    #[serde(default = "default_true")]
    pub enable_bbox: bool,

    /// Run the mask stage when a mask is configured.
    #[serde(default = "default_true")]
    pub enable_mask: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            bbox: None,
            mask_path: None,
            boundaries_path: None,
            country: None,
            country_property: default_country_property(),
            cache_dir: None,
            enable_bbox: true,
            enable_mask: true,
        }
    }
}

/// Command-line values layered over a [`FilterConfig`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOverrides {
    /// Replaces the configured bbox.
    pub bbox: Option<BoundingBox>,
    /// Replaces the mask file.
    pub mask_path: Option<PathBuf>,
    /// Replaces the boundaries file.
    pub boundaries_path: Option<PathBuf>,
    /// Replaces the country restriction.
    pub country: Option<String>,
    /// Replaces the boundary name property.
    pub country_property: Option<String>,
    /// Replaces the country mask cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Turn the bounding-box stage off.
    pub no_bbox: bool,
    /// Turn the mask stage off.
    pub no_mask: bool,
}

impl FilterConfig {
    /// Parse a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a YAML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let yaml = fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// The file at `path` if given, otherwise defaults, with `overrides` applied.
    pub fn resolve(path: Option<&Path>, overrides: FilterOverrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line values. Set values replace the file's; `no_*` flags
    /// only ever disable a stage.
    pub fn apply(&mut self, overrides: FilterOverrides) {
        if overrides.bbox.is_some() {
            self.bbox = overrides.bbox;
        }
        if overrides.mask_path.is_some() {
            self.mask_path = overrides.mask_path;
        }
        if overrides.boundaries_path.is_some() {
            self.boundaries_path = overrides.boundaries_path;
        }
        if overrides.country.is_some() {
            self.country = overrides.country;
        }
        if let Some(property) = overrides.country_property {
            self.country_property = property;
        }
        if overrides.cache_dir.is_some() {
            self.cache_dir = overrides.cache_dir;
        }
        if overrides.no_bbox {
            self.enable_bbox = false;
        }
        if overrides.no_mask {
            self.enable_mask = false;
        }
    }

    /// Check that an enabled country restriction can be resolved.
    ///
    /// The boundaries file is only needed while the country's subset is not
    /// cached yet.
    pub fn validate(&self) -> Result<()> {
        let Some(cache_path) = self.country_cache_path() else {
            return Ok(());
        };
        if self.boundaries_path.is_none() && !cache_path.exists() {
            return Err(RunnerError::Config(format!(
                "a country was given but no boundaries file, and {} does not exist",
                cache_path.display()
            )));
        }
        Ok(())
    }

    /// Cache file of the country subset, when the mask stage runs for a country.
    pub fn country_cache_path(&self) -> Option<PathBuf> {
        let mask_path = self.mask_stage()?;
        let country = self.country.as_deref()?;
        let cache_dir = self
            .cache_dir
            .clone()
            .unwrap_or_else(|| default_cache_dir(mask_path));
        Some(country_cache_path(&cache_dir, country))
    }

    /// The bbox to crop to, if that stage runs.
    pub fn bbox_stage(&self) -> Option<BoundingBox> {
        self.bbox.filter(|_| self.enable_bbox)
    }

    /// The mask file to filter with, if that stage runs.
    pub fn mask_stage(&self) -> Option<&Path> {
        self.mask_path.as_deref().filter(|_| self.enable_mask)
    }
}
