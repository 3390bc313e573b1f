//! Metrics for the disaster tile pipeline.
//!
//! Every metric the workspace emits is declared here as a [`Metric`] constant,
//! so names and label keys are spelled once. The crate re-exports `metrics`;
//! emitting goes through its macros and whatever recorder the binary installs.
//!
//! # Example
//!
//! ```rust
//! use ada_metrics::{metric_defs, metrics, TileLabels};
//!
//! ada_metrics::describe_metrics();
//!
//! let labels = TileLabels::new("post-event").with_stage("mask");
//! metrics::counter!(metric_defs::TILES_DISCARDED.name, &labels.with_reason("no overlap"))
//!     .increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration: name, kind, description, unit and label keys.
///
/// ```rust
/// use ada_metrics::{Metric, MetricKind};
/// use ada_metrics::metrics::Unit;
///
/// const RETRIES: Metric = Metric::counter("ada.download.retries")
///     .with_description("Download retries")
///     .with_unit(Unit::Count)
///     .with_labels(&["phase"]);
///
/// assert_eq!(RETRIES.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g. "ada.filter.tiles_saved").
    pub name: &'static str,
    /// The kind of metric.
    pub kind: MetricKind,
    /// Human-readable description.
    pub description: &'static str,
    /// The unit of measurement, if any.
    pub unit: Option<Unit>,
    /// Expected label keys.
    pub labels: &'static [&'static str],
}

impl Metric {
    /// A counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    /// A gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    /// A histogram metric with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Sets the description.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the pipeline.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Catalog
    // ========================================================================

    /// Tiles found in the event listing.
    ///
    /// Labels: phase
    pub const TILES_LISTED: Metric = Metric::counter("ada.catalog.tiles_listed")
        .with_description("Tiles found in the event listing")
        .with_unit(Unit::Count)
        .with_labels(&["phase"]);

    /// Tiles kept after pre/post pairing and limits.
    ///
    /// Labels: phase
    pub const TILES_SELECTED: Metric = Metric::counter("ada.catalog.tiles_selected")
        .with_description("Tiles kept after pairing by cell")
        .with_unit(Unit::Count)
        .with_labels(&["phase"]);

    // ========================================================================
    // Download
    // ========================================================================

    /// Tiles downloaded successfully.
    ///
    /// Labels: phase
    pub const TILES_DOWNLOADED: Metric = Metric::counter("ada.download.tiles")
        .with_description("Tiles downloaded")
        .with_unit(Unit::Count)
        .with_labels(&["phase"]);

    /// Tiles that stayed unavailable after the retry.
    ///
    /// Labels: phase
    pub const DOWNLOAD_FAILURES: Metric = Metric::counter("ada.download.failures")
        .with_description("Tiles unavailable after retrying")
        .with_unit(Unit::Count)
        .with_labels(&["phase"]);

    /// Bytes written by tile downloads.
    ///
    /// Labels: phase
    pub const BYTES_DOWNLOADED: Metric = Metric::counter("ada.download.bytes")
        .with_description("Bytes downloaded")
        .with_unit(Unit::Bytes)
        .with_labels(&["phase"]);

    // ========================================================================
    // Filter pipeline
    // ========================================================================

    /// Tiles that reached the final state.
    ///
    /// Labels: phase
    pub const TILES_SAVED: Metric = Metric::counter("ada.filter.tiles_saved")
        .with_description("Tiles saved after filtering")
        .with_unit(Unit::Count)
        .with_labels(&["phase"]);

    /// Tiles dropped by a filter stage.
    ///
    /// Labels: phase, stage, reason
    pub const TILES_DISCARDED: Metric = Metric::counter("ada.filter.tiles_discarded")
        .with_description("Tiles discarded by a filter stage")
        .with_unit(Unit::Count)
        .with_labels(&["phase", "stage", "reason"]);

    /// Time spent in one filter stage for one tile.
    ///
    /// Labels: stage
    pub const STAGE_TIME: Metric = Metric::histogram("ada.filter.stage_time_ms")
        .with_description("Filter stage wall time per tile")
        .with_unit(Unit::Milliseconds)
        .with_labels(&["stage"]);

    // ========================================================================
    // Country mask cache
    // ========================================================================

    /// Country subsets derived from the global mask.
    ///
    /// Labels: country
    pub const MASK_DERIVATIONS: Metric = Metric::counter("ada.mask.derivations")
        .with_description("Country mask subsets derived")
        .with_unit(Unit::Count)
        .with_labels(&["country"]);

    /// Country subsets served from the persistent cache.
    ///
    /// Labels: country
    pub const MASK_CACHE_HITS: Metric = Metric::counter("ada.mask.cache_hits")
        .with_description("Country mask subsets loaded from cache")
        .with_unit(Unit::Count)
        .with_labels(&["country"]);

    /// Polygons in the active mask set.
    pub const MASK_POLYGONS: Metric = Metric::gauge("ada.mask.polygons")
        .with_description("Polygons in the active mask set")
        .with_unit(Unit::Count);

    /// Every metric, for bulk registration.
    pub const ALL: &[&Metric] = &[
        &TILES_LISTED,
        &TILES_SELECTED,
        &TILES_DOWNLOADED,
        &DOWNLOAD_FAILURES,
        &BYTES_DOWNLOADED,
        &TILES_SAVED,
        &TILES_DISCARDED,
        &STAGE_TIME,
        &MASK_DERIVATIONS,
        &MASK_CACHE_HITS,
        &MASK_POLYGONS,
    ];
}

/// Labels identifying a tile's phase and, optionally, the stage it is in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLabels {
    /// Event phase directory ("pre-event" / "post-event").
    pub phase: String,
    /// Filter stage, when the metric is stage-scoped.
    pub stage: Option<String>,
}

impl TileLabels {
    /// Labels for a tile of `phase`.
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            stage: None,
        }
    }

    /// Adds the filter stage.
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Converts to the `metrics` crate label format.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        let mut labels = vec![("phase", self.phase.clone())];
        if let Some(stage) = &self.stage {
            labels.push(("stage", stage.clone()));
        }
        labels
    }

    /// Labels plus a discard reason.
    pub fn with_reason(&self, reason: impl Into<String>) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.push(("reason", reason.into()));
        labels
    }
}

/// Registers every metric description with the installed recorder.
///
/// Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
