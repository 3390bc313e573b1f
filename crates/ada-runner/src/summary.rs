//! JSON summary of a filter run.

use crate::Result;
use ada_filter::{TileOutcome, TileState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Final status of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileStatus {
    /// The filtered raster replaced the download.
    Saved,
    /// The tile left the pipeline early.
    Discarded,
}

/// One tile's line in the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    /// Source tile path.
    pub path: PathBuf,
    pub status: TileStatus,
    /// Last state reached, e.g. `bbox-filtered`.
    pub reached: String,
    /// Stage that discarded the tile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Why the tile was discarded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&TileOutcome> for TileRecord {
    fn from(outcome: &TileOutcome) -> Self {
        let status = if outcome.state == TileState::Final {
            TileStatus::Saved
        } else {
            TileStatus::Discarded
        };
        Self {
            path: outcome.path.clone(),
            status,
            reached: outcome.reached.to_string(),
            stage: outcome.discard.as_ref().map(|(stage, _)| stage.to_string()),
            reason: outcome
                .discard
                .as_ref()
                .map(|(_, reason)| reason.to_string()),
        }
    }
}

/// Tile counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Tiles processed.
    pub tiles: usize,
    /// Tiles kept.
    pub saved: usize,
    /// Every discard, failures included.
    pub discarded: usize,
    /// Discards caused by I/O or filter errors; the original tile was kept.
    pub failed: usize,
}

/// Outcome of a filter run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// When the summary was produced (RFC 3339).
    pub generated_at: DateTime<Utc>,
    /// Event directory that was filtered.
    pub dir: PathBuf,
    /// Stages that ran, in order.
    pub stages: Vec<String>,
    pub tiles: Vec<TileRecord>,
    pub totals: Totals,
}

impl RunSummary {
    pub fn from_outcomes(dir: &Path, stages: &[&str], outcomes: &[TileOutcome]) -> Self {
        let mut totals = Totals {
            tiles: outcomes.len(),
            ..Totals::default()
        };
        for outcome in outcomes {
            match &outcome.discard {
                None => totals.saved += 1,
                Some((_, reason)) => {
                    totals.discarded += 1;
                    if !reason.is_filtered() {
                        totals.failed += 1;
                    }
                }
            }
        }

        Self {
            generated_at: Utc::now(),
            dir: dir.to_path_buf(),
            stages: stages.iter().map(|s| s.to_string()).collect(),
            tiles: outcomes.iter().map(TileRecord::from).collect(),
            totals,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the summary as pretty-printed JSON, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ada_filter::DiscardReason;

    fn outcomes() -> Vec<TileOutcome> {
        vec![
            TileOutcome {
                path: PathBuf::from("in/pre-event/a-1.tif"),
                state: TileState::Final,
                reached: TileState::Trimmed,
                discard: None,
            },
            TileOutcome {
                path: PathBuf::from("in/post-event/a-1.tif"),
                state: TileState::Discarded,
                reached: TileState::Fetched,
                discard: Some(("bbox", DiscardReason::NoOverlap)),
            },
            TileOutcome {
                path: PathBuf::from("in/post-event/a-2.tif"),
                state: TileState::Discarded,
                reached: TileState::Fetched,
                discard: Some(("read", DiscardReason::IoFailure("truncated".to_string()))),
            },
        ]
    }

    #[test]
    fn test_totals() {
        let summary = RunSummary::from_outcomes(Path::new("in"), &["bbox", "trim"], &outcomes());
        assert_eq!(
            summary.totals,
            Totals {
                tiles: 3,
                saved: 1,
                discarded: 2,
                failed: 1
            }
        );
        assert_eq!(summary.tiles[1].reason.as_deref(), Some("no overlap"));
        assert_eq!(summary.tiles[1].stage.as_deref(), Some("bbox"));
    }

    #[test]
    fn test_json_shape() {
        let summary = RunSummary::from_outcomes(Path::new("in"), &["trim"], &outcomes());
        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();

        let stamp = json["generated_at"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(stamp).is_ok());
        assert_eq!(json["tiles"][0]["status"], "saved");
        assert_eq!(json["tiles"][0]["reached"], "trimmed");
        assert!(json["tiles"][0].get("reason").is_none());
        assert_eq!(json["tiles"][2]["reason"], "I/O failure: truncated");
        assert_eq!(json["totals"]["saved"], 1);
    }
}
