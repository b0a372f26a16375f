//! Run parameters and the morph request document.
//!
//! A `MorphRequest` is what a caller hands the planner: the start cells,
//! the bare target coordinates, and the tuning knobs. Every field of
//! `MorphParams` has a default, so a request document only needs to name
//! what it changes.

use serde::{Deserialize, Serialize};

use crate::error::MorphError;
use crate::grid::{Cell, Coord};

pub const DEFAULT_MAX_PATHS_PER_WAVE: usize = 15;
pub const DEFAULT_MAX_ATTEMPTS_TO_FIND_PAIR: usize = 25;
/// How many of the farthest unhappy bots get considered per pair pick.
pub const DEFAULT_TOP_CANDIDATES: usize = 4;

/// Tuning knobs for one morph run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphParams {
    /// Structural root; the cluster stays connected to the cell here.
    pub anchor: Coord,
    /// Ceiling on accepted moves per wave.
    pub max_paths_per_wave: usize,
    /// Consecutive failed candidates before a wave is closed.
    pub max_attempts_to_find_pair: usize,
    pub top_candidates: usize,
    /// Stop after this many committed waves. `None` runs to done or stuck.
    pub max_waves: Option<usize>,
}

impl Default for MorphParams {
    fn default() -> Self {
        Self {
            anchor: Coord::ORIGIN,
            max_paths_per_wave: DEFAULT_MAX_PATHS_PER_WAVE,
            max_attempts_to_find_pair: DEFAULT_MAX_ATTEMPTS_TO_FIND_PAIR,
            top_candidates: DEFAULT_TOP_CANDIDATES,
            max_waves: None,
        }
    }
}

impl MorphParams {
    pub fn validate(&self) -> Result<(), MorphError> {
        if self.max_paths_per_wave == 0 {
            return Err(MorphError::InvalidParams(
                "max_paths_per_wave must be at least 1".into(),
            ));
        }
        if self.max_attempts_to_find_pair == 0 {
            return Err(MorphError::InvalidParams(
                "max_attempts_to_find_pair must be at least 1".into(),
            ));
        }
        if self.top_candidates == 0 {
            return Err(MorphError::InvalidParams(
                "top_candidates must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// A target coordinate as it appears in documents. The generator writes
/// ids onto targets too; they carry no meaning and are dropped.
#[derive(Debug, Clone, Copy, Deserialize)]
struct TargetDoc {
    x: i32,
    y: i32,
    z: i32,
}

fn deserialize_targets<'de, D>(deserializer: D) -> Result<Vec<Coord>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let docs = Vec::<TargetDoc>::deserialize(deserializer)?;
    Ok(docs.into_iter().map(|t| Coord::new(t.x, t.y, t.z)).collect())
}

/// Everything needed to start a morph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MorphRequest {
    pub start: Vec<Cell>,
    #[serde(deserialize_with = "deserialize_targets")]
    pub targets: Vec<Coord>,
    #[serde(default)]
    pub params: MorphParams,
}

impl MorphRequest {
    pub fn new(start: Vec<Cell>, targets: Vec<Coord>) -> Self {
        Self {
            start,
            targets,
            params: MorphParams::default(),
        }
    }

    pub fn with_params(mut self, params: MorphParams) -> Self {
        self.params = params;
        self
    }
}

/// Parse a target list, ignoring any extra fields per entry.
pub fn targets_from_json(json: &str) -> Result<Vec<Coord>, MorphError> {
    let docs: Vec<TargetDoc> = serde_json::from_str(json)?;
    Ok(docs.into_iter().map(|t| Coord::new(t.x, t.y, t.z)).collect())
}
