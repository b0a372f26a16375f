//! Error types for morph planning.
//!
//! `MorphError` covers everything that aborts a run: malformed input,
//! structural invariant violations and persistence failures. Per-candidate
//! planning rejections are not errors; they are `PlanningRejection` values
//! the scheduler records and moves past.

use thiserror::Error;

use crate::grid::Coord;

#[derive(Debug, Error)]
pub enum MorphError {
    #[error("bot id {id:?} appears more than once")]
    DuplicateBot { id: String },

    #[error("bots {first:?} and {second:?} both occupy {coord}")]
    DuplicateOccupancy {
        coord: Coord,
        first: String,
        second: String,
    },

    #[error("no bot occupies the anchor position {anchor}")]
    MissingAnchor { anchor: Coord },

    #[error("{} cell(s) not connected to the anchor", .unreached.len())]
    Disconnected { unreached: Vec<Coord> },

    #[error("bot {id:?} not found in cluster")]
    BotNotFound { id: String },

    #[error("coordinate {coord} lies outside ±{}", crate::grid::COORD_LIMIT)]
    OutOfBounds { coord: Coord },

    #[error("coordinate {coord} is already occupied")]
    Occupied { coord: Coord },

    #[error("replay mismatch: bot {id:?} expected at {expected}, found at {found}")]
    ReplayMismatch {
        id: String,
        expected: Coord,
        found: Coord,
    },

    #[error("target configuration is empty")]
    EmptyTargets,

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary log error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),

    #[error("unsupported log version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// Why a candidate (bot, target) pair was turned down while building a wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanningRejection {
    /// Path search exhausted its frontier.
    NoPath,
    /// The path found does not end on the target.
    MissesTarget,
    /// The target has no cluster contact once the mover is lifted out.
    NoContact,
    /// The target or one of its neighbours is reserved by an earlier move.
    Reserved,
    /// A waypoint comes within contact distance of an accepted path.
    PathContact,
    /// The start touches the start of an accepted move.
    StartAdjacent,
}

impl std::fmt::Display for PlanningRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NoPath => "no path found",
            Self::MissesTarget => "path does not end at target",
            Self::NoContact => "target has no cluster contact",
            Self::Reserved => "target or neighbour reserved",
            Self::PathContact => "path touches another wave path",
            Self::StartAdjacent => "start touches another wave bot",
        };
        f.write_str(s)
    }
}
