//! Morph planning for lattice-based modular robots.
//!
//! A cluster of cube cells reshapes itself into a target configuration by
//! moving one cell at a time under a fixed set of kinematic rules, staying
//! face-connected to an anchor cell throughout. Moves are batched into
//! waves of non-interfering moves that could execute simultaneously.
//!
//! This crate contains the planning logic only. Functions take plain data
//! and return results; the only I/O is in [`persistence`], which works on
//! any reader or writer.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Run parameters and the morph request document |
//! | [`connectivity`] | Anchor connectivity checks (`would_disconnect`) |
//! | [`error`] | `MorphError` and per-candidate `PlanningRejection` |
//! | [`grid`] | Coordinates, cells, occupancy-indexed clusters, target sets |
//! | [`morph_log`] | Wave log, progress sink, per-wave reports |
//! | [`pairing`] | Greedy (bot, target) pair selection |
//! | [`pathfinding`] | BFS over rule applications |
//! | [`persistence`] | JSON and versioned bincode save/load |
//! | [`replay`] | Log replay and the 3D replay event stream |
//! | [`rules`] | Static slide and corner-roll movement table |
//! | [`scheduler`] | Wave-building state machine (`MorphPlanner`) |
//! | [`shapes`] | Box and line start configurations |

pub mod config;
pub mod connectivity;
pub mod error;
pub mod grid;
pub mod morph_log;
pub mod pairing;
pub mod pathfinding;
pub mod persistence;
pub mod replay;
pub mod rules;
pub mod scheduler;
pub mod shapes;

pub use config::{MorphParams, MorphRequest};
pub use error::{MorphError, PlanningRejection};
pub use grid::{Cell, Cluster, Coord, TargetSet};
pub use morph_log::{MorphLog, ProgressSink};
pub use scheduler::{morph, MorphOutcome, MorphPlanner, MorphStatus};
