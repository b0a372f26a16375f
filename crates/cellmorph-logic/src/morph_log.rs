//! Progress reporting and the morph log.
//!
//! The log is append-only while a run is in flight: initial bots and
//! targets are captured at construction, then one `WaveLog` per committed
//! wave. Field names match the replay tooling (`fullPath`).

use serde::{Deserialize, Serialize};

use crate::error::PlanningRejection;
use crate::grid::{Cell, Cluster, Coord, TargetSet};

/// One accepted move: where the bot was, where it ends, every waypoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveLog {
    pub id: String,
    pub from: Coord,
    pub to: Coord,
    /// Starts with `from`, ends with `to`.
    pub full_path: Vec<Coord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveLog {
    /// 1-based wave number.
    pub step: usize,
    pub moves: Vec<MoveLog>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MorphLog {
    pub bots: Vec<Cell>,
    pub targets: Vec<Coord>,
    pub waves: Vec<WaveLog>,
}

impl MorphLog {
    pub fn new(bots: Vec<Cell>, targets: Vec<Coord>) -> Self {
        Self {
            bots,
            targets,
            waves: Vec::new(),
        }
    }

    pub fn push_wave(&mut self, moves: Vec<MoveLog>) -> usize {
        let step = self.waves.len() + 1;
        self.waves.push(WaveLog { step, moves });
        step
    }

    pub fn total_moves(&self) -> usize {
        self.waves.iter().map(|w| w.moves.len()).sum()
    }
}

/// Receives a progress percentage once per committed wave.
pub trait ProgressSink {
    fn notify_progress(&mut self, percent: u8);
}

impl<F: FnMut(u8)> ProgressSink for F {
    fn notify_progress(&mut self, percent: u8) {
        self(percent)
    }
}

/// Discards progress.
impl ProgressSink for () {
    fn notify_progress(&mut self, _percent: u8) {}
}

/// Percentage of targets with a bot on them, rounded to nearest.
/// An empty target set counts as complete.
pub fn progress_percent(cluster: &Cluster, targets: &TargetSet) -> u8 {
    if targets.is_empty() {
        return 100;
    }
    let satisfied = targets.satisfied(cluster);
    ((satisfied * 100 + targets.len() / 2) / targets.len()) as u8
}

/// Per-wave tally of rejected candidates, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveStats {
    pub no_path: usize,
    pub misses_target: usize,
    pub no_contact: usize,
    pub reserved: usize,
    pub path_contact: usize,
    pub start_adjacent: usize,
}

impl WaveStats {
    pub fn record(&mut self, reason: PlanningRejection) {
        let slot = match reason {
            PlanningRejection::NoPath => &mut self.no_path,
            PlanningRejection::MissesTarget => &mut self.misses_target,
            PlanningRejection::NoContact => &mut self.no_contact,
            PlanningRejection::Reserved => &mut self.reserved,
            PlanningRejection::PathContact => &mut self.path_contact,
            PlanningRejection::StartAdjacent => &mut self.start_adjacent,
        };
        *slot += 1;
    }

    pub fn total(&self) -> usize {
        self.no_path
            + self.misses_target
            + self.no_contact
            + self.reserved
            + self.path_contact
            + self.start_adjacent
    }
}

/// Summary of one committed wave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveReport {
    pub step: usize,
    pub accepted: usize,
    /// Candidates tried, accepted or not.
    pub attempts: usize,
    pub rejections: WaveStats,
    pub progress: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_rounds_to_nearest() {
        let cells = vec![
            Cell::new("a", Coord::new(0, 0, 0)),
            Cell::new("b", Coord::new(1, 0, 0)),
        ];
        let cluster = Cluster::from_cells(&cells).unwrap();
        let t = TargetSet::new([Coord::new(0, 0, 0), Coord::new(5, 0, 0), Coord::new(6, 0, 0)]);
        // 1/3 = 33.3
        assert_eq!(progress_percent(&cluster, &t), 33);
        let t = TargetSet::new([Coord::new(0, 0, 0), Coord::new(1, 0, 0), Coord::new(6, 0, 0)]);
        // 2/3 = 66.7
        assert_eq!(progress_percent(&cluster, &t), 67);
        let t = TargetSet::new([Coord::new(0, 0, 0)]);
        assert_eq!(progress_percent(&cluster, &t), 100);
    }

    #[test]
    fn test_wave_numbering() {
        let mut log = MorphLog::new(Vec::new(), Vec::new());
        assert_eq!(log.push_wave(Vec::new()), 1);
        assert_eq!(log.push_wave(Vec::new()), 2);
        assert_eq!(log.waves[1].step, 2);
    }

    #[test]
    fn test_full_path_field_name() {
        let mv = MoveLog {
            id: "B01".into(),
            from: Coord::new(0, 1, 0),
            to: Coord::new(1, 1, 0),
            full_path: vec![Coord::new(0, 1, 0), Coord::new(1, 1, 0)],
        };
        let json = serde_json::to_value(&mv).unwrap();
        assert!(json.get("fullPath").is_some());
        assert_eq!(json["to"]["x"], 1);
    }

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |p: u8| seen.push(p);
            sink.notify_progress(40);
            sink.notify_progress(100);
        }
        assert_eq!(seen, vec![40, 100]);
        ().notify_progress(5);
    }

    #[test]
    fn test_stats_tally() {
        let mut s = WaveStats::default();
        s.record(PlanningRejection::NoPath);
        s.record(PlanningRejection::NoPath);
        s.record(PlanningRejection::StartAdjacent);
        assert_eq!(s.no_path, 2);
        assert_eq!(s.start_adjacent, 1);
        assert_eq!(s.total(), 3);
    }
}
