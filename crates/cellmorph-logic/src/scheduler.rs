//! Wave scheduler: batches non-interfering moves and commits them together.
//!
//! Each pass works on a private snapshot of the live cluster. Candidates
//! come from [`choose_pair`]; each one is planned with the mover lifted out
//! of the snapshot, validated against the moves already accepted this wave,
//! and either landed on its target or put back. A wave with at least one
//! acceptance is committed by swapping the snapshot in.
//!
//! ```text
//! BuildingWave ──accepted > 0──▶ Committed ──▶ BuildingWave ...
//!       │
//!       └──accepted == 0──▶ Done (all targets satisfied) | Stuck
//! ```
//!
//! `run` drives passes in a plain loop and checks the wave bound between
//! passes, so a host can cap a run without any recursion to unwind.

use std::collections::HashSet;

use log::{debug, error, info, log_enabled, trace, warn, Level};

use crate::config::{MorphParams, MorphRequest};
use crate::connectivity::check_connected;
use crate::error::{MorphError, PlanningRejection};
use crate::grid::{Cluster, Coord, TargetSet};
use crate::morph_log::{progress_percent, MorphLog, MoveLog, ProgressSink, WaveReport, WaveStats};
use crate::pairing::{choose_pair, Pair};
use crate::pathfinding::{plan_path, reachable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphState {
    BuildingWave,
    Committed,
    Done,
    Stuck,
    Cancelled,
}

/// Result of one scheduling pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Committed(WaveReport),
    Done,
    Stuck,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphStatus {
    Done,
    Stuck,
    /// Stopped by `max_waves` with targets still open.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct MorphOutcome {
    pub success: bool,
    pub status: MorphStatus,
    pub log: MorphLog,
    pub waves: usize,
}

/// Why the wave loop stopped looking for more candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaveEnd {
    PathCeiling,
    AttemptCeiling,
    NoPair,
}

#[derive(Debug, Clone)]
struct AcceptedMove {
    bot: String,
    start: Coord,
    target: Coord,
    path: Vec<Coord>,
}

/// State for assembling a single wave.
struct WaveBuilder<'a> {
    params: &'a MorphParams,
    targets: &'a TargetSet,
    snapshot: Cluster,
    attempted: HashSet<(Coord, Coord)>,
    reserved_targets: HashSet<Coord>,
    /// Accepted targets and their face neighbours.
    reserved_area: HashSet<Coord>,
    accepted: Vec<AcceptedMove>,
    stats: WaveStats,
    failures: usize,
    tried: usize,
}

impl<'a> WaveBuilder<'a> {
    fn new(params: &'a MorphParams, targets: &'a TargetSet, live: &Cluster) -> Self {
        Self {
            params,
            targets,
            snapshot: live.clone(),
            attempted: HashSet::new(),
            reserved_targets: HashSet::new(),
            reserved_area: HashSet::new(),
            accepted: Vec::new(),
            stats: WaveStats::default(),
            failures: 0,
            tried: 0,
        }
    }

    fn build(&mut self) -> Result<WaveEnd, MorphError> {
        loop {
            if self.accepted.len() >= self.params.max_paths_per_wave {
                return Ok(WaveEnd::PathCeiling);
            }
            if self.failures >= self.params.max_attempts_to_find_pair {
                return Ok(WaveEnd::AttemptCeiling);
            }
            let Some(pair) = choose_pair(
                &self.snapshot,
                self.targets,
                self.params.anchor,
                self.params.top_candidates,
                &self.attempted,
                &self.reserved_targets,
            ) else {
                return Ok(WaveEnd::NoPair);
            };

            self.tried += 1;
            self.attempted.insert((pair.start, pair.target));
            self.try_pair(pair)?;
        }
    }

    /// Lift the bot, plan, validate, then land it on the target or put it back.
    fn try_pair(&mut self, pair: Pair) -> Result<(), MorphError> {
        let start = self
            .snapshot
            .remove(&pair.bot)
            .ok_or_else(|| MorphError::BotNotFound {
                id: pair.bot.clone(),
            })?;

        match self.validate(start, pair.target) {
            Ok(path) => {
                self.snapshot.insert(&pair.bot, pair.target)?;
                self.reserved_targets.insert(pair.target);
                self.reserved_area.insert(pair.target);
                self.reserved_area.extend(pair.target.neighbors());
                trace!(
                    "accepted {} {} -> {} ({} waypoints)",
                    pair.bot,
                    start,
                    pair.target,
                    path.len()
                );
                self.accepted.push(AcceptedMove {
                    bot: pair.bot,
                    start,
                    target: pair.target,
                    path,
                });
                self.failures = 0;
            }
            Err(reason) => {
                self.snapshot.insert(&pair.bot, start)?;
                trace!("rejected {} {} -> {}: {}", pair.bot, start, pair.target, reason);
                if reason == PlanningRejection::NoPath && log_enabled!(Level::Trace) {
                    trace!(
                        "{} reaches {} positions from {}",
                        pair.bot,
                        reachable(start, &self.snapshot).len(),
                        start
                    );
                }
                self.stats.record(reason);
                self.failures += 1;
            }
        }
        Ok(())
    }

    /// Checks run against the snapshot with the mover already lifted out.
    fn validate(&self, start: Coord, target: Coord) -> Result<Vec<Coord>, PlanningRejection> {
        let path = plan_path(start, target, &self.snapshot).ok_or(PlanningRejection::NoPath)?;
        if path.last() != Some(&target) {
            return Err(PlanningRejection::MissesTarget);
        }
        if !self.snapshot.has_contact(target, None) {
            return Err(PlanningRejection::NoContact);
        }
        if self.reserved_area.contains(&target)
            || target.neighbors().iter().any(|n| self.reserved_area.contains(n))
        {
            return Err(PlanningRejection::Reserved);
        }
        let touches = self.accepted.iter().any(|other| {
            path.iter()
                .any(|&p| other.path.iter().any(|&q| p.manhattan(q) <= 1))
        });
        if touches {
            return Err(PlanningRejection::PathContact);
        }
        // Start waypoints already passed the path contact check above, so
        // this only fires if that check is ever relaxed.
        if self.accepted.iter().any(|other| other.start.is_adjacent(start)) {
            return Err(PlanningRejection::StartAdjacent);
        }
        Ok(path)
    }
}

/// Owns the live cluster and the log for one morph run.
#[derive(Debug, Clone)]
pub struct MorphPlanner {
    params: MorphParams,
    targets: TargetSet,
    cluster: Cluster,
    log: MorphLog,
    state: MorphState,
    waves: usize,
}

impl MorphPlanner {
    /// Validate the request and take ownership of the start configuration.
    ///
    /// The start must have unique ids and coordinates, a cell on the anchor,
    /// and be connected to it. Every coordinate in the request must lie
    /// within [`crate::grid::COORD_LIMIT`].
    pub fn new(request: MorphRequest) -> Result<Self, MorphError> {
        request.params.validate()?;
        if request.targets.is_empty() {
            return Err(MorphError::EmptyTargets);
        }
        let outside = std::iter::once(request.params.anchor)
            .chain(request.targets.iter().copied())
            .find(|c| !c.in_bounds());
        if let Some(coord) = outside {
            return Err(MorphError::OutOfBounds { coord });
        }
        let cluster = Cluster::from_cells(&request.start)?;
        check_connected(&cluster, request.params.anchor)?;

        let log = MorphLog::new(request.start, request.targets.clone());
        Ok(Self {
            params: request.params,
            targets: TargetSet::new(request.targets),
            cluster,
            log,
            state: MorphState::BuildingWave,
            waves: 0,
        })
    }

    pub fn params(&self) -> &MorphParams {
        &self.params
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn targets(&self) -> &TargetSet {
        &self.targets
    }

    pub fn log(&self) -> &MorphLog {
        &self.log
    }

    pub fn state(&self) -> MorphState {
        self.state
    }

    /// Committed waves so far.
    pub fn waves(&self) -> usize {
        self.waves
    }

    pub fn progress(&self) -> u8 {
        progress_percent(&self.cluster, &self.targets)
    }

    /// One scheduling pass. Terminal states are sticky.
    pub fn step(&mut self) -> Result<StepOutcome, MorphError> {
        match self.state {
            MorphState::Done => return Ok(StepOutcome::Done),
            MorphState::Stuck => return Ok(StepOutcome::Stuck),
            _ => {}
        }
        if self.targets.all_satisfied(&self.cluster) {
            debug!("all {} targets satisfied", self.targets.len());
            self.state = MorphState::Done;
            return Ok(StepOutcome::Done);
        }
        self.state = MorphState::BuildingWave;

        let mut wave = WaveBuilder::new(&self.params, &self.targets, &self.cluster);
        let end = wave.build()?;
        let WaveBuilder {
            snapshot,
            accepted,
            stats,
            tried,
            ..
        } = wave;
        debug!(
            "wave loop ended ({:?}): {} accepted, {} tried",
            end,
            accepted.len(),
            tried
        );

        if accepted.is_empty() {
            self.cluster = snapshot;
            if self.targets.all_satisfied(&self.cluster) {
                self.state = MorphState::Done;
                return Ok(StepOutcome::Done);
            }
            warn!(
                "stuck after {} waves at {}% ({} candidates rejected)",
                self.waves,
                self.progress(),
                stats.total()
            );
            self.state = MorphState::Stuck;
            return Ok(StepOutcome::Stuck);
        }

        if let Err(err) = check_connected(&snapshot, self.params.anchor) {
            error!(
                "wave {} would commit a broken cluster: {}\n{}",
                self.waves + 1,
                err,
                snapshot.dump()
            );
            return Err(err);
        }

        self.cluster = snapshot;
        self.waves += 1;
        let moves = accepted
            .into_iter()
            .map(|m| MoveLog {
                id: m.bot,
                from: m.start,
                to: m.target,
                full_path: m.path,
            })
            .collect::<Vec<_>>();
        let accepted = moves.len();
        let step = self.log.push_wave(moves);
        let progress = self.progress();
        info!("wave {}: {} moves, {}% complete", step, accepted, progress);

        self.state = MorphState::Committed;
        Ok(StepOutcome::Committed(WaveReport {
            step,
            accepted,
            attempts: tried,
            rejections: stats,
            progress,
        }))
    }

    /// Run waves until done, stuck, or the wave bound is hit.
    ///
    /// `sink` hears the progress after every committed wave and 100 once
    /// the morph completes.
    pub fn run(&mut self, mut sink: impl ProgressSink) -> Result<MorphOutcome, MorphError> {
        loop {
            if let Some(limit) = self.params.max_waves {
                if self.waves >= limit && !self.targets.all_satisfied(&self.cluster) {
                    warn!("cancelled after {} waves at {}%", self.waves, self.progress());
                    self.state = MorphState::Cancelled;
                    return Ok(self.outcome(MorphStatus::Cancelled));
                }
            }
            match self.step()? {
                StepOutcome::Committed(report) => sink.notify_progress(report.progress),
                StepOutcome::Done => {
                    sink.notify_progress(100);
                    return Ok(self.outcome(MorphStatus::Done));
                }
                StepOutcome::Stuck => return Ok(self.outcome(MorphStatus::Stuck)),
            }
        }
    }

    fn outcome(&self, status: MorphStatus) -> MorphOutcome {
        MorphOutcome {
            success: status == MorphStatus::Done,
            status,
            log: self.log.clone(),
            waves: self.waves,
        }
    }
}

/// Build a planner and run it to the end.
pub fn morph(request: MorphRequest, sink: impl ProgressSink) -> Result<MorphOutcome, MorphError> {
    MorphPlanner::new(request)?.run(sink)
}
