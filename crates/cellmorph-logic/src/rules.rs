//! Kinematic rule engine: which single-cell transitions are legal.
//!
//! A rule is a short sequence of steps. Each step displaces the moving cell
//! by a fixed delta and carries guards that must all hold for the rule to
//! continue. Guards probe either the step's landing point or a fixed offset
//! from the origin (the position the rule started from). A zero-delta step
//! only asserts a supporting condition and contributes no waypoint.
//!
//! The table has two families:
//! - slides (`G_*`): one face step onto an empty, contacted cell that is
//!   braced diagonally by a neighbour of the origin;
//! - corner rolls (`K_*`): step sideways into an empty cell, then roll onto
//!   the cell beyond a bracing neighbour.
//!
//! Contact checks never count the origin itself, so a cell cannot hold on
//! to the spot it is leaving.

use crate::grid::{Cluster, Coord};

/// Where a guard looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// The point the current step lands on.
    Target,
    /// A fixed offset from the rule's origin.
    Origin(Coord),
}

impl Probe {
    fn resolve(self, target: Coord, origin: Coord) -> Coord {
        match self {
            Probe::Target => target,
            Probe::Origin(delta) => origin.offset(delta),
        }
    }
}

/// A boolean precondition on a rule step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    IsBot(Probe),
    IsEmpty(Probe),
    /// Some occupied cell other than the origin shares a face with the point.
    HasContact(Probe),
    /// A cell sits left, right, above or below the point (same z layer).
    HasLateralAnchor(Probe),
    AnyOf(&'static [Guard]),
}

impl Guard {
    pub fn holds(&self, target: Coord, origin: Coord, cluster: &Cluster) -> bool {
        match *self {
            Guard::IsBot(p) => cluster.is_occupied(p.resolve(target, origin)),
            Guard::IsEmpty(p) => cluster.is_empty_at(p.resolve(target, origin)),
            Guard::HasContact(p) => cluster.has_contact(p.resolve(target, origin), Some(origin)),
            Guard::HasLateralAnchor(p) => {
                let at = p.resolve(target, origin);
                LATERAL_OFFSETS
                    .iter()
                    .any(|&d| cluster.is_occupied(at.offset(d)))
            }
            Guard::AnyOf(guards) => guards.iter().any(|g| g.holds(target, origin, cluster)),
        }
    }
}

const LATERAL_OFFSETS: [Coord; 4] = [
    Coord::new(0, -1, 0),
    Coord::new(0, 1, 0),
    Coord::new(-1, 0, 0),
    Coord::new(1, 0, 0),
];

#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub delta: Coord,
    pub guards: &'static [Guard],
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub steps: &'static [Step],
}

impl Rule {
    /// Run the rule from `origin`. Returns the non-zero waypoints on success.
    pub fn apply(&self, origin: Coord, cluster: &Cluster) -> Option<Vec<Coord>> {
        let mut current = origin;
        let mut path = Vec::with_capacity(self.steps.len());
        for step in self.steps {
            let next = current.offset(step.delta);
            if !step.guards.iter().all(|g| g.holds(next, origin, cluster)) {
                return None;
            }
            if !step.delta.is_zero() {
                path.push(next);
            }
            current = next;
        }
        Some(path)
    }
}

/// One legal transition out of a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedMove {
    pub rule: &'static str,
    /// Waypoints after the origin, in order. Never includes the origin.
    pub path: Vec<Coord>,
}

impl AllowedMove {
    pub fn destination(&self) -> Option<Coord> {
        self.path.last().copied()
    }
}

/// Every rule satisfied from `origin`, in table order. An enclosed or
/// unsupported position simply yields nothing.
pub fn allowed_moves(origin: Coord, cluster: &Cluster) -> Vec<AllowedMove> {
    MOVEMENT_RULES
        .iter()
        .filter_map(|rule| {
            rule.apply(origin, cluster).map(|path| AllowedMove {
                rule: rule.name,
                path,
            })
        })
        .collect()
}

pub fn rule_by_name(name: &str) -> Option<&'static Rule> {
    MOVEMENT_RULES.iter().find(|r| r.name == name)
}

// ── Rule table ──────────────────────────────────────────────────────────

macro_rules! at {
    ($x:expr, $y:expr, $z:expr) => {
        Coord {
            x: $x,
            y: $y,
            z: $z,
        }
    };
}

/// Face slide by `delta`, braced by any of the listed origin offsets.
macro_rules! slide {
    ($name:literal, $delta:expr, [$($brace:expr),+ $(,)?]) => {
        Rule {
            name: $name,
            steps: &[Step {
                delta: $delta,
                guards: &[
                    Guard::IsEmpty(Probe::Target),
                    Guard::HasContact(Probe::Target),
                    Guard::AnyOf(&[$(Guard::IsBot(Probe::Origin($brace))),+]),
                ],
            }],
        }
    };
}

/// Corner roll: requires a bot at `origin + roll`, steps by `via` into an
/// empty cell, then by `roll` onto an empty, contacted cell.
macro_rules! corner {
    ($name:literal, via: $via:expr, roll: $roll:expr) => {
        Rule {
            name: $name,
            steps: &[
                Step {
                    delta: at!(0, 0, 0),
                    guards: &[Guard::IsBot(Probe::Origin($roll))],
                },
                Step {
                    delta: $via,
                    guards: &[Guard::IsEmpty(Probe::Target)],
                },
                Step {
                    delta: $roll,
                    guards: &[Guard::IsEmpty(Probe::Target), Guard::HasContact(Probe::Target)],
                },
            ],
        }
    };
}

/// The complete movement table. Path search expands rules in this order.
pub static MOVEMENT_RULES: &[Rule] = &[
    slide!("G_F", at!(1, 0, 0), [at!(1, 1, 0), at!(1, -1, 0), at!(1, 0, 1), at!(1, 0, -1)]),
    slide!("G_R", at!(0, 0, -1), [at!(1, 0, -1), at!(-1, 0, -1), at!(0, 1, -1), at!(0, -1, -1)]),
    slide!("G_B", at!(-1, 0, 0), [at!(-1, 1, 0), at!(-1, -1, 0), at!(-1, 0, 1), at!(-1, 0, -1)]),
    slide!("G_L", at!(0, 0, 1), [at!(1, 0, 1), at!(-1, 0, 1), at!(0, 1, 1), at!(0, -1, 1)]),
    slide!("G_T", at!(0, 1, 0), [at!(1, 1, 0), at!(-1, 1, 0), at!(0, 1, 1), at!(0, 1, -1)]),
    slide!("G_D", at!(0, -1, 0), [at!(1, -1, 0), at!(-1, -1, 0), at!(0, -1, 1), at!(0, -1, -1)]),
    corner!("K_TF", via: at!(0, 1, 0), roll: at!(1, 0, 0)),
    corner!("K_TB", via: at!(0, 1, 0), roll: at!(-1, 0, 0)),
    corner!("K_DF", via: at!(0, -1, 0), roll: at!(1, 0, 0)),
    corner!("K_DB", via: at!(0, -1, 0), roll: at!(-1, 0, 0)),
    corner!("K_BT", via: at!(-1, 0, 0), roll: at!(0, 1, 0)),
    corner!("K_BD", via: at!(-1, 0, 0), roll: at!(0, -1, 0)),
    corner!("K_FT", via: at!(1, 0, 0), roll: at!(0, 1, 0)),
    corner!("K_FD", via: at!(1, 0, 0), roll: at!(0, -1, 0)),
    corner!("K_TR", via: at!(0, 1, 0), roll: at!(0, 0, -1)),
    corner!("K_TL", via: at!(0, 1, 0), roll: at!(0, 0, 1)),
    corner!("K_DR", via: at!(0, -1, 0), roll: at!(0, 0, -1)),
    corner!("K_DL", via: at!(0, -1, 0), roll: at!(0, 0, 1)),
    corner!("K_LT", via: at!(0, 0, 1), roll: at!(0, 1, 0)),
    corner!("K_LD", via: at!(0, 0, 1), roll: at!(0, -1, 0)),
    corner!("K_RT", via: at!(0, 0, -1), roll: at!(0, 1, 0)),
    corner!("K_RD", via: at!(0, 0, -1), roll: at!(0, -1, 0)),
];
