//! Grid and occupancy model: integer lattice coordinates, cells, clusters.
//!
//! A `Cluster` owns the id → position mapping of every cell and keeps a
//! reverse occupancy index so "is this coordinate taken" is O(1). The
//! id-keyed map is ordered, so iterating a cluster always visits cells in
//! the same order (pair selection depends on that for stable tie-breaks).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::MorphError;

/// The six orthogonal unit offsets: up, down, left, right, front, back.
pub const NEIGHBOR_OFFSETS: [Coord; 6] = [
    Coord::new(0, 1, 0),
    Coord::new(0, -1, 0),
    Coord::new(-1, 0, 0),
    Coord::new(1, 0, 0),
    Coord::new(0, 0, 1),
    Coord::new(0, 0, -1),
];

/// Largest absolute value a coordinate component may take. Rule probes and
/// distance arithmetic on in-range coordinates stay inside `i32`.
pub const COORD_LIMIT: i32 = i32::MAX / 4;

/// An integer grid coordinate. Also used as a relative offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coord {
    pub const ORIGIN: Coord = Coord::new(0, 0, 0);

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// `self + delta`.
    pub const fn offset(self, delta: Coord) -> Coord {
        Coord::new(self.x + delta.x, self.y + delta.y, self.z + delta.z)
    }

    pub fn in_bounds(self) -> bool {
        [self.x, self.y, self.z]
            .iter()
            .all(|v| v.unsigned_abs() <= COORD_LIMIT.unsigned_abs())
    }

    pub const fn is_zero(self) -> bool {
        self.x == 0 && self.y == 0 && self.z == 0
    }

    /// Manhattan (L1) distance.
    pub fn manhattan(self, other: Coord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y) + self.z.abs_diff(other.z)
    }

    /// Euclidean distance.
    pub fn distance(self, other: Coord) -> f64 {
        let dx = f64::from(self.x.abs_diff(other.x));
        let dy = f64::from(self.y.abs_diff(other.y));
        let dz = f64::from(self.z.abs_diff(other.z));
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// True when the two coordinates share a face (Manhattan distance 1).
    pub fn is_adjacent(self, other: Coord) -> bool {
        self.manhattan(other) == 1
    }

    /// The six orthogonal neighbours, in `NEIGHBOR_OFFSETS` order.
    pub fn neighbors(self) -> [Coord; 6] {
        NEIGHBOR_OFFSETS.map(|d| self.offset(d))
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{},{})", self.x, self.y, self.z)
    }
}

/// One module of the cluster as it appears in configuration documents:
/// `{ "id": "B01", "x": 1, "y": 0, "z": 0 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Cell {
    pub fn new(id: impl Into<String>, pos: Coord) -> Self {
        Self {
            id: id.into(),
            x: pos.x,
            y: pos.y,
            z: pos.z,
        }
    }

    pub fn pos(&self) -> Coord {
        Coord::new(self.x, self.y, self.z)
    }
}

/// The set of occupied coordinates, keyed by bot id.
///
/// Uniqueness of both ids and coordinates is enforced on every insert;
/// there is no way to put two cells on one coordinate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cluster {
    cells: BTreeMap<String, Coord>,
    occupancy: HashMap<Coord, String>,
}

impl Cluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cluster, rejecting duplicate ids, double occupancy and
    /// coordinates outside [`COORD_LIMIT`].
    pub fn from_cells<'a>(cells: impl IntoIterator<Item = &'a Cell>) -> Result<Self, MorphError> {
        let mut cluster = Self::new();
        for cell in cells {
            cluster.insert(&cell.id, cell.pos())?;
        }
        Ok(cluster)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn position(&self, id: &str) -> Option<Coord> {
        self.cells.get(id).copied()
    }

    pub fn bot_at(&self, pos: Coord) -> Option<&str> {
        self.occupancy.get(&pos).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.cells.contains_key(id)
    }

    pub fn is_occupied(&self, pos: Coord) -> bool {
        self.occupancy.contains_key(&pos)
    }

    pub fn is_empty_at(&self, pos: Coord) -> bool {
        !self.is_occupied(pos)
    }

    /// True if some occupied cell other than `exclude` shares a face with `pos`.
    pub fn has_contact(&self, pos: Coord, exclude: Option<Coord>) -> bool {
        pos.neighbors()
            .into_iter()
            .any(|n| Some(n) != exclude && self.is_occupied(n))
    }

    /// Ordered positional view: `(id, position)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Coord)> + '_ {
        self.cells.iter().map(|(id, &pos)| (id.as_str(), pos))
    }

    pub fn positions(&self) -> impl Iterator<Item = Coord> + '_ {
        self.cells.values().copied()
    }

    pub fn to_cells(&self) -> Vec<Cell> {
        self.iter().map(|(id, pos)| Cell::new(id, pos)).collect()
    }

    pub fn insert(&mut self, id: &str, pos: Coord) -> Result<(), MorphError> {
        if !pos.in_bounds() {
            return Err(MorphError::OutOfBounds { coord: pos });
        }
        if self.cells.contains_key(id) {
            return Err(MorphError::DuplicateBot { id: id.to_string() });
        }
        if let Some(first) = self.occupancy.get(&pos) {
            return Err(MorphError::DuplicateOccupancy {
                coord: pos,
                first: first.clone(),
                second: id.to_string(),
            });
        }
        self.cells.insert(id.to_string(), pos);
        self.occupancy.insert(pos, id.to_string());
        Ok(())
    }

    /// Remove a cell, returning where it was.
    pub fn remove(&mut self, id: &str) -> Option<Coord> {
        let pos = self.cells.remove(id)?;
        self.occupancy.remove(&pos);
        Some(pos)
    }

    /// Move an existing cell to an empty coordinate. Returns the old position.
    pub fn relocate(&mut self, id: &str, to: Coord) -> Result<Coord, MorphError> {
        let from = self
            .position(id)
            .ok_or_else(|| MorphError::BotNotFound { id: id.to_string() })?;
        if from == to {
            return Ok(from);
        }
        if !to.in_bounds() {
            return Err(MorphError::OutOfBounds { coord: to });
        }
        if self.is_occupied(to) {
            return Err(MorphError::Occupied { coord: to });
        }
        self.occupancy.remove(&from);
        self.occupancy.insert(to, id.to_string());
        self.cells.insert(id.to_string(), to);
        Ok(from)
    }

    /// Multi-line dump used when an invariant check fails.
    pub fn dump(&self) -> String {
        let mut out = format!("cluster ({} cells):", self.len());
        for (id, pos) in self.iter() {
            out.push_str(&format!("\n  {id} @ {pos}"));
        }
        out
    }
}

/// Goal coordinates for a morph. Order is preserved; lookups are hashed.
#[derive(Debug, Clone, Default)]
pub struct TargetSet {
    ordered: Vec<Coord>,
    lookup: HashSet<Coord>,
}

impl TargetSet {
    pub fn new(targets: impl IntoIterator<Item = Coord>) -> Self {
        let ordered: Vec<Coord> = targets.into_iter().collect();
        let lookup = ordered.iter().copied().collect();
        Self { ordered, lookup }
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Coord> + '_ {
        self.ordered.iter().copied()
    }

    pub fn as_slice(&self) -> &[Coord] {
        &self.ordered
    }

    /// A bot at `pos` is "happy".
    pub fn contains(&self, pos: Coord) -> bool {
        self.lookup.contains(&pos)
    }

    /// Number of targets with some bot on them.
    pub fn satisfied(&self, cluster: &Cluster) -> usize {
        self.ordered.iter().filter(|&&t| cluster.is_occupied(t)).count()
    }

    pub fn all_satisfied(&self, cluster: &Cluster) -> bool {
        self.ordered.iter().all(|&t| cluster.is_occupied(t))
    }
}
