//! Connectivity guard: the cluster must stay face-connected to its anchor.
//!
//! Every check is a fresh BFS from the cell on the anchor coordinate over
//! orthogonal adjacency. Nothing is cached between candidates.

use std::collections::{HashSet, VecDeque};

use crate::error::MorphError;
use crate::grid::{Cluster, Coord};

/// Would lifting `bot` out of `cluster` leave some cell cut off from the
/// anchor?
///
/// An empty remainder cannot be split. If no remaining cell sits on the
/// anchor the answer is `true`: without an anchor nothing is safe to move.
pub fn would_disconnect(bot: &str, cluster: &Cluster, anchor: Coord) -> bool {
    let remaining: HashSet<Coord> = cluster
        .iter()
        .filter(|&(id, _)| id != bot)
        .map(|(_, pos)| pos)
        .collect();
    if remaining.is_empty() {
        return false;
    }
    match unreached_from(&remaining, anchor) {
        Some(unreached) => !unreached.is_empty(),
        None => true,
    }
}

/// Fail with a structural error unless every cell reaches the anchor.
pub fn check_connected(cluster: &Cluster, anchor: Coord) -> Result<(), MorphError> {
    let cells: HashSet<Coord> = cluster.positions().collect();
    match unreached_from(&cells, anchor) {
        None => Err(MorphError::MissingAnchor { anchor }),
        Some(unreached) if unreached.is_empty() => Ok(()),
        Some(unreached) => Err(MorphError::Disconnected { unreached }),
    }
}

pub fn is_connected(cluster: &Cluster, anchor: Coord) -> bool {
    check_connected(cluster, anchor).is_ok()
}

/// BFS from `anchor` over `cells`. `None` if the anchor is not occupied,
/// otherwise the cells never reached, sorted.
fn unreached_from(cells: &HashSet<Coord>, anchor: Coord) -> Option<Vec<Coord>> {
    if !cells.contains(&anchor) {
        return None;
    }

    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(anchor);
    queue.push_back(anchor);

    while let Some(current) = queue.pop_front() {
        for next in current.neighbors() {
            if cells.contains(&next) && visited.insert(next) {
                queue.push_back(next);
            }
        }
    }

    let mut unreached: Vec<Coord> = cells.difference(&visited).copied().collect();
    unreached.sort();
    Some(unreached)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Cell;

    fn cluster(cells: &[(&str, i32, i32, i32)]) -> Cluster {
        let cells: Vec<Cell> = cells
            .iter()
            .map(|&(id, x, y, z)| Cell::new(id, Coord::new(x, y, z)))
            .collect();
        Cluster::from_cells(&cells).unwrap()
    }

    #[test]
    fn test_bridge_cell_disconnects() {
        // m - a - b in a line: lifting a strands b.
        let c = cluster(&[("m", 0, 0, 0), ("a", 1, 0, 0), ("b", 2, 0, 0)]);
        assert!(would_disconnect("a", &c, Coord::ORIGIN));
        assert!(!would_disconnect("b", &c, Coord::ORIGIN));
    }

    #[test]
    fn test_loop_survives_removal() {
        // 2x2 square: any single non-anchor cell can go.
        let c = cluster(&[("m", 0, 0, 0), ("a", 1, 0, 0), ("b", 1, 1, 0), ("c", 0, 1, 0)]);
        for id in ["a", "b", "c"] {
            assert!(!would_disconnect(id, &c, Coord::ORIGIN), "{id}");
        }
    }

    #[test]
    fn test_missing_anchor_is_unsafe() {
        let c = cluster(&[("a", 1, 0, 0), ("b", 2, 0, 0)]);
        assert!(would_disconnect("b", &c, Coord::ORIGIN));
        assert!(matches!(
            check_connected(&c, Coord::ORIGIN),
            Err(MorphError::MissingAnchor { .. })
        ));
    }

    #[test]
    fn test_lifting_the_anchor_is_unsafe() {
        let c = cluster(&[("m", 0, 0, 0), ("a", 1, 0, 0)]);
        assert!(would_disconnect("m", &c, Coord::ORIGIN));
    }

    #[test]
    fn test_lone_cell_cannot_split() {
        let c = cluster(&[("m", 0, 0, 0)]);
        assert!(!would_disconnect("m", &c, Coord::ORIGIN));
    }

    #[test]
    fn test_diagonal_is_not_connected() {
        let c = cluster(&[("m", 0, 0, 0), ("a", 1, 1, 0)]);
        match check_connected(&c, Coord::ORIGIN) {
            Err(MorphError::Disconnected { unreached }) => {
                assert_eq!(unreached, vec![Coord::new(1, 1, 0)]);
            }
            other => panic!("expected Disconnected, got {other:?}"),
        }
        assert!(!is_connected(&c, Coord::ORIGIN));
    }

    #[test]
    fn test_custom_anchor() {
        let anchor = Coord::new(5, 0, 0);
        let c = cluster(&[("m", 5, 0, 0), ("a", 5, 1, 0), ("b", 5, 2, 0)]);
        assert!(is_connected(&c, anchor));
        assert!(would_disconnect("a", &c, anchor));
    }
}
