//! Breadth-first path search over the rule engine's move graph.
//!
//! Nodes are grid coordinates; edges are rule applications from
//! [`allowed_moves`]. The search is breadth-first over rule applications,
//! not unit grid steps, so a multi-waypoint corner roll can reach the goal
//! before a chain of slides of equal waypoint count. The returned path is
//! the first one found, not necessarily the shortest in waypoints.
//!
//! The best-length map is local to one search. Nothing is cached across
//! calls; repeated searches on the same cluster redo their work.

use std::collections::{HashMap, VecDeque};

use crate::grid::{Cluster, Coord};
use crate::rules::allowed_moves;

/// Find a path for a cell from `start` to `goal` over `cluster`.
///
/// The cluster should not contain the moving cell itself. The path starts
/// with `start` and ends with `goal`; a search from `goal` to itself
/// returns `[goal]`. Returns `None` if the frontier runs dry.
pub fn plan_path(start: Coord, goal: Coord, cluster: &Cluster) -> Option<Vec<Coord>> {
    let mut best_len: HashMap<Coord, usize> = HashMap::new();
    let mut queue: VecDeque<(Coord, Vec<Coord>)> = VecDeque::new();
    best_len.insert(start, 0);
    queue.push_back((start, vec![start]));

    while let Some((current, path)) = queue.pop_front() {
        if current == goal {
            return Some(path);
        }

        for mv in allowed_moves(current, cluster) {
            let Some(last) = mv.destination() else {
                continue;
            };

            let mut next_path = path.clone();
            next_path.extend_from_slice(&mv.path);

            if last == goal {
                return Some(next_path);
            }

            let len = next_path.len();
            let improves = best_len.get(&last).map_or(true, |&known| len < known);
            if improves {
                best_len.insert(last, len);
                queue.push_back((last, next_path));
            }
        }
    }

    None
}

/// Coordinates reachable from `start` by any sequence of rule moves.
/// Includes `start`. Mainly useful for diagnosing "no path" rejections.
pub fn reachable(start: Coord, cluster: &Cluster) -> Vec<Coord> {
    let mut seen = vec![start];
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        for mv in allowed_moves(current, cluster) {
            if let Some(last) = mv.destination() {
                if !seen.contains(&last) {
                    seen.push(last);
                    queue.push_back(last);
                }
            }
        }
    }
    seen
}
