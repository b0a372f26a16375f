//! Pair selection: which bot goes to which target next.
//!
//! Greedy "hardest first": bots farthest from any free target are offered
//! first refusal, and among the surviving pairs the longest one wins.
//! Ties resolve to the first pair in bot-id order, then target order.

use std::collections::HashSet;

use crate::connectivity::would_disconnect;
use crate::grid::{Cluster, Coord, TargetSet};

/// A candidate move proposed by [`choose_pair`].
#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    pub bot: String,
    pub start: Coord,
    pub target: Coord,
    pub distance: f64,
}

/// Bots that are neither the anchor cell nor already on a target.
pub fn unhappy_bots<'a>(
    cluster: &'a Cluster,
    targets: &TargetSet,
    anchor: Coord,
) -> Vec<(&'a str, Coord)> {
    cluster
        .iter()
        .filter(|&(_, pos)| pos != anchor && !targets.contains(pos))
        .collect()
}

/// Targets that are empty and touch the cluster right now.
pub fn free_targets(cluster: &Cluster, targets: &TargetSet) -> Vec<Coord> {
    targets
        .iter()
        .filter(|&t| cluster.is_empty_at(t) && cluster.has_contact(t, None))
        .collect()
}

/// Pick the next (bot, target) pair or `None` if nothing qualifies.
///
/// `attempted` holds `(start, target)` pairs already tried this wave;
/// `reserved` holds targets already claimed this wave. A bot whose removal
/// would cut the cluster off from `anchor` is never proposed.
pub fn choose_pair(
    cluster: &Cluster,
    targets: &TargetSet,
    anchor: Coord,
    top_candidates: usize,
    attempted: &HashSet<(Coord, Coord)>,
    reserved: &HashSet<Coord>,
) -> Option<Pair> {
    let free = free_targets(cluster, targets);
    if free.is_empty() {
        return None;
    }

    let mut ranked: Vec<(&str, Coord, f64)> = unhappy_bots(cluster, targets, anchor)
        .into_iter()
        .map(|(id, pos)| {
            let nearest = free
                .iter()
                .map(|&t| pos.distance(t))
                .fold(f64::INFINITY, f64::min);
            (id, pos, nearest)
        })
        .collect();
    // Stable: equal distances keep id order.
    ranked.sort_by(|a, b| b.2.total_cmp(&a.2));
    ranked.truncate(top_candidates);

    let mut best: Option<Pair> = None;
    for (id, start, _) in ranked {
        let mut disconnects = None;
        for &target in &free {
            if attempted.contains(&(start, target)) || reserved.contains(&target) {
                continue;
            }
            // Computed once per bot, and only when some target is still open.
            if *disconnects.get_or_insert_with(|| would_disconnect(id, cluster, anchor)) {
                break;
            }
            if !cluster.has_contact(target, Some(start)) {
                continue;
            }
            let distance = start.distance(target);
            if best.as_ref().map_or(true, |b| distance > b.distance) {
                best = Some(Pair {
                    bot: id.to_string(),
                    start,
                    target,
                    distance,
                });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::is_connected;
    use crate::grid::Cell;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn cluster(cells: &[(&str, i32, i32, i32)]) -> Cluster {
        let cells: Vec<Cell> = cells
            .iter()
            .map(|&(id, x, y, z)| Cell::new(id, Coord::new(x, y, z)))
            .collect();
        Cluster::from_cells(&cells).unwrap()
    }

    fn targets(coords: &[(i32, i32, i32)]) -> TargetSet {
        TargetSet::new(coords.iter().map(|&(x, y, z)| Coord::new(x, y, z)))
    }

    fn pick(c: &Cluster, t: &TargetSet) -> Option<Pair> {
        choose_pair(c, t, Coord::ORIGIN, 4, &HashSet::new(), &HashSet::new())
    }

    #[test]
    fn test_single_candidate() {
        let c = cluster(&[("m", 0, 0, 0), ("s", 1, 0, 0), ("a", 0, 1, 0)]);
        let t = targets(&[(0, 0, 0), (1, 0, 0), (1, 1, 0)]);
        let pair = pick(&c, &t).unwrap();
        assert_eq!(pair.bot, "a");
        assert_eq!(pair.start, Coord::new(0, 1, 0));
        assert_eq!(pair.target, Coord::new(1, 1, 0));
    }

    #[test]
    fn test_happy_and_anchor_bots_skipped() {
        let c = cluster(&[("m", 0, 0, 0), ("s", 1, 0, 0)]);
        let t = targets(&[(1, 0, 0), (2, 0, 0)]);
        // s is happy, m is the anchor: nobody to move.
        assert_eq!(pick(&c, &t), None);
    }

    #[test]
    fn test_bridge_bot_never_proposed() {
        // b holds c to the anchor; c is happy, so b is the only mover.
        let c = cluster(&[("m", 0, 0, 0), ("b", 1, 0, 0), ("c", 2, 0, 0)]);
        let t = targets(&[(0, 0, 0), (2, 0, 0), (3, 0, 0)]);
        assert_eq!(pick(&c, &t), None);
    }

    #[test]
    fn test_attempted_and_reserved_respected() {
        let c = cluster(&[("m", 0, 0, 0), ("s", 1, 0, 0), ("a", 0, 1, 0)]);
        let t = targets(&[(0, 0, 0), (1, 0, 0), (1, 1, 0)]);

        let mut attempted = HashSet::new();
        attempted.insert((Coord::new(0, 1, 0), Coord::new(1, 1, 0)));
        assert_eq!(
            choose_pair(&c, &t, Coord::ORIGIN, 4, &attempted, &HashSet::new()),
            None
        );

        let mut reserved = HashSet::new();
        reserved.insert(Coord::new(1, 1, 0));
        assert_eq!(
            choose_pair(&c, &t, Coord::ORIGIN, 4, &HashSet::new(), &reserved),
            None
        );
    }

    #[test]
    fn test_target_touching_only_the_mover_rejected() {
        // (0,2,0) only touches a itself.
        let c = cluster(&[("m", 0, 0, 0), ("a", 0, 1, 0)]);
        let t = targets(&[(0, 0, 0), (0, 2, 0)]);
        assert_eq!(pick(&c, &t), None);
    }

    #[test]
    fn test_farthest_pair_wins() {
        // Floor m..f3 along x; two loose bots on top. Free targets at the far end.
        let c = cluster(&[
            ("m", 0, 0, 0),
            ("f1", 1, 0, 0),
            ("f2", 2, 0, 0),
            ("f3", 3, 0, 0),
            ("near", 2, 1, 0),
            ("far", 0, 1, 0),
        ]);
        let t = targets(&[(0, 0, 0), (1, 0, 0), (2, 0, 0), (3, 0, 0), (3, 1, 0), (4, 0, 0)]);
        let pair = pick(&c, &t).unwrap();
        assert_eq!(pair.bot, "far");
        assert_eq!(pair.target, Coord::new(4, 0, 0));
        assert!((pair.distance - 17f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_top_candidates_limits_bots() {
        let c = cluster(&[
            ("m", 0, 0, 0),
            ("f1", 1, 0, 0),
            ("f2", 2, 0, 0),
            ("f3", 3, 0, 0),
            ("near", 2, 1, 0),
            ("far", 0, 1, 0),
        ]);
        let t = targets(&[(0, 0, 0), (1, 0, 0), (2, 0, 0), (3, 0, 0), (3, 1, 0), (4, 0, 0)]);
        // Only the single farthest bot is considered.
        let pair = choose_pair(&c, &t, Coord::ORIGIN, 1, &HashSet::new(), &HashSet::new()).unwrap();
        assert_eq!(pair.bot, "far");
    }

    // ── Randomized shapes ──

    fn random_cluster(rng: &mut StdRng, size: usize) -> Cluster {
        let mut c = Cluster::new();
        c.insert("M000", Coord::ORIGIN).unwrap();
        let mut n = 1;
        while c.len() < size {
            let cells: Vec<Coord> = c.positions().collect();
            let base = cells[rng.gen_range(0..cells.len())];
            let next = base.neighbors()[rng.gen_range(0..6)];
            if c.is_empty_at(next) {
                c.insert(&format!("B{n:03}"), next).unwrap();
                n += 1;
            }
        }
        c
    }

    fn random_targets(rng: &mut StdRng, c: &Cluster) -> TargetSet {
        // Keep roughly half the current cells as targets, plus free spots
        // touching the cluster so there is always something to aim at.
        let mut coords: Vec<Coord> = c.positions().filter(|_| rng.gen_bool(0.5)).collect();
        for pos in c.positions() {
            for n in pos.neighbors() {
                if c.is_empty_at(n) && rng.gen_bool(0.1) && !coords.contains(&n) {
                    coords.push(n);
                }
            }
        }
        TargetSet::new(coords)
    }

    #[test]
    fn test_choose_pair_never_disconnects_random_shapes() {
        let mut rng = StdRng::seed_from_u64(0xC311);
        let mut proposals = 0;
        for _ in 0..200 {
            let size = rng.gen_range(3..24);
            let c = random_cluster(&mut rng, size);
            let t = random_targets(&mut rng, &c);
            if let Some(pair) = pick(&c, &t) {
                proposals += 1;
                assert!(!would_disconnect(&pair.bot, &c, Coord::ORIGIN));
                let mut lifted = c.clone();
                lifted.remove(&pair.bot);
                assert!(is_connected(&lifted, Coord::ORIGIN), "{}", c.dump());
                assert!(lifted.has_contact(pair.target, None));
                assert_ne!(pair.start, Coord::ORIGIN);
                assert!(!t.contains(pair.start));
            }
        }
        assert!(proposals > 0);
    }
}
