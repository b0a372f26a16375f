//! Replaying a morph log.
//!
//! [`replay`] re-applies every wave to the logged start configuration and
//! checks the structural invariants along the way. [`replay_events`]
//! turns a log into the event stream the 3D replay importer reads: one
//! `addbot` per cell, then one `update` per wave.

use serde::{Deserialize, Serialize};

use crate::connectivity::check_connected;
use crate::error::MorphError;
use crate::grid::{Cluster, Coord};
use crate::morph_log::MorphLog;

/// Animation length of one path hop when the caller has no preference.
pub const DEFAULT_MOVE_DURATION_MS: u64 = 400;

const PALETTE: [&str; 8] = [
    "4444ff", "0000ff", "ff4444", "44ff44", "cccccc", "222222", "66ddff", "ffcc00",
];

/// Rebuild the final cluster from a log.
///
/// Fails if a move's `from` is not where the bot actually is, if two cells
/// would share a coordinate, or if any wave leaves a cell cut off from
/// `anchor`.
pub fn replay(log: &MorphLog, anchor: Coord) -> Result<Cluster, MorphError> {
    let mut cluster = Cluster::from_cells(&log.bots)?;
    check_connected(&cluster, anchor)?;

    for wave in &log.waves {
        for mv in &wave.moves {
            let found = cluster
                .position(&mv.id)
                .ok_or_else(|| MorphError::BotNotFound { id: mv.id.clone() })?;
            if found != mv.from {
                return Err(MorphError::ReplayMismatch {
                    id: mv.id.clone(),
                    expected: mv.from,
                    found,
                });
            }
            cluster.relocate(&mv.id, mv.to)?;
        }
        check_connected(&cluster, anchor)?;
    }
    Ok(cluster)
}

/// Heading of a bot, as the importer expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub vx: i32,
    pub vy: i32,
    pub vz: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename = "addbot")]
pub struct AddBotEvent {
    pub botid: String,
    pub pos: Coord,
    pub dir: Heading,
    pub ts: u64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename = "move")]
pub struct MoveEvent {
    pub botid: String,
    pub from: Coord,
    pub to: Coord,
    pub ts: u64,
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "notify", rename = "update")]
pub struct UpdateEvent {
    pub msg: Vec<MoveEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplayEvent {
    AddBot(AddBotEvent),
    Update(UpdateEvent),
}

/// Flatten a log into timed events.
///
/// Each path hop becomes one `move` lasting `move_duration_ms`. All moves
/// of a wave start together; the next wave starts when the longest path
/// of this one has finished.
pub fn replay_events(log: &MorphLog, move_duration_ms: u64) -> Vec<ReplayEvent> {
    let mut events: Vec<ReplayEvent> = log
        .bots
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            ReplayEvent::AddBot(AddBotEvent {
                botid: cell.id.clone(),
                pos: cell.pos(),
                dir: Heading { vx: 1, vy: 0, vz: 0 },
                ts: 0,
                color: PALETTE[i % PALETTE.len()].to_string(),
            })
        })
        .collect();

    let mut wave_start = 0u64;
    for wave in &log.waves {
        let mut msg = Vec::new();
        let mut longest = 0u64;
        for mv in &wave.moves {
            let hops = mv.full_path.windows(2);
            longest = longest.max(hops.len() as u64);
            for (i, hop) in hops.enumerate() {
                msg.push(MoveEvent {
                    botid: mv.id.clone(),
                    from: hop[0],
                    to: hop[1],
                    ts: wave_start + i as u64 * move_duration_ms,
                    duration: move_duration_ms,
                });
            }
        }
        events.push(ReplayEvent::Update(UpdateEvent { msg }));
        wave_start += longest * move_duration_ms;
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Cell;
    use crate::morph_log::MoveLog;

    fn log_with(moves: Vec<MoveLog>) -> MorphLog {
        let mut log = MorphLog::new(
            vec![
                Cell::new("M", Coord::ORIGIN),
                Cell::new("S", Coord::new(1, 0, 0)),
                Cell::new("A", Coord::new(0, 1, 0)),
            ],
            vec![Coord::ORIGIN, Coord::new(1, 0, 0), Coord::new(1, 1, 0)],
        );
        log.push_wave(moves);
        log
    }

    fn slide_a() -> MoveLog {
        MoveLog {
            id: "A".into(),
            from: Coord::new(0, 1, 0),
            to: Coord::new(1, 1, 0),
            full_path: vec![Coord::new(0, 1, 0), Coord::new(1, 1, 0)],
        }
    }

    #[test]
    fn test_replay_applies_moves() {
        let cluster = replay(&log_with(vec![slide_a()]), Coord::ORIGIN).unwrap();
        assert_eq!(cluster.position("A"), Some(Coord::new(1, 1, 0)));
        assert_eq!(cluster.len(), 3);
    }

    #[test]
    fn test_replay_detects_wrong_origin() {
        let mut mv = slide_a();
        mv.from = Coord::new(5, 5, 5);
        match replay(&log_with(vec![mv]), Coord::ORIGIN) {
            Err(MorphError::ReplayMismatch { id, found, .. }) => {
                assert_eq!(id, "A");
                assert_eq!(found, Coord::new(0, 1, 0));
            }
            other => panic!("expected ReplayMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_replay_detects_disconnect() {
        let mv = MoveLog {
            id: "A".into(),
            from: Coord::new(0, 1, 0),
            to: Coord::new(0, 3, 0),
            full_path: vec![Coord::new(0, 1, 0), Coord::new(0, 3, 0)],
        };
        assert!(matches!(
            replay(&log_with(vec![mv]), Coord::ORIGIN),
            Err(MorphError::Disconnected { .. })
        ));
    }

    #[test]
    fn test_event_stream_shape() {
        let events = replay_events(&log_with(vec![slide_a()]), 250);
        assert_eq!(events.len(), 4);

        let json = serde_json::to_value(&events).unwrap();
        assert_eq!(json[0]["event"], "addbot");
        assert_eq!(json[0]["botid"], "M");
        assert_eq!(json[0]["dir"]["vx"], 1);
        assert_eq!(json[0]["ts"], 0);
        assert_eq!(json[3]["notify"], "update");
        assert_eq!(json[3]["msg"][0]["event"], "move");
        assert_eq!(json[3]["msg"][0]["to"]["x"], 1);
        assert_eq!(json[3]["msg"][0]["duration"], 250);
    }

    #[test]
    fn test_waves_are_sequenced() {
        let mut log = log_with(vec![MoveLog {
            id: "A".into(),
            from: Coord::new(0, 1, 0),
            to: Coord::new(0, 1, 2),
            full_path: vec![Coord::new(0, 1, 0), Coord::new(0, 1, 1), Coord::new(0, 1, 2)],
        }]);
        log.push_wave(vec![slide_a()]);
        let events = replay_events(&log, 100);
        let ReplayEvent::Update(first) = &events[3] else {
            panic!("expected update");
        };
        assert_eq!(first.msg.len(), 2);
        assert_eq!(first.msg[1].ts, 100);
        let ReplayEvent::Update(second) = &events[4] else {
            panic!("expected update");
        };
        // Two hops of 100ms in the first wave.
        assert_eq!(second.msg[0].ts, 200);
    }

    #[test]
    fn test_events_parse_back() {
        let events = replay_events(&log_with(vec![slide_a()]), DEFAULT_MOVE_DURATION_MS);
        let text = serde_json::to_string(&events).unwrap();
        let back: Vec<ReplayEvent> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, events);
    }
}
