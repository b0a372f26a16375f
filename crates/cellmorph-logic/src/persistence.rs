//! Save/load for morph logs and request documents.
//!
//! Logs go out either as pretty JSON (what the replay tooling reads) or as
//! bincode behind a format version. Requests and loose cell/target lists
//! are JSON only.

use bincode::Options;
use serde::Serialize;
use std::io::{Read, Write};

use crate::config::{targets_from_json, MorphRequest};
use crate::error::MorphError;
use crate::grid::{Cell, Coord};
use crate::morph_log::MorphLog;

/// Version number for the binary log format (increment when format changes)
pub const LOG_VERSION: u32 = 1;

/// Upper bound on the bytes a single binary log may decode into.
pub const MAX_LOG_BYTES: u64 = 64 * 1024 * 1024;

/// Same wire format as `bincode::serialize_into`, with a decode limit.
fn log_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(MAX_LOG_BYTES)
}

#[derive(Serialize)]
struct SavedLog<'a> {
    version: u32,
    log: &'a MorphLog,
}

/// Write a log in the binary format.
pub fn save_log<W: Write>(mut writer: W, log: &MorphLog) -> Result<(), MorphError> {
    bincode::serialize_into(
        &mut writer,
        &SavedLog {
            version: LOG_VERSION,
            log,
        },
    )?;
    writer.flush()?;
    Ok(())
}

/// Read a binary log. The version is checked before the body is decoded,
/// and length prefixes that would exceed [`MAX_LOG_BYTES`] are refused.
pub fn load_log<R: Read>(mut reader: R) -> Result<MorphLog, MorphError> {
    let version: u32 = log_options().deserialize_from(&mut reader)?;
    if version != LOG_VERSION {
        return Err(MorphError::UnsupportedVersion {
            found: version,
            expected: LOG_VERSION,
        });
    }
    Ok(log_options().deserialize_from(reader)?)
}

pub fn save_log_json<W: Write>(writer: W, log: &MorphLog) -> Result<(), MorphError> {
    save_json(writer, log)
}

pub fn load_log_json<R: Read>(reader: R) -> Result<MorphLog, MorphError> {
    Ok(serde_json::from_reader(reader)?)
}

pub fn load_request_json<R: Read>(reader: R) -> Result<MorphRequest, MorphError> {
    Ok(serde_json::from_reader(reader)?)
}

pub fn load_cells_json<R: Read>(reader: R) -> Result<Vec<Cell>, MorphError> {
    Ok(serde_json::from_reader(reader)?)
}

/// Targets may carry ids; they are dropped.
pub fn load_targets_json<R: Read>(mut reader: R) -> Result<Vec<Coord>, MorphError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    targets_from_json(&text)
}

/// Pretty JSON with a trailing newline.
pub fn save_json<W: Write, T: Serialize + ?Sized>(mut writer: W, value: &T) -> Result<(), MorphError> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morph_log::MoveLog;

    fn sample_log() -> MorphLog {
        let mut log = MorphLog::new(
            vec![
                Cell::new("MASTERBOT", Coord::ORIGIN),
                Cell::new("B01", Coord::new(0, 1, 0)),
            ],
            vec![Coord::ORIGIN, Coord::new(1, 0, 0)],
        );
        log.push_wave(vec![MoveLog {
            id: "B01".into(),
            from: Coord::new(0, 1, 0),
            to: Coord::new(1, 0, 0),
            full_path: vec![Coord::new(0, 1, 0), Coord::new(1, 1, 0), Coord::new(1, 0, 0)],
        }]);
        log
    }

    #[test]
    fn test_binary_log_roundtrip() {
        let log = sample_log();
        let mut buf = Vec::new();
        save_log(&mut buf, &log).expect("save failed");
        let loaded = load_log(&buf[..]).expect("load failed");
        assert_eq!(loaded, log);
    }

    #[test]
    fn test_binary_version_mismatch() {
        let mut buf = Vec::new();
        bincode::serialize_into(&mut buf, &(LOG_VERSION + 1)).unwrap();
        match load_log(&buf[..]) {
            Err(MorphError::UnsupportedVersion { found, expected }) => {
                assert_eq!(found, LOG_VERSION + 1);
                assert_eq!(expected, LOG_VERSION);
            }
            other => panic!("expected UnsupportedVersion, got {other:?}"),
        }
    }

    #[test]
    fn test_oversized_length_prefix_refused() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&LOG_VERSION.to_le_bytes());
        buf.extend_from_slice(&1u64.to_le_bytes()); // one bot
        buf.extend_from_slice(&(1u64 << 40).to_le_bytes()); // id length
        match load_log(&buf[..]) {
            Err(MorphError::Bincode(e)) => assert!(matches!(*e, bincode::ErrorKind::SizeLimit)),
            other => panic!("expected a size limit error, got {other:?}"),
        }
    }

    #[test]
    fn test_json_log_shape() {
        let mut buf = Vec::new();
        save_log_json(&mut buf, &sample_log()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("\"fullPath\""));
        assert!(text.ends_with('\n'));
        let back = load_log_json(text.as_bytes()).unwrap();
        assert_eq!(back.waves[0].step, 1);
    }

    #[test]
    fn test_truncated_binary_is_error() {
        let mut buf = Vec::new();
        save_log(&mut buf, &sample_log()).unwrap();
        buf.truncate(buf.len() / 2);
        assert!(matches!(load_log(&buf[..]), Err(MorphError::Bincode(_))));
    }

    #[test]
    fn test_load_loose_lists() {
        let cells = load_cells_json(r#"[{"id":"B01","x":1,"y":-1,"z":0}]"#.as_bytes()).unwrap();
        assert_eq!(cells[0].pos(), Coord::new(1, -1, 0));
        let targets = load_targets_json(r#"[{"id":"B01","x":1,"y":-1,"z":0}]"#.as_bytes()).unwrap();
        assert_eq!(targets, vec![Coord::new(1, -1, 0)]);
    }
}
