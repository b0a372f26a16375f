//! Cellmorph Headless Morph Harness
//!
//! Runs morphs from JSON documents and validates the planner against a
//! built-in scenario sweep. Runs entirely in-process.
//!
//! Usage:
//!   cargo run -p cellmorph-simtest -- check --verbose
//!   cargo run -p cellmorph-simtest -- morph --start base_12.json --target wall_12.json --log out.json
//!   cargo run -p cellmorph-simtest -- generate --width 5 --depth 3 --height 2

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use cellmorph_logic::config::{MorphParams, MorphRequest};
use cellmorph_logic::connectivity::{is_connected, would_disconnect};
use cellmorph_logic::grid::{Cell, Cluster, Coord, TargetSet};
use cellmorph_logic::morph_log::{progress_percent, MorphLog};
use cellmorph_logic::pairing::choose_pair;
use cellmorph_logic::persistence::{
    load_cells_json, load_log, load_log_json, load_request_json, load_targets_json, save_json,
    save_log, save_log_json,
};
use cellmorph_logic::replay::{replay, replay_events, DEFAULT_MOVE_DURATION_MS};
use cellmorph_logic::rules::{allowed_moves, rule_by_name, MOVEMENT_RULES};
use cellmorph_logic::scheduler::{morph, MorphOutcome, MorphPlanner, MorphStatus};
use cellmorph_logic::shapes::{box_cluster, coords_of, line_cluster};
use clap::{Parser, Subcommand};
use log::info;
use tracing_subscriber::EnvFilter;

// ── Fixtures (same documents the integration tests use) ─────────────────
const BASE_12_JSON: &str = include_str!("../../../data/base_12.json");
const WALL_12_JSON: &str = include_str!("../../../data/wall_12.json");
const SINGLE_SLIDE_JSON: &str = include_str!("../../../data/single_slide.json");

#[derive(Parser)]
#[command(name = "cellmorph-simtest", about = "Headless morph harness for cellmorph")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Morph a start configuration into a target configuration.
    Morph {
        /// Start cells: JSON array of {id, x, y, z}.
        #[arg(long)]
        start: PathBuf,

        /// Target coordinates: JSON array of {x, y, z}.
        #[arg(long)]
        target: PathBuf,

        /// Anchor coordinate as x,y,z.
        #[arg(long, value_parser = parse_coord, default_value = "0,0,0")]
        anchor: Coord,

        #[arg(long, default_value_t = cellmorph_logic::config::DEFAULT_MAX_PATHS_PER_WAVE)]
        max_paths: usize,

        #[arg(long, default_value_t = cellmorph_logic::config::DEFAULT_MAX_ATTEMPTS_TO_FIND_PAIR)]
        max_attempts: usize,

        /// Stop after this many waves.
        #[arg(long)]
        max_waves: Option<usize>,

        /// Write the morph log here (JSON).
        #[arg(long)]
        log: Option<PathBuf>,

        /// Write the replay event stream here (JSON).
        #[arg(long)]
        events: Option<PathBuf>,
    },

    /// Write a box-shaped start configuration and its coordinate list.
    Generate {
        #[arg(long, default_value_t = 5)]
        width: u32,

        #[arg(long, default_value_t = 3)]
        depth: u32,

        #[arg(long, default_value_t = 2)]
        height: u32,

        /// File name prefix; the cell count is appended.
        #[arg(long, default_value = "base")]
        out: String,
    },

    /// Run the built-in scenario sweep.
    Check {
        #[arg(long)]
        verbose: bool,
    },
}

fn parse_coord(s: &str) -> Result<Coord, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let &[x, y, z] = parts.as_slice() else {
        return Err(format!("expected x,y,z, got {s:?}"));
    };
    let num = |v: &str| v.parse::<i32>().map_err(|e| format!("{v:?}: {e}"));
    Ok(Coord::new(num(x)?, num(y)?, num(z)?))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Morph {
            start,
            target,
            anchor,
            max_paths,
            max_attempts,
            max_waves,
            log,
            events,
        } => {
            let params = MorphParams {
                anchor,
                max_paths_per_wave: max_paths,
                max_attempts_to_find_pair: max_attempts,
                max_waves,
                ..Default::default()
            };
            let success = run_morph(
                &start,
                &target,
                params,
                log.as_deref(),
                events.as_deref(),
            )?;
            if !success {
                std::process::exit(1);
            }
        }
        Command::Generate {
            width,
            depth,
            height,
            out,
        } => run_generate(width, depth, height, &out)?,
        Command::Check { verbose } => {
            if !run_check(verbose) {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

// ── morph ───────────────────────────────────────────────────────────────

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn run_morph(
    start: &Path,
    target: &Path,
    params: MorphParams,
    log_path: Option<&Path>,
    events_path: Option<&Path>,
) -> Result<bool> {
    let cells = load_cells_json(open(start)?)
        .with_context(|| format!("reading start cells from {}", start.display()))?;
    let targets = load_targets_json(open(target)?)
        .with_context(|| format!("reading targets from {}", target.display()))?;
    info!("morphing {} cells onto {} targets", cells.len(), targets.len());

    let request = MorphRequest::new(cells, targets).with_params(params);
    let mut planner = MorphPlanner::new(request).context("invalid start configuration")?;
    let outcome = planner.run(|p: u8| println!("  progress {p:>3}%"))?;

    let end = replay(&outcome.log, planner.params().anchor).context("log does not replay")?;
    let label = match outcome.status {
        MorphStatus::Done => "done",
        MorphStatus::Stuck => "stuck",
        MorphStatus::Cancelled => "cancelled",
    };
    println!(
        "{}: {} waves, {} moves, {}% of targets reached",
        label,
        outcome.waves,
        outcome.log.total_moves(),
        progress_percent(&end, planner.targets())
    );

    if let Some(path) = log_path {
        save_log_json(create(path)?, &outcome.log)?;
        println!("log written to {}", path.display());
    }
    if let Some(path) = events_path {
        save_json(create(path)?, &replay_events(&outcome.log, DEFAULT_MOVE_DURATION_MS))?;
        println!("replay events written to {}", path.display());
    }
    Ok(outcome.success)
}

// ── generate ────────────────────────────────────────────────────────────

fn run_generate(width: u32, depth: u32, height: u32, prefix: &str) -> Result<()> {
    if width == 0 || depth == 0 || height == 0 {
        bail!("box dimensions must be positive");
    }
    let cells = box_cluster(width, depth, height);
    let total = width * depth * height;
    let cells_path = PathBuf::from(format!("{prefix}_{total}.json"));
    let coords_path = PathBuf::from(format!("{prefix}_{total}_coords.json"));

    save_json(create(&cells_path)?, &cells)?;
    save_json(create(&coords_path)?, &coords_of(&cells))?;
    println!(
        "{} and {} generated with {} cells plus MASTERBOT",
        cells_path.display(),
        coords_path.display(),
        total
    );
    Ok(())
}

// ── check: test harness ─────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn run_check(verbose: bool) -> bool {
    println!("=== Cellmorph Morph Harness ===\n");

    let mut results = Vec::new();

    // 1. Movement rule table
    results.extend(validate_rule_table(verbose));

    // 2. Small hand-built scenarios
    results.extend(validate_scenarios(verbose));

    // 3. Connectivity gate on pair selection
    results.extend(validate_connectivity_gate(verbose));

    // 4. Multi-wave box morphs
    results.extend(validate_box_morphs(verbose));

    // 5. Log persistence
    results.extend(validate_persistence(verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );
    failed == 0
}

// ── 1. Rule table ───────────────────────────────────────────────────────

fn validate_rule_table(verbose: bool) -> Vec<TestResult> {
    println!("--- Rule Table ---");
    let mut results = Vec::new();

    let names: HashSet<&str> = MOVEMENT_RULES.iter().map(|r| r.name).collect();
    results.push(TestResult {
        name: "rules_unique_names".into(),
        passed: names.len() == MOVEMENT_RULES.len(),
        detail: format!("{} rules, {} distinct names", MOVEMENT_RULES.len(), names.len()),
    });

    let slides = MOVEMENT_RULES.iter().filter(|r| r.name.starts_with("G_")).count();
    let corners = MOVEMENT_RULES.iter().filter(|r| r.name.starts_with("K_")).count();
    results.push(TestResult {
        name: "rules_families".into(),
        passed: slides == 6 && corners == 16,
        detail: format!("{} slides, {} corner rolls", slides, corners),
    });

    let resolved = MOVEMENT_RULES
        .iter()
        .filter(|r| rule_by_name(r.name).is_some_and(|found| std::ptr::eq(found, *r)))
        .count();
    results.push(TestResult {
        name: "rules_lookup_by_name".into(),
        passed: resolved == MOVEMENT_RULES.len(),
        detail: format!("{}/{} rules resolve to themselves", resolved, MOVEMENT_RULES.len()),
    });

    // Around a single cell: every rule that fires must move in face steps.
    let lone = match Cluster::from_cells(&line_cluster(1)) {
        Ok(c) => c,
        Err(e) => {
            results.push(TestResult {
                name: "rules_lone_cell".into(),
                passed: false,
                detail: format!("cluster error: {}", e),
            });
            return results;
        }
    };
    let mut jumps = Vec::new();
    for start in Coord::ORIGIN.neighbors() {
        for mv in allowed_moves(start, &lone) {
            let mut prev = start;
            for &p in &mv.path {
                if !prev.is_adjacent(p) {
                    jumps.push(format!("{} from {}", mv.rule, start));
                }
                prev = p;
            }
        }
    }
    results.push(TestResult {
        name: "rules_unit_steps".into(),
        passed: jumps.is_empty(),
        detail: if jumps.is_empty() {
            "every waypoint is one face step from the last".into()
        } else {
            format!("non-adjacent steps: {}", jumps.join(", "))
        },
    });

    let rolls = allowed_moves(Coord::new(1, 0, 0), &lone).len();
    if verbose {
        println!("  moves around a lone cell from (1,0,0): {}", rolls);
    }
    results.push(TestResult {
        name: "rules_lone_cell_rolls".into(),
        passed: rolls == 2,
        detail: format!("{} corner rolls available", rolls),
    });

    results
}

// ── 2. Scenarios ────────────────────────────────────────────────────────

fn validate_scenarios(verbose: bool) -> Vec<TestResult> {
    println!("--- Scenarios ---");
    let mut results = Vec::new();

    // Already at target: no waves.
    let line = line_cluster(4);
    let targets = coords_of(&line);
    results.push(scenario("scenario_already_done", MorphRequest::new(line, targets), verbose, |o| {
        o.success && o.waves == 0
    }));

    // One slide: one wave, one move.
    match serde_json::from_str::<MorphRequest>(SINGLE_SLIDE_JSON) {
        Ok(req) => results.push(scenario("scenario_single_slide", req, verbose, |o| {
            o.success && o.waves == 1 && o.log.total_moves() == 1
        })),
        Err(e) => results.push(TestResult {
            name: "scenario_single_slide".into(),
            passed: false,
            detail: format!("fixture parse error: {}", e),
        }),
    }

    // Enclosed core: stuck with no waves.
    let mut cube = Vec::new();
    let mut shell = Vec::new();
    for x in 0..3 {
        for y in 0..3 {
            for z in 0..3 {
                let pos = Coord::new(x, y, z);
                let id = if pos == Coord::ORIGIN {
                    "MASTERBOT".to_string()
                } else {
                    format!("C{x}{y}{z}")
                };
                if pos != Coord::new(1, 1, 1) {
                    shell.push(pos);
                }
                cube.push(Cell::new(id, pos));
            }
        }
    }
    shell.push(Coord::new(3, 1, 1));
    results.push(scenario("scenario_enclosed_stuck", MorphRequest::new(cube, shell), verbose, |o| {
        o.status == MorphStatus::Stuck && o.waves == 0
    }));

    // Two bots competing for neighbouring targets: one per wave.
    let floor: Vec<_> = (0..5)
        .map(|x| {
            let id = if x == 0 { "MASTERBOT".to_string() } else { format!("S{x}") };
            Cell::new(id, Coord::new(x, 0, 0))
        })
        .collect();
    let mut start = floor.clone();
    start.push(Cell::new("A", Coord::new(1, 1, 0)));
    start.push(Cell::new("B", Coord::new(3, 1, 0)));
    let mut targets = coords_of(&floor);
    targets.push(Coord::new(2, 1, 0));
    targets.push(Coord::new(2, 2, 0));
    results.push(scenario("scenario_contested", MorphRequest::new(start, targets), verbose, |o| {
        o.success && o.waves == 2 && o.log.waves.iter().all(|w| w.moves.len() == 1)
    }));

    results
}

fn scenario(
    name: &str,
    request: MorphRequest,
    verbose: bool,
    check: impl Fn(&MorphOutcome) -> bool,
) -> TestResult {
    match morph(request, ()) {
        Ok(outcome) => {
            if verbose {
                println!("  {}: {:?} after {} waves", name, outcome.status, outcome.waves);
            }
            TestResult {
                name: name.into(),
                passed: check(&outcome),
                detail: format!(
                    "{:?}, {} waves, {} moves",
                    outcome.status,
                    outcome.waves,
                    outcome.log.total_moves()
                ),
            }
        }
        Err(e) => TestResult {
            name: name.into(),
            passed: false,
            detail: format!("planner error: {}", e),
        },
    }
}

// ── 3. Connectivity gate ────────────────────────────────────────────────

fn validate_connectivity_gate(verbose: bool) -> Vec<TestResult> {
    println!("--- Connectivity Gate ---");
    let mut results = Vec::new();

    // A line where the only unhappy bot holds the rest to the anchor.
    let line = line_cluster(4);
    let cluster = match Cluster::from_cells(&line) {
        Ok(c) => c,
        Err(e) => {
            results.push(TestResult {
                name: "gate_line".into(),
                passed: false,
                detail: format!("cluster error: {}", e),
            });
            return results;
        }
    };
    let targets = TargetSet::new([
        Coord::ORIGIN,
        Coord::new(2, 0, 0),
        Coord::new(3, 0, 0),
        Coord::new(4, 0, 0),
    ]);
    let pick = choose_pair(
        &cluster,
        &targets,
        Coord::ORIGIN,
        4,
        &HashSet::new(),
        &HashSet::new(),
    );
    results.push(TestResult {
        name: "gate_bridge_bot_held".into(),
        passed: pick.is_none() && would_disconnect("B01", &cluster, Coord::ORIGIN),
        detail: match pick {
            None => "bridge bot B01 not proposed".into(),
            Some(p) => format!("proposed {} -> {}", p.bot, p.target),
        },
    });

    // Every proposal on a family of boxes leaves the rest connected.
    let mut proposals = 0;
    let mut broken = Vec::new();
    for (w, d, h) in [(2, 1, 1), (2, 2, 1), (3, 2, 2), (4, 1, 3), (3, 3, 1)] {
        let cells = box_cluster(w, d, h);
        let Ok(cluster) = Cluster::from_cells(&cells) else {
            continue;
        };
        let goal = TargetSet::new(coords_of(&box_cluster(w * d * h, 1, 1)));
        if let Some(pair) = choose_pair(
            &cluster,
            &goal,
            Coord::ORIGIN,
            4,
            &HashSet::new(),
            &HashSet::new(),
        ) {
            proposals += 1;
            let mut lifted = cluster.clone();
            lifted.remove(&pair.bot);
            if !is_connected(&lifted, Coord::ORIGIN) {
                broken.push(format!("{w}x{d}x{h}: {}", pair.bot));
            }
            if verbose {
                println!("  {w}x{d}x{h}: {} {} -> {}", pair.bot, pair.start, pair.target);
            }
        }
    }
    results.push(TestResult {
        name: "gate_box_proposals_safe".into(),
        passed: broken.is_empty() && proposals > 0,
        detail: if broken.is_empty() {
            format!("{} proposals, none disconnecting", proposals)
        } else {
            format!("disconnecting proposals: {}", broken.join(", "))
        },
    });

    results
}

// ── 4. Box morphs ───────────────────────────────────────────────────────

fn validate_box_morphs(verbose: bool) -> Vec<TestResult> {
    println!("--- Box Morphs ---");
    let mut results = Vec::new();

    let fixture = load_cells_json(BASE_12_JSON.as_bytes())
        .and_then(|cells| Ok((cells, load_targets_json(WALL_12_JSON.as_bytes())?)));
    match fixture {
        Ok((start, targets)) => results.push(sound_morph(
            "morph_box_to_wall",
            MorphRequest::new(start, targets),
            verbose,
        )),
        Err(e) => results.push(TestResult {
            name: "morph_box_to_wall".into(),
            passed: false,
            detail: format!("fixture error: {}", e),
        }),
    }

    results.push(sound_morph(
        "morph_box_to_tower",
        MorphRequest::new(box_cluster(3, 2, 2), coords_of(&box_cluster(2, 2, 3))),
        verbose,
    ));

    let narrow = MorphParams {
        max_paths_per_wave: 1,
        ..Default::default()
    };
    results.push(sound_morph(
        "morph_single_move_waves",
        MorphRequest::new(box_cluster(2, 2, 2), coords_of(&box_cluster(4, 2, 1))).with_params(narrow),
        verbose,
    ));

    results
}

/// Run a morph to the end and check the log replays with every wave's
/// moves kept apart. Success is reported but not required.
fn sound_morph(name: &str, request: MorphRequest, verbose: bool) -> TestResult {
    let anchor = request.params.anchor;
    let mut progress = Vec::new();
    let outcome = match MorphPlanner::new(request).and_then(|mut p| p.run(|v: u8| progress.push(v))) {
        Ok(o) => o,
        Err(e) => {
            return TestResult {
                name: name.into(),
                passed: false,
                detail: format!("planner error: {}", e),
            }
        }
    };
    if verbose {
        println!("  {}: progress {:?}", name, progress);
    }

    let mut problems = wave_problems(&outcome.log);
    if let Err(e) = replay(&outcome.log, anchor) {
        problems.push(format!("replay: {}", e));
    }
    if progress.windows(2).any(|w| w[1] < w[0]) {
        problems.push("progress went backwards".into());
    }

    TestResult {
        name: name.into(),
        passed: problems.is_empty(),
        detail: if problems.is_empty() {
            format!(
                "{:?} after {} waves, {} moves",
                outcome.status,
                outcome.waves,
                outcome.log.total_moves()
            )
        } else {
            problems.join("; ")
        },
    }
}

fn wave_problems(log: &MorphLog) -> Vec<String> {
    let mut problems = Vec::new();
    for wave in &log.waves {
        for (i, a) in wave.moves.iter().enumerate() {
            for b in &wave.moves[i + 1..] {
                if a.from.is_adjacent(b.from) {
                    problems.push(format!("wave {}: {} and {} start adjacent", wave.step, a.id, b.id));
                }
                let touch = a
                    .full_path
                    .iter()
                    .any(|p| b.full_path.iter().any(|q| p.manhattan(*q) <= 1));
                if touch {
                    problems.push(format!("wave {}: {} and {} paths touch", wave.step, a.id, b.id));
                }
            }
        }
    }
    problems
}

// ── 5. Persistence ──────────────────────────────────────────────────────

fn validate_persistence(_verbose: bool) -> Vec<TestResult> {
    println!("--- Persistence ---");
    let mut results = Vec::new();

    let request = match load_request_json(SINGLE_SLIDE_JSON.as_bytes()) {
        Ok(r) => r,
        Err(e) => {
            results.push(TestResult {
                name: "persist_request".into(),
                passed: false,
                detail: format!("request parse error: {}", e),
            });
            return results;
        }
    };
    let log = match morph(request, ()) {
        Ok(o) => o.log,
        Err(e) => {
            results.push(TestResult {
                name: "persist_request".into(),
                passed: false,
                detail: format!("planner error: {}", e),
            });
            return results;
        }
    };

    let mut bin = Vec::new();
    let binary = save_log(&mut bin, &log).and_then(|_| load_log(&bin[..]));
    results.push(TestResult {
        name: "persist_binary_roundtrip".into(),
        passed: matches!(&binary, Ok(back) if *back == log),
        detail: format!("{} bytes", bin.len()),
    });

    let mut json = Vec::new();
    let text = save_log_json(&mut json, &log).and_then(|_| load_log_json(&json[..]));
    results.push(TestResult {
        name: "persist_json_roundtrip".into(),
        passed: matches!(&text, Ok(back) if *back == log),
        detail: format!("{} bytes", json.len()),
    });

    results
}
