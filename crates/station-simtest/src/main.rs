//! Station Headless Simulation Harness
//!
//! Validates content, pure rules and whole play-throughs in-process.
//! No rendering, no persistence on disk.
//!
//! Usage:
//!   cargo run -p station-simtest
//!   cargo run -p station-simtest -- --verbose
//!   cargo run -p station-simtest -- --seed 1234

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use station_core::persistence::{decode_binary, encode_binary, load_or_fresh, MemorySaveSink};
use station_core::prelude::*;
use station_logic::attributes::AttributeKind;
use station_logic::config::validate_config;
use station_logic::effects::{total_value, EffectHolder, EffectSource};
use station_logic::grid::Activation;
use station_logic::progression::{max_xp_for, Progress};

// ── Station content (same JSON the engine ships with) ───────────────────
const CONTENT_JSON: &str = include_str!("../../../data/station_content.json");

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn check(name: &str, passed: bool, detail: impl Into<String>) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail: detail.into(),
    }
}

/// Summary of one randomized play-through, printed with `--verbose`.
#[derive(Debug, Serialize)]
struct RunSummary {
    seed: u64,
    ticks: u64,
    rebirths: u32,
    total_cycles: f64,
    grid_strength: u32,
    best_operation_level: u32,
    rejected_commands: u32,
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose");
    let seed = args
        .iter()
        .position(|a| a == "--seed")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(0xC0FFEE_u64);

    let level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    println!("=== Station Simulation Harness ===\n");

    let content = match Content::from_json(CONTENT_JSON) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            println!("  ✗ content_parse: {}", e);
            std::process::exit(1);
        }
    };

    let mut results = Vec::new();

    // 1. Content and config validation
    results.extend(validate_content(&content, verbose));

    // 2. Effect resolution
    results.extend(validate_effects(&content));

    // 3. Progression math
    results.extend(validate_progression());

    // 4. Scripted play-through
    results.extend(validate_playthrough(&content));

    // 5. Randomized play-throughs
    results.extend(validate_random_playthroughs(&content, seed, verbose));

    // 6. Save / load
    results.extend(validate_persistence(&content));

    // 7. Real-time scheduler
    results.extend(validate_scheduler(&content));

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

    if failed > 0 {
        std::process::exit(1);
    }
}

fn new_engine(content: &Arc<Content>) -> Option<StationEngine> {
    StationEngine::new(Arc::clone(content), StationConfig::default()).ok()
}

// ── 1. Content ──────────────────────────────────────────────────────────

fn validate_content(content: &Content, verbose: bool) -> Vec<TestResult> {
    println!("--- Content ---");
    let mut results = Vec::new();

    let errors = validate_config(&StationConfig::default());
    results.push(check(
        "config_default_valid",
        errors.is_empty(),
        format!("{} config errors", errors.len()),
    ));

    results.push(check(
        "content_not_empty",
        !content.operations.is_empty() && !content.modules.is_empty(),
        format!(
            "{} operations, {} components, {} modules",
            content.operations.len(),
            content.components.len(),
            content.modules.len()
        ),
    ));

    let bad_xp: Vec<&str> = content
        .operations
        .iter()
        .filter(|op| op.base_max_xp <= 0.0)
        .map(|op| op.name.as_str())
        .collect();
    results.push(check(
        "content_positive_max_xp",
        bad_xp.is_empty(),
        if bad_xp.is_empty() {
            "all operations have positive max xp".to_string()
        } else {
            format!("non-positive max xp: {}", bad_xp.join(", "))
        },
    ));

    let empty: Vec<&str> = content
        .components
        .iter()
        .filter(|c| c.operations.is_empty())
        .map(|c| c.name.as_str())
        .collect();
    results.push(check(
        "content_components_have_operations",
        empty.is_empty(),
        format!("{} empty components", empty.len()),
    ));

    let default_load = Activation::defaults(content).grid_load(content);
    results.push(check(
        "content_default_load_fits",
        default_load == 0,
        format!("default activation loads the grid with {}", default_load),
    ));

    results.push(check(
        "content_has_boss",
        content.boss.is_some(),
        format!("{} battles incl. boss", content.battles.len()),
    ));

    if verbose {
        println!("  Grid load by operation:");
        for op in &content.operations {
            println!("    {:24} {}", op.name, op.grid_load);
        }
    }

    results
}

// ── 2. Effects ──────────────────────────────────────────────────────────

fn attribute_with(content: &Content, kind: AttributeKind, ops: &[(&str, f64)]) -> Option<f64> {
    let mut sources: Vec<EffectSource<'_>> = Vec::new();
    for (name, level) in ops {
        let id = content.operation_id(name)?;
        sources.push(content.operation(id).source(*level));
    }
    let poi = content.point_of_interest(content.default_point_of_interest);
    Some(total_value(
        &content.effect_types,
        content.attribute_types(kind),
        &sources,
        &poi.source(1.0),
        &poi.modifiers,
    ))
}

fn validate_effects(content: &Content) -> Vec<TestResult> {
    println!("--- Effects ---");
    let mut results = Vec::new();

    let danger = attribute_with(content, AttributeKind::Danger, &[]);
    results.push(check(
        "effects_poi_danger",
        danger == Some(10.0),
        format!("danger with no producers = {:?}", danger),
    ));

    let growth = attribute_with(content, AttributeKind::Growth, &[]);
    results.push(check(
        "effects_zero_additive_product",
        growth == Some(1.0),
        format!("growth (multiplicative only) = {:?}", growth),
    ));

    let research = attribute_with(content, AttributeKind::Research, &[("Diesel", 2.0)]);
    results.push(check(
        "effects_modifier_redirects",
        research == Some(10.0),
        format!("Diesel L2 growth redirected to research = {:?}", research),
    ));

    let energy = attribute_with(
        content,
        AttributeKind::Energy,
        &[("Garbage", 2.0), ("Steel", 1.0)],
    );
    results.push(check(
        "effects_factor_scales_sum",
        energy == Some(60.0),
        format!("Garbage L2 + Steel L1 energy = {:?}", energy),
    ));

    results
}

// ── 3. Progression ──────────────────────────────────────────────────────

fn validate_progression() -> Vec<TestResult> {
    println!("--- Progression ---");
    let mut results = Vec::new();

    results.push(check(
        "xp_curve_example",
        max_xp_for(100.0, 0) == 100.0 && max_xp_for(100.0, 1) == 202.0,
        format!(
            "max xp L0={} L1={}",
            max_xp_for(100.0, 0),
            max_xp_for(100.0, 1)
        ),
    ));

    let mut lump = Progress::default();
    lump.increase_xp(1000.0, 100.0);
    let mut steps = Progress::default();
    for _ in 0..1000 {
        steps.increase_xp(1.0, 100.0);
    }
    results.push(check(
        "xp_lump_equals_incremental",
        lump.level == steps.level && (lump.xp - steps.xp).abs() < 1e-6,
        format!(
            "lump L{} xp {:.1} / steps L{} xp {:.1}",
            lump.level, lump.xp, steps.level, steps.xp
        ),
    ));

    let settled = [lump, steps]
        .iter()
        .all(|p| p.xp >= 0.0 && p.xp < p.max_xp(100.0));
    results.push(check(
        "xp_settled_bounds",
        settled,
        "0 <= xp < max_xp after every update",
    ));

    results
}

// ── 4. Scripted play-through ────────────────────────────────────────────

fn validate_playthrough(content: &Arc<Content>) -> Vec<TestResult> {
    println!("--- Play-through ---");
    let mut results = Vec::new();
    let Some(mut engine) = new_engine(content) else {
        results.push(check("playthrough_engine", false, "engine rejected default config"));
        return results;
    };

    let _ = engine.finish_intro();
    for _ in 0..2600 {
        engine.update();
    }
    let events = engine.drain_events();
    results.push(check(
        "playthrough_boss_appears",
        engine.state().boss.available
            && engine.game_state() == GameState::Paused
            && events.contains(&StationEvent::BossAppeared),
        format!(
            "{:.1} cycles, state {}",
            engine.state().cycles,
            engine.game_state()
        ),
    ));

    let level = engine.operation_level("StandbyGenerator").unwrap_or(0);
    results.push(check(
        "playthrough_operation_levels",
        level > 1,
        format!("Standby Generator reached level {}", level),
    ));

    let fight = engine
        .engage_boss()
        .and_then(|_| engine.start_boss_fight());
    for _ in 0..10 {
        engine.update();
    }
    results.push(check(
        "playthrough_boss_fight_lost",
        fight.is_ok() && engine.game_state() == GameState::Dead,
        format!("state after fight: {}", engine.game_state()),
    ));

    let level = engine.operation_level("StandbyGenerator").unwrap_or(0);
    let prestige = engine.request_prestige(PrestigeTier::Rebirth);
    let kept = engine
        .content()
        .operation_id("StandbyGenerator")
        .map(|id| engine.state().operations[id.0].max_level);
    results.push(check(
        "playthrough_rebirth_keeps_max_level",
        prestige.is_ok() && kept == Some(level) && engine.game_state() == GameState::New,
        format!("max level {:?}, expected {}", kept, level),
    ));

    results
}

// ── 5. Randomized play-throughs ─────────────────────────────────────────

fn random_run(content: &Arc<Content>, seed: u64) -> Result<RunSummary, String> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut engine = new_engine(content).ok_or("engine rejected default config")?;

    let pairs: Vec<(String, String)> = content
        .components
        .iter()
        .flat_map(|c| {
            c.operations
                .iter()
                .map(move |op| (c.name.clone(), content.operation(*op).name.clone()))
        })
        .collect();
    let modules: Vec<&str> = content.modules.iter().map(|m| m.name.as_str()).collect();
    let battles: Vec<&str> = content.regular_battles().map(|(_, b)| b.name.as_str()).collect();

    let mut best = vec![0u32; content.operations.len()];
    let mut rejected = 0;

    for step in 0..500 {
        let outcome = match rng.gen_range(0..8) {
            0..=2 => match pairs.choose(&mut rng) {
                Some((component, operation)) => engine.activate_operation(component, operation),
                None => Ok(()),
            },
            3 => match modules.choose(&mut rng) {
                Some(module) => engine.toggle_module(module).map(|_| ()),
                None => Ok(()),
            },
            4 => match battles.choose(&mut rng) {
                Some(battle) => engine.toggle_battle(battle).map(|_| ()),
                None => Ok(()),
            },
            5 => engine.toggle_pause().map(|_| ()),
            6 => engine.finish_intro(),
            _ => engine.request_prestige(PrestigeTier::Rebirth),
        };
        if outcome.is_err() {
            rejected += 1;
        }

        for _ in 0..rng.gen_range(0..30) {
            engine.update();
        }

        if engine.grid_load() > engine.grid_capacity() {
            return Err(format!(
                "step {}: load {} over capacity {}",
                step,
                engine.grid_load(),
                engine.grid_capacity()
            ));
        }
        if engine.state().population < 1.0 {
            return Err(format!("step {}: population {}", step, engine.state().population));
        }
        for (i, progress) in engine.state().operations.iter().enumerate() {
            if progress.max_level < best[i] {
                return Err(format!("step {}: max level of op {} dropped", step, i));
            }
            best[i] = progress.max_level;
        }
    }

    let state = engine.state();
    Ok(RunSummary {
        seed,
        ticks: engine.tick_count(),
        rebirths: state.rebirth_one_count,
        total_cycles: state.total_cycles,
        grid_strength: state.grid_strength.level,
        best_operation_level: state.operations.iter().map(|p| p.level.max(p.max_level)).max().unwrap_or(0),
        rejected_commands: rejected,
    })
}

fn validate_random_playthroughs(content: &Arc<Content>, seed: u64, verbose: bool) -> Vec<TestResult> {
    println!("--- Randomized play-throughs ---");
    let mut results = Vec::new();

    for offset in 0..5 {
        let run_seed = seed.wrapping_add(offset);
        match random_run(content, run_seed) {
            Ok(summary) => {
                if verbose {
                    match serde_json::to_string(&summary) {
                        Ok(json) => println!("    {}", json),
                        Err(e) => log::warn!("Could not print run summary: {}", e),
                    }
                }
                results.push(check(
                    &format!("random_run_{}", run_seed),
                    true,
                    format!(
                        "{} ticks, {} rebirths, {} rejected commands",
                        summary.ticks, summary.rebirths, summary.rejected_commands
                    ),
                ));
            }
            Err(detail) => results.push(check(&format!("random_run_{}", run_seed), false, detail)),
        }
    }

    results
}

// ── 6. Persistence ──────────────────────────────────────────────────────

fn validate_persistence(content: &Arc<Content>) -> Vec<TestResult> {
    println!("--- Persistence ---");
    let mut results = Vec::new();
    let Some(mut engine) = new_engine(content) else {
        results.push(check("save_engine", false, "engine rejected default config"));
        return results;
    };
    let _ = engine.finish_intro();
    for _ in 0..500 {
        engine.update();
    }

    match encode_binary(&engine.serialize()) {
        Ok(bytes) => {
            let decoded = decode_binary(&bytes).map(|s| s.tick_count);
            results.push(check(
                "save_binary_roundtrip",
                matches!(decoded, Ok(500)),
                format!("{} bytes", bytes.len()),
            ));
            let restored = load_or_fresh(Arc::clone(content), StationConfig::default(), &bytes);
            results.push(check(
                "save_restore_state",
                restored.is_ok_and(|r| r.state() == engine.state()),
                "restored state equals saved state",
            ));
        }
        Err(e) => results.push(check("save_binary_roundtrip", false, e.to_string())),
    }

    let fresh = load_or_fresh(Arc::clone(content), StationConfig::default(), b"\x00garbage");
    results.push(check(
        "save_corrupt_falls_back",
        fresh.is_ok_and(|e| e.game_state() == GameState::New && e.tick_count() == 0),
        "unreadable save starts a fresh game",
    ));

    results
}

// ── 7. Scheduler ────────────────────────────────────────────────────────

fn validate_scheduler(content: &Arc<Content>) -> Vec<TestResult> {
    println!("--- Scheduler ---");
    let mut results = Vec::new();
    let Some(mut engine) = new_engine(content) else {
        results.push(check("scheduler_engine", false, "engine rejected default config"));
        return results;
    };
    let _ = engine.finish_intro();

    let mut scheduler = Scheduler::new(engine.config());
    let mut sink = MemorySaveSink::default();
    let mut ticks = 0;
    for _ in 0..100 {
        ticks += scheduler
            .advance(&mut engine, Duration::from_millis(100), &mut sink)
            .ticks;
    }
    results.push(check(
        "scheduler_tick_rate",
        ticks == 200,
        format!("{} ticks in 10 s", ticks),
    ));
    results.push(check(
        "scheduler_save_timer",
        sink.saves.len() == 3,
        format!("{} saves in 10 s", sink.saves.len()),
    ));

    results
}
