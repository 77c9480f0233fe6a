#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs evacuation and intruder scenarios on a building.

mod config;

use std::{
    fs::File,
    io::{self, BufRead, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use evac_attack_core::{IntruderBehavior, ZoneId};
use evac_attack_system_intruder::IntruderConfig;
use evac_attack_system_scenario::{
    experiments::{run_sweep, ExperimentResult, SweepPlan},
    remote::{handle, RemoteRequest},
    EvacuationCurve, Scenario,
};
use evac_attack_world::{query, ElementRef, World};
use tracing_subscriber::EnvFilter;

use config::{FileConfig, Overrides, Settings};

/// Evacuation crowd flow with an intruder moving through the building.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Optional TOML configuration; flags take precedence over its values.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the crowd flow alone and writes the per-exit evacuation curve as CSV.
    Evacuate {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// CSV destination; standard output when omitted.
        #[arg(long, value_name = "FILE")]
        curve: Option<PathBuf>,
    },

    /// Runs one attack to completion and reports the totals.
    Attack {
        #[command(flatten)]
        scenario: ScenarioArgs,

        #[command(flatten)]
        intruder: IntruderArgs,

        /// Print the final snapshot as JSON instead of the summary.
        #[arg(long)]
        json: bool,
    },

    /// Runs every behaviour, speed and density combination and writes CSV results.
    Sweep {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Exit index the intruder enters through.
        #[arg(long)]
        entry: Option<usize>,

        /// Rooms the intruder never enters, by element identifier.
        #[arg(long = "disable", value_name = "ID")]
        disabled: Vec<String>,

        /// CSV destination; standard output when omitted.
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Answers JSON requests read line by line from standard input.
    Remote {
        #[command(flatten)]
        scenario: ScenarioArgs,

        #[command(flatten)]
        intruder: IntruderArgs,

        /// Place an intruder before the first request.
        #[arg(long)]
        with_intruder: bool,
    },
}

#[derive(Args, Debug)]
struct ScenarioArgs {
    /// Building description in JSON.
    #[arg(long, value_name = "FILE")]
    building: PathBuf,

    /// Initial density in persons per square metre.
    #[arg(long)]
    density: Option<f64>,

    /// Tick budget before a run is reported as not converging.
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Keep the crowd still while the intruder moves.
    #[arg(long)]
    frozen_crowd: bool,
}

#[derive(Args, Debug)]
struct IntruderArgs {
    /// Exit index the intruder enters through.
    #[arg(long)]
    entry: Option<usize>,

    /// Behaviour type: 1 advance, 2 predatory, 3 efficient.
    #[arg(long, value_parser = parse_behavior)]
    behavior: Option<IntruderBehavior>,

    /// Walking speed in metres per minute.
    #[arg(long)]
    speed: Option<f64>,

    /// Plan the whole route when the intruder is placed.
    #[arg(long)]
    precompute: bool,

    /// Rooms the intruder never enters, by element identifier.
    #[arg(long = "disable", value_name = "ID")]
    disabled: Vec<String>,
}

fn parse_behavior(value: &str) -> Result<IntruderBehavior, String> {
    let code = value
        .parse::<u8>()
        .map_err(|_| format!("intruder type must be 1, 2 or 3, got {value}"))?;
    IntruderBehavior::try_from(code)
}

fn overrides(scenario: &ScenarioArgs, intruder: Option<&IntruderArgs>) -> Overrides {
    let mut flags = Overrides {
        density: scenario.density,
        max_ticks: scenario.max_ticks,
        frozen_crowd: scenario.frozen_crowd,
        ..Overrides::default()
    };
    if let Some(intruder) = intruder {
        flags.entry = intruder.entry;
        flags.behavior = intruder.behavior;
        flags.speed = intruder.speed;
        flags.precompute = intruder.precompute;
        flags.disabled = intruder.disabled.clone();
    }
    flags
}

fn load_world(path: &Path) -> Result<World> {
    let file = File::open(path)
        .with_context(|| format!("failed to open building description at {}", path.display()))?;
    World::from_reader(io::BufReader::new(file))
        .with_context(|| format!("failed to load building description at {}", path.display()))
}

fn resolve_rooms(world: &World, ids: &[String]) -> Result<Vec<ZoneId>> {
    ids.iter()
        .map(|id| match query::lookup(world, id) {
            Some(ElementRef::Zone(zone)) => Ok(zone),
            Some(ElementRef::Transit(_)) => bail!("element {id} is a doorway, not a room"),
            None => bail!("unknown room {id}"),
        })
        .collect()
}

fn intruder_config(world: &World, settings: &Settings) -> Result<IntruderConfig> {
    Ok(IntruderConfig {
        entry: settings.entry,
        behavior: settings.behavior,
        speed: settings.speed,
        precompute: settings.precompute,
        disabled: resolve_rooms(world, &settings.disabled)?,
        ..IntruderConfig::default()
    })
}

fn populated(world: World, settings: &Settings) -> Scenario {
    let mut scenario = Scenario::new(world);
    let mut events = Vec::new();
    scenario.set_density(settings.density, &mut events);
    scenario.set_people_by_density(&mut events);
    scenario.set_crowd_active(settings.crowd_motion);
    scenario
}

fn output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(File::create(path).with_context(|| {
            format!("failed to create output file at {}", path.display())
        })?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

fn write_curve(out: &mut dyn Write, world: &World, curve: &EvacuationCurve) -> Result<()> {
    let mut header = String::from("time_s");
    for exit in curve.exits() {
        header.push(',');
        header.push_str(world.transit(*exit).external_id());
    }
    header.push_str(",total");
    writeln!(out, "{header}")?;

    for sample in curve.samples() {
        let mut row = format!("{:.1}", sample.time_seconds);
        for people in &sample.evacuated {
            row.push_str(&format!(",{people:.3}"));
        }
        row.push_str(&format!(",{:.3}", sample.total()));
        writeln!(out, "{row}")?;
    }
    Ok(())
}

fn write_results(out: &mut dyn Write, results: &[ExperimentResult]) -> Result<()> {
    writeln!(out, "type,speed,density,victims,evacuated,time_min,ticks")?;
    for result in results {
        writeln!(
            out,
            "{},{},{},{:.3},{:.3},{:.4},{}",
            result.behavior.code(),
            result.speed,
            result.density,
            result.victims,
            result.evacuated,
            result.time,
            result.ticks
        )?;
    }
    Ok(())
}

fn evacuate(settings: &Settings, world: World, curve_path: Option<&Path>) -> Result<()> {
    let mut scenario = populated(world, settings);
    let summary = scenario
        .run_to_completion(settings.max_ticks, &mut Vec::new())
        .context("evacuation failed")?;
    tracing::info!(
        ticks = summary.ticks,
        time = summary.time,
        evacuated = summary.evacuated,
        "evacuation finished"
    );

    let mut out = output(curve_path)?;
    write_curve(&mut *out, scenario.world(), scenario.curve())?;
    out.flush().context("failed to flush evacuation curve")
}

fn attack(settings: &Settings, world: World, json: bool) -> Result<()> {
    let config = intruder_config(&world, settings)?;
    let mut scenario = populated(world, settings);
    let mut events = Vec::new();
    let _ = scenario
        .set_intruder(config, &mut events)
        .context("failed to place intruder")?;
    let summary = scenario
        .run_to_completion(settings.max_ticks, &mut events)
        .context("attack failed")?;

    let mut out = output(None)?;
    if json {
        serde_json::to_writer_pretty(&mut out, &scenario.snapshot())
            .context("failed to serialize snapshot")?;
        writeln!(out)?;
    } else {
        writeln!(out, "type:      {}", settings.behavior.code())?;
        writeln!(out, "ticks:     {}", summary.ticks)?;
        writeln!(out, "time:      {:.4} min", summary.time)?;
        writeln!(out, "evacuated: {:.3}", summary.evacuated)?;
        writeln!(out, "victims:   {:.3}", summary.victims)?;
        writeln!(out, "remaining: {:.3}", summary.remaining)?;
        if let Some(intruder) = scenario.intruder() {
            let path = intruder
                .path()
                .iter()
                .map(|zone| scenario.world().zone(*zone).external_id())
                .collect::<Vec<_>>()
                .join(" -> ");
            writeln!(out, "path:      {path}")?;
        }
    }
    out.flush().context("failed to flush attack report")
}

fn sweep(
    file: &FileConfig,
    settings: &Settings,
    world: World,
    output_path: Option<&Path>,
) -> Result<()> {
    let defaults = SweepPlan::default();
    let plan = SweepPlan {
        entry: settings.entry,
        behaviors: file.sweep.behaviors.clone().unwrap_or(defaults.behaviors),
        speeds: file.sweep.speeds.clone().unwrap_or(defaults.speeds),
        densities: file.sweep.densities.clone().unwrap_or(defaults.densities),
        disabled: resolve_rooms(&world, &settings.disabled)?,
        max_ticks: settings.max_ticks,
    };
    let results = run_sweep(&world, &plan).context("sweep failed")?;

    let mut out = output(output_path)?;
    write_results(&mut *out, &results)?;
    out.flush().context("failed to flush sweep results")
}

fn remote(settings: &Settings, world: World, with_intruder: bool) -> Result<()> {
    let config = intruder_config(&world, settings)?;
    let mut scenario = populated(world, settings);
    let mut events = Vec::new();
    if with_intruder {
        let _ = scenario
            .set_intruder(config, &mut events)
            .context("failed to place intruder")?;
    }

    let stdin = io::stdin();
    let mut out = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read request")?;
        if line.trim().is_empty() {
            continue;
        }
        let response = serde_json::from_str::<RemoteRequest>(&line)
            .map_err(|error| error.to_string())
            .and_then(|request| {
                handle(&mut scenario, request, &mut events).map_err(|error| error.to_string())
            });
        events.clear();
        let reply = match response {
            Ok(snapshot) => serde_json::to_string(&snapshot)?,
            Err(error) => {
                tracing::warn!(%error, "remote request failed");
                serde_json::json!({ "error": error }).to_string()
            }
        };
        writeln!(out, "{reply}")?;
        out.flush()?;
    }
    Ok(())
}

/// Entry point for the evacuation command-line interface.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let file = FileConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Evacuate { scenario, curve } => {
            let settings = Settings::resolve(&file, &overrides(&scenario, None));
            evacuate(&settings, load_world(&scenario.building)?, curve.as_deref())
        }
        Commands::Attack {
            scenario,
            intruder,
            json,
        } => {
            let settings = Settings::resolve(&file, &overrides(&scenario, Some(&intruder)));
            attack(&settings, load_world(&scenario.building)?, json)
        }
        Commands::Sweep {
            scenario,
            entry,
            disabled,
            output,
        } => {
            let mut flags = overrides(&scenario, None);
            flags.entry = entry;
            flags.disabled = disabled;
            let settings = Settings::resolve(&file, &flags);
            sweep(&file, &settings, load_world(&scenario.building)?, output.as_deref())
        }
        Commands::Remote {
            scenario,
            intruder,
            with_intruder,
        } => {
            let settings = Settings::resolve(&file, &overrides(&scenario, Some(&intruder)));
            remote(&settings, load_world(&scenario.building)?, with_intruder)
        }
    }
}
