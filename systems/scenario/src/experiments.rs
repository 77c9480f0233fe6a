//! Batch what-if runs over intruder type, speed and initial density.

use evac_attack_core::{IntruderBehavior, ZoneId};
use evac_attack_system_intruder::IntruderConfig;
use evac_attack_world::World;
use serde::{Deserialize, Serialize};

use crate::{Scenario, ScenarioError};

/// Grid of runs to execute against one building.
#[derive(Clone, Debug, PartialEq)]
pub struct SweepPlan {
    /// Exit index the intruder enters through.
    pub entry: usize,
    /// Behaviour policies to try.
    pub behaviors: Vec<IntruderBehavior>,
    /// Intruder speeds in metres per minute.
    pub speeds: Vec<f64>,
    /// Initial densities in persons per square metre.
    pub densities: Vec<f64>,
    /// Rooms the intruder never enters.
    pub disabled: Vec<ZoneId>,
    /// Tick budget of each run.
    pub max_ticks: u64,
}

impl Default for SweepPlan {
    fn default() -> Self {
        Self {
            entry: 0,
            behaviors: vec![
                IntruderBehavior::Advance,
                IntruderBehavior::Predatory,
                IntruderBehavior::Efficient,
            ],
            speeds: vec![30.0, 60.0, 90.0],
            densities: vec![0.1, 0.2, 0.3],
            disabled: Vec::new(),
            max_ticks: 100_000,
        }
    }
}

/// Result of one run of a [`SweepPlan`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentResult {
    /// Behaviour policy of the intruder.
    pub behavior: IntruderBehavior,
    /// Intruder speed in metres per minute.
    pub speed: f64,
    /// Initial density.
    pub density: f64,
    /// People captured by the intruder.
    pub victims: f64,
    /// People that reached safety.
    pub evacuated: f64,
    /// Simulation clock at the end of the run, in minutes.
    pub time: f64,
    /// Ticks executed.
    pub ticks: u64,
}

/// Runs every combination of the plan, each on a fresh copy of `world`.
///
/// Type 1 intruders plan their route up front.
pub fn run_sweep(world: &World, plan: &SweepPlan) -> Result<Vec<ExperimentResult>, ScenarioError> {
    let mut results = Vec::new();
    for &behavior in &plan.behaviors {
        for &speed in &plan.speeds {
            for &density in &plan.densities {
                let config = IntruderConfig {
                    entry: plan.entry,
                    behavior,
                    speed,
                    precompute: behavior == IntruderBehavior::Advance,
                    disabled: plan.disabled.clone(),
                    ..IntruderConfig::default()
                };
                let result = run_once(world, density, config, plan.max_ticks)?;
                tracing::info!(
                    behavior = behavior.code(),
                    speed,
                    density,
                    victims = result.victims,
                    "experiment finished"
                );
                results.push(result);
            }
        }
    }
    Ok(results)
}

/// Runs a single attack to completion on a copy of `world`.
pub fn run_once(
    world: &World,
    density: f64,
    config: IntruderConfig,
    max_ticks: u64,
) -> Result<ExperimentResult, ScenarioError> {
    let behavior = config.behavior;
    let speed = config.speed;
    let mut scenario = Scenario::new(world.clone());
    let mut events = Vec::new();
    scenario.set_density(density, &mut events);
    scenario.set_people_by_density(&mut events);
    let _ = scenario.set_intruder(config, &mut events)?;
    let summary = scenario.run_to_completion(max_ticks, &mut events)?;

    Ok(ExperimentResult {
        behavior,
        speed,
        density,
        victims: summary.victims,
        evacuated: summary.evacuated,
        time: summary.time,
        ticks: summary.ticks,
    })
}
