//! Request vocabulary of the remote-control façade.
//!
//! Every request is answered with the full [`ScenarioSnapshot`].

use evac_attack_core::Event;
use serde::{Deserialize, Serialize};

use crate::{Scenario, ScenarioError, ScenarioSnapshot, ZoneOverride};

/// Request accepted by [`handle`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "camelCase")]
pub enum RemoteRequest {
    /// Overrides zone state before the next tick.
    ApplySnapshot {
        /// Zones to change.
        zones: Vec<ZoneOverride>,
        /// Empty the safety zones and restart the evacuation curve first.
        #[serde(rename = "resetSafetyZones", default)]
        reset_safety_zones: bool,
    },
    /// Advances the scenario.
    Step {
        /// Number of ticks to run.
        #[serde(default = "one_tick")]
        ticks: u32,
    },
    /// Returns the state without changing it.
    Snapshot,
}

fn one_tick() -> u32 {
    1
}

/// Executes a request and returns the resulting state.
pub fn handle(
    scenario: &mut Scenario,
    request: RemoteRequest,
    out_events: &mut Vec<Event>,
) -> Result<ScenarioSnapshot, ScenarioError> {
    match request {
        RemoteRequest::ApplySnapshot {
            zones,
            reset_safety_zones,
        } => {
            scenario.apply_overrides(&zones, out_events)?;
            if reset_safety_zones {
                scenario.reset_safety_zones(out_events);
            }
        }
        RemoteRequest::Step { ticks } => {
            for _ in 0..ticks {
                let _ = scenario.tick(out_events)?;
            }
        }
        RemoteRequest::Snapshot => {}
    }
    Ok(scenario.snapshot())
}
