#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Orchestrates crowd flow and the intruder on a shared clock.
//!
//! A [`Scenario`] owns the world, advances the crowd one fixed step per tick
//! and lets the intruder enter the next room once its walked distance can be
//! covered within the elapsed time. Every room the intruder enters is captured:
//! its occupants become victims and the room is blocked until the intruder
//! moves on.

pub mod curve;
pub mod experiments;
pub mod remote;

use evac_attack_core::{
    Command, Event, IntruderSnapshot, SafetyZoneSnapshot, TransitSnapshot, ZoneId, ZoneSnapshot,
    MODELLING_STEP,
};
use evac_attack_system_crowd_flow::{CrowdFlow, CrowdFlowError, StepReport};
use evac_attack_system_intruder::{Intruder, IntruderConfig, IntruderError, Move};
use evac_attack_world::{self as world, query, World};
use serde::{Deserialize, Serialize};

pub use curve::EvacuationCurve;

/// Errors raised while running a scenario.
#[derive(thiserror::Error, Debug)]
pub enum ScenarioError {
    /// The crowd-flow engine failed.
    #[error(transparent)]
    CrowdFlow(#[from] CrowdFlowError),

    /// The intruder could not be placed.
    #[error(transparent)]
    Intruder(#[from] IntruderError),

    /// People were still moving when the tick budget ran out.
    #[error("evacuation did not finish within {ticks} ticks, {remaining} people still moving")]
    DidNotConverge {
        /// Ticks executed.
        ticks: u64,
        /// People left in zones that gave occupants during the last step.
        remaining: f64,
    },

    /// An override named an element that is not a zone of the building.
    #[error("unknown zone {id}")]
    UnknownZone {
        /// Identifier from the request.
        id: String,
    },
}

/// Outcome of a single tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TickReport {
    /// Crowd step summary, absent while crowd motion is paused.
    pub crowd: Option<StepReport>,
    /// Room change made by the intruder during the tick.
    pub intruder_move: Option<Move>,
    /// Occupants captured during the tick.
    pub captured: f64,
}

/// Totals reported once a run has drained.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Ticks executed.
    pub ticks: u64,
    /// Simulation clock in minutes.
    pub time: f64,
    /// People that reached safety.
    pub evacuated: f64,
    /// People captured by the intruder.
    pub victims: f64,
    /// People left inside the building.
    pub remaining: f64,
}

/// Full state returned to reporting layers and remote callers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSnapshot {
    /// Simulation clock in minutes.
    pub time: f64,
    /// Ticks executed so far.
    pub ticks: u64,
    /// Zones in arena order.
    pub zones: Vec<ZoneSnapshot>,
    /// Doorways in arena order.
    pub transits: Vec<TransitSnapshot>,
    /// Exterior sinks in exit order.
    pub safety_zones: Vec<SafetyZoneSnapshot>,
    /// Intruder state, if one was placed.
    pub intruder: Option<IntruderSnapshot>,
    /// People that reached safety.
    pub evacuated: f64,
    /// People still inside the building.
    pub building_population: f64,
}

/// Replacement values for a zone, addressed by its element identifier.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneOverride {
    /// Element identifier from the building description.
    pub id: String,
    /// New number of occupants.
    #[serde(default)]
    pub num_people: Option<f64>,
    /// New blocked flag.
    #[serde(default)]
    pub is_blocked: Option<bool>,
}

/// Crowd flow and intruder sharing one building and one clock.
#[derive(Debug)]
pub struct Scenario {
    world: World,
    crowd: CrowdFlow,
    crowd_active: bool,
    intruder: Option<Intruder>,
    curve: EvacuationCurve,
    ticks: u64,
}

impl Scenario {
    /// Creates a scenario over the provided building with crowd motion active.
    #[must_use]
    pub fn new(world: World) -> Self {
        let curve = EvacuationCurve::new(&world);
        Self {
            world,
            crowd: CrowdFlow::default(),
            crowd_active: true,
            intruder: None,
            curve,
            ticks: 0,
        }
    }

    /// Building state.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Placed intruder, if any.
    #[must_use]
    pub fn intruder(&self) -> Option<&Intruder> {
        self.intruder.as_ref()
    }

    /// Cumulative escapes per exit sampled after every tick.
    #[must_use]
    pub fn curve(&self) -> &EvacuationCurve {
        &self.curve
    }

    /// Ticks executed so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Whether the crowd moves on each tick.
    #[must_use]
    pub const fn crowd_active(&self) -> bool {
        self.crowd_active
    }

    /// Pauses or resumes crowd motion; the clock keeps running either way.
    pub fn set_crowd_active(&mut self, active: bool) {
        self.crowd_active = active;
    }

    /// Assigns the same density to every zone.
    pub fn set_density(&mut self, density: f64, out_events: &mut Vec<Event>) {
        world::apply(&mut self.world, Command::SetDensity { density }, out_events);
    }

    /// Derives every zone's population from its density.
    pub fn set_people_by_density(&mut self, out_events: &mut Vec<Event>) {
        world::apply(&mut self.world, Command::SetPeopleByDensity, out_events);
    }

    /// Empties every safety zone and restarts the evacuation curve from the
    /// current clock.
    pub fn reset_safety_zones(&mut self, out_events: &mut Vec<Event>) {
        world::apply(&mut self.world, Command::ResetSafetyZones, out_events);
        self.curve = EvacuationCurve::new(&self.world);
    }

    /// Places an intruder and captures the room behind its entry door.
    ///
    /// A previously placed intruder is withdrawn and its room unblocked.
    pub fn set_intruder(
        &mut self,
        config: IntruderConfig,
        out_events: &mut Vec<Event>,
    ) -> Result<&Intruder, ScenarioError> {
        let mut intruder = Intruder::new(&self.world, config)?;
        if let Some(previous) = self.intruder.take() {
            world::apply(
                &mut self.world,
                Command::SetZoneBlocked {
                    zone: previous.room(),
                    blocked: false,
                },
                out_events,
            );
        }

        let captured = capture(&mut self.world, intruder.room(), out_events);
        intruder.add_victims(captured);
        Ok(self.intruder.insert(intruder))
    }

    /// Advances the crowd by one step and lets the intruder catch up.
    pub fn tick(&mut self, out_events: &mut Vec<Event>) -> Result<TickReport, ScenarioError> {
        let mut report = TickReport::default();
        if self.crowd_active {
            report.crowd = Some(self.crowd.step(&mut self.world, out_events)?);
        } else {
            world::apply(
                &mut self.world,
                Command::AdvanceClock { dt: MODELLING_STEP },
                out_events,
            );
        }
        self.ticks += 1;

        if let Some(intruder) = self.intruder.as_mut() {
            let due = intruder.path_len(&self.world) / intruder.speed() < self.world.time();
            if due && !intruder.is_halted() {
                if let Some(step) = intruder.step_next(&self.world, out_events) {
                    world::apply(
                        &mut self.world,
                        Command::SetZoneBlocked {
                            zone: step.from,
                            blocked: false,
                        },
                        out_events,
                    );
                    report.captured = capture(&mut self.world, step.to, out_events);
                    intruder.add_victims(report.captured);
                    report.intruder_move = Some(step);
                }
            }
        }

        self.curve.record(&self.world);
        Ok(report)
    }

    /// Ticks until nobody is moving any more.
    ///
    /// The scenario always ticks once, then keeps ticking while zones that
    /// gave occupants during the last step still hold people.
    pub fn run_to_completion(
        &mut self,
        max_ticks: u64,
        out_events: &mut Vec<Event>,
    ) -> Result<RunSummary, ScenarioError> {
        let start = self.ticks;
        let _ = self.tick(out_events)?;
        loop {
            let remaining = query::pending_evacuees(&self.world);
            if remaining <= 0.0 {
                break;
            }
            let ticks = self.ticks - start;
            if ticks >= max_ticks {
                tracing::warn!(ticks, remaining, "evacuation did not converge");
                return Err(ScenarioError::DidNotConverge { ticks, remaining });
            }
            let _ = self.tick(out_events)?;
        }

        let summary = self.summary();
        tracing::info!(
            ticks = summary.ticks,
            time = summary.time,
            evacuated = summary.evacuated,
            victims = summary.victims,
            "evacuation finished"
        );
        Ok(summary)
    }

    /// Totals for the current state.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            ticks: self.ticks,
            time: self.world.time(),
            evacuated: query::evacuated(&self.world),
            victims: self.intruder.as_ref().map_or(0.0, Intruder::victims),
            remaining: query::building_population(&self.world),
        }
    }

    /// Applies zone overrides addressed by element identifier.
    ///
    /// Every identifier is resolved before anything changes, so an unknown
    /// one leaves the scenario untouched.
    pub fn apply_overrides(
        &mut self,
        overrides: &[ZoneOverride],
        out_events: &mut Vec<Event>,
    ) -> Result<(), ScenarioError> {
        let resolved = overrides
            .iter()
            .map(|entry| self.resolve_zone(&entry.id).map(|zone| (zone, entry)))
            .collect::<Result<Vec<_>, _>>()?;

        for (zone, entry) in resolved {
            if let Some(people) = entry.num_people {
                world::apply(
                    &mut self.world,
                    Command::SetZonePopulation { zone, people },
                    out_events,
                );
            }
            if let Some(blocked) = entry.is_blocked {
                world::apply(
                    &mut self.world,
                    Command::SetZoneBlocked { zone, blocked },
                    out_events,
                );
            }
        }
        Ok(())
    }

    /// Resolves a zone's element identifier.
    pub fn resolve_zone(&self, id: &str) -> Result<ZoneId, ScenarioError> {
        match query::lookup(&self.world, id) {
            Some(world::ElementRef::Zone(zone)) => Ok(zone),
            _ => Err(ScenarioError::UnknownZone { id: id.to_owned() }),
        }
    }

    /// Captures the full state.
    #[must_use]
    pub fn snapshot(&self) -> ScenarioSnapshot {
        ScenarioSnapshot {
            time: self.world.time(),
            ticks: self.ticks,
            zones: query::zone_snapshots(&self.world),
            transits: query::transit_snapshots(&self.world),
            safety_zones: query::safety_zone_snapshots(&self.world),
            intruder: self.intruder.as_ref().map(Intruder::snapshot),
            evacuated: query::evacuated(&self.world),
            building_population: query::building_population(&self.world),
        }
    }
}

/// Empties and blocks a zone, returning the occupants removed.
fn capture(world: &mut World, zone: ZoneId, out_events: &mut Vec<Event>) -> f64 {
    let people = world.zone(zone).num_people();
    world::apply(world, Command::CaptureZone { zone }, out_events);
    people
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN: &str = r#"{
        "Level": [{
            "NameLevel": "ground",
            "ZLevel": 0.0,
            "BuildElement": [
                {"Id": "A", "Sign": "Room", "XY": [[[0,0],[4,0],[4,4],[0,4],[0,0]]], "Output": ["X", "AB"]},
                {"Id": "B", "Sign": "Room", "XY": [[[4,0],[8,0],[8,4],[4,4],[4,0]]], "Output": ["AB"]},
                {"Id": "AB", "Sign": "DoorWayInt", "XY": [[[4,1],[4,2],[4.1,2],[4.1,1],[4,1]]], "Output": ["A", "B"]},
                {"Id": "X", "Sign": "DoorWayOut", "XY": [[[0,1],[0,2],[-0.1,2],[-0.1,1],[0,1]]], "Output": ["A"]}
            ]
        }]
    }"#;

    fn scenario() -> Scenario {
        Scenario::new(World::from_json_str(CHAIN).expect("building"))
    }

    #[test]
    fn paused_crowd_only_advances_clock() {
        let mut scenario = scenario();
        let mut events = Vec::new();
        scenario.set_density(0.5, &mut events);
        scenario.set_people_by_density(&mut events);
        scenario.set_crowd_active(false);

        let report = scenario.tick(&mut events).expect("tick");

        assert!(report.crowd.is_none());
        assert!((scenario.world().time() - MODELLING_STEP).abs() < 1e-15);
        assert_eq!(scenario.summary().evacuated, 0.0);
        assert!((scenario.summary().remaining - 16.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_override_changes_nothing() {
        let mut scenario = scenario();
        let overrides = [
            ZoneOverride {
                id: "A".to_owned(),
                num_people: Some(3.0),
                is_blocked: None,
            },
            ZoneOverride {
                id: "AB".to_owned(),
                num_people: Some(1.0),
                is_blocked: None,
            },
        ];

        let result = scenario.apply_overrides(&overrides, &mut Vec::new());

        assert!(matches!(result, Err(ScenarioError::UnknownZone { id }) if id == "AB"));
        assert_eq!(scenario.summary().remaining, 0.0);
    }
}
