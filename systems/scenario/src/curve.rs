//! Per-exit evacuation curves.

use evac_attack_core::TransitId;
use evac_attack_world::World;
use serde::{Deserialize, Serialize};

/// Cumulative people per exit at one point in time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurveSample {
    /// Elapsed time in seconds.
    pub time_seconds: f64,
    /// People that reached safety through each exit, in exit order.
    pub evacuated: Vec<f64>,
}

impl CurveSample {
    /// Sum over all exits.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.evacuated.iter().sum()
    }
}

/// Time series of people reaching safety, one column per exit.
///
/// The series starts with the state the curve was created from, then gains one
/// sample per recorded tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvacuationCurve {
    exits: Vec<TransitId>,
    samples: Vec<CurveSample>,
}

impl EvacuationCurve {
    /// Starts a curve with the world's current totals.
    #[must_use]
    pub fn new(world: &World) -> Self {
        let mut curve = Self {
            exits: world.safety_zones().iter().map(|sink| sink.exit()).collect(),
            samples: Vec::new(),
        };
        curve.record(world);
        curve
    }

    /// Appends the world's current totals.
    pub fn record(&mut self, world: &World) {
        self.samples.push(CurveSample {
            time_seconds: world.time() * 60.0,
            evacuated: world
                .safety_zones()
                .iter()
                .map(|sink| sink.num_people())
                .collect(),
        });
    }

    /// Exit doorways in column order.
    #[must_use]
    pub fn exits(&self) -> &[TransitId] {
        &self.exits
    }

    /// Samples in time order.
    #[must_use]
    pub fn samples(&self) -> &[CurveSample] {
        &self.samples
    }
}
