#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the evacuation-and-intrusion engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative building world, and the simulation systems. Adapters submit
//! [`Command`] values describing desired mutations, the world executes those
//! commands via its `apply` entry point and broadcasts [`Event`] values. The
//! crowd-flow and intruder systems borrow the world directly while stepping
//! and report what they did through the same event vocabulary.

pub mod geometry;

use serde::{Deserialize, Serialize};

/// Fixed simulation timestep expressed in minutes.
pub const MODELLING_STEP: f64 = 0.008;

/// Density (persons per square metre) at or below which a zone is flushed in one step.
pub const MIN_DENSITY: f64 = 0.01;

/// Highest density (persons per square metre) a receiving zone may reach.
pub const MAX_DENSITY: f64 = 5.0;

/// Identifier of a room or staircase inside the building arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZoneId(u32);

impl ZoneId {
    /// Creates a new zone identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Position of the zone inside dense per-zone tables.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Identifier of a doorway inside the building arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitId(u32);

impl TransitId {
    /// Creates a new transit identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Position of the transit inside dense per-transit tables.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Identifier of a virtual exterior sink attached to an exit doorway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SafetyZoneId(u32);

impl SafetyZoneId {
    /// Creates a new safety zone identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Position of the safety zone inside dense per-sink tables.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Discrete category of an occupiable zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneKind {
    /// Horizontal room on a single level.
    Room,
    /// Staircase connecting zones at different elevations.
    Staircase,
}

/// Discrete category of a doorway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitKind {
    /// Interior door between two zones (`DoorWayInt`).
    Interior,
    /// Plain opening between two zones (`DoorWay`).
    Opening,
    /// Exit door leading from a single zone to the outside (`DoorWayOut`).
    Exit,
}

impl TransitKind {
    /// Reports whether the intruder may walk through this kind of doorway.
    ///
    /// Exit doors only ever lead outside, so they never join two rooms.
    #[must_use]
    pub const fn is_passable_inside(self) -> bool {
        matches!(self, Self::Interior | Self::Opening)
    }
}

/// Either endpoint of a transfer: a building zone or an exterior sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Node {
    /// Occupiable zone inside the building.
    Zone(ZoneId),
    /// Exterior sink reached through an exit doorway.
    Safety(SafetyZoneId),
}

/// Behaviour policy steering the intruder through the building.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum IntruderBehavior {
    /// Type 1: always advances one graph level deeper, planning the richest branch.
    Advance,
    /// Type 2: greedily heads towards the largest visible crowd.
    Predatory,
    /// Type 3: greedily heads towards the most occupants per distance travelled.
    Efficient,
}

impl IntruderBehavior {
    /// Resolves the numeric behaviour code (1, 2 or 3).
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Advance),
            2 => Some(Self::Predatory),
            3 => Some(Self::Efficient),
            _ => None,
        }
    }

    /// Numeric behaviour code (1, 2 or 3).
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Advance => 1,
            Self::Predatory => 2,
            Self::Efficient => 3,
        }
    }
}

impl TryFrom<u8> for IntruderBehavior {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_code(value).ok_or_else(|| format!("unknown intruder type {value}"))
    }
}

impl From<IntruderBehavior> for u8 {
    fn from(value: IntruderBehavior) -> Self {
        value.code()
    }
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Assigns the same initial density to every zone.
    SetDensity {
        /// Density in persons per square metre.
        density: f64,
    },
    /// Derives every zone's population from its density and area.
    SetPeopleByDensity,
    /// Overrides the population of a single zone.
    SetZonePopulation {
        /// Zone receiving the new population.
        zone: ZoneId,
        /// Number of occupants; negative values are treated as zero.
        people: f64,
    },
    /// Toggles whether a zone takes part in crowd flow.
    SetZoneBlocked {
        /// Zone to update.
        zone: ZoneId,
        /// Whether the zone is excluded from flow.
        blocked: bool,
    },
    /// Toggles whether a doorway carries crowd flow.
    SetTransitBlocked {
        /// Doorway to update.
        transit: TransitId,
        /// Whether the doorway is closed.
        blocked: bool,
    },
    /// Empties every safety zone so a fresh run can be counted.
    ResetSafetyZones,
    /// Removes every occupant of a zone and blocks it.
    CaptureZone {
        /// Zone entered by the intruder.
        zone: ZoneId,
    },
    /// Advances the simulation clock without moving anybody.
    AdvanceClock {
        /// Elapsed time in minutes.
        dt: f64,
    },
}

/// Events broadcast by the world and systems after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Elapsed time in minutes.
        dt: f64,
        /// Clock value after the advance.
        time: f64,
    },
    /// Confirms that every zone now carries the provided density.
    DensityAssigned {
        /// Density in persons per square metre.
        density: f64,
    },
    /// Reports that a zone's population was overwritten.
    ZonePopulationChanged {
        /// Zone that changed.
        zone: ZoneId,
        /// New number of occupants.
        people: f64,
    },
    /// Reports that a zone was blocked or unblocked.
    ZoneBlockChanged {
        /// Zone that changed.
        zone: ZoneId,
        /// Whether the zone is now blocked.
        blocked: bool,
    },
    /// Reports that a doorway was closed or opened.
    TransitBlockChanged {
        /// Doorway that changed.
        transit: TransitId,
        /// Whether the doorway is now blocked.
        blocked: bool,
    },
    /// Confirms that every safety zone was emptied.
    SafetyZonesReset,
    /// Reports that the occupants of a zone were captured.
    ZoneCaptured {
        /// Zone that was emptied and blocked.
        zone: ZoneId,
        /// Number of occupants removed.
        people: f64,
    },
    /// Diagnostic: a computed transfer exceeded the giving zone's population.
    TransferClamped {
        /// Doorway carrying the transfer.
        transit: TransitId,
        /// Zone that gave the people.
        zone: ZoneId,
        /// Amount the flow law asked for.
        requested: f64,
        /// Amount that was actually present.
        available: f64,
    },
    /// Confirms that the intruder entered a new room.
    IntruderAdvanced {
        /// Room the intruder left.
        from: ZoneId,
        /// Room the intruder entered.
        to: ZoneId,
        /// Doorway the intruder crossed.
        door: TransitId,
    },
    /// Reports that the intruder found no further room and stopped.
    IntruderHalted {
        /// Room where the intruder stays.
        room: ZoneId,
    },
}

/// Immutable view of a zone used by reporting layers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSnapshot {
    /// Arena identifier of the zone.
    pub id: ZoneId,
    /// Element identifier taken from the building description.
    pub external_id: String,
    /// Human readable name, if the description carried one.
    pub name: Option<String>,
    /// Room or staircase.
    pub kind: ZoneKind,
    /// Current number of occupants.
    pub num_people: f64,
    /// Current density in persons per square metre.
    pub density: f64,
    /// Whether the zone gave people during the last step.
    pub is_visited: bool,
    /// Whether the zone is excluded from flow.
    pub is_blocked: bool,
    /// Routing cost computed during the last step, if the zone was reached.
    pub potential: Option<f64>,
    /// Exit doorway the zone drained towards during the last step.
    pub route: Option<TransitId>,
}

/// Immutable view of a doorway used by reporting layers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitSnapshot {
    /// Arena identifier of the doorway.
    pub id: TransitId,
    /// Element identifier taken from the building description.
    pub external_id: String,
    /// Interior door, opening or exit.
    pub kind: TransitKind,
    /// Doorway width in metres.
    pub width: f64,
    /// People moved through the doorway in the last step, signed by direction.
    pub flow: f64,
    /// Whether the doorway carried flow during the last step.
    pub is_visited: bool,
    /// Whether the doorway is closed.
    pub is_blocked: bool,
    /// Exit doorway the flow was routed towards.
    pub route: Option<TransitId>,
}

/// Immutable view of an exterior sink.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyZoneSnapshot {
    /// Arena identifier of the sink.
    pub id: SafetyZoneId,
    /// Exit doorway feeding the sink.
    pub exit: TransitId,
    /// People that reached safety through this exit.
    pub num_people: f64,
}

/// Immutable view of the intruder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntruderSnapshot {
    /// Behaviour policy of the intruder.
    pub behavior: IntruderBehavior,
    /// Doorway the intruder entered through.
    pub entry: TransitId,
    /// Room currently occupied.
    pub room: ZoneId,
    /// Rooms traversed so far, entry room first.
    pub path: Vec<ZoneId>,
    /// Occupants captured so far.
    pub victims: f64,
    /// Whether the intruder stopped at a dead end.
    pub halted: bool,
}

#[cfg(test)]
mod tests {
    use super::{IntruderBehavior, ZoneId};

    #[test]
    fn behavior_codes_round_trip() {
        for code in 1..=3 {
            let behavior = IntruderBehavior::from_code(code).expect("known code");
            assert_eq!(behavior.code(), code);
        }
        assert!(IntruderBehavior::from_code(0).is_none());
        assert!(IntruderBehavior::from_code(4).is_none());
    }

    #[test]
    fn behavior_deserializes_from_numeric_code() {
        let behavior: IntruderBehavior = serde_json::from_str("3").expect("deserialize");
        assert_eq!(behavior, IntruderBehavior::Efficient);
        assert!(serde_json::from_str::<IntruderBehavior>("7").is_err());
    }

    #[test]
    fn zone_id_indexes_dense_tables() {
        assert_eq!(ZoneId::new(7).index(), 7);
        assert_eq!(ZoneId::new(7).get(), 7);
    }
}
