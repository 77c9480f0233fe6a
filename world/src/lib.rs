#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative building state for the evacuation-and-intrusion engine.
//!
//! The world owns a typed arena of zones, doorways and exterior sinks that is
//! built once from a building description and then mutated in place for the
//! lifetime of a simulation. Everything else refers to those records through
//! [`ZoneId`], [`TransitId`] and [`SafetyZoneId`].

mod building;
pub mod levels;

use std::collections::BTreeMap;

use evac_attack_core::{
    geometry::Polygon, Command, Event, Node, SafetyZoneId, TransitId, TransitKind, ZoneId,
    ZoneKind,
};
use glam::DVec2;

pub use building::{BuildingDescription, BuildingError, ElementDescription, LevelDescription};

/// Room or staircase record stored inside the world arena.
#[derive(Clone, Debug)]
pub struct Zone {
    id: ZoneId,
    external_id: String,
    name: Option<String>,
    kind: ZoneKind,
    polygon: Polygon,
    area: f64,
    elevation: f64,
    transits: Vec<TransitId>,
    num_people: f64,
    density: f64,
    blocked: bool,
    visited: bool,
    potential: f64,
    route: Option<TransitId>,
}

impl Zone {
    /// Arena identifier of the zone.
    #[must_use]
    pub const fn id(&self) -> ZoneId {
        self.id
    }

    /// Element identifier taken from the building description.
    #[must_use]
    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    /// Human readable name, if the description carried one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Room or staircase.
    #[must_use]
    pub const fn kind(&self) -> ZoneKind {
        self.kind
    }

    /// Floor area in square metres.
    #[must_use]
    pub const fn area(&self) -> f64 {
        self.area
    }

    /// Elevation of the zone floor in metres.
    #[must_use]
    pub const fn elevation(&self) -> f64 {
        self.elevation
    }

    /// Doorways attached to the zone in description order.
    #[must_use]
    pub fn transits(&self) -> &[TransitId] {
        &self.transits
    }

    /// Current number of occupants.
    #[must_use]
    pub const fn num_people(&self) -> f64 {
        self.num_people
    }

    /// Current density in persons per square metre.
    #[must_use]
    pub const fn density(&self) -> f64 {
        self.density
    }

    /// Whether the zone is excluded from flow.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Whether the zone gave people during the current or last step.
    #[must_use]
    pub const fn is_visited(&self) -> bool {
        self.visited
    }

    /// Routing cost towards safety; infinite when unreached this step.
    #[must_use]
    pub const fn potential(&self) -> f64 {
        self.potential
    }

    /// Exit doorway the zone currently drains towards.
    #[must_use]
    pub const fn route(&self) -> Option<TransitId> {
        self.route
    }

    /// Reference point used for travel distances.
    #[must_use]
    pub fn centroid(&self) -> DVec2 {
        self.polygon.centroid()
    }

    fn set_people(&mut self, people: f64) {
        self.num_people = people.max(0.0);
        self.density = self.num_people / self.area;
    }
}

/// Doorway record stored inside the world arena.
#[derive(Clone, Debug)]
pub struct Transit {
    id: TransitId,
    external_id: String,
    kind: TransitKind,
    polygon: Polygon,
    width: f64,
    zones: Vec<ZoneId>,
    blocked: bool,
    visited: bool,
    flow: f64,
    route: Option<TransitId>,
}

impl Transit {
    /// Arena identifier of the doorway.
    #[must_use]
    pub const fn id(&self) -> TransitId {
        self.id
    }

    /// Element identifier taken from the building description.
    #[must_use]
    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    /// Interior door, opening or exit.
    #[must_use]
    pub const fn kind(&self) -> TransitKind {
        self.kind
    }

    /// Clear width in metres, taken as the longest outline edge.
    #[must_use]
    pub const fn width(&self) -> f64 {
        self.width
    }

    /// Connected zones; one for exits, two for interior doorways.
    #[must_use]
    pub fn zones(&self) -> &[ZoneId] {
        &self.zones
    }

    /// Whether the doorway is closed.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Whether the doorway carried flow during the current or last step.
    #[must_use]
    pub const fn is_visited(&self) -> bool {
        self.visited
    }

    /// People moved through the doorway this step, negative when flowing
    /// towards the first connected zone.
    #[must_use]
    pub const fn flow(&self) -> f64 {
        self.flow
    }

    /// Exit doorway the flow through this doorway is routed towards.
    #[must_use]
    pub const fn route(&self) -> Option<TransitId> {
        self.route
    }

    /// Reference point used for travel distances.
    #[must_use]
    pub fn centroid(&self) -> DVec2 {
        self.polygon.centroid()
    }
}

/// Exterior sink attached to a single exit doorway.
#[derive(Clone, Debug)]
pub struct SafetyZone {
    id: SafetyZoneId,
    exit: TransitId,
    num_people: f64,
}

impl SafetyZone {
    /// Arena identifier of the sink.
    #[must_use]
    pub const fn id(&self) -> SafetyZoneId {
        self.id
    }

    /// Exit doorway feeding the sink.
    #[must_use]
    pub const fn exit(&self) -> TransitId {
        self.exit
    }

    /// People that reached safety through this exit.
    #[must_use]
    pub const fn num_people(&self) -> f64 {
        self.num_people
    }
}

/// Arena element resolved from an external identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementRef {
    /// Room or staircase.
    Zone(ZoneId),
    /// Doorway.
    Transit(TransitId),
}

/// Represents the authoritative building state.
#[derive(Clone, Debug)]
pub struct World {
    zones: Vec<Zone>,
    transits: Vec<Transit>,
    safety_zones: Vec<SafetyZone>,
    lookup: BTreeMap<String, ElementRef>,
    time: f64,
}

impl World {
    /// Builds a world from a parsed building description.
    pub fn from_description(description: &BuildingDescription) -> Result<Self, BuildingError> {
        building::ingest(description)
    }

    /// Parses and validates a building description from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, BuildingError> {
        let description: BuildingDescription = serde_json::from_str(json)?;
        Self::from_description(&description)
    }

    /// Parses and validates a building description from a reader.
    pub fn from_reader(reader: impl std::io::Read) -> Result<Self, BuildingError> {
        let description: BuildingDescription = serde_json::from_reader(reader)?;
        Self::from_description(&description)
    }

    /// Retrieves a zone record.
    ///
    /// # Panics
    ///
    /// Panics when the identifier was not issued by this world.
    #[must_use]
    pub fn zone(&self, id: ZoneId) -> &Zone {
        &self.zones[id.index()]
    }

    /// Retrieves a doorway record.
    ///
    /// # Panics
    ///
    /// Panics when the identifier was not issued by this world.
    #[must_use]
    pub fn transit(&self, id: TransitId) -> &Transit {
        &self.transits[id.index()]
    }

    /// Retrieves an exterior sink record.
    ///
    /// # Panics
    ///
    /// Panics when the identifier was not issued by this world.
    #[must_use]
    pub fn safety_zone(&self, id: SafetyZoneId) -> &SafetyZone {
        &self.safety_zones[id.index()]
    }

    /// All zones in arena order.
    #[must_use]
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// All doorways in arena order.
    #[must_use]
    pub fn transits(&self) -> &[Transit] {
        &self.transits
    }

    /// All exterior sinks in exit order.
    #[must_use]
    pub fn safety_zones(&self) -> &[SafetyZone] {
        &self.safety_zones
    }

    /// Simulation clock in minutes.
    #[must_use]
    pub const fn time(&self) -> f64 {
        self.time
    }

    /// Routing cost of either kind of node; sinks are always zero.
    #[must_use]
    pub fn potential(&self, node: Node) -> f64 {
        match node {
            Node::Zone(zone) => self.zone(zone).potential,
            Node::Safety(_) => 0.0,
        }
    }

    /// Exit doorway a node drains towards; a sink drains through its own exit.
    #[must_use]
    pub fn route(&self, node: Node) -> Option<TransitId> {
        match node {
            Node::Zone(zone) => self.zone(zone).route,
            Node::Safety(sink) => Some(self.safety_zone(sink).exit),
        }
    }

    /// Doorways attached to either kind of node.
    #[must_use]
    pub fn node_transits(&self, node: Node) -> &[TransitId] {
        match node {
            Node::Zone(zone) => &self.zone(zone).transits,
            Node::Safety(sink) => std::slice::from_ref(&self.safety_zone(sink).exit),
        }
    }

    /// Clears the per-step transient state ahead of a crowd-flow step.
    pub fn begin_flow_step(&mut self) {
        for transit in &mut self.transits {
            transit.visited = false;
            transit.flow = 0.0;
            transit.route = None;
        }
        for zone in &mut self.zones {
            zone.visited = false;
            zone.potential = f64::INFINITY;
            zone.route = None;
        }
    }

    /// Moves people from a giving zone through a doorway into a receiving node.
    ///
    /// Both populations and densities are updated, the doorway records the
    /// signed flow, and the giving zone and doorway are marked visited. Sinks
    /// have no area, so only their head count changes.
    pub fn transfer(
        &mut self,
        transit: TransitId,
        giving: ZoneId,
        receiving: Node,
        people: f64,
        direction: f64,
    ) {
        match receiving {
            Node::Zone(zone) => {
                let record = &mut self.zones[zone.index()];
                let people_after = record.num_people + people;
                record.set_people(people_after);
            }
            Node::Safety(sink) => self.safety_zones[sink.index()].num_people += people,
        }

        let giver = &mut self.zones[giving.index()];
        let people_after = giver.num_people - people;
        giver.set_people(people_after);
        giver.visited = true;

        let doorway = &mut self.transits[transit.index()];
        doorway.flow = people * direction;
        doorway.visited = true;
    }

    /// Lowers a zone's routing cost when the candidate improves on it.
    ///
    /// On improvement the route tag is copied onto the zone and the doorway the
    /// cost was propagated through. Returns whether the potential changed.
    pub fn relax_potential(
        &mut self,
        zone: ZoneId,
        transit: TransitId,
        potential: f64,
        route: Option<TransitId>,
    ) -> bool {
        let record = &mut self.zones[zone.index()];
        if potential >= record.potential {
            return false;
        }
        record.potential = potential;
        record.route = route;
        self.transits[transit.index()].route = route;
        true
    }

    fn zone_mut(&mut self, id: ZoneId) -> Option<&mut Zone> {
        self.zones.get_mut(id.index())
    }

    fn transit_mut(&mut self, id: TransitId) -> Option<&mut Transit> {
        self.transits.get_mut(id.index())
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::SetDensity { density } => {
            let density = density.max(0.0);
            for zone in &mut world.zones {
                zone.density = density;
            }
            out_events.push(Event::DensityAssigned { density });
        }
        Command::SetPeopleByDensity => {
            for zone in &mut world.zones {
                zone.num_people = zone.density * zone.area;
                out_events.push(Event::ZonePopulationChanged {
                    zone: zone.id,
                    people: zone.num_people,
                });
            }
        }
        Command::SetZonePopulation { zone, people } => {
            if let Some(record) = world.zone_mut(zone) {
                record.set_people(people);
                out_events.push(Event::ZonePopulationChanged {
                    zone,
                    people: record.num_people,
                });
            }
        }
        Command::SetZoneBlocked { zone, blocked } => {
            if let Some(record) = world.zone_mut(zone) {
                if record.blocked != blocked {
                    record.blocked = blocked;
                    out_events.push(Event::ZoneBlockChanged { zone, blocked });
                }
            }
        }
        Command::SetTransitBlocked { transit, blocked } => {
            if let Some(record) = world.transit_mut(transit) {
                if record.blocked != blocked {
                    record.blocked = blocked;
                    out_events.push(Event::TransitBlockChanged { transit, blocked });
                }
            }
        }
        Command::ResetSafetyZones => {
            for sink in &mut world.safety_zones {
                sink.num_people = 0.0;
            }
            out_events.push(Event::SafetyZonesReset);
        }
        Command::CaptureZone { zone } => {
            if let Some(record) = world.zone_mut(zone) {
                let people = record.num_people;
                record.set_people(0.0);
                record.blocked = true;
                out_events.push(Event::ZoneCaptured { zone, people });
            }
        }
        Command::AdvanceClock { dt } => {
            world.time += dt;
            out_events.push(Event::TimeAdvanced {
                dt,
                time: world.time,
            });
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use evac_attack_core::{SafetyZoneSnapshot, TransitId, TransitSnapshot, ZoneId, ZoneSnapshot};

    use super::{ElementRef, World};

    /// Resolves an element identifier from the building description.
    #[must_use]
    pub fn lookup(world: &World, external_id: &str) -> Option<ElementRef> {
        world.lookup.get(external_id).copied()
    }

    /// Exit doorways in description order; the index selects an intruder entry.
    #[must_use]
    pub fn exits(world: &World) -> Vec<TransitId> {
        world.safety_zones.iter().map(|sink| sink.exit).collect()
    }

    /// Rooms reachable from `zone` through a single interior doorway.
    ///
    /// Each neighbour is yielded together with the doorway crossed to reach it,
    /// in the zone's doorway order. Exit doors never contribute neighbours.
    pub fn neighbors(
        world: &World,
        zone: ZoneId,
    ) -> impl Iterator<Item = (TransitId, ZoneId)> + '_ {
        world
            .zone(zone)
            .transits
            .iter()
            .map(move |&transit| world.transit(transit))
            .filter(|transit| transit.kind.is_passable_inside())
            .flat_map(move |transit| {
                transit
                    .zones
                    .iter()
                    .copied()
                    .filter(move |&other| other != zone)
                    .map(move |other| (transit.id, other))
            })
    }

    /// First doorway shared by two distinct zones, if any.
    #[must_use]
    pub fn shared_transit(world: &World, first: ZoneId, second: ZoneId) -> Option<TransitId> {
        if first == second {
            return None;
        }
        let candidates = &world.zone(second).transits;
        world
            .zone(first)
            .transits
            .iter()
            .copied()
            .find(|transit| candidates.contains(transit))
    }

    /// Total number of people still inside the building.
    #[must_use]
    pub fn building_population(world: &World) -> f64 {
        world.zones.iter().map(|zone| zone.num_people).sum()
    }

    /// Total number of people that reached any safety zone.
    #[must_use]
    pub fn evacuated(world: &World) -> f64 {
        world.safety_zones.iter().map(|sink| sink.num_people).sum()
    }

    /// People left in zones that gave occupants during the last step.
    ///
    /// A full run is over once this drops to zero.
    #[must_use]
    pub fn pending_evacuees(world: &World) -> f64 {
        world
            .zones
            .iter()
            .filter(|zone| zone.visited)
            .map(|zone| zone.num_people)
            .sum()
    }

    /// Captures immutable views of every zone in arena order.
    #[must_use]
    pub fn zone_snapshots(world: &World) -> Vec<ZoneSnapshot> {
        world
            .zones
            .iter()
            .map(|zone| ZoneSnapshot {
                id: zone.id,
                external_id: zone.external_id.clone(),
                name: zone.name.clone(),
                kind: zone.kind,
                num_people: zone.num_people,
                density: zone.density,
                is_visited: zone.visited,
                is_blocked: zone.blocked,
                potential: zone.potential.is_finite().then_some(zone.potential),
                route: zone.route,
            })
            .collect()
    }

    /// Captures immutable views of every doorway in arena order.
    #[must_use]
    pub fn transit_snapshots(world: &World) -> Vec<TransitSnapshot> {
        world
            .transits
            .iter()
            .map(|transit| TransitSnapshot {
                id: transit.id,
                external_id: transit.external_id.clone(),
                kind: transit.kind,
                width: transit.width,
                flow: transit.flow,
                is_visited: transit.visited,
                is_blocked: transit.blocked,
                route: transit.route,
            })
            .collect()
    }

    /// Captures immutable views of every exterior sink in exit order.
    #[must_use]
    pub fn safety_zone_snapshots(world: &World) -> Vec<SafetyZoneSnapshot> {
        world
            .safety_zones
            .iter()
            .map(|sink| SafetyZoneSnapshot {
                id: sink.id,
                exit: sink.exit,
                num_people: sink.num_people,
            })
            .collect()
    }
}
