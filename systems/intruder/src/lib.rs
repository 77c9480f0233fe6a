#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Intruder path search over the building graph.
//!
//! The intruder enters through one of the exit doors and walks room to room.
//! Type 1 intruders always push one breadth-first level deeper and plan the
//! branch holding the most occupants. Types 2 and 3 greedily follow what they
//! can see a few rooms ahead, backtracking out of dead ends. Cycles in the
//! building are handled with per-element visit counters rather than by the
//! shape of the graph.

use std::collections::{BTreeSet, VecDeque};

use evac_attack_core::{geometry, Event, IntruderBehavior, IntruderSnapshot, TransitId, ZoneId};
use evac_attack_world::{levels::LevelField, query, World};

/// Number of rooms the predatory intruders look ahead.
pub const DEFAULT_VISION_DEPTH: u32 = 3;

/// Default walking speed in metres per minute.
pub const DEFAULT_SPEED: f64 = 60.0;

const MAX_SEARCH_DEPTH: usize = 64;

/// Errors raised while placing an intruder.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum IntruderError {
    /// The entry index does not name an exit door.
    #[error("entry door {index} does not exist, building has {exits} exits")]
    UnknownEntry {
        /// Requested entry index.
        index: usize,
        /// Number of exit doors in the building.
        exits: usize,
    },

    /// The walking speed is not a positive finite number.
    #[error("intruder speed must be positive, got {speed}")]
    InvalidSpeed {
        /// Requested speed in metres per minute.
        speed: f64,
    },
}

/// Parameters used to place an intruder.
#[derive(Clone, Debug, PartialEq)]
pub struct IntruderConfig {
    /// Index into the exit doors, in description order.
    pub entry: usize,
    /// Behaviour policy.
    pub behavior: IntruderBehavior,
    /// Walking speed in metres per minute.
    pub speed: f64,
    /// Plan the whole route at placement instead of step by step.
    pub precompute: bool,
    /// Rooms the intruder never enters as a forward move.
    pub disabled: Vec<ZoneId>,
    /// Rooms looked ahead by the predatory policies.
    pub vision_depth: u32,
}

impl Default for IntruderConfig {
    fn default() -> Self {
        Self {
            entry: 0,
            behavior: IntruderBehavior::Advance,
            speed: DEFAULT_SPEED,
            precompute: false,
            disabled: Vec::new(),
            vision_depth: DEFAULT_VISION_DEPTH,
        }
    }
}

/// Per-element crossing counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VisitCounts {
    zones: Vec<u32>,
    transits: Vec<u32>,
}

impl VisitCounts {
    /// Creates zeroed counters sized for the world.
    #[must_use]
    pub fn new(world: &World) -> Self {
        Self {
            zones: vec![0; world.zones().len()],
            transits: vec![0; world.transits().len()],
        }
    }

    /// Times the zone was entered.
    #[must_use]
    pub fn zone(&self, zone: ZoneId) -> u32 {
        self.zones.get(zone.index()).copied().unwrap_or(0)
    }

    /// Times the doorway was crossed.
    #[must_use]
    pub fn transit(&self, transit: TransitId) -> u32 {
        self.transits.get(transit.index()).copied().unwrap_or(0)
    }

    fn enter_zone(&mut self, zone: ZoneId) {
        if let Some(count) = self.zones.get_mut(zone.index()) {
            *count += 1;
        }
    }

    fn leave_zone(&mut self, zone: ZoneId) {
        if let Some(count) = self.zones.get_mut(zone.index()) {
            *count = count.saturating_sub(1);
        }
    }

    fn cross(&mut self, transit: TransitId) {
        if let Some(count) = self.transits.get_mut(transit.index()) {
            *count += 1;
        }
    }

    fn uncross(&mut self, transit: TransitId) {
        if let Some(count) = self.transits.get_mut(transit.index()) {
            *count = count.saturating_sub(1);
        }
    }
}

/// Where a searched move starts from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// Entering the building through an exit door.
    Entry(TransitId),
    /// Coming from a neighbouring room.
    Room(ZoneId),
}

/// Best branch found by [`Intruder::search`].
#[derive(Clone, Debug, PartialEq)]
pub struct SearchOutcome {
    /// Rooms of the branch, starting with the searched room.
    pub rooms: Vec<ZoneId>,
    /// Occupants present in those rooms at search time.
    pub victims: f64,
}

/// Single room-to-room move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Move {
    /// Room left.
    pub from: ZoneId,
    /// Room entered.
    pub to: ZoneId,
    /// Doorway crossed.
    pub door: TransitId,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Sight {
    people: f64,
    distance: f64,
}

/// Adversarial agent walking the building and removing occupants.
#[derive(Clone, Debug)]
pub struct Intruder {
    behavior: IntruderBehavior,
    speed: f64,
    vision_depth: u32,
    entry: TransitId,
    room: ZoneId,
    levels: LevelField,
    disabled: BTreeSet<ZoneId>,
    visits: VisitCounts,
    path: Vec<ZoneId>,
    plan: Option<VecDeque<ZoneId>>,
    victims: f64,
    halted: bool,
}

impl Intruder {
    /// Places the intruder in the room behind the configured entry door.
    pub fn new(world: &World, config: IntruderConfig) -> Result<Self, IntruderError> {
        if !(config.speed.is_finite() && config.speed > 0.0) {
            return Err(IntruderError::InvalidSpeed {
                speed: config.speed,
            });
        }
        let exits = query::exits(world);
        let entry = *exits
            .get(config.entry)
            .ok_or(IntruderError::UnknownEntry {
                index: config.entry,
                exits: exits.len(),
            })?;
        let room = world.transit(entry).zones()[0];

        let mut visits = VisitCounts::new(world);
        visits.cross(entry);
        visits.enter_zone(room);

        let mut intruder = Self {
            behavior: config.behavior,
            speed: config.speed,
            vision_depth: config.vision_depth,
            entry,
            room,
            levels: LevelField::from_root(world, room),
            disabled: config.disabled.into_iter().collect(),
            visits,
            path: vec![room],
            plan: None,
            victims: 0.0,
            halted: false,
        };

        if config.precompute {
            let mut visits = intruder.visits.clone();
            let outcome =
                intruder.search(world, Origin::Entry(entry), room, &mut visits, &mut Vec::new());
            intruder.plan = Some(outcome.rooms.into_iter().skip(1).collect());
        }

        tracing::info!(
            behavior = config.behavior.code(),
            entry = world.transit(entry).external_id(),
            room = world.zone(room).external_id(),
            max_level = intruder.levels.max_level(),
            "intruder placed"
        );
        Ok(intruder)
    }

    /// Candidate next rooms from `room` under the intruder's policy.
    ///
    /// Type 1 yields every forward neighbour; types 2 and 3 yield at most one
    /// room. `visits` is used as scratch space and is left unchanged.
    pub fn step_variants(
        &self,
        world: &World,
        room: ZoneId,
        visits: &mut VisitCounts,
        path: &[ZoneId],
    ) -> Vec<ZoneId> {
        if self.behavior == IntruderBehavior::Advance {
            let Some(forward) = self.levels.level(room).map(|level| level + 1) else {
                return Vec::new();
            };
            return query::neighbors(world, room)
                .map(|(_, next)| next)
                .filter(|&next| {
                    self.levels.level(next) == Some(forward) && !self.disabled.contains(&next)
                })
                .collect();
        }

        let candidates: Vec<ZoneId> = query::neighbors(world, room)
            .map(|(_, next)| next)
            .filter(|&next| visits.zone(next) == 0 && !self.disabled.contains(&next))
            .collect();

        if !candidates.is_empty() {
            let sights: Vec<Sight> = candidates
                .iter()
                .map(|&next| self.vision(world, next, room, visits, 0))
                .collect();
            return vec![self.choose(&candidates, &sights)];
        }

        for &back in path.iter().rev() {
            if back == room {
                continue;
            }
            if let Some(door) = query::shared_transit(world, room, back) {
                if visits.transit(door) <= 1 {
                    return vec![back];
                }
            }
        }
        Vec::new()
    }

    /// Exhaustive search for the branch holding the most occupants.
    ///
    /// The search enters `to` from `origin`, then recursively follows every
    /// variant. A branch ends when there are no variants, when the doorway
    /// just crossed has been used three times, or when `to` sits at the
    /// deepest level. Ties keep the first branch. `visits` and `path` are left
    /// unchanged on return.
    pub fn search(
        &self,
        world: &World,
        origin: Origin,
        to: ZoneId,
        visits: &mut VisitCounts,
        path: &mut Vec<ZoneId>,
    ) -> SearchOutcome {
        self.search_from(world, origin, to, visits, path, 0)
    }

    fn search_from(
        &self,
        world: &World,
        origin: Origin,
        to: ZoneId,
        visits: &mut VisitCounts,
        path: &mut Vec<ZoneId>,
        depth: usize,
    ) -> SearchOutcome {
        let door = match origin {
            Origin::Entry(door) => Some(door),
            Origin::Room(from) => query::shared_transit(world, from, to),
        };
        if let Some(door) = door {
            visits.cross(door);
        }
        visits.enter_zone(to);
        path.push(to);

        let gain = world.zone(to).num_people();
        let variants = self.step_variants(world, to, visits, path);
        let worn = door.is_some_and(|door| visits.transit(door) >= 3);

        let mut outcome = SearchOutcome {
            rooms: vec![to],
            victims: gain,
        };
        let terminal =
            variants.is_empty() || worn || self.levels.is_deepest(to) || depth >= MAX_SEARCH_DEPTH;
        if !terminal {
            let mut best: Option<SearchOutcome> = None;
            for next in variants {
                let branch =
                    self.search_from(world, Origin::Room(to), next, visits, path, depth + 1);
                if best.as_ref().map_or(true, |best| branch.victims > best.victims) {
                    best = Some(branch);
                }
            }
            if let Some(best) = best {
                outcome.rooms.extend(best.rooms);
                outcome.victims += best.victims;
            }
        }

        let _ = path.pop();
        visits.leave_zone(to);
        if let Some(door) = door {
            visits.uncross(door);
        }
        outcome
    }

    /// Advances the intruder by exactly one room.
    ///
    /// Returns the move made, or `None` when the intruder has no next room; in
    /// that case it halts and stays put from then on.
    pub fn step_next(&mut self, world: &World, out_events: &mut Vec<Event>) -> Option<Move> {
        if self.halted {
            return None;
        }
        let from = self.room();

        let next = if let Some(plan) = self.plan.as_mut() {
            plan.pop_front()
        } else if self.behavior == IntruderBehavior::Advance {
            self.replan_next(world)
        } else {
            let mut visits = std::mem::take(&mut self.visits);
            let next = self
                .step_variants(world, from, &mut visits, &self.path)
                .first()
                .copied();
            self.visits = visits;
            next
        };

        let Some((to, door)) = next.and_then(|to| {
            query::shared_transit(world, from, to).map(|door| (to, door))
        }) else {
            self.halted = true;
            tracing::info!(room = world.zone(from).external_id(), "intruder halted");
            out_events.push(Event::IntruderHalted { room: from });
            return None;
        };

        self.visits.enter_zone(to);
        self.visits.cross(door);
        self.path.push(to);
        self.room = to;
        tracing::info!(
            from = world.zone(from).external_id(),
            to = world.zone(to).external_id(),
            door = world.transit(door).external_id(),
            "intruder advanced"
        );
        out_events.push(Event::IntruderAdvanced { from, to, door });
        Some(Move { from, to, door })
    }

    fn replan_next(&self, world: &World) -> Option<ZoneId> {
        let (&to, before) = self.path.split_last()?;
        let origin = before
            .last()
            .map_or(Origin::Entry(self.entry), |&from| Origin::Room(from));
        let mut visits = self.visits.clone();
        let mut path = before.to_vec();
        let outcome = self.search(world, origin, to, &mut visits, &mut path);
        outcome.rooms.get(1).copied()
    }

    /// Distance walked so far, from the entry door through every room entered.
    #[must_use]
    pub fn path_len(&self, world: &World) -> f64 {
        let Some(&first) = self.path.first() else {
            return 0.0;
        };
        let entry = geometry::distance(
            world.transit(self.entry).centroid(),
            world.zone(first).centroid(),
        );
        let rooms: f64 = self
            .path
            .windows(2)
            .map(|pair| {
                geometry::distance(world.zone(pair[0]).centroid(), world.zone(pair[1]).centroid())
            })
            .sum();
        entry + rooms
    }

    /// Adds captured occupants to the running total.
    pub fn add_victims(&mut self, people: f64) {
        self.victims += people;
    }

    /// Room currently occupied.
    #[must_use]
    pub const fn room(&self) -> ZoneId {
        self.room
    }

    /// Rooms traversed so far, entry room first.
    #[must_use]
    pub fn path(&self) -> &[ZoneId] {
        &self.path
    }

    /// Breadth-first levels measured from the entry room.
    #[must_use]
    pub const fn levels(&self) -> &LevelField {
        &self.levels
    }

    /// Crossing counters accumulated by actual moves.
    #[must_use]
    pub const fn visits(&self) -> &VisitCounts {
        &self.visits
    }

    /// Remaining precomputed rooms, if the route was planned up front.
    #[must_use]
    pub fn plan(&self) -> Option<&VecDeque<ZoneId>> {
        self.plan.as_ref()
    }

    /// Entry doorway.
    #[must_use]
    pub const fn entry(&self) -> TransitId {
        self.entry
    }

    /// Behaviour policy.
    #[must_use]
    pub const fn behavior(&self) -> IntruderBehavior {
        self.behavior
    }

    /// Walking speed in metres per minute.
    #[must_use]
    pub const fn speed(&self) -> f64 {
        self.speed
    }

    /// Occupants captured so far.
    #[must_use]
    pub const fn victims(&self) -> f64 {
        self.victims
    }

    /// Whether the intruder found no further room.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    /// Captures an immutable view of the intruder.
    #[must_use]
    pub fn snapshot(&self) -> IntruderSnapshot {
        IntruderSnapshot {
            behavior: self.behavior,
            entry: self.entry,
            room: self.room(),
            path: self.path.clone(),
            victims: self.victims,
            halted: self.halted,
        }
    }

    /// Occupants and distance visible from `room`, entered from `previous`.
    fn vision(
        &self,
        world: &World,
        room: ZoneId,
        previous: ZoneId,
        visits: &mut VisitCounts,
        depth: u32,
    ) -> Sight {
        let mut sight = Sight {
            people: world.zone(room).num_people(),
            distance: geometry::distance(
                world.zone(previous).centroid(),
                world.zone(room).centroid(),
            ),
        };
        if depth >= self.vision_depth {
            return sight;
        }

        visits.enter_zone(room);
        for (_, next) in query::neighbors(world, room) {
            if visits.zone(next) != 0 {
                continue;
            }
            let beyond = self.vision(world, next, room, visits, depth + 1);
            sight.people += beyond.people;
            sight.distance += beyond.distance;
        }
        visits.leave_zone(room);
        sight
    }

    fn choose(&self, candidates: &[ZoneId], sights: &[Sight]) -> ZoneId {
        let scores: Vec<f64> = sights.iter().map(|sight| self.score(*sight)).collect();
        let best = first_max(&scores);
        if scores[best] > 0.0 {
            return candidates[best];
        }

        let top_level = candidates
            .iter()
            .map(|&zone| self.levels.level(zone))
            .max()
            .flatten();
        let mut choice: Option<(ZoneId, f64)> = None;
        for (&zone, sight) in candidates.iter().zip(sights) {
            if self.levels.level(zone) != top_level {
                continue;
            }
            if choice.map_or(true, |(_, distance)| sight.distance > distance) {
                choice = Some((zone, sight.distance));
            }
        }
        choice.map_or(candidates[best], |(zone, _)| zone)
    }

    fn score(&self, sight: Sight) -> f64 {
        match self.behavior {
            IntruderBehavior::Efficient => efficiency(sight),
            IntruderBehavior::Advance | IntruderBehavior::Predatory => sight.people,
        }
    }
}

/// Occupants per metre; a zero-length view is worth everything if anybody is
/// in it and nothing otherwise.
fn efficiency(sight: Sight) -> f64 {
    if sight.distance > 0.0 {
        sight.people / sight.distance
    } else if sight.people > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

fn first_max(values: &[f64]) -> usize {
    let mut best = 0;
    for (index, &value) in values.iter().enumerate().skip(1) {
        if value > values[best] {
            best = index;
        }
    }
    best
}
