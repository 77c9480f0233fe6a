#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Potential-field crowd flow that drains zones towards the exterior sinks.
//!
//! Every step starts at the safety zones and walks the building backwards:
//! the receiving node with the lowest potential pulls people from each zone
//! behind its unvisited doorways, and those givers are queued in turn. The
//! amount moved through a doorway follows the density-dependent speed laws of
//! [`VelocityModel`].

use std::{cmp::Reverse, collections::BinaryHeap};

use evac_attack_core::{
    Command, Event, Node, TransitId, ZoneId, ZoneKind, MAX_DENSITY, MIN_DENSITY, MODELLING_STEP,
};
use evac_attack_system_velocity::{PathKind, VelocityError, VelocityModel};
use evac_attack_world::{self as world, World};
use ordered_float::OrderedFloat;

const ELEVATION_TOLERANCE: f64 = 1e-3;

/// Errors raised while advancing the crowd.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrowdFlowError {
    /// The velocity model rejected a request.
    #[error("velocity model failed: {0}")]
    Velocity(#[from] VelocityError),
}

/// Summary of a single crowd-flow step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepReport {
    /// Number of doorways that carried a transfer, including empty ones.
    pub transfers: usize,
    /// People moved between any two nodes.
    pub moved: f64,
    /// People that reached a safety zone.
    pub escaped: f64,
    /// Transfers cut down to the giving zone's population.
    pub clamped: usize,
}

/// Crowd-flow engine advancing the occupant distribution by fixed steps.
#[derive(Debug, Default)]
pub struct CrowdFlow {
    velocity: VelocityModel,
    queue: FlowQueue,
}

impl CrowdFlow {
    /// Creates an engine using the provided velocity model.
    #[must_use]
    pub fn new(velocity: VelocityModel) -> Self {
        Self {
            velocity,
            queue: FlowQueue::default(),
        }
    }

    /// Moves people one step closer to safety and advances the clock.
    pub fn step(
        &mut self,
        world: &mut World,
        out_events: &mut Vec<Event>,
    ) -> Result<StepReport, CrowdFlowError> {
        world.begin_flow_step();
        self.queue.reset(world.zones().len());
        for sink in world.safety_zones() {
            self.queue.push(Node::Safety(sink.id()), 0.0);
        }

        let mut report = StepReport::default();
        while let Some(receiving) = self.queue.pop() {
            for index in 0..world.node_transits(receiving).len() {
                let transit = world.node_transits(receiving)[index];
                self.pull_through(world, transit, receiving, &mut report, out_events)?;
            }
        }

        world::apply(
            world,
            Command::AdvanceClock { dt: MODELLING_STEP },
            out_events,
        );

        tracing::debug!(
            time = world.time(),
            transfers = report.transfers,
            moved = report.moved,
            escaped = report.escaped,
            "crowd step"
        );
        Ok(report)
    }

    fn pull_through(
        &mut self,
        world: &mut World,
        transit: TransitId,
        receiving: Node,
        report: &mut StepReport,
        out_events: &mut Vec<Event>,
    ) -> Result<(), CrowdFlowError> {
        let record = world.transit(transit);
        if record.is_visited() || record.is_blocked() {
            return Ok(());
        }
        let width = record.width();
        let Some((giving, direction)) = giver(record.zones(), receiving) else {
            return Ok(());
        };
        if world.zone(giving).is_blocked() {
            return Ok(());
        }

        let requested = self.part_of_people_flow(world, receiving, giving, width)?;
        let available = world.zone(giving).num_people();
        let moved = if requested > available {
            tracing::warn!(
                transit = world.transit(transit).external_id(),
                zone = world.zone(giving).external_id(),
                requested,
                available,
                "transfer clamped to giving zone population"
            );
            out_events.push(Event::TransferClamped {
                transit,
                zone: giving,
                requested,
                available,
            });
            report.clamped += 1;
            available
        } else {
            requested
        };

        world.transfer(transit, giving, receiving, moved, direction);
        report.transfers += 1;
        report.moved += moved;
        if matches!(receiving, Node::Safety(_)) {
            report.escaped += moved;
        }

        let newly_queued = world.zone(giving).transits().len() > 1 && !self.queue.contains(giving);
        let exit_speed = self.speed_at_exit(world, receiving, giving, width)?;
        let candidate = world.potential(receiving) + world.zone(giving).area().sqrt() / exit_speed;
        let route = world.route(receiving);
        let improved = world.relax_potential(giving, transit, candidate, route);
        if newly_queued || (improved && self.queue.contains(giving)) {
            self.queue.push(Node::Zone(giving), world.zone(giving).potential());
        }
        Ok(())
    }

    /// People that can move from `giving` into `receiving` during one step.
    fn part_of_people_flow(
        &self,
        world: &World,
        receiving: Node,
        giving: ZoneId,
        width: f64,
    ) -> Result<f64, CrowdFlowError> {
        let giver = world.zone(giving);
        let speed = self.speed_at_exit(world, receiving, giving, width)?;
        let mut flow = giver.density() * speed * width * MODELLING_STEP;
        if giver.density() <= MIN_DENSITY {
            flow = giver.num_people();
        }

        let Node::Zone(receiving) = receiving else {
            return Ok(flow);
        };
        let receiver = world.zone(receiving);
        let capacity = MAX_DENSITY * receiver.area() - receiver.num_people();
        if capacity < 0.0 {
            return Ok(0.0);
        }
        Ok(flow.min(capacity))
    }

    fn speed_at_exit(
        &self,
        world: &World,
        receiving: Node,
        giving: ZoneId,
        width: f64,
    ) -> Result<f64, CrowdFlowError> {
        let zone_speed = self.speed_in_element(world, receiving, giving)?;
        let transit_speed = self
            .velocity
            .speed_through_transit(width, world.zone(giving).density());
        Ok(zone_speed.min(transit_speed))
    }

    fn speed_in_element(
        &self,
        world: &World,
        receiving: Node,
        giving: ZoneId,
    ) -> Result<f64, CrowdFlowError> {
        let giver = world.zone(giving);
        let Node::Zone(receiving) = receiving else {
            return Ok(self.velocity.speed_in_room(giver.density()));
        };
        let receiver = world.zone(receiving);
        let rise = receiver.elevation() - giver.elevation();
        if receiver.kind() != ZoneKind::Staircase || rise.abs() <= ELEVATION_TOLERANCE {
            return Ok(self.velocity.speed_in_room(giver.density()));
        }

        let direction = if rise < 0.0 {
            PathKind::StairDown
        } else {
            PathKind::StairUp
        };
        Ok(self.velocity.speed_on_stair(direction, giver.density())?)
    }
}

/// Zone on the far side of a doorway from `receiving`, with the flow sign.
fn giver(zones: &[ZoneId], receiving: Node) -> Option<(ZoneId, f64)> {
    let &first = zones.first()?;
    if Node::Zone(first) != receiving {
        return Some((first, 1.0));
    }
    let &second = zones.get(1)?;
    (Node::Zone(second) != receiving).then_some((second, -1.0))
}

/// Min-priority work queue keyed by potential, ties resolved by insertion.
///
/// Entries are invalidated lazily: a zone keeps only its latest sequence
/// number, and every (re)prioritisation hands out a fresh one. This orders
/// ties exactly like appending to a list and stably re-sorting it.
#[derive(Debug, Default)]
struct FlowQueue {
    heap: BinaryHeap<Reverse<(OrderedFloat<f64>, u64, Node)>>,
    live: Vec<Option<u64>>,
    next_sequence: u64,
}

impl FlowQueue {
    fn reset(&mut self, zone_count: usize) {
        self.heap.clear();
        self.live.clear();
        self.live.resize(zone_count, None);
        self.next_sequence = 0;
    }

    fn push(&mut self, node: Node, potential: f64) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        if let Node::Zone(zone) = node {
            if let Some(slot) = self.live.get_mut(zone.index()) {
                *slot = Some(sequence);
            }
        }
        self.heap
            .push(Reverse((OrderedFloat(potential), sequence, node)));
    }

    fn contains(&self, zone: ZoneId) -> bool {
        matches!(self.live.get(zone.index()), Some(Some(_)))
    }

    fn pop(&mut self) -> Option<Node> {
        while let Some(Reverse((_, sequence, node))) = self.heap.pop() {
            match node {
                Node::Safety(_) => return Some(node),
                Node::Zone(zone) => {
                    let Some(slot) = self.live.get_mut(zone.index()) else {
                        continue;
                    };
                    if *slot != Some(sequence) {
                        continue;
                    }
                    *slot = None;
                    return Some(node);
                }
            }
        }
        None
    }
}
