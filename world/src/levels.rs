//! Breadth-first level field used by the intruder planner.

use std::collections::VecDeque;

use evac_attack_core::ZoneId;

use crate::{query, World};

/// Hop distance of every zone from a root zone over interior doorways.
///
/// Exit doors never join two zones, so they do not contribute edges. Zones the
/// search cannot reach keep no level, which callers treat as "never a forward
/// candidate".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LevelField {
    levels: Vec<Option<u32>>,
    max_level: u32,
}

impl LevelField {
    /// Runs a breadth-first search from `root` across the world's zones.
    #[must_use]
    pub fn from_root(world: &World, root: ZoneId) -> Self {
        let mut levels = vec![None; world.zones().len()];
        let mut max_level = 0;
        let mut queue = VecDeque::new();

        if let Some(slot) = levels.get_mut(root.index()) {
            *slot = Some(0);
            queue.push_back(root);
        }

        while let Some(zone) = queue.pop_front() {
            let Some(current) = levels[zone.index()] else {
                continue;
            };
            let next = current + 1;

            for (_, neighbor) in query::neighbors(world, zone) {
                let slot = &mut levels[neighbor.index()];
                if slot.is_some() {
                    continue;
                }
                *slot = Some(next);
                max_level = max_level.max(next);
                queue.push_back(neighbor);
            }
        }

        Self {
            levels,
            max_level,
        }
    }

    /// Level captured for the zone, if it was reached.
    #[must_use]
    pub fn level(&self, zone: ZoneId) -> Option<u32> {
        self.levels.get(zone.index()).copied().flatten()
    }

    /// Deepest level reached by the search.
    #[must_use]
    pub const fn max_level(&self) -> u32 {
        self.max_level
    }

    /// Whether the zone sits at the deepest level.
    #[must_use]
    pub fn is_deepest(&self, zone: ZoneId) -> bool {
        self.level(zone) == Some(self.max_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ElementRef;

    // A - B - C in a line, with D hanging off A and an exit on A.
    const CHAIN: &str = r#"{
        "Level": [{
            "Name": "ground",
            "ZLevel": 0.0,
            "BuildElement": [
                {"Id": "A", "Sign": "Room", "XY": [[[0,0],[4,0],[4,4],[0,4],[0,0]]], "Output": ["AB", "AD", "EXIT"]},
                {"Id": "B", "Sign": "Room", "XY": [[[4,0],[8,0],[8,4],[4,4],[4,0]]], "Output": ["AB", "BC"]},
                {"Id": "C", "Sign": "Room", "XY": [[[8,0],[12,0],[12,4],[8,4],[8,0]]], "Output": ["BC"]},
                {"Id": "D", "Sign": "Room", "XY": [[[0,4],[4,4],[4,8],[0,8],[0,4]]], "Output": ["AD"]},
                {"Id": "E", "Sign": "Room", "XY": [[[20,0],[24,0],[24,4],[20,4],[20,0]]], "Output": []},
                {"Id": "AB", "Sign": "DoorWayInt", "XY": [[[4,1],[4,2],[4.2,2],[4.2,1],[4,1]]], "Output": ["A", "B"]},
                {"Id": "BC", "Sign": "DoorWay", "XY": [[[8,1],[8,2],[8.2,2],[8.2,1],[8,1]]], "Output": ["B", "C"]},
                {"Id": "AD", "Sign": "DoorWayInt", "XY": [[[1,4],[2,4],[2,4.2],[1,4.2],[1,4]]], "Output": ["A", "D"]},
                {"Id": "EXIT", "Sign": "DoorWayOut", "XY": [[[0,1],[0,2],[-0.2,2],[-0.2,1],[0,1]]], "Output": ["A"]}
            ]
        }]
    }"#;

    fn zone(world: &World, id: &str) -> ZoneId {
        match query::lookup(world, id) {
            Some(ElementRef::Zone(zone)) => zone,
            other => panic!("expected zone for {id}, got {other:?}"),
        }
    }

    #[test]
    fn levels_are_hop_distances() {
        let world = World::from_json_str(CHAIN).expect("valid building");
        let field = LevelField::from_root(&world, zone(&world, "A"));

        assert_eq!(field.level(zone(&world, "A")), Some(0));
        assert_eq!(field.level(zone(&world, "B")), Some(1));
        assert_eq!(field.level(zone(&world, "D")), Some(1));
        assert_eq!(field.level(zone(&world, "C")), Some(2));
        assert_eq!(field.max_level(), 2);
        assert!(field.is_deepest(zone(&world, "C")));
    }

    #[test]
    fn unreachable_zones_have_no_level() {
        let world = World::from_json_str(CHAIN).expect("valid building");
        let field = LevelField::from_root(&world, zone(&world, "A"));

        assert_eq!(field.level(zone(&world, "E")), None);
    }

    #[test]
    fn single_room_has_zero_max_level() {
        let world = World::from_json_str(CHAIN).expect("valid building");
        let field = LevelField::from_root(&world, zone(&world, "E"));

        assert_eq!(field.max_level(), 0);
        assert!(field.is_deepest(zone(&world, "E")));
    }
}
