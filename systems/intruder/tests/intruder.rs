use evac_attack_core::{Command, Event, IntruderBehavior, ZoneId};
use evac_attack_system_intruder::{Intruder, IntruderConfig, IntruderError};
use evac_attack_world::{self as world, query, ElementRef, World};

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

// A at the root, B and C one level deeper, D behind B and E behind C.
const TREE: &str = r#"{
    "Level": [{
        "NameLevel": "ground",
        "ZLevel": 0.0,
        "BuildElement": [
            {"Id": "A", "Sign": "Room", "NumPeople": 2, "XY": [[[0,0],[4,0],[4,4],[0,4],[0,0]]], "Output": ["X", "AB", "AC"]},
            {"Id": "B", "Sign": "Room", "NumPeople": 1, "XY": [[[4,0],[8,0],[8,4],[4,4],[4,0]]], "Output": ["AB", "BD"]},
            {"Id": "C", "Sign": "Room", "NumPeople": 4, "XY": [[[0,4],[4,4],[4,8],[0,8],[0,4]]], "Output": ["AC", "CE"]},
            {"Id": "D", "Sign": "Room", "NumPeople": 5, "XY": [[[8,0],[12,0],[12,4],[8,4],[8,0]]], "Output": ["BD"]},
            {"Id": "E", "Sign": "Room", "NumPeople": 0, "XY": [[[0,8],[4,8],[4,16],[0,16],[0,8]]], "Output": ["CE"]},
            {"Id": "AB", "Sign": "DoorWayInt", "XY": [[[4,1],[4,2],[4.1,2],[4.1,1],[4,1]]], "Output": ["A", "B"]},
            {"Id": "AC", "Sign": "DoorWayInt", "XY": [[[1,4],[2,4],[2,4.1],[1,4.1],[1,4]]], "Output": ["A", "C"]},
            {"Id": "BD", "Sign": "DoorWay", "XY": [[[8,1],[8,2],[8.1,2],[8.1,1],[8,1]]], "Output": ["B", "D"]},
            {"Id": "CE", "Sign": "DoorWay", "XY": [[[1,8],[2,8],[2,8.1],[1,8.1],[1,8]]], "Output": ["C", "E"]},
            {"Id": "X", "Sign": "DoorWayOut", "XY": [[[0,1],[0,2],[-0.1,2],[-0.1,1],[0,1]]], "Output": ["A"]}
        ]
    }]
}"#;

// A small crowd next door and a larger one far away.
const NEAR_FAR: &str = r#"{
    "Level": [{
        "NameLevel": "ground",
        "ZLevel": 0.0,
        "BuildElement": [
            {"Id": "A", "Sign": "Room", "XY": [[[0,0],[4,0],[4,4],[0,4],[0,0]]], "Output": ["X", "AN", "AF"]},
            {"Id": "N", "Sign": "Room", "NumPeople": 3, "XY": [[[4,0],[6,0],[6,4],[4,4],[4,0]]], "Output": ["AN"]},
            {"Id": "F", "Sign": "Room", "NumPeople": 6, "XY": [[[0,4],[4,4],[4,24],[0,24],[0,4]]], "Output": ["AF"]},
            {"Id": "AN", "Sign": "DoorWayInt", "XY": [[[4,1],[4,2],[4.1,2],[4.1,1],[4,1]]], "Output": ["A", "N"]},
            {"Id": "AF", "Sign": "DoorWayInt", "XY": [[[1,4],[2,4],[2,4.1],[1,4.1],[1,4]]], "Output": ["A", "F"]},
            {"Id": "X", "Sign": "DoorWayOut", "XY": [[[0,1],[0,2],[-0.1,2],[-0.1,1],[0,1]]], "Output": ["A"]}
        ]
    }]
}"#;

// Two dead-end rooms hanging off the entry room.
const STAR: &str = r#"{
    "Level": [{
        "NameLevel": "ground",
        "ZLevel": 0.0,
        "BuildElement": [
            {"Id": "A", "Sign": "Room", "XY": [[[0,0],[4,0],[4,4],[0,4],[0,0]]], "Output": ["X", "AB", "AC"]},
            {"Id": "B", "Sign": "Room", "NumPeople": 5, "XY": [[[4,0],[8,0],[8,4],[4,4],[4,0]]], "Output": ["AB"]},
            {"Id": "C", "Sign": "Room", "NumPeople": 2, "XY": [[[0,4],[4,4],[4,8],[0,8],[0,4]]], "Output": ["AC"]},
            {"Id": "AB", "Sign": "DoorWayInt", "XY": [[[4,1],[4,2],[4.1,2],[4.1,1],[4,1]]], "Output": ["A", "B"]},
            {"Id": "AC", "Sign": "DoorWayInt", "XY": [[[1,4],[2,4],[2,4.1],[1,4.1],[1,4]]], "Output": ["A", "C"]},
            {"Id": "X", "Sign": "DoorWayOut", "XY": [[[0,1],[0,2],[-0.1,2],[-0.1,1],[0,1]]], "Output": ["A"]}
        ]
    }]
}"#;

fn building(json: &str) -> World {
    World::from_json_str(json).expect("building")
}

fn zone(world: &World, id: &str) -> ZoneId {
    match query::lookup(world, id) {
        Some(ElementRef::Zone(zone)) => zone,
        other => panic!("expected zone for {id}, got {other:?}"),
    }
}

fn zones(world: &World, ids: &[&str]) -> Vec<ZoneId> {
    ids.iter().map(|id| zone(world, id)).collect()
}

fn config(behavior: IntruderBehavior) -> IntruderConfig {
    IntruderConfig {
        behavior,
        ..IntruderConfig::default()
    }
}

fn walk(intruder: &mut Intruder, world: &World, steps: usize) -> Vec<Event> {
    let mut events = Vec::new();
    for _ in 0..steps {
        let _ = intruder.step_next(world, &mut events);
    }
    events
}

#[test]
fn advance_intruder_moves_one_level_deeper() {
    let world = building(CHAIN);
    let mut intruder = Intruder::new(&world, config(IntruderBehavior::Advance)).expect("intruder");

    assert_eq!(intruder.path(), &[zone(&world, "A")]);
    assert_eq!(intruder.levels().level(intruder.room()), Some(0));

    let step = intruder.step_next(&world, &mut Vec::new()).expect("move");

    assert_eq!(intruder.path().len(), 2);
    assert_eq!(step.to, zone(&world, "B"));
    assert_eq!(intruder.levels().level(intruder.room()), Some(1));
}

#[test]
fn entry_visits_are_counted() {
    let world = building(CHAIN);
    let intruder = Intruder::new(&world, config(IntruderBehavior::Advance)).expect("intruder");

    assert_eq!(intruder.visits().zone(zone(&world, "A")), 1);
    assert_eq!(intruder.visits().transit(intruder.entry()), 1);
    assert_eq!(intruder.visits().zone(zone(&world, "B")), 0);
}

#[test]
fn unknown_entry_is_rejected() {
    let world = building(CHAIN);
    let result = Intruder::new(
        &world,
        IntruderConfig {
            entry: 1,
            ..IntruderConfig::default()
        },
    );
    assert_eq!(
        result.err(),
        Some(IntruderError::UnknownEntry { index: 1, exits: 1 })
    );
}

#[test]
fn non_positive_speeds_are_rejected() {
    let world = building(CHAIN);
    for speed in [0.0, -30.0, f64::INFINITY] {
        let result = Intruder::new(
            &world,
            IntruderConfig {
                speed,
                ..IntruderConfig::default()
            },
        );
        assert_eq!(result.err(), Some(IntruderError::InvalidSpeed { speed }));
    }

    let result = Intruder::new(
        &world,
        IntruderConfig {
            speed: f64::NAN,
            ..IntruderConfig::default()
        },
    );
    assert!(matches!(result, Err(IntruderError::InvalidSpeed { speed }) if speed.is_nan()));
}

#[test]
fn path_length_starts_at_entry_door() {
    let world = building(CHAIN);
    let mut intruder = Intruder::new(&world, config(IntruderBehavior::Advance)).expect("intruder");
    let entry_leg = 2.05_f64.hypot(0.5);
    assert!((intruder.path_len(&world) - entry_leg).abs() < 1e-9);

    let _ = walk(&mut intruder, &world, 1);
    assert!((intruder.path_len(&world) - (entry_leg + 4.0)).abs() < 1e-9);
}

#[test]
fn precomputed_plan_takes_richest_branch() {
    let world = building(TREE);
    let mut intruder = Intruder::new(
        &world,
        IntruderConfig {
            precompute: true,
            ..IntruderConfig::default()
        },
    )
    .expect("intruder");

    let plan: Vec<ZoneId> = intruder.plan().expect("plan").iter().copied().collect();
    assert_eq!(plan, zones(&world, &["B", "D"]));

    let events = walk(&mut intruder, &world, 3);
    assert_eq!(intruder.path(), zones(&world, &["A", "B", "D"]).as_slice());
    assert!(intruder.is_halted());
    assert_eq!(
        events.last(),
        Some(&Event::IntruderHalted {
            room: zone(&world, "D")
        })
    );
}

#[test]
fn replanned_advance_matches_precomputed_route() {
    let world = building(TREE);
    let mut intruder = Intruder::new(&world, config(IntruderBehavior::Advance)).expect("intruder");

    let _ = walk(&mut intruder, &world, 2);
    assert_eq!(intruder.path(), zones(&world, &["A", "B", "D"]).as_slice());

    let events = walk(&mut intruder, &world, 2);
    assert!(intruder.is_halted());
    assert_eq!(events.len(), 1, "halting is reported once");
}

#[test]
fn search_reports_cumulative_victims() {
    let world = building(TREE);
    let intruder = Intruder::new(&world, config(IntruderBehavior::Advance)).expect("intruder");
    let mut visits = intruder.visits().clone();
    let before = visits.clone();

    let outcome = intruder.search(
        &world,
        evac_attack_system_intruder::Origin::Entry(intruder.entry()),
        zone(&world, "A"),
        &mut visits,
        &mut Vec::new(),
    );

    assert_eq!(outcome.rooms, zones(&world, &["A", "B", "D"]));
    assert_eq!(outcome.victims, 8.0);
    assert_eq!(visits, before);
}

#[test]
fn disabled_rooms_are_avoided() {
    let world = building(TREE);
    let mut intruder = Intruder::new(
        &world,
        IntruderConfig {
            disabled: vec![zone(&world, "B")],
            ..IntruderConfig::default()
        },
    )
    .expect("intruder");

    let _ = walk(&mut intruder, &world, 2);
    assert_eq!(intruder.path(), zones(&world, &["A", "C", "E"]).as_slice());
}

#[test]
fn predatory_and_efficient_intruders_disagree() {
    let world = building(NEAR_FAR);

    let mut predatory = Intruder::new(&world, config(IntruderBehavior::Predatory)).expect("intruder");
    let step = predatory.step_next(&world, &mut Vec::new()).expect("move");
    assert_eq!(step.to, zone(&world, "F"));

    let mut efficient = Intruder::new(&world, config(IntruderBehavior::Efficient)).expect("intruder");
    let step = efficient.step_next(&world, &mut Vec::new()).expect("move");
    assert_eq!(step.to, zone(&world, "N"));
}

#[test]
fn empty_building_prefers_longest_view() {
    let mut world = building(TREE);
    let mut events = Vec::new();
    for id in world.zones().iter().map(|zone| zone.id()).collect::<Vec<_>>() {
        world::apply(&mut world, Command::SetZonePopulation { zone: id, people: 0.0 }, &mut events);
    }

    let mut intruder = Intruder::new(&world, config(IntruderBehavior::Predatory)).expect("intruder");
    let step = intruder.step_next(&world, &mut Vec::new()).expect("move");
    assert_eq!(step.to, zone(&world, "C"));
}

#[test]
fn predatory_intruder_backtracks_out_of_dead_ends() {
    let world = building(STAR);
    let mut intruder = Intruder::new(&world, config(IntruderBehavior::Predatory)).expect("intruder");

    let events = walk(&mut intruder, &world, 5);

    assert_eq!(
        intruder.path(),
        zones(&world, &["A", "B", "A", "C", "A"]).as_slice()
    );
    assert!(intruder.is_halted());
    assert_eq!(
        events
            .iter()
            .filter(|event| matches!(event, Event::IntruderAdvanced { .. }))
            .count(),
        4
    );
}

#[test]
fn snapshot_reflects_progress() {
    let world = building(CHAIN);
    let mut intruder = Intruder::new(&world, config(IntruderBehavior::Advance)).expect("intruder");
    intruder.add_victims(3.5);
    let _ = walk(&mut intruder, &world, 1);

    let snapshot = intruder.snapshot();
    assert_eq!(snapshot.room, zone(&world, "B"));
    assert_eq!(snapshot.path.len(), 2);
    assert_eq!(snapshot.victims, 3.5);
    assert!(!snapshot.halted);
    assert_eq!(snapshot.behavior, IntruderBehavior::Advance);
}
