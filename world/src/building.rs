//! Building description format and its validation into the world arena.

use std::collections::BTreeMap;

use evac_attack_core::{
    geometry::{Outline, Polygon},
    SafetyZoneId, TransitId, TransitKind, ZoneId, ZoneKind,
};
use serde::{Deserialize, Serialize};

use crate::{ElementRef, SafetyZone, Transit, World, Zone};

const MIN_ZONE_VERTICES: usize = 3;
const MIN_TRANSIT_VERTICES: usize = 2;

/// Errors raised while loading a building description.
#[derive(thiserror::Error, Debug)]
pub enum BuildingError {
    /// The description is not valid JSON or does not match the schema.
    #[error("malformed building description: {0}")]
    Parse(#[from] serde_json::Error),

    /// A required key is absent from the element.
    #[error("element {id} has no {field}")]
    MissingField {
        /// Element identifier.
        id: String,
        /// Name of the missing key.
        field: &'static str,
    },

    /// The element carries no outline in `XY`.
    #[error("element {id} has no outline")]
    MissingOutline {
        /// Element identifier.
        id: String,
    },

    /// The outline has fewer vertices than its kind requires.
    #[error("element {id} has {count} vertices, at least {required} required")]
    TooFewVertices {
        /// Element identifier.
        id: String,
        /// Number of vertices found.
        count: usize,
        /// Minimum number of vertices for the element kind.
        required: usize,
    },

    /// The zone outline encloses no area.
    #[error("zone {id} has zero area")]
    DegenerateZone {
        /// Element identifier.
        id: String,
    },

    /// Two elements share the same identifier.
    #[error("element id {id} is used more than once")]
    DuplicateElement {
        /// Element identifier.
        id: String,
    },

    /// An `Output` entry names an unknown element or one of the wrong kind.
    #[error("element {element} references unknown {target}")]
    DanglingReference {
        /// Element carrying the reference.
        element: String,
        /// Identifier that could not be resolved.
        target: String,
    },

    /// A doorway connects the wrong number of zones for its kind.
    #[error("doorway {id} connects {count} zones")]
    InvalidConnectionCount {
        /// Element identifier.
        id: String,
        /// Number of connected zones.
        count: usize,
    },

    /// A zone and a doorway disagree about being connected.
    #[error("zone {zone} and doorway {transit} are not linked both ways")]
    AsymmetricLink {
        /// Zone identifier.
        zone: String,
        /// Doorway identifier.
        transit: String,
    },

    /// The zone starts with a negative population.
    #[error("zone {id} has negative population {people}")]
    NegativePopulation {
        /// Element identifier.
        id: String,
        /// Population found in the description.
        people: f64,
    },
}

/// Whole-building description as exchanged with BIM tooling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildingDescription {
    /// Building storeys in drawing order.
    #[serde(rename = "Level")]
    pub levels: Vec<LevelDescription>,
}

/// Single storey of a [`BuildingDescription`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelDescription {
    /// Storey label.
    #[serde(rename = "NameLevel", alias = "Name", default)]
    pub name: Option<String>,
    /// Elevation inherited by elements without their own.
    #[serde(rename = "ZLevel", default)]
    pub elevation: f64,
    /// Rooms, staircases and doorways of the storey.
    #[serde(rename = "BuildElement", default)]
    pub elements: Vec<ElementDescription>,
}

/// Room, staircase or doorway entry of a [`LevelDescription`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementDescription {
    /// Unique element identifier.
    #[serde(rename = "Id")]
    pub id: String,
    /// Optional label.
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    /// Element kind: `Room`, `Staircase`, `DoorWayInt`, `DoorWay` or `DoorWayOut`.
    #[serde(rename = "Sign", default)]
    pub sign: Option<String>,
    /// Outlines; only the first one is used.
    #[serde(rename = "XY", default)]
    pub outlines: Vec<Outline>,
    /// Identifiers of connected elements.
    #[serde(rename = "Output", default)]
    pub output: Vec<String>,
    /// Elevation overriding the storey's.
    #[serde(rename = "ZLevel", default)]
    pub elevation: Option<f64>,
    /// Initial population of a zone.
    #[serde(rename = "NumPeople", default)]
    pub num_people: Option<f64>,
}

enum Sign {
    Zone(ZoneKind),
    Transit(TransitKind),
}

fn classify(sign: &str) -> Option<Sign> {
    match sign {
        "Room" => Some(Sign::Zone(ZoneKind::Room)),
        "Staircase" => Some(Sign::Zone(ZoneKind::Staircase)),
        "DoorWayInt" => Some(Sign::Transit(TransitKind::Interior)),
        "DoorWay" => Some(Sign::Transit(TransitKind::Opening)),
        "DoorWayOut" => Some(Sign::Transit(TransitKind::Exit)),
        _ => None,
    }
}

struct Pending<'a> {
    element: &'a ElementDescription,
    elevation: f64,
    polygon: Polygon,
}

pub(crate) fn ingest(description: &BuildingDescription) -> Result<World, BuildingError> {
    let mut lookup = BTreeMap::new();
    let mut zones = Vec::new();
    let mut transits = Vec::new();

    for level in &description.levels {
        for element in &level.elements {
            let Some(name) = element.sign.as_deref() else {
                return Err(BuildingError::MissingField {
                    id: element.id.clone(),
                    field: "Sign",
                });
            };
            let Some(sign) = classify(name) else {
                tracing::debug!(id = %element.id, sign = name, "skipping element");
                continue;
            };

            let (reference, required) = match &sign {
                Sign::Zone(_) => (
                    ElementRef::Zone(ZoneId::new(arena_index(zones.len()))),
                    MIN_ZONE_VERTICES,
                ),
                Sign::Transit(_) => (
                    ElementRef::Transit(TransitId::new(arena_index(transits.len()))),
                    MIN_TRANSIT_VERTICES,
                ),
            };

            if lookup.insert(element.id.clone(), reference).is_some() {
                return Err(BuildingError::DuplicateElement {
                    id: element.id.clone(),
                });
            }

            let pending = Pending {
                element,
                elevation: element.elevation.unwrap_or(level.elevation),
                polygon: outline(element, required)?,
            };

            match sign {
                Sign::Zone(kind) => zones.push((kind, pending)),
                Sign::Transit(kind) => transits.push((kind, pending)),
            }
        }
    }

    let zones = zones
        .into_iter()
        .enumerate()
        .map(|(index, (kind, pending))| build_zone(index, kind, pending, &lookup))
        .collect::<Result<Vec<_>, _>>()?;

    let transits = transits
        .into_iter()
        .enumerate()
        .map(|(index, (kind, pending))| build_transit(index, kind, pending, &lookup))
        .collect::<Result<Vec<_>, _>>()?;

    check_links(&zones, &transits)?;

    let safety_zones = transits
        .iter()
        .filter(|transit| transit.kind == TransitKind::Exit)
        .enumerate()
        .map(|(index, transit)| SafetyZone {
            id: SafetyZoneId::new(arena_index(index)),
            exit: transit.id,
            num_people: 0.0,
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        zones = zones.len(),
        transits = transits.len(),
        exits = safety_zones.len(),
        "building loaded"
    );

    Ok(World {
        zones,
        transits,
        safety_zones,
        lookup,
        time: 0.0,
    })
}

fn arena_index(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}

fn outline(element: &ElementDescription, required: usize) -> Result<Polygon, BuildingError> {
    let outline = element
        .outlines
        .first()
        .ok_or_else(|| BuildingError::MissingOutline {
            id: element.id.clone(),
        })?;
    let vertices = outline.vertices();
    if vertices.len() < required {
        return Err(BuildingError::TooFewVertices {
            id: element.id.clone(),
            count: vertices.len(),
            required,
        });
    }
    Ok(Polygon::new(vertices))
}

fn build_zone(
    index: usize,
    kind: ZoneKind,
    pending: Pending<'_>,
    lookup: &BTreeMap<String, ElementRef>,
) -> Result<Zone, BuildingError> {
    let element = pending.element;
    let area = pending.polygon.area();
    if area <= f64::EPSILON {
        return Err(BuildingError::DegenerateZone {
            id: element.id.clone(),
        });
    }

    let num_people = element.num_people.unwrap_or(0.0);
    if num_people < 0.0 {
        return Err(BuildingError::NegativePopulation {
            id: element.id.clone(),
            people: num_people,
        });
    }

    let transits = element
        .output
        .iter()
        .map(|target| match lookup.get(target) {
            Some(ElementRef::Transit(transit)) => Ok(*transit),
            _ => Err(BuildingError::DanglingReference {
                element: element.id.clone(),
                target: target.clone(),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Zone {
        id: ZoneId::new(arena_index(index)),
        external_id: element.id.clone(),
        name: element.name.clone(),
        kind,
        area,
        elevation: pending.elevation,
        polygon: pending.polygon,
        transits,
        num_people,
        density: num_people / area,
        blocked: false,
        visited: false,
        potential: f64::INFINITY,
        route: None,
    })
}

fn build_transit(
    index: usize,
    kind: TransitKind,
    pending: Pending<'_>,
    lookup: &BTreeMap<String, ElementRef>,
) -> Result<Transit, BuildingError> {
    let element = pending.element;
    let zones = element
        .output
        .iter()
        .map(|target| match lookup.get(target) {
            Some(ElementRef::Zone(zone)) => Ok(*zone),
            _ => Err(BuildingError::DanglingReference {
                element: element.id.clone(),
                target: target.clone(),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let valid = match kind {
        TransitKind::Exit => zones.len() == 1,
        TransitKind::Interior | TransitKind::Opening => (1..=2).contains(&zones.len()),
    };
    if !valid {
        return Err(BuildingError::InvalidConnectionCount {
            id: element.id.clone(),
            count: zones.len(),
        });
    }

    Ok(Transit {
        id: TransitId::new(arena_index(index)),
        external_id: element.id.clone(),
        kind,
        width: pending.polygon.max_edge_length(),
        polygon: pending.polygon,
        zones,
        blocked: false,
        visited: false,
        flow: 0.0,
        route: None,
    })
}

fn check_links(zones: &[Zone], transits: &[Transit]) -> Result<(), BuildingError> {
    let asymmetric = |zone: &Zone, transit: &Transit| BuildingError::AsymmetricLink {
        zone: zone.external_id.clone(),
        transit: transit.external_id.clone(),
    };

    for zone in zones {
        for &transit in &zone.transits {
            let transit = &transits[transit.index()];
            if !transit.zones.contains(&zone.id) {
                return Err(asymmetric(zone, transit));
            }
        }
    }

    for transit in transits {
        for &zone in &transit.zones {
            let zone = &zones[zone.index()];
            if !zone.transits.contains(&transit.id) {
                return Err(asymmetric(zone, transit));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(id: &str, sign: &str, ring: &[[f64; 2]], output: &[&str]) -> ElementDescription {
        ElementDescription {
            id: id.to_owned(),
            name: None,
            sign: Some(sign.to_owned()),
            outlines: vec![Outline::Ring(ring.to_vec())],
            output: output.iter().map(|&id| id.to_owned()).collect(),
            elevation: None,
            num_people: None,
        }
    }

    fn square(x: f64) -> Vec<[f64; 2]> {
        vec![[x, 0.0], [x + 2.0, 0.0], [x + 2.0, 2.0], [x, 2.0], [x, 0.0]]
    }

    fn door(x: f64) -> Vec<[f64; 2]> {
        vec![[x, 0.5], [x, 1.5], [x + 0.1, 1.5], [x + 0.1, 0.5], [x, 0.5]]
    }

    fn building(elements: Vec<ElementDescription>) -> BuildingDescription {
        BuildingDescription {
            levels: vec![LevelDescription {
                name: Some("ground".to_owned()),
                elevation: 3.0,
                elements,
            }],
        }
    }

    fn valid_elements() -> Vec<ElementDescription> {
        vec![
            element("A", "Room", &square(0.0), &["D"]),
            element("B", "Staircase", &square(2.0), &["D", "X"]),
            element("D", "DoorWayInt", &door(2.0), &["A", "B"]),
            element("X", "DoorWayOut", &door(4.0), &["B"]),
        ]
    }

    #[test]
    fn ingest_builds_arena_and_sinks() {
        let world = ingest(&building(valid_elements())).expect("valid building");

        assert_eq!(world.zones().len(), 2);
        assert_eq!(world.transits().len(), 2);
        assert_eq!(world.safety_zones().len(), 1);

        let stair = &world.zones()[1];
        assert_eq!(stair.kind(), ZoneKind::Staircase);
        assert!((stair.area() - 4.0).abs() < 1e-12);
        assert_eq!(stair.elevation(), 3.0);

        let door = &world.transits()[0];
        assert!((door.width() - 1.0).abs() < 1e-12);
        assert_eq!(door.zones(), &[ZoneId::new(0), ZoneId::new(1)]);
        assert_eq!(world.safety_zones()[0].exit(), TransitId::new(1));
    }

    #[test]
    fn element_elevation_overrides_level() {
        let mut elements = valid_elements();
        elements[0].elevation = Some(0.5);
        let world = ingest(&building(elements)).expect("valid building");
        assert_eq!(world.zones()[0].elevation(), 0.5);
    }

    #[test]
    fn unknown_signs_are_skipped() {
        let mut elements = valid_elements();
        elements.push(element("W", "Window", &door(6.0), &[]));
        let world = ingest(&building(elements)).expect("valid building");
        assert_eq!(world.transits().len(), 2);
    }

    #[test]
    fn missing_sign_names_the_element() {
        let mut elements = valid_elements();
        elements[2].sign = None;
        assert!(matches!(
            ingest(&building(elements)),
            Err(BuildingError::MissingField { id, field: "Sign" }) if id == "D"
        ));

        let json = r#"{"Level": [{"ZLevel": 0.0, "BuildElement": [{"Id": "Q", "XY": []}]}]}"#;
        let description: BuildingDescription = serde_json::from_str(json).expect("parse");
        assert!(matches!(
            ingest(&description),
            Err(BuildingError::MissingField { id, .. }) if id == "Q"
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut elements = valid_elements();
        elements.push(element("A", "Room", &square(8.0), &[]));
        assert!(matches!(
            ingest(&building(elements)),
            Err(BuildingError::DuplicateElement { id }) if id == "A"
        ));
    }

    #[test]
    fn dangling_references_are_rejected() {
        let mut elements = valid_elements();
        elements[0].output.push("nowhere".to_owned());
        assert!(matches!(
            ingest(&building(elements)),
            Err(BuildingError::DanglingReference { element, target })
                if element == "A" && target == "nowhere"
        ));
    }

    #[test]
    fn exit_must_have_single_zone() {
        let mut elements = valid_elements();
        elements[3].output = vec!["A".to_owned(), "B".to_owned()];
        elements[0].output.push("X".to_owned());
        assert!(matches!(
            ingest(&building(elements)),
            Err(BuildingError::InvalidConnectionCount { count: 2, .. })
        ));
    }

    #[test]
    fn one_sided_links_are_rejected() {
        let mut elements = valid_elements();
        elements[0].output.clear();
        assert!(matches!(
            ingest(&building(elements)),
            Err(BuildingError::AsymmetricLink { zone, transit }) if zone == "A" && transit == "D"
        ));
    }

    #[test]
    fn degenerate_outlines_are_rejected() {
        let mut elements = valid_elements();
        elements[0].outlines = vec![Outline::Ring(vec![
            [0.0, 0.0],
            [1.0, 0.0],
            [2.0, 0.0],
            [0.0, 0.0],
        ])];
        assert!(matches!(
            ingest(&building(elements)),
            Err(BuildingError::DegenerateZone { .. })
        ));

        let mut elements = valid_elements();
        elements[1].outlines.clear();
        assert!(matches!(
            ingest(&building(elements)),
            Err(BuildingError::MissingOutline { .. })
        ));

        let mut elements = valid_elements();
        elements[0].outlines = vec![Outline::Ring(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 0.0]])];
        assert!(matches!(
            ingest(&building(elements)),
            Err(BuildingError::TooFewVertices { count: 2, required: 3, .. })
        ));
    }

    #[test]
    fn negative_population_is_rejected() {
        let mut elements = valid_elements();
        elements[0].num_people = Some(-1.0);
        assert!(matches!(
            ingest(&building(elements)),
            Err(BuildingError::NegativePopulation { .. })
        ));
    }

    #[test]
    fn parses_level_name_alias() {
        let json = r#"{"Level": [{"Name": "first", "ZLevel": 1.5, "BuildElement": []}]}"#;
        let description: BuildingDescription = serde_json::from_str(json).expect("parse");
        assert_eq!(description.levels[0].name.as_deref(), Some("first"));
        assert_eq!(description.levels[0].elevation, 1.5);
    }
}
