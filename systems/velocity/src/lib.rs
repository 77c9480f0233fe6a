#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Empirical density-to-speed laws for pedestrian flow.
//!
//! Speeds are expressed in metres per minute and densities in persons per
//! square metre. Every law shares the logarithmic base [`velocity`] and only
//! differs in its coefficients and in how dense flows are capped.

/// Kind of path segment a flow is moving along.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PathKind {
    /// Horizontal movement inside a room.
    Room,
    /// Passage through a doorway.
    Transit,
    /// Climbing a staircase.
    StairUp,
    /// Descending a staircase.
    StairDown,
}

/// Coefficients of the base velocity law for one [`PathKind`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coefficients {
    /// Free-flow speed in metres per minute.
    pub v0: f64,
    /// Path-kind coefficient.
    pub a: f64,
    /// Density up to which the flow moves at free speed.
    pub d0: f64,
}

impl PathKind {
    /// Fixed empirical coefficients of the path kind.
    #[must_use]
    pub const fn coefficients(self) -> Coefficients {
        match self {
            Self::Room => Coefficients {
                v0: 100.0,
                a: 0.295,
                d0: 0.51,
            },
            Self::Transit => Coefficients {
                v0: 100.0,
                a: 0.295,
                d0: 0.65,
            },
            Self::StairDown => Coefficients {
                v0: 100.0,
                a: 0.400,
                d0: 0.89,
            },
            Self::StairUp => Coefficients {
                v0: 60.0,
                a: 0.305,
                d0: 0.67,
            },
        }
    }
}

/// Errors raised by the velocity model.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VelocityError {
    /// A stair speed was requested for a path kind that is not a stair.
    #[error("{0:?} is not a stair direction")]
    InvalidStairDirection(PathKind),
}

/// Base law `v0 * (1 - a * ln(d / d0))`.
#[must_use]
pub fn velocity(v0: f64, a: f64, d0: f64, density: f64) -> f64 {
    v0 * (1.0 - a * (density / d0).ln())
}

/// Density-dependent speed model parameterised by the horizontal projection
/// area of one person.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VelocityModel {
    projection_area: f64,
}

impl Default for VelocityModel {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl VelocityModel {
    /// Creates a model for the provided per-person projection area in m².
    #[must_use]
    pub const fn new(projection_area: f64) -> Self {
        Self { projection_area }
    }

    /// Density at which the occupied floor share reaches 0.9.
    #[must_use]
    pub fn saturation_density(&self) -> f64 {
        0.9 / self.projection_area
    }

    /// Speed of a flow crossing a doorway of the given width.
    #[must_use]
    pub fn speed_through_transit(&self, width: f64, density: f64) -> f64 {
        let Coefficients { v0, a, d0 } = PathKind::Transit.coefficients();
        if density <= d0 {
            return v0;
        }

        let share = density * self.projection_area;
        let m = if share <= 0.5 { 1.0 } else { 1.25 - 0.5 * share };
        let mut intensity = velocity(v0, a, d0, density) * share * m;
        if share >= 0.9 {
            intensity = if width < 1.6 { 2.5 + 3.75 * width } else { 8.5 };
        }
        intensity / share
    }

    /// Speed of horizontal movement inside a room.
    #[must_use]
    pub fn speed_in_room(&self, density: f64) -> f64 {
        self.capped_speed(PathKind::Room, density)
    }

    /// Speed on a staircase in the given direction.
    pub fn speed_on_stair(&self, direction: PathKind, density: f64) -> Result<f64, VelocityError> {
        match direction {
            PathKind::StairUp | PathKind::StairDown => Ok(self.capped_speed(direction, density)),
            PathKind::Room | PathKind::Transit => {
                Err(VelocityError::InvalidStairDirection(direction))
            }
        }
    }

    fn capped_speed(&self, kind: PathKind, density: f64) -> f64 {
        let density = density.min(self.saturation_density());
        let Coefficients { v0, a, d0 } = kind.coefficients();
        if density > d0 {
            velocity(v0, a, d0, density)
        } else {
            v0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn free_flow_below_threshold() {
        let model = VelocityModel::default();
        assert_eq!(model.speed_in_room(0.3), 100.0);
        assert_eq!(model.speed_in_room(0.51), 100.0);
        assert_eq!(model.speed_through_transit(1.0, 0.65), 100.0);
        assert_eq!(
            model.speed_on_stair(PathKind::StairUp, 0.5),
            Ok(60.0)
        );
    }

    #[test]
    fn base_law_is_continuous_at_threshold() {
        for kind in [PathKind::Room, PathKind::Transit, PathKind::StairUp, PathKind::StairDown] {
            let Coefficients { v0, a, d0 } = kind.coefficients();
            assert!((velocity(v0, a, d0, d0) - v0).abs() < EPSILON);
        }
    }

    #[test]
    fn room_speed_decreases_with_density() {
        let model = VelocityModel::default();
        let mut previous = model.speed_in_room(0.51);
        for step in 1..80 {
            let speed = model.speed_in_room(0.51 + f64::from(step) * 0.1);
            assert!(speed <= previous + EPSILON);
            previous = speed;
        }
    }

    #[test]
    fn room_density_is_capped_at_saturation() {
        let model = VelocityModel::default();
        assert!((model.saturation_density() - 9.0).abs() < EPSILON);
        assert_eq!(model.speed_in_room(9.0), model.speed_in_room(20.0));
    }

    #[test]
    fn transit_uses_capacity_formula_when_saturated() {
        let model = VelocityModel::default();
        let speed = model.speed_through_transit(1.0, 9.0);
        assert!((speed - (2.5 + 3.75) / 0.9).abs() < EPSILON);

        let wide = model.speed_through_transit(2.0, 10.0);
        assert!((wide - 8.5).abs() < EPSILON);
    }

    #[test]
    fn transit_speed_in_congested_range() {
        let model = VelocityModel::default();
        let density = 6.0;
        let share = 0.6;
        let expected = velocity(100.0, 0.295, 0.65, density) * (1.25 - 0.5 * share);
        assert!((model.speed_through_transit(1.2, density) - expected).abs() < EPSILON);
    }

    #[test]
    fn stair_directions_differ() {
        let model = VelocityModel::default();
        let down = model.speed_on_stair(PathKind::StairDown, 2.0).expect("stair");
        let up = model.speed_on_stair(PathKind::StairUp, 2.0).expect("stair");
        assert!(down > up);
    }

    #[test]
    fn non_stair_direction_is_rejected() {
        let model = VelocityModel::default();
        assert_eq!(
            model.speed_on_stair(PathKind::Room, 1.0),
            Err(VelocityError::InvalidStairDirection(PathKind::Room))
        );
    }
}
