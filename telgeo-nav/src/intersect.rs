//! Search for the plane a track crosses next.

use crate::config::NavigationConfig;
use crate::navigator::Navigator;
use crate::volume::{VolumeModel, NO_SENSOR};
use nalgebra::Vector3;
use telgeo_core::{FrameCache, MagneticField, Result, SensorId};
use telgeo_track::{unit_or_zero, TrackPropagator};

/// Sensor ID reported when a straight-line search meets no further plane.
pub const NO_PLANE_FOUND: SensorId = -100;

/// First plane met by a straight-line search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneCrossing {
    /// Sensor entered, or [`NO_PLANE_FOUND`].
    pub sensor_id: SensorId,
    /// Point just inside the entered plane, or the last point reached.
    pub point: Vector3<f64>,
}

impl PlaneCrossing {
    /// Returns true if a plane was found.
    pub fn is_found(&self) -> bool {
        self.sensor_id != NO_PLANE_FOUND
    }
}

/// Intersection of a track with a given plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    /// Target sensor ID on success, [`NO_SENSOR`] otherwise.
    pub status: SensorId,
    /// Position on the plane.
    pub position: Vector3<f64>,
    /// Momentum at `position`.
    pub momentum: Vector3<f64>,
    /// Arc length from the start to the analytic intersection.
    pub arc_length: f64,
}

impl Intersection {
    fn missed(start: &Vector3<f64>, momentum: &Vector3<f64>) -> Self {
        Self {
            status: NO_SENSOR,
            position: *start,
            momentum: *momentum,
            arc_length: 0.0,
        }
    }

    /// Returns true if the target plane was reached.
    pub fn is_found(&self) -> bool {
        self.status != NO_SENSOR
    }
}

/// Real roots of `a s^2 + b s + c = 0` in ascending order.
///
/// A vanishing `a` gives the linear root twice.
pub fn solve_quadratic(a: f64, b: f64, c: f64) -> Option<[f64; 2]> {
    if a == 0.0 {
        if b == 0.0 {
            return None;
        }
        let root = -c / b;
        return Some([root, root]);
    }

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }

    let q = -0.5 * (b + b.signum() * discriminant.sqrt());
    if q == 0.0 {
        return Some([0.0, 0.0]);
    }
    let (r1, r2) = (q / a, c / q);
    Some(if r1 <= r2 { [r1, r2] } else { [r2, r1] })
}

/// Plane search over a volume model, its frames and a propagator.
#[derive(Debug)]
pub struct PlaneIntersector<'a, F> {
    model: &'a VolumeModel,
    frames: &'a FrameCache,
    propagator: &'a TrackPropagator<F>,
    config: &'a NavigationConfig,
}

impl<'a, F: MagneticField> PlaneIntersector<'a, F> {
    /// Creates an intersector.
    pub fn new(
        model: &'a VolumeModel,
        frames: &'a FrameCache,
        propagator: &'a TrackPropagator<F>,
        config: &'a NavigationConfig,
    ) -> Self {
        Self {
            model,
            frames,
            propagator,
            config,
        }
    }

    /// Follows a straight line to the first plane other than the one
    /// holding `point`.
    pub fn find_next_plane(&self, point: Vector3<f64>, direction: Vector3<f64>) -> PlaneCrossing {
        self.find_next_plane_with(&mut Navigator::new(self.model), point, direction)
    }

    /// [`find_next_plane`](Self::find_next_plane) reusing a caller-owned navigator.
    pub fn find_next_plane_with(
        &self,
        navigator: &mut Navigator<'_>,
        point: Vector3<f64>,
        direction: Vector3<f64>,
    ) -> PlaneCrossing {
        let current = self.model.locate(&point);
        navigator.init_track(point, direction);
        let direction = navigator.direction();
        let mut last = point;

        while navigator.step_to_next_boundary().is_some() {
            let nudged = navigator.point() + direction * self.config.nudge_epsilon;
            let sensor_id = self.model.locate(&nudged);
            last = nudged;

            if sensor_id >= 0 && sensor_id != current {
                log::debug!("next plane from {point:?} is {sensor_id} at {nudged:?}");
                return PlaneCrossing {
                    sensor_id,
                    point: nudged,
                };
            }
            if navigator.relocate(nudged).is_none() {
                break;
            }
        }

        PlaneCrossing {
            sensor_id: NO_PLANE_FOUND,
            point: last,
        }
    }

    /// Follows a straight line until `target` is entered.
    ///
    /// Returns the point just inside the target, or `None` after the
    /// configured number of boundary steps or on leaving the world.
    pub fn find_plane_entrance(
        &self,
        point: Vector3<f64>,
        direction: Vector3<f64>,
        target: SensorId,
    ) -> Option<Vector3<f64>> {
        let mut navigator = Navigator::new(self.model);
        navigator.init_track(point, direction);
        let direction = navigator.direction();

        for _ in 0..=self.config.max_entrance_steps {
            navigator.step_to_next_boundary()?;
            let nudged = navigator.point() + direction * self.config.nudge_epsilon;
            if self.model.locate(&nudged) == target {
                return Some(nudged);
            }
            navigator.relocate(nudged)?;
        }

        log::debug!(
            "no entrance into plane {target} within {} steps from {point:?}",
            self.config.max_entrance_steps
        );
        None
    }

    /// Intersects the helix (or line) of a track with the plane `target`.
    ///
    /// The arc length solves the plane equation to second order in the
    /// curvature. The analytic point is accepted when it lies inside the
    /// target box; otherwise the target is searched for along the momentum
    /// at that point, first forward and then backward.
    ///
    /// Fails only for an unknown target; a miss is reported through
    /// [`Intersection::status`].
    pub fn find_intersection(
        &self,
        start: &Vector3<f64>,
        momentum: &Vector3<f64>,
        charge: f64,
        target: SensorId,
    ) -> Result<Intersection> {
        let normal = self.frames.normal(target)?;
        let center = self.frames.offset(target)?;

        let h = unit_or_zero(&self.propagator.field_at(start));
        let p = momentum.norm();
        let rho = self.propagator.curvature_constant(start, charge) / p;

        let a = -0.5 * rho * normal.dot(&momentum.cross(&h)) / p;
        let b = normal.dot(momentum) / p;
        let c = normal.dot(&(start - center));

        let Some([first, second]) = solve_quadratic(a, b, c) else {
            log::debug!("track from {start:?} never reaches the plane of sensor {target}");
            return Ok(Intersection::missed(start, momentum));
        };
        let arc_length = if first > 0.0 {
            first
        } else if second > 0.0 {
            second
        } else {
            log::debug!("plane of sensor {target} lies behind the track at {start:?}");
            return Ok(Intersection::missed(start, momentum));
        };

        let position = self
            .propagator
            .propagate_position(start, momentum, charge, arc_length);
        let end_momentum = self
            .propagator
            .propagate_momentum(start, momentum, charge, arc_length);

        let found = if self.model.locate(&position) == target {
            Some(position)
        } else {
            log::debug!(
                "analytic intersection {position:?} is not inside sensor {target}, searching"
            );
            self.find_plane_entrance(position, end_momentum, target)
                .or_else(|| self.find_plane_entrance(position, -end_momentum, target))
        };

        Ok(match found {
            Some(position) => Intersection {
                status: target,
                position,
                momentum: end_momentum,
                arc_length,
            },
            None => Intersection {
                status: NO_SENSOR,
                position,
                momentum: end_momentum,
                arc_length,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quadratic_roots() {
        let roots = solve_quadratic(1.0, -3.0, 2.0).unwrap();
        assert_relative_eq!(roots[0], 1.0);
        assert_relative_eq!(roots[1], 2.0);

        let roots = solve_quadratic(-1.0, 0.0, 4.0).unwrap();
        assert_relative_eq!(roots[0], -2.0);
        assert_relative_eq!(roots[1], 2.0);

        assert!(solve_quadratic(1.0, 0.0, 1.0).is_none());
    }

    #[test]
    fn test_linear_case() {
        assert_eq!(solve_quadratic(0.0, 2.0, -8.0), Some([4.0, 4.0]));
        assert!(solve_quadratic(0.0, 0.0, 1.0).is_none());
    }

    #[test]
    fn test_tiny_curvature_is_stable() {
        // a s^2 + s - 110 with a tiny a keeps the root near 110.
        let roots = solve_quadratic(1e-12, 1.0, -110.0).unwrap();
        let positive = roots.iter().copied().find(|&r| r > 0.0).unwrap();
        assert_relative_eq!(positive, 110.0, epsilon = 1e-6);
    }
}
