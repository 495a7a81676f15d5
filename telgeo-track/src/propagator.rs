//! Helix and straight-line propagation in a uniform field.

use crate::state::TrackState;
use nalgebra::Vector3;
use telgeo_core::MagneticField;

/// Momentum in GeV/c of a unit-charge track bending with a 1 m radius in 1 T.
pub const SPEED_OF_LIGHT_FACTOR: f64 = 0.299_792_458;

/// Millimetres per metre.
pub(crate) const MM_PER_METRE: f64 = 1000.0;

/// Unit vector along `v`, or the zero vector when `v` vanishes.
pub fn unit_or_zero(v: &Vector3<f64>) -> Vector3<f64> {
    let norm = v.norm();
    if norm > 0.0 {
        v / norm
    } else {
        Vector3::zeros()
    }
}

/// Propagates charged tracks along helices in the field of `F`.
///
/// The field is sampled once at the start point and taken as uniform over
/// the whole step. Lengths are in mm, momenta in GeV/c and fields in tesla.
#[derive(Debug, Clone)]
pub struct TrackPropagator<F> {
    field: F,
}

impl<F: MagneticField> TrackPropagator<F> {
    /// Creates a propagator over the given field.
    pub fn new(field: F) -> Self {
        Self { field }
    }

    /// Field provider.
    pub fn field(&self) -> &F {
        &self.field
    }

    /// Field vector at a global position.
    #[inline]
    pub fn field_at(&self, position: &Vector3<f64>) -> Vector3<f64> {
        self.field.field_at(position)
    }

    /// Curvature constant `k = -c * q * |B| / 1000`.
    ///
    /// `k / |p|` is the signed curvature in 1/mm; zero without field.
    pub fn curvature_constant(&self, position: &Vector3<f64>, charge: f64) -> f64 {
        -SPEED_OF_LIGHT_FACTOR * charge * self.field_at(position).norm() / MM_PER_METRE
    }

    /// Position after travelling an arc length `s` from `position`.
    pub fn propagate_position(
        &self,
        position: &Vector3<f64>,
        momentum: &Vector3<f64>,
        charge: f64,
        s: f64,
    ) -> Vector3<f64> {
        let p = momentum.norm();
        let k = self.curvature_constant(position, charge);

        if k.abs() > 0.0 {
            let h = unit_or_zero(&self.field_at(position));
            let rho = k / p;
            let p_cross_h = momentum.cross(&h);
            let p_cross_h_cross_h = p_cross_h.cross(&h);
            let p_dot_h = momentum.dot(&h);

            position + p_cross_h_cross_h * ((-1.0 / k) * (rho * s).sin())
                + p_cross_h * ((-1.0 / k) * (1.0 - (rho * s).cos()))
                + h * (p_dot_h / p * s)
        } else {
            position + momentum * (s / p)
        }
    }

    /// Momentum after travelling an arc length `s` from `position`.
    ///
    /// The magnitude is conserved; only the direction rotates about the field.
    pub fn propagate_momentum(
        &self,
        position: &Vector3<f64>,
        momentum: &Vector3<f64>,
        charge: f64,
        s: f64,
    ) -> Vector3<f64> {
        let p = momentum.norm();
        let k = self.curvature_constant(position, charge);
        if k == 0.0 {
            return *momentum;
        }

        let h = unit_or_zero(&self.field_at(position));
        let t = momentum / p;
        let theta = k / p * s;
        let (sin_theta, cos_theta) = theta.sin_cos();
        let gamma = h.dot(&t);

        let end_direction =
            h * (gamma * (1.0 - cos_theta)) + t * cos_theta + h.cross(&t) * sin_theta;
        end_direction * p
    }

    /// Propagates a full state by an arc length `s`.
    pub fn propagate(&self, state: &TrackState, s: f64) -> TrackState {
        TrackState {
            position: self.propagate_position(&state.position, &state.momentum, state.charge, s),
            momentum: self.propagate_momentum(&state.position, &state.momentum, state.charge, s),
            charge: state.charge,
        }
    }
}
