//! Analytic Jacobians of the track parameters.
//!
//! Two parameterizations are used:
//!
//! - Small-step: `(q/p, tx, ty, x, y)` with `tx = px/|p|`, `ty = py/|p|`,
//!   valid in parabolic approximation for steps below roughly 100 mm.
//! - Curvilinear: `(q/p, lambda, phi, x_t, y_t)` of the helix-propagation
//!   literature. Its construction assumes motion mostly along its own x axis,
//!   so every vector entering it is permuted `(x, y, z) -> (z, y, x)` first.
//!
//! All matrices are 5x5, row-major in that parameter order.

use crate::propagator::{unit_or_zero, TrackPropagator, MM_PER_METRE, SPEED_OF_LIGHT_FACTOR};
use crate::state::TrackState;
use nalgebra::{Matrix5, Vector3};
use telgeo_core::{FrameCache, MagneticField, Result, SensorId, SCATTERING_PLANE_ID};

/// Tesla to kilogauss.
const KILOGAUSS_PER_TESLA: f64 = 10.0;

/// `q/p` below which the curvilinear Jacobian uses the straight-line form.
const STRAIGHT_LINE_CURVATURE: f64 = 1e-12;

/// Swaps the x and z components.
#[inline]
fn to_curvilinear_axes(v: &Vector3<f64>) -> Vector3<f64> {
    Vector3::new(v.z, v.y, v.x)
}

impl<F: MagneticField> TrackPropagator<F> {
    /// Jacobian of `(q/p, tx, ty, x, y)` over a short step `dz` along z.
    pub fn small_step_jacobian(&self, state: &TrackState, dz: f64) -> Matrix5<f64> {
        let k = SPEED_OF_LIGHT_FACTOR * 1e-4;
        let p = state.momentum_magnitude();
        let inv_p = state.charge / p;
        let tx = state.momentum.x / p;
        let ty = state.momentum.y / p;

        let b = self.field_at(&state.position) * KILOGAUSS_PER_TESLA;
        let sqrt_factor = (1.0 + tx * tx + ty * ty).sqrt();
        let sf2 = sqrt_factor * sqrt_factor;

        let ax = sqrt_factor * (ty * (tx * b.x + b.z) - (1.0 + tx * tx) * b.y);
        let ay = sqrt_factor * (-tx * (ty * b.y + b.z) + (1.0 + ty * ty) * b.x);

        let dax_dty = ty * ax / sf2 + sqrt_factor * (tx * b.x + b.z);
        let day_dtx = tx * ay / sf2 + sqrt_factor * (-ty * b.y - b.z);

        let half_dz2 = 0.5 * dz * dz;
        let mut jac = Matrix5::identity();

        jac[(3, 0)] = half_dz2 * k * ax;
        jac[(3, 1)] = dz;
        jac[(3, 2)] = half_dz2 * inv_p * k * dax_dty;

        jac[(4, 0)] = half_dz2 * k * ay;
        jac[(4, 1)] = half_dz2 * inv_p * k * day_dtx;
        jac[(4, 2)] = dz;

        jac[(1, 0)] = k * dz * ax;
        jac[(1, 2)] = inv_p * k * dz * dax_dty;

        jac[(2, 0)] = k * dz * ay;
        jac[(2, 1)] = inv_p * k * dz * day_dtx;

        jac
    }

    /// Curvilinear propagation Jacobian along a helix of arc length `ds`.
    ///
    /// `t1` and `t2` are the global track directions at the start and end
    /// point and `qbyp` the signed inverse momentum.
    pub fn curvilinear_jacobian(
        &self,
        ds: f64,
        qbyp: f64,
        t1: &Vector3<f64>,
        t2: &Vector3<f64>,
    ) -> Matrix5<f64> {
        let t1 = unit_or_zero(&to_curvilinear_axes(t1));
        let t2 = unit_or_zero(&to_curvilinear_axes(t2));
        let b = to_curvilinear_axes(&self.field_at(&Vector3::zeros()))
            * (SPEED_OF_LIGHT_FACTOR / MM_PER_METRE);

        let mut jac = Matrix5::identity();
        let qp = -b.norm();
        let q = qp * qbyp;
        let cosl1 = (t1.x * t1.x + t1.y * t1.y).sqrt();

        if q.abs() < STRAIGHT_LINE_CURVATURE {
            jac[(3, 2)] = ds * cosl1;
            jac[(4, 1)] = ds;
            return jac;
        }

        let cosl2 = (t2.x * t2.x + t2.y * t2.y).sqrt();
        let cosl2_inv = 1.0 / cosl2;
        let hn = unit_or_zero(&b);
        let pav = 1.0 / qbyp;

        let theta = q * ds;
        let (sint, cost) = theta.sin_cos();
        let gamma = hn.dot(&t2);
        let an1 = hn.cross(&t1);
        let an2 = hn.cross(&t2);

        let au1 = 1.0 / cosl1;
        let u1 = Vector3::new(-au1 * t1.y, au1 * t1.x, 0.0);
        let v1 = Vector3::new(-t1.z * u1.y, t1.z * u1.x, t1.x * u1.y - t1.y * u1.x);

        let au2 = cosl2_inv;
        let u2 = Vector3::new(-au2 * t2.y, au2 * t2.x, 0.0);
        let v2 = Vector3::new(-t2.z * u2.y, t2.z * u2.x, t2.x * u2.y - t2.y * u2.x);

        // N.V = -H.U and N.U = H.V
        let anv = -hn.dot(&u2);
        let anu = hn.dot(&v2);
        let omcost = 1.0 - cost;
        let tmsint = theta - sint;

        // M0 - M
        let dx = -(hn * (gamma * tmsint) + t1 * sint + an1 * omcost) / q;

        let hu1 = hn.cross(&u1);
        let hv1 = hn.cross(&v1);

        let (u1u2, u1v2, v1u2, v1v2) = (u1.dot(&u2), u1.dot(&v2), v1.dot(&u2), v1.dot(&v2));
        let (hu1u2, hu1v2, hv1u2, hv1v2) =
            (hu1.dot(&u2), hu1.dot(&v2), hv1.dot(&u2), hv1.dot(&v2));
        let (hnu1, hnv1, hnu2, hnv2) = (hn.dot(&u1), hn.dot(&v1), hn.dot(&u2), hn.dot(&v2));
        let (t2u1, t2v1) = (t2.dot(&u1), t2.dot(&v1));
        let (t2dx, u2dx, v2dx) = (t2.dot(&dx), u2.dot(&dx), v2.dot(&dx));
        let (an2u1, an2v1) = (an2.dot(&u1), an2.dot(&v1));

        // 1/P
        jac[(0, 0)] = 1.0;

        // lambda
        jac[(1, 0)] = -qp * anv * t2dx;
        jac[(1, 1)] = cost * v1v2
            + sint * hv1v2
            + omcost * hnv1 * hnv2
            + anv * (-sint * t2v1 + omcost * an2v1 - gamma * tmsint * hnv1);
        jac[(1, 2)] = cosl1
            * (cost * u1v2
                + sint * hu1v2
                + omcost * hnu1 * hnv2
                + anv * (-sint * t2u1 + omcost * an2u1 - gamma * tmsint * hnu1));
        jac[(1, 3)] = -q * anv * t2u1;
        jac[(1, 4)] = -q * anv * t2v1;

        // phi
        jac[(2, 0)] = -qp * anu * t2dx * cosl2_inv;
        jac[(2, 1)] = cosl2_inv
            * (cost * v1u2
                + sint * hv1u2
                + omcost * hnv1 * hnu2
                + anu * (-sint * t2v1 + omcost * an2v1 - gamma * tmsint * hnv1));
        jac[(2, 2)] = cosl2_inv
            * cosl1
            * (cost * u1u2
                + sint * hu1u2
                + omcost * hnu1 * hnu2
                + anu * (-sint * t2u1 + omcost * an2u1 - gamma * tmsint * hnu1));
        jac[(2, 3)] = -q * anu * t2u1 * cosl2_inv;
        jac[(2, 4)] = -q * anu * t2v1 * cosl2_inv;

        // x_t
        jac[(3, 0)] = pav * u2dx;
        jac[(3, 1)] = (sint * v1u2 + omcost * hv1u2 + tmsint * hnu2 * hnv1) / q;
        jac[(3, 2)] = (sint * u1u2 + omcost * hu1u2 + tmsint * hnu2 * hnu1) * cosl1 / q;
        jac[(3, 3)] = u1u2;
        jac[(3, 4)] = v1u2;

        // y_t
        jac[(4, 0)] = pav * v2dx;
        jac[(4, 1)] = (sint * v1v2 + omcost * hv1v2 + tmsint * hnv2 * hnv1) / q;
        jac[(4, 2)] = (sint * u1v2 + omcost * hu1v2 + tmsint * hnv2 * hnu1) * cosl1 / q;
        jac[(4, 3)] = u1v2;
        jac[(4, 4)] = v1v2;

        jac
    }

    /// Jacobian from a plane's local parameters to curvilinear parameters.
    ///
    /// `plane_id` may be [`SCATTERING_PLANE_ID`], whose axes are the global
    /// axes; any other ID must be known to `frames`.
    pub fn local_to_curvilinear(
        &self,
        frames: &FrameCache,
        momentum: &Vector3<f64>,
        plane_id: SensorId,
        charge: f64,
    ) -> Result<Matrix5<f64>> {
        let (normal, x_axis, y_axis) = if plane_id == SCATTERING_PLANE_ID {
            (Vector3::z(), Vector3::x(), Vector3::y())
        } else {
            (
                frames.normal(plane_id)?,
                frames.x_axis(plane_id)?,
                frames.y_axis(plane_id)?,
            )
        };

        let b = to_curvilinear_axes(&self.field_at(&Vector3::zeros())) * SPEED_OF_LIGHT_FACTOR;
        let h = unit_or_zero(&b);
        let p = to_curvilinear_axes(momentum);
        let t = unit_or_zero(&p);

        let cos_lambda = (t.x * t.x + t.y * t.y).sqrt();
        let u = unit_or_zero(&Vector3::z().cross(&t));
        let v = t.cross(&u);

        let i = to_curvilinear_axes(&normal);
        let j = to_curvilinear_axes(&x_axis);
        let k = to_curvilinear_axes(&y_axis);

        let h_cross_t = h.cross(&t);
        let n = unit_or_zero(&h_cross_t);
        let alpha = h_cross_t.norm();
        let q = -b.norm() * charge / p.norm();

        let (ti, tj, tk) = (t.dot(&i), t.dot(&j), t.dot(&k));
        let (vj, vk, vn) = (v.dot(&j), v.dot(&k), v.dot(&n));
        let (uj, uk, un) = (u.dot(&j), u.dot(&k), u.dot(&n));

        let mut jac = Matrix5::zeros();
        jac[(0, 0)] = 1.0;

        jac[(1, 1)] = ti * vj;
        jac[(1, 2)] = ti * vk;
        jac[(1, 3)] = -alpha * q * tj * vn;
        jac[(1, 4)] = -alpha * q * tk * vn;

        jac[(2, 1)] = ti * uj / cos_lambda;
        jac[(2, 2)] = ti * uk / cos_lambda;
        jac[(2, 3)] = -alpha * q * tj * un / cos_lambda;
        jac[(2, 4)] = -alpha * q * tk * un / cos_lambda;

        jac[(3, 3)] = uj;
        jac[(3, 4)] = uk;
        jac[(4, 3)] = vj;
        jac[(4, 4)] = vk;

        log::trace!("local-to-curvilinear jacobian for plane {plane_id}: {jac}");
        Ok(jac)
    }
}
