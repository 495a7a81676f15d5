//! telgeo-track: Track propagation through a uniform magnetic field.
//!
//! Provides position/momentum propagation along a helix (or a straight line
//! without field) and the analytic Jacobians used to carry track-parameter
//! covariances between planes:
//!
//! - **Small-step** Jacobian in `(q/p, tx, ty, x, y)` for short z steps
//! - **Curvilinear** helix Jacobian between two points of one trajectory
//! - **Local-to-curvilinear** Jacobian at a sensor plane
//!
#![warn(missing_docs)]

mod jacobian;
mod propagator;
mod state;

pub use propagator::{unit_or_zero, TrackPropagator, SPEED_OF_LIGHT_FACTOR};
pub use state::TrackState;
pub use telgeo_core::SCATTERING_PLANE_ID;
