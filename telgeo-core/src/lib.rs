//! telgeo-core: Plane catalog, coordinate frames and hit types for
//! beam-telescope geometry.
//!
//! This crate holds the authoritative description of every sensing plane
//! and the frame algebra that maps hits between sensor-local and global
//! coordinates.

pub mod catalog;
pub mod error;
pub mod field;
pub mod frame;
pub mod hit;
pub mod plane;

pub use catalog::{PlaneCatalog, ZOrderMap, DEFAULT_Z_TOLERANCE};
pub use error::{Error, Result};
pub use field::{MagneticField, UniformField};
pub use frame::{
    angle_rotation, angles_from_rotation, placement_rotation, rotation_from_angles, FrameCache,
    PlaneFrame,
};
pub use hit::{HitFrame, TelescopeHit};
pub use plane::{FlipMatrix, PlaneDescriptor, SensorId, SCATTERING_PLANE_ID};

/// Re-exported so downstream crates share one nalgebra version.
pub use nalgebra;
