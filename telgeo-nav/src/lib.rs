//! telgeo-nav: Volume navigation for beam-telescope geometry.
//!
//! Builds a box-per-plane volume model from a plane catalog and walks
//! straight rays through it:
//!
//! - **Navigator** - boundary stepper holding the cursor of one trace
//! - **RadiationIntegrator** - `X/X0` along a segment
//! - **PlaneIntersector** - next plane on a line, helix/plane intersection
//! - **TelescopeGeometry** - context owning catalog, frames, model and field
//!

mod config;
mod geometry;
mod intersect;
mod navigator;
mod radiation;
mod volume;

pub use config::{GeometryConfig, NavigationConfig, AIR_RADIATION_LENGTH};
pub use geometry::TelescopeGeometry;
pub use intersect::{
    solve_quadratic, Intersection, PlaneCrossing, PlaneIntersector, NO_PLANE_FOUND,
};
pub use navigator::{BoundaryStep, Navigator};
pub use radiation::{RadiationIntegrator, RadiationReport, TerminationReason};
pub use volume::{
    node_name, sensor_id_from_node_name, NodeId, SensorBox, VolumeModel, NO_SENSOR,
    WORLD_NODE_NAME,
};
