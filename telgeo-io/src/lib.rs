//! telgeo-io: JSON layout files for telgeo.
//!
//! A layout file lists the sensing planes of a telescope and, optionally,
//! a uniform magnetic field. Reading produces a [`Layout`] holding a
//! [`PlaneCatalog`](telgeo_core::PlaneCatalog); writing serializes a
//! catalog back, for example after alignment.

mod error;
mod layout;

pub use error::{Error, Result};
pub use layout::{layout_from_json, layout_to_json, read_layout, write_layout, Layout};
