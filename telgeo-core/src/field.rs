//! Magnetic field providers.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Source of the magnetic field (tesla) at a global position (mm).
///
/// Propagation samples the field once per call and treats it as uniform
/// over the step.
pub trait MagneticField: Send + Sync {
    /// Field vector at `position`.
    fn field_at(&self, position: &Vector3<f64>) -> Vector3<f64>;
}

/// Field that is the same everywhere.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UniformField {
    /// Field vector in tesla.
    pub field: [f64; 3],
}

impl UniformField {
    pub fn new(bx: f64, by: f64, bz: f64) -> Self {
        Self { field: [bx, by, bz] }
    }

    /// Field-free region.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Returns true if every component is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.field.iter().all(|&b| b == 0.0)
    }
}

impl Default for UniformField {
    fn default() -> Self {
        Self::zero()
    }
}

impl MagneticField for UniformField {
    #[inline]
    fn field_at(&self, _position: &Vector3<f64>) -> Vector3<f64> {
        Vector3::from(self.field)
    }
}

impl<F: MagneticField + ?Sized> MagneticField for &F {
    fn field_at(&self, position: &Vector3<f64>) -> Vector3<f64> {
        (**self).field_at(position)
    }
}

impl<F: MagneticField + ?Sized> MagneticField for Box<F> {
    fn field_at(&self, position: &Vector3<f64>) -> Vector3<f64> {
        (**self).field_at(position)
    }
}
