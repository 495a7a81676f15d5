//! Local/global coordinate frames of sensor planes.
//!
//! A plane's local frame is mapped to the global frame by
//! `global = R * local + c`, with `R = Ry(beta) * Rx(alpha) * Rz(gamma) * F`
//! where `F` is the plane's integer flip matrix and `c` its centre.

use crate::catalog::PlaneCatalog;
use crate::plane::{PlaneDescriptor, SensorId};
use crate::{Error, Result};
use nalgebra::{Matrix3, Vector3};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Rotation matrix for the given angles in radians.
///
/// Equal to `Ry(beta) * Rx(alpha) * Rz(gamma)`.
pub fn rotation_from_angles(alpha: f64, beta: f64, gamma: f64) -> Matrix3<f64> {
    let (sin_a, cos_a) = alpha.sin_cos();
    let (sin_b, cos_b) = beta.sin_cos();
    let (sin_g, cos_g) = gamma.sin_cos();

    Matrix3::new(
        cos_b * cos_g + sin_a * sin_b * sin_g,
        sin_a * sin_b * cos_g - cos_b * sin_g,
        cos_a * sin_b,
        cos_a * sin_g,
        cos_a * cos_g,
        -sin_a,
        sin_a * cos_b * sin_g - sin_b * cos_g,
        sin_a * cos_b * cos_g + sin_b * sin_g,
        cos_a * cos_b,
    )
}

/// `cos(alpha)` below which the rotation is treated as gimbal-locked.
const GIMBAL_LOCK_COS: f64 = 1e-12;

/// Recovers `(alpha, beta, gamma)` in radians from a rotation built by
/// [`rotation_from_angles`].
///
/// The returned angles satisfy `alpha` in [-pi/2, pi/2] and `beta`, `gamma`
/// in (-pi, pi], and rebuild the same matrix for any input angles. When
/// `cos(alpha)` vanishes only `beta ∓ gamma` is defined; `gamma` is then
/// set to zero.
pub fn angles_from_rotation(rotation: &Matrix3<f64>) -> Vector3<f64> {
    let sin_a = -rotation[(1, 2)];
    let cos_a = rotation[(1, 0)].hypot(rotation[(1, 1)]);
    let alpha = sin_a.atan2(cos_a);

    if cos_a < GIMBAL_LOCK_COS {
        let beta = (sin_a.signum() * rotation[(0, 1)]).atan2(rotation[(0, 0)]);
        return Vector3::new(alpha, beta, 0.0);
    }

    let beta = rotation[(0, 2)].atan2(rotation[(2, 2)]);
    let gamma = rotation[(1, 0)].atan2(rotation[(1, 1)]);
    Vector3::new(alpha, beta, gamma)
}

/// Angle-only rotation of a plane (flip matrix not applied).
pub fn angle_rotation(plane: &PlaneDescriptor) -> Matrix3<f64> {
    let (alpha, beta, gamma) = plane.angles_radians();
    rotation_from_angles(alpha, beta, gamma)
}

/// Full placement rotation of a plane: angular rotation after the flip.
pub fn placement_rotation(plane: &PlaneDescriptor) -> Matrix3<f64> {
    angle_rotation(plane) * plane.flip.to_matrix3()
}

/// Affine transform between a plane's local frame and the global frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneFrame {
    rotation: Matrix3<f64>,
    inverse: Matrix3<f64>,
    translation: Vector3<f64>,
}

impl PlaneFrame {
    /// Builds the frame of a validated descriptor.
    ///
    /// The inverse is exact: the angular part is orthonormal and the flip
    /// matrix has determinant ±1.
    pub fn from_descriptor(plane: &PlaneDescriptor) -> Self {
        let angles = angle_rotation(plane);
        Self {
            rotation: angles * plane.flip.to_matrix3(),
            inverse: plane.flip.inverse_matrix3() * angles.transpose(),
            translation: plane.offset(),
        }
    }

    /// Builds a frame from an arbitrary placement.
    ///
    /// Returns `None` if `rotation` is singular.
    pub fn from_placement(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Option<Self> {
        let inverse = rotation.try_inverse()?;
        Some(Self {
            rotation,
            inverse,
            translation,
        })
    }

    /// Local-to-global rotation part.
    #[inline]
    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rotation
    }

    /// Global position of the local origin.
    #[inline]
    pub fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    /// Transforms a point from the local to the global frame.
    #[inline]
    pub fn local_to_global_point(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * local + self.translation
    }

    /// Transforms a point from the global to the local frame.
    #[inline]
    pub fn global_to_local_point(&self, global: &Vector3<f64>) -> Vector3<f64> {
        self.inverse * (global - self.translation)
    }

    /// Transforms a free vector from the local to the global frame.
    #[inline]
    pub fn local_to_global_vector(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * local
    }

    /// Transforms a free vector from the global to the local frame.
    #[inline]
    pub fn global_to_local_vector(&self, global: &Vector3<f64>) -> Vector3<f64> {
        self.inverse * global
    }

    /// Local x axis in global coordinates.
    pub fn x_axis(&self) -> Vector3<f64> {
        self.local_to_global_vector(&Vector3::x())
    }

    /// Local y axis in global coordinates.
    pub fn y_axis(&self) -> Vector3<f64> {
        self.local_to_global_vector(&Vector3::y())
    }

    /// Plane normal (local z axis) in global coordinates.
    pub fn normal(&self) -> Vector3<f64> {
        self.local_to_global_vector(&Vector3::z())
    }
}

#[derive(Debug)]
struct FrameEntry {
    descriptor: PlaneDescriptor,
    frame: OnceLock<PlaneFrame>,
}

/// Lazily populated per-plane frame cache.
///
/// Frames are computed on first use and kept until the cache is dropped;
/// a geometry rebuild creates a new cache.
#[derive(Debug, Default)]
pub struct FrameCache {
    entries: BTreeMap<SensorId, FrameEntry>,
}

impl FrameCache {
    /// Creates a cache for every plane of the catalog.
    pub fn new(catalog: &PlaneCatalog) -> Self {
        let entries = catalog
            .iter()
            .map(|plane| {
                (
                    plane.sensor_id,
                    FrameEntry {
                        descriptor: plane.clone(),
                        frame: OnceLock::new(),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Number of planes known to the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache knows no planes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of frames computed so far.
    pub fn computed(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.frame.get().is_some())
            .count()
    }

    fn entry(&self, sensor_id: SensorId) -> Result<&FrameEntry> {
        self.entries
            .get(&sensor_id)
            .ok_or_else(|| Error::unknown_plane("frame lookup", sensor_id))
    }

    /// Frame of a plane, computed on first access.
    pub fn frame(&self, sensor_id: SensorId) -> Result<&PlaneFrame> {
        let entry = self.entry(sensor_id)?;
        Ok(entry
            .frame
            .get_or_init(|| PlaneFrame::from_descriptor(&entry.descriptor)))
    }

    /// Local point to global point.
    pub fn local_to_global(&self, sensor_id: SensorId, local: &Vector3<f64>) -> Result<Vector3<f64>> {
        Ok(self.frame(sensor_id)?.local_to_global_point(local))
    }

    /// Global point to local point.
    pub fn global_to_local(&self, sensor_id: SensorId, global: &Vector3<f64>) -> Result<Vector3<f64>> {
        Ok(self.frame(sensor_id)?.global_to_local_point(global))
    }

    /// Local free vector to global free vector.
    pub fn local_to_global_vector(
        &self,
        sensor_id: SensorId,
        local: &Vector3<f64>,
    ) -> Result<Vector3<f64>> {
        Ok(self.frame(sensor_id)?.local_to_global_vector(local))
    }

    /// Global free vector to local free vector.
    pub fn global_to_local_vector(
        &self,
        sensor_id: SensorId,
        global: &Vector3<f64>,
    ) -> Result<Vector3<f64>> {
        Ok(self.frame(sensor_id)?.global_to_local_vector(global))
    }

    /// Plane normal in the global frame.
    pub fn normal(&self, sensor_id: SensorId) -> Result<Vector3<f64>> {
        Ok(self.frame(sensor_id)?.normal())
    }

    /// Local x axis in the global frame.
    pub fn x_axis(&self, sensor_id: SensorId) -> Result<Vector3<f64>> {
        Ok(self.frame(sensor_id)?.x_axis())
    }

    /// Local y axis in the global frame.
    pub fn y_axis(&self, sensor_id: SensorId) -> Result<Vector3<f64>> {
        Ok(self.frame(sensor_id)?.y_axis())
    }

    /// Global x axis of the angle-only rotation (flip ignored).
    pub fn angle_x_axis(&self, sensor_id: SensorId) -> Result<Vector3<f64>> {
        Ok(angle_rotation(&self.entry(sensor_id)?.descriptor) * Vector3::x())
    }

    /// Global y axis of the angle-only rotation (flip ignored).
    pub fn angle_y_axis(&self, sensor_id: SensorId) -> Result<Vector3<f64>> {
        Ok(angle_rotation(&self.entry(sensor_id)?.descriptor) * Vector3::y())
    }

    /// Plane centre.
    pub fn offset(&self, sensor_id: SensorId) -> Result<Vector3<f64>> {
        Ok(self.entry(sensor_id)?.descriptor.offset())
    }

    /// Flip matrix embedded in 3x3.
    pub fn flip_matrix(&self, sensor_id: SensorId) -> Result<Matrix3<f64>> {
        Ok(self.entry(sensor_id)?.descriptor.flip.to_matrix3())
    }
}
