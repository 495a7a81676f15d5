//! Sensor plane descriptors.

use crate::{Error, Result};
use nalgebra::{Matrix3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Integer sensor identifier, unique within a layout.
///
/// Real planes use non-negative IDs; negative values are lookup and
/// search sentinels.
pub type SensorId = i32;

/// Pseudo-plane ID standing for a scattering plane without a placement.
///
/// Its local axes coincide with the global axes, so no real plane may
/// carry it.
pub const SCATTERING_PLANE_ID: SensorId = 314;

/// Integer rotation/reflection applied in the plane's XY before the
/// angular rotations.
///
/// Formula:
/// x' = r1 * x + r2 * y
/// y' = r3 * x + r4 * y
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FlipMatrix {
    pub r1: i32,
    pub r2: i32,
    pub r3: i32,
    pub r4: i32,
}

impl FlipMatrix {
    /// Create a flip matrix from its four entries (row major).
    pub fn new(r1: i32, r2: i32, r3: i32, r4: i32) -> Self {
        Self { r1, r2, r3, r4 }
    }

    /// Create an identity flip matrix.
    pub fn identity() -> Self {
        Self::new(1, 0, 0, 1)
    }

    /// Determinant of the 2x2 matrix.
    #[inline]
    pub fn determinant(&self) -> i32 {
        self.r1 * self.r4 - self.r2 * self.r3
    }

    /// Check that this is a combination of rotations and reflections.
    ///
    /// The determinant must be exactly +1 or -1.
    pub fn validate(&self, sensor_id: SensorId) -> Result<()> {
        match self.determinant() {
            1 | -1 => Ok(()),
            det => Err(Error::InvalidGeometry(format!(
                "sensor {sensor_id}: flip matrix [[{}, {}], [{}, {}]] has determinant {det}, \
                 expected 1 or -1",
                self.r1, self.r2, self.r3, self.r4
            ))),
        }
    }

    /// Embed into a 3x3 matrix that leaves the z axis untouched.
    pub fn to_matrix3(&self) -> Matrix3<f64> {
        Matrix3::new(
            f64::from(self.r1),
            f64::from(self.r2),
            0.0,
            f64::from(self.r3),
            f64::from(self.r4),
            0.0,
            0.0,
            0.0,
            1.0,
        )
    }

    /// Inverse of [`to_matrix3`](Self::to_matrix3) for a validated matrix.
    pub fn inverse_matrix3(&self) -> Matrix3<f64> {
        let det = f64::from(self.determinant());
        Matrix3::new(
            f64::from(self.r4) / det,
            -f64::from(self.r2) / det,
            0.0,
            -f64::from(self.r3) / det,
            f64::from(self.r1) / det,
            0.0,
            0.0,
            0.0,
            1.0,
        )
    }
}

impl Default for FlipMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

/// Pose, extent and material of one sensing plane.
///
/// Lengths are in millimetres, angles in degrees. The plane is placed by
/// first applying [`FlipMatrix`], then the rotation about Z (`gamma`),
/// X (`alpha`) and Y (`beta`), and finally translating to `position`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlaneDescriptor {
    /// Unique sensor identifier.
    pub sensor_id: SensorId,
    /// Plane centre in the global frame.
    pub position: [f64; 3],
    /// Rotation angles (alpha about X, beta about Y, gamma about Z) in degrees.
    pub angles: [f64; 3],
    /// Integer rotation/reflection applied before the angular rotations.
    pub flip: FlipMatrix,
    /// Full extents along local x, y and the thickness along local z.
    pub size: [f64; 3],
    /// Number of pixels along x and y.
    pub pixels: [u32; 2],
    /// Pixel pitch along x and y.
    pub pitch: [f64; 2],
    /// Intrinsic spatial resolution along x and y.
    pub resolution: [f64; 2],
    /// Radiation length of the sensor material.
    pub radiation_length: f64,
    /// Name of the pixel-level geometry, opaque to the geometry core.
    pub pixel_geometry: String,
}

impl PlaneDescriptor {
    /// Silicon radiation length in mm.
    pub const SILICON_RADIATION_LENGTH: f64 = 93.66;

    /// Pixel geometry used when a layout does not name one.
    pub const DEFAULT_PIXEL_GEOMETRY: &'static str = "CAST";

    /// Creates an unrotated plane at `position` with Mimosa26-like defaults
    /// for size and pixelization.
    pub fn new(sensor_id: SensorId, position: [f64; 3]) -> Self {
        Self {
            sensor_id,
            position,
            angles: [0.0; 3],
            flip: FlipMatrix::identity(),
            size: [21.2, 10.6, 0.05],
            pixels: [1152, 576],
            pitch: [0.0184, 0.0184],
            resolution: [0.0045, 0.0045],
            radiation_length: Self::SILICON_RADIATION_LENGTH,
            pixel_geometry: Self::DEFAULT_PIXEL_GEOMETRY.to_string(),
        }
    }

    /// Sets the rotation angles in degrees.
    pub fn with_angles(mut self, alpha: f64, beta: f64, gamma: f64) -> Self {
        self.angles = [alpha, beta, gamma];
        self
    }

    /// Sets the flip matrix.
    pub fn with_flip(mut self, flip: FlipMatrix) -> Self {
        self.flip = flip;
        self
    }

    /// Sets the full extents (x, y, thickness).
    pub fn with_size(mut self, x: f64, y: f64, thickness: f64) -> Self {
        self.size = [x, y, thickness];
        self
    }

    /// Sets the pixel counts and pitches.
    pub fn with_pixels(mut self, nx: u32, ny: u32, pitch_x: f64, pitch_y: f64) -> Self {
        self.pixels = [nx, ny];
        self.pitch = [pitch_x, pitch_y];
        self
    }

    /// Sets the intrinsic resolution.
    pub fn with_resolution(mut self, x: f64, y: f64) -> Self {
        self.resolution = [x, y];
        self
    }

    /// Sets the radiation length.
    pub fn with_radiation_length(mut self, radiation_length: f64) -> Self {
        self.radiation_length = radiation_length;
        self
    }

    /// Sets the pixel geometry name.
    pub fn with_pixel_geometry(mut self, name: impl Into<String>) -> Self {
        self.pixel_geometry = name.into();
        self
    }

    /// Validates the descriptor.
    ///
    /// Rejects negative or reserved sensor IDs, flip matrices whose
    /// determinant is not ±1 and non-positive extents or radiation length.
    pub fn validate(&self) -> Result<()> {
        if self.sensor_id < 0 {
            return Err(Error::InvalidGeometry(format!(
                "sensor ID {} must not be negative",
                self.sensor_id
            )));
        }
        if self.sensor_id == SCATTERING_PLANE_ID {
            return Err(Error::InvalidGeometry(format!(
                "sensor ID {SCATTERING_PLANE_ID} is reserved for the scattering pseudo-plane"
            )));
        }
        self.flip.validate(self.sensor_id)?;

        if self.size.iter().any(|&s| !s.is_finite() || s <= 0.0) {
            return Err(Error::InvalidGeometry(format!(
                "sensor {}: plane size {:?} must be positive",
                self.sensor_id, self.size
            )));
        }
        if self.radiation_length.is_nan() || self.radiation_length <= 0.0 {
            return Err(Error::InvalidGeometry(format!(
                "sensor {}: radiation length {} must be positive",
                self.sensor_id, self.radiation_length
            )));
        }
        Ok(())
    }

    /// Plane centre as a vector.
    #[inline]
    pub fn offset(&self) -> Vector3<f64> {
        Vector3::from(self.position)
    }

    /// Half extents of the sensor box.
    #[inline]
    pub fn half_extents(&self) -> Vector3<f64> {
        Vector3::from(self.size) * 0.5
    }

    /// Rotation angles (alpha, beta, gamma) in radians.
    #[inline]
    pub fn angles_radians(&self) -> (f64, f64, f64) {
        (
            self.angles[0].to_radians(),
            self.angles[1].to_radians(),
            self.angles[2].to_radians(),
        )
    }
}
