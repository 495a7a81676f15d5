//! Geometry and navigation settings.

use telgeo_core::{Error, Result, DEFAULT_Z_TOLERANCE};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Radiation length of air in mm, for callers that want a material world.
pub const AIR_RADIATION_LENGTH: f64 = 303_900.0;

/// Configuration of the volume model built from a plane catalog.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeometryConfig {
    /// Half extent of the cubic world volume in mm.
    pub world_half_extent: f64,
    /// Radiation length of the world medium in mm; `None` is transparent.
    pub world_radiation_length: Option<f64>,
    /// Tolerance under which planes count as sharing a z position.
    pub z_tolerance: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            world_half_extent: 5000.0,
            world_radiation_length: None,
            z_tolerance: DEFAULT_Z_TOLERANCE,
        }
    }
}

impl GeometryConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the world half extent.
    pub fn with_world_half_extent(mut self, half_extent: f64) -> Self {
        self.world_half_extent = half_extent;
        self
    }

    /// Fills the world with a medium of the given radiation length.
    pub fn with_world_radiation_length(mut self, radiation_length: f64) -> Self {
        self.world_radiation_length = Some(radiation_length);
        self
    }

    /// Sets the z tie tolerance.
    pub fn with_z_tolerance(mut self, tolerance: f64) -> Self {
        self.z_tolerance = tolerance;
        self
    }

    /// Rejects non-positive extents and tolerances.
    pub fn validate(&self) -> Result<()> {
        if !self.world_half_extent.is_finite() || self.world_half_extent <= 0.0 {
            return Err(Error::ConfigError(format!(
                "world half extent must be positive, got {}",
                self.world_half_extent
            )));
        }
        if self.z_tolerance.is_nan() || self.z_tolerance < 0.0 {
            return Err(Error::ConfigError(format!(
                "z tolerance must not be negative, got {}",
                self.z_tolerance
            )));
        }
        if let Some(radlen) = self.world_radiation_length {
            if radlen.is_nan() || radlen <= 0.0 {
                return Err(Error::ConfigError(format!(
                    "world radiation length must be positive, got {radlen}"
                )));
            }
        }
        Ok(())
    }
}

/// Step control for navigation, material integration and plane search.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NavigationConfig {
    /// Distance (mm) a point is pushed past a boundary before relocating.
    pub nudge_epsilon: f64,
    /// Steps shorter than this (mm) count as degenerate.
    pub degenerate_step: f64,
    /// Consecutive degenerate steps tolerated before giving up.
    pub max_degenerate_steps: usize,
    /// Remaining path (mm) below which integration stops.
    pub min_remaining_step: f64,
    /// Boundary steps tried while searching for a plane entrance.
    pub max_entrance_steps: usize,
    /// Conversion from mm of path to the units of `1 / radiation length`.
    pub length_scale: f64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            nudge_epsilon: 0.01,
            degenerate_step: 1e-8,
            max_degenerate_steps: 3,
            min_remaining_step: 1e-9,
            max_entrance_steps: 10,
            length_scale: 0.1,
        }
    }
}

impl NavigationConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the boundary nudge distance.
    pub fn with_nudge_epsilon(mut self, epsilon: f64) -> Self {
        self.nudge_epsilon = epsilon;
        self
    }

    /// Sets the degenerate step threshold.
    pub fn with_degenerate_step(mut self, threshold: f64) -> Self {
        self.degenerate_step = threshold;
        self
    }

    /// Sets the number of tolerated consecutive degenerate steps.
    pub fn with_max_degenerate_steps(mut self, count: usize) -> Self {
        self.max_degenerate_steps = count;
        self
    }

    /// Sets the minimum remaining path.
    pub fn with_min_remaining_step(mut self, step: f64) -> Self {
        self.min_remaining_step = step;
        self
    }

    /// Sets the entrance search step limit.
    pub fn with_max_entrance_steps(mut self, count: usize) -> Self {
        self.max_entrance_steps = count;
        self
    }

    /// Sets the path length scale.
    pub fn with_length_scale(mut self, scale: f64) -> Self {
        self.length_scale = scale;
        self
    }

    /// Rejects non-positive nudges and thresholds.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("nudge epsilon", self.nudge_epsilon),
            ("degenerate step", self.degenerate_step),
            ("min remaining step", self.min_remaining_step),
            ("length scale", self.length_scale),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::ConfigError(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if self.nudge_epsilon <= self.degenerate_step {
            return Err(Error::ConfigError(format!(
                "nudge epsilon {} must exceed the degenerate step threshold {}",
                self.nudge_epsilon, self.degenerate_step
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let geometry = GeometryConfig::default();
        assert_eq!(geometry.world_half_extent, 5000.0);
        assert!(geometry.world_radiation_length.is_none());
        assert!(geometry.validate().is_ok());

        let nav = NavigationConfig::new();
        assert_eq!(nav.max_degenerate_steps, 3);
        assert_eq!(nav.max_entrance_steps, 10);
        assert!(nav.validate().is_ok());
    }

    #[test]
    fn test_builders_and_validation() {
        let geometry = GeometryConfig::new()
            .with_world_half_extent(-1.0)
            .with_world_radiation_length(AIR_RADIATION_LENGTH);
        assert!(matches!(geometry.validate(), Err(Error::ConfigError(_))));

        let nav = NavigationConfig::new()
            .with_nudge_epsilon(1e-9)
            .with_max_degenerate_steps(0);
        assert_eq!(nav.max_degenerate_steps, 0);
        assert!(nav.validate().is_err());

        assert!(NavigationConfig::new()
            .with_length_scale(0.0)
            .validate()
            .is_err());
    }
}
