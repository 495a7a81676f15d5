//! Telescope hit records and frame conversion.

use crate::frame::FrameCache;
use crate::plane::SensorId;
use crate::{Error, Result};
use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Frame in which a hit position is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum HitFrame {
    /// Sensor-local coordinates.
    Local,
    /// Global telescope coordinates.
    Global,
}

impl std::fmt::Display for HitFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HitFrame::Local => write!(f, "local"),
            HitFrame::Global => write!(f, "global"),
        }
    }
}

/// A measured hit on one sensor plane.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TelescopeHit {
    /// Sensor that recorded the hit.
    pub sensor_id: SensorId,
    /// Position in the frame named by `frame`.
    pub position: [f64; 3],
    /// Frame of `position`.
    pub frame: HitFrame,
    /// Hit time in detector units.
    pub time: f64,
    /// Packed symmetric position covariance (xx, xy, xz, yy, yz, zz).
    pub covariance: [f64; 6],
}

impl TelescopeHit {
    /// Creates a local hit with zero covariance.
    pub fn local(sensor_id: SensorId, position: [f64; 3]) -> Self {
        Self {
            sensor_id,
            position,
            frame: HitFrame::Local,
            time: 0.0,
            covariance: [0.0; 6],
        }
    }

    /// Creates a global hit with zero covariance.
    pub fn global(sensor_id: SensorId, position: [f64; 3]) -> Self {
        Self {
            frame: HitFrame::Global,
            ..Self::local(sensor_id, position)
        }
    }

    /// Sets the hit time.
    pub fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    /// Sets the packed covariance.
    pub fn with_covariance(mut self, covariance: [f64; 6]) -> Self {
        self.covariance = covariance;
        self
    }

    /// Position as a vector.
    #[inline]
    pub fn position_vector(&self) -> Vector3<f64> {
        Vector3::from(self.position)
    }

    #[inline]
    pub fn is_local(&self) -> bool {
        self.frame == HitFrame::Local
    }

    fn require(&self, expected: HitFrame) -> Result<()> {
        if self.frame == expected {
            Ok(())
        } else {
            Err(Error::InvalidGeometry(format!(
                "hit on sensor {} is in the {} frame, expected {}",
                self.sensor_id, self.frame, expected
            )))
        }
    }
}

impl FrameCache {
    /// Converts a local hit into the global frame.
    ///
    /// Every field apart from the position and frame flag is copied.
    pub fn hit_to_global(&self, hit: &TelescopeHit) -> Result<TelescopeHit> {
        hit.require(HitFrame::Local)?;
        let global = self.local_to_global(hit.sensor_id, &hit.position_vector())?;
        Ok(TelescopeHit {
            position: global.into(),
            frame: HitFrame::Global,
            ..*hit
        })
    }

    /// Converts a global hit into its sensor's local frame.
    pub fn hit_to_local(&self, hit: &TelescopeHit) -> Result<TelescopeHit> {
        hit.require(HitFrame::Global)?;
        let local = self.global_to_local(hit.sensor_id, &hit.position_vector())?;
        Ok(TelescopeHit {
            position: local.into(),
            frame: HitFrame::Local,
            ..*hit
        })
    }
}
