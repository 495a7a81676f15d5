//! Track state carried through propagation.

use nalgebra::Vector3;

/// Position (mm), momentum (GeV/c) and signed charge (units of e).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackState {
    /// Global position.
    pub position: Vector3<f64>,
    /// Global momentum.
    pub momentum: Vector3<f64>,
    /// Signed charge.
    pub charge: f64,
}

impl TrackState {
    /// Creates a state.
    #[inline]
    pub fn new(position: Vector3<f64>, momentum: Vector3<f64>, charge: f64) -> Self {
        Self {
            position,
            momentum,
            charge,
        }
    }

    /// Momentum magnitude.
    #[inline]
    pub fn momentum_magnitude(&self) -> f64 {
        self.momentum.norm()
    }

    /// Unit direction of flight.
    #[inline]
    pub fn direction(&self) -> Vector3<f64> {
        self.momentum / self.momentum.norm()
    }

    /// Signed inverse momentum `q / |p|`.
    #[inline]
    pub fn charge_over_momentum(&self) -> f64 {
        self.charge / self.momentum.norm()
    }

    /// Same track flown backwards: momentum and charge reversed.
    ///
    /// Propagating the reversed state retraces the trajectory backwards.
    pub fn reversed(&self) -> Self {
        Self {
            position: self.position,
            momentum: -self.momentum,
            charge: -self.charge,
        }
    }
}
