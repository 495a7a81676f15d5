//! Straight-line boundary stepping through a [`VolumeModel`].

use crate::volume::{NodeId, SensorBox, VolumeModel};
use nalgebra::Vector3;
use telgeo_core::SensorId;

/// Result of one step to the next boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryStep {
    /// Point reached on the boundary.
    pub point: Vector3<f64>,
    /// Unit direction of travel.
    pub direction: Vector3<f64>,
    /// Length of the step.
    pub step: f64,
    /// Sensor whose box was entered, if the step entered one.
    pub entered: Option<SensorId>,
}

/// Cursor moving along a straight ray through a volume model.
///
/// The model is shared; each trace owns its navigator.
#[derive(Debug, Clone)]
pub struct Navigator<'a> {
    model: &'a VolumeModel,
    point: Vector3<f64>,
    direction: Vector3<f64>,
    node: Option<NodeId>,
    last_step: f64,
}

impl<'a> Navigator<'a> {
    /// Creates a navigator at the origin heading along +z.
    pub fn new(model: &'a VolumeModel) -> Self {
        let point = Vector3::zeros();
        Self {
            model,
            point,
            direction: Vector3::z(),
            node: model.locate_node(&point),
            last_step: 0.0,
        }
    }

    /// Model this navigator walks through.
    pub fn model(&self) -> &'a VolumeModel {
        self.model
    }

    /// Starts a new trace; `direction` is normalized.
    ///
    /// Returns the node holding `point`, `None` outside the world.
    pub fn init_track(&mut self, point: Vector3<f64>, direction: Vector3<f64>) -> Option<NodeId> {
        self.direction = direction.normalize();
        self.last_step = 0.0;
        self.relocate(point)
    }

    /// Moves the cursor to `point` and finds its node again.
    pub fn relocate(&mut self, point: Vector3<f64>) -> Option<NodeId> {
        self.point = point;
        self.node = self.model.locate_node(&point);
        self.node
    }

    /// Current point.
    #[inline]
    pub fn point(&self) -> Vector3<f64> {
        self.point
    }

    /// Current unit direction.
    #[inline]
    pub fn direction(&self) -> Vector3<f64> {
        self.direction
    }

    /// Current node, `None` once outside the world.
    #[inline]
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Length of the last step taken.
    #[inline]
    pub fn last_step(&self) -> f64 {
        self.last_step
    }

    /// Returns true once the cursor has left the world.
    #[inline]
    pub fn is_outside(&self) -> bool {
        self.node.is_none()
    }

    /// Sensor of the current node, if it is a sensor box.
    pub fn current_sensor(&self) -> Option<SensorId> {
        match self.node? {
            NodeId::Sensor(i) => self.model.boxes().get(i).map(SensorBox::sensor_id),
            NodeId::World => None,
        }
    }

    /// Advances to the next boundary, but no further than `max_step`.
    ///
    /// When the boundary lies within `max_step` the cursor takes the node
    /// behind it; otherwise it stays in the current node. Returns the new
    /// node, `None` when the world was left or the cursor already was outside.
    pub fn find_next_boundary_and_step(&mut self, max_step: f64) -> Option<NodeId> {
        let Some(node) = self.node else {
            self.last_step = 0.0;
            return None;
        };

        let hit = self.model.next_boundary(node, &self.point, &self.direction);
        if hit.distance <= max_step {
            self.point += self.direction * hit.distance;
            self.last_step = hit.distance;
            self.node = hit.next;
        } else {
            self.point += self.direction * max_step;
            self.last_step = max_step;
        }
        self.node
    }

    /// Advances to the next boundary without a length limit.
    pub fn step_to_next_boundary(&mut self) -> Option<BoundaryStep> {
        self.find_next_boundary_and_step(f64::INFINITY)?;
        Some(BoundaryStep {
            point: self.point,
            direction: self.direction,
            step: self.last_step,
            entered: self.current_sensor(),
        })
    }
}

impl VolumeModel {
    /// Steps once from `point` along `direction` to the next boundary.
    ///
    /// Returns `None` when the ray leaves the world instead.
    pub fn step_to_next_boundary(
        &self,
        point: Vector3<f64>,
        direction: Vector3<f64>,
    ) -> Option<BoundaryStep> {
        let mut navigator = Navigator::new(self);
        navigator.init_track(point, direction);
        navigator.step_to_next_boundary()
    }
}
