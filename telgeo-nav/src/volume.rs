//! Volumetric model of the telescope: a world box holding one box per plane.

use crate::config::GeometryConfig;
use nalgebra::{Matrix3, Vector3};
use std::collections::BTreeMap;
use telgeo_core::{Error, PlaneCatalog, PlaneDescriptor, PlaneFrame, Result, SensorId};

/// Sensor ID reported for points that lie in no sensor.
pub const NO_SENSOR: SensorId = -999;

/// Name of the world volume.
pub const WORLD_NODE_NAME: &str = "volume_World";

const SENSOR_NODE_PREFIX: &str = "volume_SensorID:";

/// Entry parameters at or above this (mm) still count as ahead of the point.
const ENTRY_TOLERANCE: f64 = 1e-9;

/// Name of the box volume of a sensor.
pub fn node_name(sensor_id: SensorId) -> String {
    format!("{SENSOR_NODE_PREFIX}{sensor_id}")
}

/// Sensor ID encoded in a node name, if any.
pub fn sensor_id_from_node_name(name: &str) -> Option<SensorId> {
    name.strip_prefix(SENSOR_NODE_PREFIX)
        .filter(|rest| !rest.is_empty())
        .and_then(|rest| rest.parse().ok())
}

/// Handle of a node in the volume hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    /// The world volume.
    World,
    /// Box at the given index of the model.
    Sensor(usize),
}

/// Parameter interval `[enter, exit]` over which a ray lies inside an
/// axis-aligned box centred at the origin.
fn slab_interval(
    origin: &Vector3<f64>,
    direction: &Vector3<f64>,
    half_extents: &Vector3<f64>,
) -> Option<(f64, f64)> {
    let mut enter = f64::NEG_INFINITY;
    let mut exit = f64::INFINITY;

    for axis in 0..3 {
        let o = origin[axis];
        let d = direction[axis];
        let h = half_extents[axis];

        if d == 0.0 {
            if o.abs() > h {
                return None;
            }
            continue;
        }

        let t1 = (-h - o) / d;
        let t2 = (h - o) / d;
        let (near, far) = if t1 < t2 { (t1, t2) } else { (t2, t1) };
        enter = enter.max(near);
        exit = exit.min(far);
    }

    (enter <= exit).then_some((enter, exit))
}

/// Box volume of one sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorBox {
    sensor_id: SensorId,
    name: String,
    frame: PlaneFrame,
    half_extents: Vector3<f64>,
    radiation_length: f64,
}

impl SensorBox {
    fn from_descriptor(plane: &PlaneDescriptor) -> Self {
        Self {
            sensor_id: plane.sensor_id,
            name: node_name(plane.sensor_id),
            frame: PlaneFrame::from_descriptor(plane),
            half_extents: plane.half_extents(),
            radiation_length: plane.radiation_length,
        }
    }

    /// Sensor this box belongs to.
    pub fn sensor_id(&self) -> SensorId {
        self.sensor_id
    }

    /// Node name of the box.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Placement of the box in the world.
    pub fn frame(&self) -> &PlaneFrame {
        &self.frame
    }

    /// Half extents in the box frame.
    pub fn half_extents(&self) -> &Vector3<f64> {
        &self.half_extents
    }

    /// Radiation length of the box material.
    pub fn radiation_length(&self) -> f64 {
        self.radiation_length
    }

    /// Returns true if the global point lies inside or on the box.
    pub fn contains(&self, point: &Vector3<f64>) -> bool {
        let local = self.frame.global_to_local_point(point);
        (0..3).all(|axis| local[axis].abs() <= self.half_extents[axis])
    }

    /// Ray parameters at which a global ray enters and leaves the box.
    pub fn ray_interval(
        &self,
        point: &Vector3<f64>,
        direction: &Vector3<f64>,
    ) -> Option<(f64, f64)> {
        let origin = self.frame.global_to_local_point(point);
        let local_dir = self.frame.global_to_local_vector(direction);
        slab_interval(&origin, &local_dir, &self.half_extents)
    }
}

/// Distance to the next boundary along a ray and the node behind it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BoundaryHit {
    pub distance: f64,
    pub next: Option<NodeId>,
}

/// Immutable volume hierarchy built from a plane catalog.
///
/// The world is an axis-aligned cube centred at the origin. Each plane
/// contributes one box placed with the plane's full rotation and centre.
#[derive(Debug, Clone)]
pub struct VolumeModel {
    world_half_extent: f64,
    world_radiation_length: Option<f64>,
    boxes: Vec<SensorBox>,
    index: BTreeMap<SensorId, usize>,
    paths: BTreeMap<SensorId, String>,
}

impl VolumeModel {
    /// Builds the model for every plane of the catalog.
    ///
    /// Fails with [`Error::MissingGeometry`] on an empty catalog.
    pub fn build(catalog: &PlaneCatalog, config: &GeometryConfig) -> Result<Self> {
        config.validate()?;
        if catalog.is_empty() {
            return Err(Error::MissingGeometry(
                "cannot build a volume model without planes".to_string(),
            ));
        }

        let boxes: Vec<SensorBox> = catalog.iter().map(SensorBox::from_descriptor).collect();
        let index = boxes
            .iter()
            .enumerate()
            .map(|(i, b)| (b.sensor_id, i))
            .collect();
        let paths = boxes
            .iter()
            .map(|b| (b.sensor_id, format!("/{WORLD_NODE_NAME}_1/{}_1", b.name)))
            .collect();

        Ok(Self {
            world_half_extent: config.world_half_extent,
            world_radiation_length: config.world_radiation_length,
            boxes,
            index,
            paths,
        })
    }

    /// Half extent of the world cube.
    pub fn world_half_extent(&self) -> f64 {
        self.world_half_extent
    }

    /// Sensor boxes in z-order.
    pub fn boxes(&self) -> &[SensorBox] {
        &self.boxes
    }

    /// Box of a sensor.
    pub fn sensor_box(&self, sensor_id: SensorId) -> Result<&SensorBox> {
        self.index
            .get(&sensor_id)
            .map(|&i| &self.boxes[i])
            .ok_or_else(|| Error::unknown_plane("volume lookup", sensor_id))
    }

    /// Node of a sensor's box.
    pub fn sensor_node(&self, sensor_id: SensorId) -> Option<NodeId> {
        self.index.get(&sensor_id).map(|&i| NodeId::Sensor(i))
    }

    /// Hierarchy path of a sensor's box.
    pub fn path(&self, sensor_id: SensorId) -> Result<&str> {
        self.paths
            .get(&sensor_id)
            .map(String::as_str)
            .ok_or_else(|| Error::unknown_plane("path lookup", sensor_id))
    }

    /// Name of a node.
    ///
    /// A sensor handle this model does not hold resolves to the world.
    pub fn node_name(&self, node: NodeId) -> &str {
        match node {
            NodeId::Sensor(i) => self.boxes.get(i).map_or(WORLD_NODE_NAME, |b| b.name()),
            NodeId::World => WORLD_NODE_NAME,
        }
    }

    /// Parent of a node; the world has none.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        match node {
            NodeId::World => None,
            NodeId::Sensor(_) => Some(NodeId::World),
        }
    }

    /// Radiation length of the medium filling a node, if it has one.
    ///
    /// A sensor handle this model does not hold gets the world medium.
    pub fn radiation_length(&self, node: NodeId) -> Option<f64> {
        match node {
            NodeId::Sensor(i) => self
                .boxes
                .get(i)
                .map_or(self.world_radiation_length, |b| Some(b.radiation_length)),
            NodeId::World => self.world_radiation_length,
        }
    }

    /// Returns true if the point lies outside the world cube.
    pub fn is_outside(&self, point: &Vector3<f64>) -> bool {
        point.iter().any(|c| c.abs() > self.world_half_extent)
    }

    /// Deepest node containing the point, or `None` outside the world.
    ///
    /// Overlapping boxes resolve to the most upstream one.
    pub fn locate_node(&self, point: &Vector3<f64>) -> Option<NodeId> {
        if self.is_outside(point) {
            return None;
        }
        Some(
            self.boxes
                .iter()
                .position(|b| b.contains(point))
                .map_or(NodeId::World, NodeId::Sensor),
        )
    }

    /// Sensor containing the point, or [`NO_SENSOR`].
    ///
    /// Walks up from the containing node until a node named after a sensor
    /// is found.
    pub fn locate(&self, point: &Vector3<f64>) -> SensorId {
        let mut node = self.locate_node(point);
        while let Some(current) = node {
            if let Some(sensor_id) = sensor_id_from_node_name(self.node_name(current)) {
                return sensor_id;
            }
            node = self.parent(current);
        }
        NO_SENSOR
    }

    /// Replaces the placement of a sensor's box.
    ///
    /// `rotation` is the full local-to-global rotation and must be invertible.
    pub fn set_placement(
        &mut self,
        sensor_id: SensorId,
        translation: Vector3<f64>,
        rotation: Matrix3<f64>,
    ) -> Result<()> {
        let i = *self
            .index
            .get(&sensor_id)
            .ok_or_else(|| Error::unknown_plane("placement update", sensor_id))?;
        let frame = PlaneFrame::from_placement(rotation, translation).ok_or_else(|| {
            Error::InvalidGeometry(format!(
                "sensor {sensor_id}: placement rotation is not invertible"
            ))
        })?;
        log::debug!("placement of sensor {sensor_id} moved to {translation:?}");
        self.boxes[i].frame = frame;
        Ok(())
    }

    /// Distance from `point` to the next boundary of `node` along
    /// `direction` and the node entered there.
    ///
    /// From a box the next node is always the world. From the world it is
    /// the nearest box ahead, or `None` when the ray leaves the world first.
    /// A box the point already touches yields a zero distance.
    pub(crate) fn next_boundary(
        &self,
        node: NodeId,
        point: &Vector3<f64>,
        direction: &Vector3<f64>,
    ) -> BoundaryHit {
        match node {
            NodeId::Sensor(i) => {
                let distance = self
                    .boxes
                    .get(i)
                    .and_then(|b| b.ray_interval(point, direction))
                    .map_or(0.0, |(_, exit)| exit.max(0.0));
                BoundaryHit {
                    distance,
                    next: Some(NodeId::World),
                }
            }
            NodeId::World => {
                let half = Vector3::repeat(self.world_half_extent);
                let world_exit = slab_interval(point, direction, &half)
                    .map_or(0.0, |(_, exit)| exit.max(0.0));

                let nearest = self
                    .boxes
                    .iter()
                    .enumerate()
                    .filter_map(|(i, b)| {
                        let (enter, exit) = b.ray_interval(point, direction)?;
                        let enter = if enter >= -ENTRY_TOLERANCE {
                            enter.max(0.0)
                        } else {
                            return None;
                        };
                        (exit > enter).then_some((enter, i))
                    })
                    .min_by(|a, b| a.0.total_cmp(&b.0));

                match nearest {
                    Some((distance, i)) if distance <= world_exit => BoundaryHit {
                        distance,
                        next: Some(NodeId::Sensor(i)),
                    },
                    _ => BoundaryHit {
                        distance: world_exit,
                        next: None,
                    },
                }
            }
        }
    }
}
