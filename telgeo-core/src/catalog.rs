//! Plane catalog and z-ordering.

use crate::plane::{PlaneDescriptor, SensorId};
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Default tolerance (mm) under which two planes count as sharing a z position.
pub const DEFAULT_Z_TOLERANCE: f64 = 1e-6;

/// Bidirectional mapping between sensor ID and rank along the beam axis.
///
/// Ranks are contiguous and start at 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZOrderMap {
    rank_to_id: Vec<SensorId>,
    id_to_rank: BTreeMap<SensorId, usize>,
}

impl ZOrderMap {
    /// Builds a map from IDs already sorted by z.
    fn from_sorted(ids: Vec<SensorId>) -> Self {
        let id_to_rank = ids
            .iter()
            .enumerate()
            .map(|(rank, &id)| (id, rank))
            .collect();
        Self {
            rank_to_id: ids,
            id_to_rank,
        }
    }

    /// Number of planes in the map.
    pub fn len(&self) -> usize {
        self.rank_to_id.len()
    }

    /// Returns true if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.rank_to_id.is_empty()
    }

    /// Rank of a sensor along z.
    pub fn rank(&self, sensor_id: SensorId) -> Result<usize> {
        self.id_to_rank
            .get(&sensor_id)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("sensor ID {sensor_id} has no z-order rank")))
    }

    /// Sensor at the given rank.
    pub fn id_at(&self, rank: usize) -> Result<SensorId> {
        self.rank_to_id
            .get(rank)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("no sensor at z-order rank {rank}")))
    }

    /// Returns true if the sensor is part of the map.
    pub fn contains(&self, sensor_id: SensorId) -> bool {
        self.id_to_rank.contains_key(&sensor_id)
    }

    /// Sensor IDs in ascending rank.
    pub fn ids(&self) -> &[SensorId] {
        &self.rank_to_id
    }
}

/// Authoritative set of plane descriptors for one telescope layout.
#[derive(Debug, Clone)]
pub struct PlaneCatalog {
    layout_id: i32,
    planes: BTreeMap<SensorId, PlaneDescriptor>,
    z_order: ZOrderMap,
    z_tolerance: f64,
}

impl Default for PlaneCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaneCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self {
            layout_id: 0,
            planes: BTreeMap::new(),
            z_order: ZOrderMap::default(),
            z_tolerance: DEFAULT_Z_TOLERANCE,
        }
    }

    /// Sets the layout identifier.
    pub fn with_layout_id(mut self, layout_id: i32) -> Self {
        self.layout_id = layout_id;
        self
    }

    /// Sets the tolerance used to detect planes sharing a z position.
    pub fn with_z_tolerance(mut self, tolerance: f64) -> Self {
        self.z_tolerance = tolerance;
        self.rebuild_z_order();
        self
    }

    /// Builds a catalog from a list of descriptors.
    pub fn from_planes<I>(planes: I) -> Result<Self>
    where
        I: IntoIterator<Item = PlaneDescriptor>,
    {
        let mut catalog = Self::new();
        for plane in planes {
            catalog.add_plane(plane)?;
        }
        Ok(catalog)
    }

    /// Layout identifier carried through to exported layouts.
    pub fn layout_id(&self) -> i32 {
        self.layout_id
    }

    /// Adds a plane to the catalog.
    ///
    /// Fails with [`Error::InvalidGeometry`] on a duplicate sensor ID or an
    /// invalid descriptor.
    pub fn add_plane(&mut self, plane: PlaneDescriptor) -> Result<()> {
        plane.validate()?;
        if self.planes.contains_key(&plane.sensor_id) {
            return Err(Error::InvalidGeometry(format!(
                "duplicate sensor ID {}",
                plane.sensor_id
            )));
        }
        self.planes.insert(plane.sensor_id, plane);
        self.rebuild_z_order();
        Ok(())
    }

    /// Replaces an existing plane with a new descriptor.
    ///
    /// Every field is taken from `plane`; nothing of the old descriptor survives.
    pub fn replace_plane(&mut self, plane: PlaneDescriptor) -> Result<()> {
        plane.validate()?;
        match self.planes.get_mut(&plane.sensor_id) {
            Some(slot) => *slot = plane,
            None => {
                return Err(Error::NotFound(format!(
                    "cannot replace unknown sensor ID {}",
                    plane.sensor_id
                )))
            }
        }
        self.rebuild_z_order();
        Ok(())
    }

    /// Descriptor for a sensor.
    pub fn get(&self, sensor_id: SensorId) -> Result<&PlaneDescriptor> {
        self.planes
            .get(&sensor_id)
            .ok_or_else(|| Error::NotFound(format!("sensor ID {sensor_id} is not in the catalog")))
    }

    /// Returns true if the sensor is in the catalog.
    pub fn contains(&self, sensor_id: SensorId) -> bool {
        self.planes.contains_key(&sensor_id)
    }

    /// Number of planes.
    pub fn len(&self) -> usize {
        self.planes.len()
    }

    /// Returns true if the catalog holds no planes.
    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    /// Sensor IDs in ascending z-order.
    pub fn all_ids(&self) -> &[SensorId] {
        self.z_order.ids()
    }

    /// Descriptors in ascending z-order.
    pub fn iter(&self) -> impl Iterator<Item = &PlaneDescriptor> {
        self.z_order.ids().iter().filter_map(|id| self.planes.get(id))
    }

    /// Owned copies of all descriptors in z-order.
    pub fn descriptors(&self) -> Vec<PlaneDescriptor> {
        self.iter().cloned().collect()
    }

    /// Full z-order map.
    pub fn z_order_map(&self) -> &ZOrderMap {
        &self.z_order
    }

    /// Rank of a sensor along the beam axis.
    pub fn z_order(&self, sensor_id: SensorId) -> Result<usize> {
        self.z_order.rank(sensor_id)
    }

    /// Sensor at a given rank along the beam axis.
    pub fn id_at_z_order(&self, rank: usize) -> Result<SensorId> {
        self.z_order.id_at(rank)
    }

    /// Builds a z-order map without the given planes, renumbered from 0.
    ///
    /// The resulting map must hold exactly `len() - excluded.len()` planes,
    /// so unknown or repeated IDs in `excluded` are rejected.
    pub fn exclude_planes(&self, excluded: &[SensorId]) -> Result<ZOrderMap> {
        let remaining: Vec<SensorId> = self
            .z_order
            .ids()
            .iter()
            .copied()
            .filter(|id| !excluded.contains(id))
            .collect();

        let expected = self.len().checked_sub(excluded.len());
        if expected != Some(remaining.len()) {
            return Err(Error::InvalidGeometry(format!(
                "excluding {:?} from {} planes left {} planes; the exclusion list does not \
                 match the geometry",
                excluded,
                self.len(),
                remaining.len()
            )));
        }

        log::debug!(
            "excluded {} planes, {} remain",
            excluded.len(),
            remaining.len()
        );
        Ok(ZOrderMap::from_sorted(remaining))
    }

    /// Recomputes ranks from the current z positions.
    ///
    /// Planes are sorted by z and grouped: a plane joins the current group
    /// while it lies within the tolerance of the group's first plane. Each
    /// group is then ordered by sensor ID.
    fn rebuild_z_order(&mut self) {
        let tolerance = self.z_tolerance;
        let mut entries: Vec<(f64, SensorId)> = self
            .planes
            .values()
            .map(|p| (p.position[2], p.sensor_id))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut ordered = Vec::with_capacity(entries.len());
        let mut group_start = 0;
        for i in 0..=entries.len() {
            let closes_group = entries
                .get(i)
                .is_none_or(|&(z, _)| z - entries[group_start].0 > tolerance);
            if closes_group && group_start < i {
                let mut group: Vec<SensorId> =
                    entries[group_start..i].iter().map(|&(_, id)| id).collect();
                group.sort_unstable();
                ordered.extend(group);
                group_start = i;
            }
        }

        self.z_order = ZOrderMap::from_sorted(ordered);
    }
}
