//! Telescope geometry context tying catalog, frames, volumes and field together.

use crate::config::{GeometryConfig, NavigationConfig};
use crate::intersect::{PlaneCrossing, PlaneIntersector};
use crate::navigator::Navigator;
use crate::radiation::RadiationIntegrator;
use crate::volume::{SensorBox, VolumeModel};
use nalgebra::Vector3;
use rayon::prelude::*;
use telgeo_core::{
    angles_from_rotation, placement_rotation, rotation_from_angles, Error, FrameCache,
    MagneticField, PlaneCatalog, PlaneDescriptor, Result, SensorId, TelescopeHit, UniformField,
};
use telgeo_track::TrackPropagator;

/// Owner of every geometry service for one telescope layout.
///
/// Frames are available as soon as the context exists; the volume model
/// needs an explicit [`build`](Self::build).
#[derive(Debug)]
pub struct TelescopeGeometry<F = UniformField> {
    catalog: PlaneCatalog,
    geometry_config: GeometryConfig,
    navigation_config: NavigationConfig,
    frames: FrameCache,
    model: Option<VolumeModel>,
    propagator: TrackPropagator<F>,
}

impl TelescopeGeometry<UniformField> {
    /// Creates a field-free context.
    pub fn field_free(catalog: PlaneCatalog) -> Self {
        Self::new(catalog, UniformField::zero())
    }
}

impl<F: MagneticField> TelescopeGeometry<F> {
    /// Creates a context over a catalog and a field provider.
    pub fn new(catalog: PlaneCatalog, field: F) -> Self {
        let frames = FrameCache::new(&catalog);
        Self {
            catalog,
            geometry_config: GeometryConfig::default(),
            navigation_config: NavigationConfig::default(),
            frames,
            model: None,
            propagator: TrackPropagator::new(field),
        }
    }

    /// Sets the volume model configuration.
    pub fn with_geometry_config(mut self, config: GeometryConfig) -> Self {
        self.catalog = self.catalog.with_z_tolerance(config.z_tolerance);
        self.geometry_config = config;
        self
    }

    /// Sets the navigation configuration.
    pub fn with_navigation_config(mut self, config: NavigationConfig) -> Self {
        self.navigation_config = config;
        self
    }

    /// Builds the volume model.
    ///
    /// Building twice without [`reset`](Self::reset) keeps the first model.
    pub fn build(&mut self) -> Result<()> {
        if self.model.is_some() {
            log::warn!("volume model already built; call reset() before building again");
            return Ok(());
        }
        self.navigation_config.validate()?;
        let model = VolumeModel::build(&self.catalog, &self.geometry_config)?;
        log::info!(
            "built volume model with {} sensor boxes (layout {})",
            model.boxes().len(),
            self.catalog.layout_id()
        );
        self.model = Some(model);
        Ok(())
    }

    /// Drops the volume model.
    pub fn reset(&mut self) {
        self.model = None;
    }

    /// Returns true once the volume model exists.
    pub fn is_built(&self) -> bool {
        self.model.is_some()
    }

    pub fn catalog(&self) -> &PlaneCatalog {
        &self.catalog
    }

    pub fn frames(&self) -> &FrameCache {
        &self.frames
    }

    pub fn propagator(&self) -> &TrackPropagator<F> {
        &self.propagator
    }

    pub fn geometry_config(&self) -> &GeometryConfig {
        &self.geometry_config
    }

    pub fn navigation_config(&self) -> &NavigationConfig {
        &self.navigation_config
    }

    /// Volume model, or [`Error::MissingGeometry`] before [`build`](Self::build).
    pub fn model(&self) -> Result<&VolumeModel> {
        self.model.as_ref().ok_or_else(|| {
            Error::MissingGeometry("volume model has not been built".to_string())
        })
    }

    /// Mutable volume model for placement refinement.
    ///
    /// Catalog and frames follow only after [`update_layout`](Self::update_layout).
    pub fn model_mut(&mut self) -> Result<&mut VolumeModel> {
        self.model.as_mut().ok_or_else(|| {
            Error::MissingGeometry("volume model has not been built".to_string())
        })
    }

    /// New cursor over the volume model.
    pub fn navigator(&self) -> Result<Navigator<'_>> {
        Ok(Navigator::new(self.model()?))
    }

    /// Plane search bound to this context.
    pub fn intersector(&self) -> Result<PlaneIntersector<'_, F>> {
        Ok(PlaneIntersector::new(
            self.model()?,
            &self.frames,
            &self.propagator,
            &self.navigation_config,
        ))
    }

    /// Material integrator bound to this context.
    pub fn radiation_integrator(&self) -> Result<RadiationIntegrator<'_>> {
        Ok(RadiationIntegrator::new(
            self.model()?,
            self.navigation_config.clone(),
        ))
    }

    /// Sensor containing a global point, or [`NO_SENSOR`](crate::NO_SENSOR).
    pub fn locate(&self, point: &Vector3<f64>) -> Result<SensorId> {
        Ok(self.model()?.locate(point))
    }

    /// Converts a local hit to the global frame.
    pub fn hit_to_global(&self, hit: &TelescopeHit) -> Result<TelescopeHit> {
        self.frames.hit_to_global(hit)
    }

    /// Converts a global hit to its sensor's local frame.
    pub fn hit_to_local(&self, hit: &TelescopeHit) -> Result<TelescopeHit> {
        self.frames.hit_to_local(hit)
    }

    /// Replaces the descriptors of existing planes.
    ///
    /// Frames are recomputed and a built volume model is rebuilt.
    pub fn replace_planes<I>(&mut self, planes: I) -> Result<()>
    where
        I: IntoIterator<Item = PlaneDescriptor>,
    {
        let mut catalog = self.catalog.clone();
        let mut updated = 0usize;
        for plane in planes {
            catalog.replace_plane(plane)?;
            updated += 1;
        }
        self.install_catalog(catalog)?;
        log::info!("replaced {updated} planes of layout {}", self.catalog.layout_id());
        Ok(())
    }

    /// Re-derives every descriptor from the volume model.
    ///
    /// Position and angles come from the box placement, size and radiation
    /// length from the box itself. Flip, pixelization and resolution are
    /// kept. Used after box placements were refined through
    /// [`model_mut`](Self::model_mut). A box whose rotation is unchanged
    /// keeps the catalog angles exactly.
    pub fn update_layout(&mut self) -> Result<()> {
        let model = self.model()?;
        let mut catalog = self.catalog.clone();
        for sensor_box in model.boxes() {
            let plane = catalog.get(sensor_box.sensor_id())?;
            let derived = descriptor_from_box(plane, sensor_box)?;
            catalog.replace_plane(derived)?;
        }
        self.frames = FrameCache::new(&catalog);
        self.catalog = catalog;
        log::info!(
            "layout {} updated from {} sensor boxes",
            self.catalog.layout_id(),
            self.catalog.len()
        );
        Ok(())
    }

    /// Moves a plane to a new centre and angles (degrees), keeping its flip.
    ///
    /// Writes the alignment back into the catalog so later exports carry it.
    pub fn set_placement(
        &mut self,
        sensor_id: SensorId,
        position: [f64; 3],
        angles: [f64; 3],
    ) -> Result<()> {
        let plane = self
            .catalog
            .get(sensor_id)?
            .clone()
            .with_angles(angles[0], angles[1], angles[2]);
        let plane = PlaneDescriptor { position, ..plane };
        let rotation = placement_rotation(&plane);
        let translation = plane.offset();

        self.catalog.replace_plane(plane)?;
        self.frames = FrameCache::new(&self.catalog);
        if let Some(model) = self.model.as_mut() {
            model.set_placement(sensor_id, translation, rotation)?;
        }
        Ok(())
    }

    fn install_catalog(&mut self, catalog: PlaneCatalog) -> Result<()> {
        let model = if self.model.is_some() {
            Some(VolumeModel::build(&catalog, &self.geometry_config)?)
        } else {
            None
        };
        self.frames = FrameCache::new(&catalog);
        self.catalog = catalog;
        self.model = model;
        Ok(())
    }

    /// Radiation lengths of many segments in parallel.
    pub fn radiation_lengths_par(
        &self,
        segments: &[(Vector3<f64>, Vector3<f64>)],
        skip_boundary_volumes: bool,
    ) -> Result<Vec<f64>> {
        let integrator = self.radiation_integrator()?;
        Ok(segments
            .par_iter()
            .map(|(start, finish)| integrator.accumulate(start, finish, skip_boundary_volumes))
            .collect())
    }

    /// Next planes of many rays in parallel, one navigator per worker.
    pub fn next_planes_par(
        &self,
        rays: &[(Vector3<f64>, Vector3<f64>)],
    ) -> Result<Vec<PlaneCrossing>> {
        let model = self.model()?;
        let intersector = self.intersector()?;
        Ok(rays
            .par_iter()
            .map_init(
                || Navigator::new(model),
                |navigator, &(point, direction)| {
                    intersector.find_next_plane_with(navigator, point, direction)
                },
            )
            .collect())
    }
}

/// Largest entry difference between a box rotation and the rotation rebuilt
/// from the derived angles.
const ROTATION_MATCH_TOLERANCE: f64 = 1e-9;

fn descriptor_from_box(
    plane: &PlaneDescriptor,
    sensor_box: &SensorBox,
) -> Result<PlaneDescriptor> {
    let frame = sensor_box.frame();
    let rotation = frame.rotation();
    let translation = frame.translation();
    let size = sensor_box.half_extents() * 2.0;

    // an unmoved box keeps the catalog angles verbatim
    let angles = if (rotation - placement_rotation(plane)).amax() <= ROTATION_MATCH_TOLERANCE {
        plane.angles
    } else {
        let radians = angles_from_rotation(&(rotation * plane.flip.inverse_matrix3()));
        let rebuilt =
            rotation_from_angles(radians.x, radians.y, radians.z) * plane.flip.to_matrix3();
        if (rotation - rebuilt).amax() > ROTATION_MATCH_TOLERANCE {
            return Err(Error::InvalidGeometry(format!(
                "sensor {}: box rotation is not reachable from plane angles and flip",
                plane.sensor_id
            )));
        }
        [
            radians.x.to_degrees(),
            radians.y.to_degrees(),
            radians.z.to_degrees(),
        ]
    };

    Ok(PlaneDescriptor {
        position: [translation.x, translation.y, translation.z],
        angles,
        size: [size.x, size.y, size.z],
        radiation_length: sensor_box.radiation_length(),
        ..plane.clone()
    })
}
