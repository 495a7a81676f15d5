//! JSON layout schema and conversion to the plane catalog.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use telgeo_core::{FlipMatrix, PlaneCatalog, PlaneDescriptor, SensorId, UniformField};

/// Planes and field read from a layout file.
#[derive(Debug, Clone)]
pub struct Layout {
    /// Catalog of every plane in the file.
    pub catalog: PlaneCatalog,
    /// Uniform field; zero when the file carries none.
    pub magnetic_field: UniformField,
}

// Intermediate structs for JSON parsing

#[derive(Serialize, Deserialize)]
struct JsonLayout {
    #[serde(default)]
    layout_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    magnetic_field: Option<[f64; 3]>,
    planes: Vec<JsonPlane>,
}

#[derive(Serialize, Deserialize)]
struct JsonPlane {
    sensor_id: SensorId,
    position: [f64; 3],
    #[serde(default)]
    angles: [f64; 3],
    #[serde(default = "identity_flip")]
    flip: [[i32; 2]; 2],
    size: Option<[f64; 3]>,
    pixels: Option<[u32; 2]>,
    pitch: Option<[f64; 2]>,
    resolution: Option<[f64; 2]>,
    radiation_length: Option<f64>,
    pixel_geometry: Option<String>,
}

fn identity_flip() -> [[i32; 2]; 2] {
    [[1, 0], [0, 1]]
}

impl From<JsonPlane> for PlaneDescriptor {
    fn from(plane: JsonPlane) -> Self {
        let defaults = PlaneDescriptor::new(plane.sensor_id, plane.position);
        let [[r1, r2], [r3, r4]] = plane.flip;
        PlaneDescriptor {
            angles: plane.angles,
            flip: FlipMatrix::new(r1, r2, r3, r4),
            size: plane.size.unwrap_or(defaults.size),
            pixels: plane.pixels.unwrap_or(defaults.pixels),
            pitch: plane.pitch.unwrap_or(defaults.pitch),
            resolution: plane.resolution.unwrap_or(defaults.resolution),
            radiation_length: plane.radiation_length.unwrap_or(defaults.radiation_length),
            pixel_geometry: plane.pixel_geometry.unwrap_or(defaults.pixel_geometry),
            ..defaults
        }
    }
}

impl From<&PlaneDescriptor> for JsonPlane {
    fn from(plane: &PlaneDescriptor) -> Self {
        let flip = plane.flip;
        Self {
            sensor_id: plane.sensor_id,
            position: plane.position,
            angles: plane.angles,
            flip: [[flip.r1, flip.r2], [flip.r3, flip.r4]],
            size: Some(plane.size),
            pixels: Some(plane.pixels),
            pitch: Some(plane.pitch),
            resolution: Some(plane.resolution),
            radiation_length: Some(plane.radiation_length),
            pixel_geometry: Some(plane.pixel_geometry.clone()),
        }
    }
}

fn from_json_layout(layout: JsonLayout) -> Result<Layout> {
    if layout.planes.is_empty() {
        return Err(Error::InvalidFormat(
            "layout contains no planes".to_string(),
        ));
    }

    let mut catalog = PlaneCatalog::new().with_layout_id(layout.layout_id);
    for plane in layout.planes {
        catalog.add_plane(plane.into())?;
    }

    let magnetic_field = layout
        .magnetic_field
        .map_or_else(UniformField::zero, |[bx, by, bz]| UniformField::new(bx, by, bz));

    Ok(Layout {
        catalog,
        magnetic_field,
    })
}

fn to_json_layout(catalog: &PlaneCatalog, field: &UniformField) -> JsonLayout {
    JsonLayout {
        layout_id: catalog.layout_id(),
        magnetic_field: (!field.is_zero()).then_some(field.field),
        planes: catalog.iter().map(JsonPlane::from).collect(),
    }
}

/// Reads a layout file.
///
/// A missing or unreadable file is an error; there is no fallback layout.
pub fn read_layout<P: AsRef<Path>>(path: P) -> Result<Layout> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let json: JsonLayout = serde_json::from_reader(BufReader::new(file))?;
    let layout = from_json_layout(json)?;
    log::info!(
        "read layout {} with {} planes from {}",
        layout.catalog.layout_id(),
        layout.catalog.len(),
        path.display()
    );
    Ok(layout)
}

/// Parses a layout from a JSON string.
pub fn layout_from_json(json: &str) -> Result<Layout> {
    from_json_layout(serde_json::from_str(json)?)
}

/// Writes a catalog and field as a layout file, planes in z-order.
///
/// The field is omitted when it is zero.
pub fn write_layout<P: AsRef<Path>>(
    path: P,
    catalog: &PlaneCatalog,
    field: &UniformField,
) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &to_json_layout(catalog, field))?;
    writeln!(writer)?;
    writer.flush()?;
    log::info!("wrote {} planes to {}", catalog.len(), path.display());
    Ok(())
}

/// Serializes a catalog and field as pretty-printed layout JSON.
pub fn layout_to_json(catalog: &PlaneCatalog, field: &UniformField) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_json_layout(catalog, field))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use telgeo_core::Error as CoreError;

    #[test]
    fn test_minimal_plane_gets_defaults() {
        let layout = layout_from_json(
            r#"{ "planes": [ { "sensor_id": 3, "position": [0.0, 0.0, 150.0] } ] }"#,
        )
        .unwrap();

        let plane = layout.catalog.get(3).unwrap();
        assert_eq!(*plane, PlaneDescriptor::new(3, [0.0, 0.0, 150.0]));
        assert_eq!(plane.flip, FlipMatrix::identity());
        assert_eq!(layout.catalog.layout_id(), 0);
        assert!(layout.magnetic_field.is_zero());
    }

    #[test]
    fn test_full_plane() {
        let json = r#"{
            "layout_id": 7,
            "magnetic_field": [0.0, 1.2, 0.0],
            "planes": [
                {
                    "sensor_id": 20,
                    "position": [1.0, -2.0, 300.0],
                    "angles": [0.0, 0.0, 90.0],
                    "flip": [[0, 1], [1, 0]],
                    "size": [30.0, 20.0, 0.3],
                    "pixels": [256, 256],
                    "pitch": [0.055, 0.055],
                    "resolution": [0.004, 0.004],
                    "radiation_length": 93.66,
                    "pixel_geometry": "FEI4"
                }
            ]
        }"#;
        let layout = layout_from_json(json).unwrap();
        assert_eq!(layout.catalog.layout_id(), 7);
        assert_eq!(layout.magnetic_field, UniformField::new(0.0, 1.2, 0.0));

        let plane = layout.catalog.get(20).unwrap();
        assert_eq!(plane.flip, FlipMatrix::new(0, 1, 1, 0));
        assert_eq!(plane.size, [30.0, 20.0, 0.3]);
        assert_eq!(plane.pixels, [256, 256]);
        assert_eq!(plane.pixel_geometry, "FEI4");
    }

    #[test]
    fn test_rejects_empty_layout() {
        assert!(matches!(
            layout_from_json(r#"{ "planes": [] }"#),
            Err(Error::InvalidFormat(_))
        ));
        assert!(matches!(
            layout_from_json(r#"{ "layout_id": 1 }"#),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_geometry_errors_surface() {
        let duplicate = r#"{ "planes": [
            { "sensor_id": 1, "position": [0.0, 0.0, 0.0] },
            { "sensor_id": 1, "position": [0.0, 0.0, 10.0] }
        ] }"#;
        assert!(matches!(
            layout_from_json(duplicate),
            Err(Error::Core(CoreError::InvalidGeometry(_)))
        ));

        let bad_flip = r#"{ "planes": [
            { "sensor_id": 1, "position": [0.0, 0.0, 0.0], "flip": [[1, 1], [1, 1]] }
        ] }"#;
        assert!(matches!(
            layout_from_json(bad_flip),
            Err(Error::Core(CoreError::InvalidGeometry(_)))
        ));

        let negative_id = r#"{ "planes": [
            { "sensor_id": -3, "position": [0.0, 0.0, 0.0] }
        ] }"#;
        assert!(matches!(
            layout_from_json(negative_id),
            Err(Error::Core(CoreError::InvalidGeometry(_)))
        ));
    }

    #[test]
    fn test_zero_field_is_omitted() {
        let catalog =
            PlaneCatalog::from_planes([PlaneDescriptor::new(0, [0.0, 0.0, 0.0])]).unwrap();
        let json = layout_to_json(&catalog, &UniformField::zero()).unwrap();
        assert!(!json.contains("magnetic_field"));

        let json = layout_to_json(&catalog, &UniformField::new(0.0, 0.0, 4.0)).unwrap();
        assert!(json.contains("magnetic_field"));
    }
}
