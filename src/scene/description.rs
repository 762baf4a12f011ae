//! Geometry description documents as consumed by the scene builder.
//!
//! Parsing is lenient: a volume that fails to deserialize is dropped with a warning and the
//! rest of the document is kept, and material colours that are not numeric arrays read as
//! absent.

use crate::error::{DashError, DashResult};
use crate::mesh::{
    box_mesh, cylinder_mesh, sphere_mesh, Mesh, CYLINDER_SEGMENTS, SPHERE_LAT_BANDS,
    SPHERE_LON_BANDS,
};
use glam::DVec3;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Render-relevant part of a material definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Material {
    /// `[r, g, b]` or `[r, g, b, a]`; channels in either `[0, 1]` or `[0, 255]`.
    pub color: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default)]
pub struct GeometryDescription {
    pub materials: BTreeMap<String, Material>,
    pub volumes: Vec<Volume>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Volume {
    #[serde(default)]
    pub name: Option<String>,
    /// Name the simulation engine uses for the physical volume.
    #[serde(default)]
    pub g4name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub dimensions: Dimensions,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub placements: Vec<Placement>,
}

fn default_visible() -> bool {
    true
}

/// Full lengths for boxes (`x`, `y`, `z`), `radius` and full `height` for the round shapes.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Dimensions {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub z: Option<f64>,
    #[serde(default)]
    pub radius: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Placement {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    /// Euler angles in degrees.
    #[serde(default)]
    pub rotation: Rotation,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Rotation {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Placement {
    pub fn translation(&self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }

    pub fn rotation_deg(&self) -> DVec3 {
        DVec3::new(self.rotation.x, self.rotation.y, self.rotation.z)
    }
}

/// Primitive a volume tessellates to.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Box { half_extents: DVec3 },
    Cylinder { radius: f64, half_height: f64 },
    Sphere { radius: f64 },
    /// Boolean solids and every other type the mesher has no generator for.
    Unsupported(String),
}

impl Shape {
    /// Local-frame mesh, or `None` for shapes that produce no surfaces.
    pub fn mesh(&self) -> Option<Mesh> {
        match *self {
            Shape::Box { half_extents: h } => Some(box_mesh(h.x, h.y, h.z)),
            Shape::Cylinder {
                radius,
                half_height,
            } => Some(cylinder_mesh(radius, half_height, CYLINDER_SEGMENTS)),
            Shape::Sphere { radius } => {
                Some(sphere_mesh(radius, SPHERE_LAT_BANDS, SPHERE_LON_BANDS))
            }
            Shape::Unsupported(_) => None,
        }
    }
}

impl Volume {
    pub fn shape(&self) -> Shape {
        let d = &self.dimensions;
        match self.kind.as_str() {
            "box" => Shape::Box {
                half_extents: DVec3::new(
                    d.x.unwrap_or(0.0) / 2.0,
                    d.y.unwrap_or(0.0) / 2.0,
                    d.z.unwrap_or(0.0) / 2.0,
                ),
            },
            "cylinder" => Shape::Cylinder {
                radius: d.radius.unwrap_or(0.0),
                half_height: d.height.unwrap_or(0.0) / 2.0,
            },
            "sphere" => Shape::Sphere {
                radius: d.radius.unwrap_or(0.0),
            },
            other => Shape::Unsupported(other.to_string()),
        }
    }

    /// Engine name, then user-facing name, then the shape type.
    pub fn display_name(&self) -> &str {
        self.g4name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.name.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or(&self.kind)
    }
}

impl GeometryDescription {
    /// Build a description from an already-parsed JSON document.
    pub fn from_value(doc: &Value) -> Self {
        let materials = doc
            .get("materials")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .map(|(name, def)| (name.clone(), parse_material(def)))
                    .collect()
            })
            .unwrap_or_default();

        let volumes = doc
            .get("volumes")
            .and_then(Value::as_array)
            .map(|vols| {
                vols.iter()
                    .enumerate()
                    .filter_map(|(idx, raw)| match Volume::deserialize(raw) {
                        Ok(v) => Some(v),
                        Err(e) => {
                            tracing::warn!(index = idx, error = %e, "skipping malformed volume");
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { materials, volumes }
    }

    pub fn from_json_str(text: &str) -> DashResult<Self> {
        let doc: Value = serde_json::from_str(text)
            .map_err(|e| DashError::json("parse geometry description", e))?;
        Ok(Self::from_value(&doc))
    }

    pub fn load(path: &Path) -> DashResult<Self> {
        if !path.exists() {
            return Err(DashError::NotFound(format!(
                "geometry file {}",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| DashError::io(format!("read {}", path.display()), e))?;
        Self::from_json_str(&text)
    }

    pub fn material_color(&self, name: Option<&str>) -> Option<&[f64]> {
        name.and_then(|n| self.materials.get(n))
            .and_then(|m| m.color.as_deref())
    }
}

fn parse_material(def: &Value) -> Material {
    let color = def.get("color").and_then(Value::as_array).and_then(|arr| {
        arr.iter()
            .map(Value::as_f64)
            .collect::<Option<Vec<f64>>>()
    });
    Material { color }
}
