//! Turns a geometry description into placed, coloured surfaces.

use super::color::rgba_string;
use super::description::{GeometryDescription, Shape};
use crate::mesh::{place, Mesh};
use serde::Serialize;

/// One placed instance of a volume, ready to hand to a renderer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Surface {
    pub name: String,
    pub mesh: Mesh,
    /// CSS colour including the scene alpha.
    pub color: String,
    /// Whole-surface opacity, applied on top of `color`'s alpha.
    pub opacity: f64,
}

/// Scene-level translucency, kept separate from material alpha.
#[derive(Debug, Clone, Copy)]
pub struct SceneStyle {
    pub color_alpha: Option<f64>,
    pub opacity: f64,
}

impl Default for SceneStyle {
    fn default() -> Self {
        Self {
            color_alpha: Some(0.15),
            opacity: 0.20,
        }
    }
}

/// Build surfaces with the default translucent overlay style.
pub fn build(desc: &GeometryDescription) -> Vec<Surface> {
    build_with_style(desc, SceneStyle::default())
}

pub fn build_with_style(desc: &GeometryDescription, style: SceneStyle) -> Vec<Surface> {
    let mut surfaces = Vec::new();

    for volume in &desc.volumes {
        if !volume.visible {
            tracing::debug!(volume = volume.display_name(), "skipping hidden volume");
            continue;
        }

        let local = match volume.shape() {
            Shape::Unsupported(kind) => {
                tracing::warn!(
                    volume = volume.display_name(),
                    kind = %kind,
                    "no mesh for volume type"
                );
                continue;
            }
            shape => match shape.mesh() {
                Some(mesh) => mesh,
                None => continue,
            },
        };

        let color = rgba_string(
            desc.material_color(volume.material.as_deref()),
            style.color_alpha,
        );
        let name = volume.display_name().to_string();

        for placement in &volume.placements {
            surfaces.push(Surface {
                name: name.clone(),
                mesh: place(&local, placement.translation(), placement.rotation_deg()),
                color: color.clone(),
                opacity: style.opacity,
            });
        }
    }

    surfaces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::color::FALLBACK_RGBA;
    use approx::assert_abs_diff_eq;
    use serde_json::json;

    fn describe(doc: serde_json::Value) -> GeometryDescription {
        GeometryDescription::from_value(&doc)
    }

    #[test]
    fn unsupported_type_yields_no_surface() {
        let desc = describe(json!({
            "volumes": [
                { "name": "ring", "type": "torus", "placements": [{}] },
                { "name": "block", "type": "box", "dimensions": { "x": 2, "y": 2, "z": 2 }, "placements": [{}] }
            ]
        }));
        let surfaces = build(&desc);
        assert_eq!(surfaces.len(), 1);
        assert_eq!(surfaces[0].name, "block");
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn skipped_volumes_are_logged() {
        let desc = describe(json!({
            "volumes": [
                { "name": "ring", "type": "torus", "placements": [{}] },
                { "name": "veto", "type": "box", "visible": false, "placements": [{}] }
            ]
        }));
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let surfaces = tracing::subscriber::with_default(subscriber, || build(&desc));
        assert!(surfaces.is_empty());

        let text = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let line = |needle: &str| {
            text.lines()
                .find(|l| l.contains(needle))
                .unwrap_or_else(|| panic!("no log line containing {needle:?} in {text}"))
                .to_string()
        };
        let unsupported = line("no mesh for volume type");
        assert!(unsupported.contains("WARN"));
        assert!(unsupported.contains("torus"));
        let hidden = line("skipping hidden volume");
        assert!(hidden.contains("DEBUG"));
        assert!(hidden.contains("veto"));
    }

    #[test]
    fn one_surface_per_placement() {
        let desc = describe(json!({
            "volumes": [{
                "name": "pmt",
                "type": "cylinder",
                "dimensions": { "radius": 1, "height": 2 },
                "placements": [
                    { "x": -5 },
                    { "x": 5, "rotation": { "x": 90 } },
                    { "y": 5 }
                ]
            }]
        }));
        let surfaces = build(&desc);
        assert_eq!(surfaces.len(), 3);
        assert!(surfaces.iter().all(|s| s.mesh.indices_in_bounds()));
        let centre = surfaces[0].mesh.vertices[surfaces[0].mesh.vertex_count() - 1];
        assert_abs_diff_eq!(centre.x, -5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(centre.z, 1.0, epsilon = 1e-12);
        // Top cap centre of the rotated copy moves from +z onto -y.
        let rotated = surfaces[1].mesh.vertices[surfaces[1].mesh.vertex_count() - 1];
        assert_abs_diff_eq!(rotated.x, 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rotated.y, -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rotated.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn invisible_volumes_and_empty_placements_are_skipped() {
        let desc = describe(json!({
            "volumes": [
                { "type": "sphere", "visible": false, "placements": [{}] },
                { "type": "sphere", "dimensions": { "radius": 1 } }
            ]
        }));
        assert!(build(&desc).is_empty());
    }

    #[test]
    fn material_colour_uses_scene_alpha() {
        let desc = describe(json!({
            "materials": { "Water": { "color": [0, 0, 1, 0.8] } },
            "volumes": [
                { "type": "box", "material": "Water", "placements": [{}] },
                { "type": "box", "material": "Missing", "placements": [{}] },
                { "type": "box", "placements": [{}] }
            ]
        }));
        let surfaces = build(&desc);
        assert_eq!(surfaces[0].color, "rgba(0,0,255,0.15)");
        assert_eq!(surfaces[1].color, FALLBACK_RGBA);
        assert_eq!(surfaces[2].color, FALLBACK_RGBA);
        assert!(surfaces.iter().all(|s| s.opacity == 0.20));
    }

    #[test]
    fn style_without_override_keeps_material_alpha() {
        let desc = describe(json!({
            "materials": { "Lead": { "color": [90, 90, 90, 0.7] } },
            "volumes": [{ "type": "box", "material": "Lead", "placements": [{}] }]
        }));
        let surfaces = build_with_style(
            &desc,
            SceneStyle {
                color_alpha: None,
                opacity: 1.0,
            },
        );
        assert_eq!(surfaces[0].color, "rgba(90,90,90,0.7)");
        assert_eq!(surfaces[0].opacity, 1.0);
    }

    #[test]
    fn surfaces_follow_description_order() {
        let desc = describe(json!({
            "volumes": [
                { "name": "a", "type": "sphere", "placements": [{}] },
                { "name": "b", "type": "box", "placements": [{}] },
                { "name": "c", "type": "cylinder", "placements": [{}] }
            ]
        }));
        let names: Vec<_> = build(&desc).into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }
}
