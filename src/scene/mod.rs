//! Render-ready geometry and hit overlays for simulation runs.

mod builder;
mod color;
mod description;
mod hits;

pub use builder::{build, build_with_style, SceneStyle, Surface};
pub use color::{rgba_string, FALLBACK_RGBA};
pub use description::{
    Dimensions, GeometryDescription, Material, Placement, Rotation, Shape, Volume,
};
pub use hits::{
    detector_names, hit_clouds, ColumnData, ColumnSource, HitCloud, MemoryColumns, MAX_HIT_POINTS,
};

use crate::config::DashboardPaths;
use crate::storage::RunStore;
use serde::Serialize;

/// Geometry surfaces of a run's detector overlaid with its recorded hits.
#[derive(Debug, Clone, Serialize)]
pub struct RunScene {
    pub surfaces: Vec<Surface>,
    pub hits: Vec<HitCloud>,
}

/// Assemble the 3-D view of a finished run.
///
/// The geometry is the one named in the run's record; if the record or the geometry file is
/// missing the scene has hits only.
pub fn run_scene(
    paths: &DashboardPaths,
    run_id: &str,
    output: &dyn ColumnSource,
) -> RunScene {
    let store = RunStore::new(&paths.runs_dir);
    let surfaces = match store.read_record(run_id) {
        Ok(record) => match GeometryDescription::load(&paths.geometry_path(&record.geometry)) {
            Ok(desc) => build(&desc),
            Err(e) => {
                tracing::debug!(run_id = %run_id, error = %e, "no geometry overlay");
                Vec::new()
            }
        },
        Err(e) => {
            tracing::debug!(run_id = %run_id, error = %e, "no run record for geometry overlay");
            Vec::new()
        }
    };
    let hits = hit_clouds(output, MAX_HIT_POINTS, &mut rand::thread_rng());
    RunScene { surfaces, hits }
}
