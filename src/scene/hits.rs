//! Detector hit positions read from the simulation output.
//!
//! The columnar output format is not decoded here. Callers supply a [`ColumnSource`] that can
//! list and read named columns; per-event (ragged) columns are flattened before use.

use anyhow::Result;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;

/// Upper bound on points kept per detector.
pub const MAX_HIT_POINTS: usize = 50_000;

/// A column as read from the output file.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// One value per event.
    Flat(Vec<f64>),
    /// A variable-length list per event.
    Ragged(Vec<Vec<f64>>),
}

impl ColumnData {
    pub fn flatten(self) -> Vec<f64> {
        match self {
            ColumnData::Flat(values) => values,
            ColumnData::Ragged(rows) => rows.into_iter().flatten().collect(),
        }
    }
}

/// Read access to named columns of an opened output file.
pub trait ColumnSource {
    fn column_names(&self) -> Vec<String>;
    fn read_column(&self, name: &str) -> Result<ColumnData>;
}

/// Columns already decoded into memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryColumns {
    columns: BTreeMap<String, ColumnData>,
}

impl MemoryColumns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, name: impl Into<String>, data: ColumnData) -> Self {
        self.columns.insert(name.into(), data);
        self
    }
}

impl ColumnSource for MemoryColumns {
    fn column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    fn read_column(&self, name: &str) -> Result<ColumnData> {
        self.columns
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no column named {name}"))
    }
}

/// Hit positions recorded by one detector.
#[derive(Debug, Clone, Serialize)]
pub struct HitCloud {
    pub detector: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl HitCloud {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Detector prefixes, discovered from columns named `<detector>_x`.
pub fn detector_names(source: &dyn ColumnSource) -> Vec<String> {
    source
        .column_names()
        .into_iter()
        .filter_map(|name| name.strip_suffix("_x").map(str::to_string))
        .collect()
}

/// Read one cloud per detector, subsampling each to at most `max_points`.
///
/// Detectors with no hits, unreadable columns or mismatched column lengths are skipped.
pub fn hit_clouds<R: Rng + ?Sized>(
    source: &dyn ColumnSource,
    max_points: usize,
    rng: &mut R,
) -> Vec<HitCloud> {
    let mut clouds = Vec::new();
    for detector in detector_names(source) {
        let cloud = match read_cloud(source, &detector) {
            Ok(cloud) => cloud,
            Err(e) => {
                tracing::warn!(detector = %detector, error = %e, "skipping detector hits");
                continue;
            }
        };
        if cloud.is_empty() {
            continue;
        }
        clouds.push(subsample(cloud, max_points, rng));
    }
    clouds
}

fn read_cloud(source: &dyn ColumnSource, detector: &str) -> Result<HitCloud> {
    let x = source.read_column(&format!("{detector}_x"))?.flatten();
    let y = source.read_column(&format!("{detector}_y"))?.flatten();
    let z = source.read_column(&format!("{detector}_z"))?.flatten();
    if x.len() != y.len() || x.len() != z.len() {
        anyhow::bail!(
            "coordinate columns differ in length ({}, {}, {})",
            x.len(),
            y.len(),
            z.len()
        );
    }
    Ok(HitCloud {
        detector: detector.to_string(),
        x,
        y,
        z,
    })
}

// Uniform sample without replacement; kept points stay in their original order.
fn subsample<R: Rng + ?Sized>(cloud: HitCloud, max_points: usize, rng: &mut R) -> HitCloud {
    if cloud.len() <= max_points {
        return cloud;
    }
    let mut picked = rand::seq::index::sample(rng, cloud.len(), max_points).into_vec();
    picked.sort_unstable();
    let take = |values: &[f64]| picked.iter().map(|&i| values[i]).collect::<Vec<_>>();
    HitCloud {
        x: take(&cloud.x),
        y: take(&cloud.y),
        z: take(&cloud.z),
        detector: cloud.detector,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn ragged_columns_flatten_by_concatenation() {
        let data = ColumnData::Ragged(vec![vec![1.0, 2.0], vec![], vec![3.0]]);
        assert_eq!(data.flatten(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn clouds_are_built_per_detector() {
        let source = MemoryColumns::new()
            .with_column("LXe_x", ColumnData::Ragged(vec![vec![1.0], vec![2.0, 3.0]]))
            .with_column("LXe_y", ColumnData::Ragged(vec![vec![4.0], vec![5.0, 6.0]]))
            .with_column("LXe_z", ColumnData::Ragged(vec![vec![7.0], vec![8.0, 9.0]]))
            .with_column("Veto_x", ColumnData::Flat(vec![]))
            .with_column("Veto_y", ColumnData::Flat(vec![]))
            .with_column("Veto_z", ColumnData::Flat(vec![]))
            .with_column("edep", ColumnData::Flat(vec![0.5]));
        let mut rng = StdRng::seed_from_u64(7);
        let clouds = hit_clouds(&source, MAX_HIT_POINTS, &mut rng);
        assert_eq!(clouds.len(), 1);
        assert_eq!(clouds[0].detector, "LXe");
        assert_eq!(clouds[0].x, vec![1.0, 2.0, 3.0]);
        assert_eq!(clouds[0].z, vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn incomplete_detector_is_skipped() {
        let source = MemoryColumns::new()
            .with_column("A_x", ColumnData::Flat(vec![1.0]))
            .with_column("A_y", ColumnData::Flat(vec![1.0]))
            .with_column("B_x", ColumnData::Flat(vec![1.0, 2.0]))
            .with_column("B_y", ColumnData::Flat(vec![1.0]))
            .with_column("B_z", ColumnData::Flat(vec![1.0, 2.0]));
        let mut rng = StdRng::seed_from_u64(1);
        assert!(hit_clouds(&source, MAX_HIT_POINTS, &mut rng).is_empty());
    }

    #[test]
    fn large_clouds_are_subsampled_consistently() {
        let n: u32 = 1_000;
        let xs: Vec<f64> = (0..n).map(f64::from).collect();
        let ys: Vec<f64> = xs.iter().map(|v| v * 2.0).collect();
        let zs: Vec<f64> = xs.iter().map(|v| -v).collect();
        let source = MemoryColumns::new()
            .with_column("D_x", ColumnData::Flat(xs))
            .with_column("D_y", ColumnData::Flat(ys))
            .with_column("D_z", ColumnData::Flat(zs));
        let mut rng = StdRng::seed_from_u64(42);
        let clouds = hit_clouds(&source, 100, &mut rng);
        let cloud = &clouds[0];
        assert_eq!(cloud.len(), 100);
        assert!(cloud.x.windows(2).all(|w| w[0] < w[1]));
        for i in 0..cloud.len() {
            assert_eq!(cloud.y[i], cloud.x[i] * 2.0);
            assert_eq!(cloud.z[i], -cloud.x[i]);
        }
    }
}
