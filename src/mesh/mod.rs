//! Triangle meshes for detector volumes.
//!
//! Primitives are generated in local coordinates centred on the origin and then placed into
//! the world frame by [`place`]. Triangle winding is not kept consistent between primitives;
//! consumers render with flat shading.

mod primitives;
mod transform;

pub use primitives::{
    box_mesh, cylinder_mesh, sphere_mesh, CYLINDER_SEGMENTS, SPHERE_LAT_BANDS, SPHERE_LON_BANDS,
};
pub use transform::{place, rotation_matrix};

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Indexed triangle mesh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<DVec3>,
    pub triangles: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// True when every triangle references an existing vertex.
    pub fn indices_in_bounds(&self) -> bool {
        let n = self.vertices.len();
        self.triangles
            .iter()
            .all(|tri| tri.iter().all(|&i| (i as usize) < n))
    }

    /// Split triangle indices into the three parallel columns most plotting front-ends expect.
    pub fn index_columns(&self) -> (Vec<u32>, Vec<u32>, Vec<u32>) {
        let mut i = Vec::with_capacity(self.triangles.len());
        let mut j = Vec::with_capacity(self.triangles.len());
        let mut k = Vec::with_capacity(self.triangles.len());
        for tri in &self.triangles {
            i.push(tri[0]);
            j.push(tri[1]);
            k.push(tri[2]);
        }
        (i, j, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_columns_split_triangles_in_order() {
        let mesh = box_mesh(1.0, 1.0, 1.0);
        let (i, j, k) = mesh.index_columns();
        assert_eq!(i.len(), mesh.triangle_count());
        for (n, tri) in mesh.triangles.iter().enumerate() {
            assert_eq!([i[n], j[n], k[n]], *tri);
        }
    }

    #[test]
    fn out_of_range_index_is_detected() {
        let mesh = Mesh {
            vertices: vec![DVec3::ZERO, DVec3::X, DVec3::Y],
            triangles: vec![[0, 1, 3]],
        };
        assert!(!mesh.indices_in_bounds());
    }
}
