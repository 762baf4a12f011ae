//! Placement of local-frame meshes into the world frame.

use super::Mesh;
use glam::{DMat3, DVec3};

/// Rotation from Euler angles in degrees: about X first, then Y, then Z (`Rz * Ry * Rx`).
pub fn rotation_matrix(rotation_deg: DVec3) -> DMat3 {
    DMat3::from_rotation_z(rotation_deg.z.to_radians())
        * DMat3::from_rotation_y(rotation_deg.y.to_radians())
        * DMat3::from_rotation_x(rotation_deg.x.to_radians())
}

/// Rotate every vertex of `mesh` and then translate it, returning a new mesh.
///
/// Connectivity is shared with the input unchanged.
pub fn place(mesh: &Mesh, translation: DVec3, rotation_deg: DVec3) -> Mesh {
    let vertices = if rotation_deg == DVec3::ZERO {
        mesh.vertices.iter().map(|v| *v + translation).collect()
    } else {
        let r = rotation_matrix(rotation_deg);
        mesh.vertices.iter().map(|v| r * *v + translation).collect()
    };
    Mesh {
        vertices,
        triangles: mesh.triangles.clone(),
    }
}
