//! Box, cylinder and sphere tessellation in local coordinates.

use super::Mesh;
use glam::DVec3;
use std::f64::consts::PI;

/// Default number of side segments for cylinders.
pub const CYLINDER_SEGMENTS: u32 = 24;
/// Default latitude bands for spheres.
pub const SPHERE_LAT_BANDS: u32 = 12;
/// Default longitude bands for spheres.
pub const SPHERE_LON_BANDS: u32 = 24;

// Two triangles per face: -z, +z, -y, +y, -x, +x.
const BOX_TRIANGLES: [[u32; 3]; 12] = [
    [0, 1, 2],
    [0, 2, 3],
    [4, 5, 6],
    [4, 6, 7],
    [0, 1, 5],
    [0, 5, 4],
    [3, 2, 6],
    [3, 6, 7],
    [0, 3, 7],
    [0, 7, 4],
    [1, 2, 6],
    [1, 6, 5],
];

/// Axis-aligned box with half-extents `dx`, `dy`, `dz`.
pub fn box_mesh(dx: f64, dy: f64, dz: f64) -> Mesh {
    let vertices = vec![
        DVec3::new(-dx, -dy, -dz),
        DVec3::new(dx, -dy, -dz),
        DVec3::new(dx, dy, -dz),
        DVec3::new(-dx, dy, -dz),
        DVec3::new(-dx, -dy, dz),
        DVec3::new(dx, -dy, dz),
        DVec3::new(dx, dy, dz),
        DVec3::new(-dx, dy, dz),
    ];
    Mesh {
        vertices,
        triangles: BOX_TRIANGLES.to_vec(),
    }
}

/// Closed cylinder along the Z axis.
///
/// Vertex layout: bottom ring `[0, segments)`, top ring `[segments, 2*segments)`, then the
/// bottom and top cap centres. Each segment contributes two side triangles and one triangle
/// per cap, fanned from the cap centre.
pub fn cylinder_mesh(radius: f64, half_height: f64, segments: u32) -> Mesh {
    let n = segments as usize;
    let mut vertices = Vec::with_capacity(2 * n + 2);
    for z in [-half_height, half_height] {
        for seg in 0..segments {
            let angle = 2.0 * PI * f64::from(seg) / f64::from(segments);
            vertices.push(DVec3::new(radius * angle.cos(), radius * angle.sin(), z));
        }
    }
    let bottom_center = vertices.len() as u32;
    vertices.push(DVec3::new(0.0, 0.0, -half_height));
    let top_center = vertices.len() as u32;
    vertices.push(DVec3::new(0.0, 0.0, half_height));

    let mut triangles = Vec::with_capacity(4 * n);
    for seg in 0..segments {
        let next = (seg + 1) % segments;
        let (b0, b1) = (seg, next);
        let (t0, t1) = (seg + segments, next + segments);
        triangles.push([b0, b1, t0]);
        triangles.push([b1, t1, t0]);
        triangles.push([bottom_center, b1, b0]);
        triangles.push([top_center, t0, t1]);
    }

    Mesh {
        vertices,
        triangles,
    }
}

/// UV sphere sampled uniformly in (θ, φ).
///
/// Poles are rings of coincident vertices rather than single apex vertices, so the triangles
/// touching a pole are zero-area.
pub fn sphere_mesh(radius: f64, lat_bands: u32, lon_bands: u32) -> Mesh {
    let mut vertices = Vec::with_capacity(((lat_bands + 1) * lon_bands) as usize);
    for lat in 0..=lat_bands {
        let theta = PI * f64::from(lat) / f64::from(lat_bands);
        let (sin_t, cos_t) = theta.sin_cos();
        for lon in 0..lon_bands {
            let phi = 2.0 * PI * f64::from(lon) / f64::from(lon_bands);
            let (sin_p, cos_p) = phi.sin_cos();
            vertices.push(DVec3::new(
                radius * sin_t * cos_p,
                radius * sin_t * sin_p,
                radius * cos_t,
            ));
        }
    }

    let mut triangles = Vec::with_capacity((2 * lat_bands * lon_bands) as usize);
    for lat in 0..lat_bands {
        for lon in 0..lon_bands {
            let next = (lon + 1) % lon_bands;
            let v0 = lat * lon_bands + lon;
            let v1 = lat * lon_bands + next;
            let v2 = (lat + 1) * lon_bands + lon;
            let v3 = (lat + 1) * lon_bands + next;
            triangles.push([v0, v1, v2]);
            triangles.push([v1, v3, v2]);
        }
    }

    Mesh {
        vertices,
        triangles,
    }
}
