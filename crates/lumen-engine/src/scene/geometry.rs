//! Unit meshes shared by the built-in shapes.
//!
//! Every built-in shape renders one of these meshes and folds its own dimensions into the model
//! matrix, so all boxes (or cylinders, spheres...) of a context share a single GPU buffer.
//! Closed meshes wind counter-clockwise when seen from outside.

use std::f32::consts::{PI, TAU};
use std::sync::{Arc, OnceLock};

use glam::Vec3;

use crate::loader::{Descriptor, MeshData, Topology};

pub const CYLINDER_SEGMENTS: u32 = 32;
pub const SPHERE_RINGS: u32 = 16;
pub const SPHERE_SEGMENTS: u32 = 32;

/// Cube of side 1 centered on the origin.
pub fn unit_cube() -> Arc<Descriptor> {
    static MESH: OnceLock<Arc<Descriptor>> = OnceLock::new();
    Arc::clone(MESH.get_or_init(|| Arc::new(Descriptor::Mesh(cube(Vec3::ZERO)))))
}

/// Unit box spanning `x` in `0..1`, used to draw line segments with thickness.
pub fn unit_beam() -> Arc<Descriptor> {
    static MESH: OnceLock<Arc<Descriptor>> = OnceLock::new();
    Arc::clone(MESH.get_or_init(|| Arc::new(Descriptor::Mesh(cube(Vec3::new(0.5, 0.0, 0.0))))))
}

/// Cylinder of diameter 1 and length 1 along Z, centered on the origin.
pub fn unit_cylinder() -> Arc<Descriptor> {
    static MESH: OnceLock<Arc<Descriptor>> = OnceLock::new();
    Arc::clone(MESH.get_or_init(|| Arc::new(Descriptor::Mesh(cylinder(CYLINDER_SEGMENTS)))))
}

/// Sphere of diameter 1 centered on the origin.
pub fn unit_sphere() -> Arc<Descriptor> {
    static MESH: OnceLock<Arc<Descriptor>> = OnceLock::new();
    Arc::clone(
        MESH.get_or_init(|| Arc::new(Descriptor::Mesh(sphere(SPHERE_RINGS, SPHERE_SEGMENTS)))),
    )
}

/// Quad of side 1 in the XY plane. `v = 0` is the `y = -0.5` edge.
pub fn unit_quad() -> Arc<Descriptor> {
    static MESH: OnceLock<Arc<Descriptor>> = OnceLock::new();
    Arc::clone(MESH.get_or_init(|| Arc::new(Descriptor::Mesh(quad()))))
}

fn quad() -> MeshData {
    MeshData {
        positions: vec![
            [-0.5, -0.5, 0.0],
            [0.5, -0.5, 0.0],
            [0.5, 0.5, 0.0],
            [-0.5, 0.5, 0.0],
        ],
        normals: vec![[0.0, 0.0, 1.0]; 4],
        uvs: Some(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]),
        indices: vec![0, 1, 2, 0, 2, 3],
        topology: Topology::TriangleList,
    }
}

fn cube(offset: Vec3) -> MeshData {
    // (normal, u, v) with u x v == normal.
    const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
    ];
    const CORNERS: [(f32, f32, [f32; 2]); 4] = [
        (-1.0, -1.0, [0.0, 1.0]),
        (1.0, -1.0, [1.0, 1.0]),
        (1.0, 1.0, [1.0, 0.0]),
        (-1.0, 1.0, [0.0, 0.0]),
    ];

    let mut mesh = MeshData::default();
    let mut uvs = Vec::with_capacity(24);

    for (face, (n, u, v)) in FACES.iter().enumerate() {
        let (n, u, v) = (Vec3::from(*n), Vec3::from(*u), Vec3::from(*v));
        let center = n * 0.5 + offset;
        for (su, sv, uv) in CORNERS {
            let p = center + u * (0.5 * su) + v * (0.5 * sv);
            mesh.positions.push(p.to_array());
            mesh.normals.push(n.to_array());
            uvs.push(uv);
        }
        let base = face as u32 * 4;
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    mesh.uvs = Some(uvs);
    mesh
}

fn cylinder(segments: u32) -> MeshData {
    let mut mesh = MeshData::default();
    let mut uvs = Vec::new();

    // Side wall: one bottom/top pair per segment boundary, seam duplicated for uvs.
    for i in 0..=segments {
        let t = i as f32 / segments as f32;
        let (s, c) = (t * TAU).sin_cos();
        mesh.positions.push([0.5 * c, 0.5 * s, -0.5]);
        mesh.positions.push([0.5 * c, 0.5 * s, 0.5]);
        mesh.normals.push([c, s, 0.0]);
        mesh.normals.push([c, s, 0.0]);
        uvs.push([t, 1.0]);
        uvs.push([t, 0.0]);
    }
    for i in 0..segments {
        let b0 = i * 2;
        let t0 = b0 + 1;
        let b1 = b0 + 2;
        let t1 = b0 + 3;
        mesh.indices.extend_from_slice(&[b0, b1, t1, b0, t1, t0]);
    }

    // Caps.
    for (z, nz) in [(0.5f32, 1.0f32), (-0.5, -1.0)] {
        let center = mesh.positions.len() as u32;
        mesh.positions.push([0.0, 0.0, z]);
        mesh.normals.push([0.0, 0.0, nz]);
        uvs.push([0.5, 0.5]);
        for i in 0..=segments {
            let (s, c) = (i as f32 / segments as f32 * TAU).sin_cos();
            mesh.positions.push([0.5 * c, 0.5 * s, z]);
            mesh.normals.push([0.0, 0.0, nz]);
            uvs.push([0.5 + 0.5 * c, 0.5 - 0.5 * s]);
        }
        for i in 0..segments {
            let a = center + 1 + i;
            let b = a + 1;
            if nz > 0.0 {
                mesh.indices.extend_from_slice(&[center, a, b]);
            } else {
                mesh.indices.extend_from_slice(&[center, b, a]);
            }
        }
    }

    mesh.uvs = Some(uvs);
    mesh
}

fn sphere(rings: u32, segments: u32) -> MeshData {
    let mut mesh = MeshData::default();
    let mut uvs = Vec::new();

    for r in 0..=rings {
        let v = r as f32 / rings as f32;
        let (st, ct) = (v * PI).sin_cos();
        for s in 0..=segments {
            let u = s as f32 / segments as f32;
            let (sp, cp) = (u * TAU).sin_cos();
            let n = [st * cp, st * sp, ct];
            mesh.positions.push([0.5 * n[0], 0.5 * n[1], 0.5 * n[2]]);
            mesh.normals.push(n);
            uvs.push([u, v]);
        }
    }

    let stride = segments + 1;
    for r in 0..rings {
        for s in 0..segments {
            let a = r * stride + s;
            let b = a + stride;
            let c = b + 1;
            let d = a + 1;
            mesh.indices.extend_from_slice(&[a, b, c, a, c, d]);
        }
    }

    mesh.uvs = Some(uvs);
    mesh
}

/// Per-vertex normals averaged from the faces sharing each vertex.
///
/// Used for imported meshes that carry no normals. Degenerate faces contribute nothing.
pub fn smooth_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut acc = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let (Some(pa), Some(pb), Some(pc)) = (positions.get(a), positions.get(b), positions.get(c))
        else {
            continue;
        };
        let face = (Vec3::from(*pb) - Vec3::from(*pa)).cross(Vec3::from(*pc) - Vec3::from(*pa));
        acc[a] += face;
        acc[b] += face;
        acc[c] += face;
    }
    acc.into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Z).to_array())
        .collect()
}

/// Unwelds a triangle mesh so each face carries its own vertices and face normal.
///
/// Line meshes are returned unchanged.
pub fn flatten(mesh: &MeshData) -> MeshData {
    if mesh.topology != Topology::TriangleList {
        return mesh.clone();
    }

    let mut out = MeshData {
        topology: Topology::TriangleList,
        uvs: mesh.uvs.as_ref().map(|_| Vec::with_capacity(mesh.indices.len())),
        ..MeshData::default()
    };
    for tri in mesh.indices.chunks_exact(3) {
        let idx = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let Some(p) = idx
            .iter()
            .map(|&i| mesh.positions.get(i).copied().map(Vec3::from))
            .collect::<Option<Vec<_>>>()
        else {
            continue;
        };
        let normal = (p[1] - p[0])
            .cross(p[2] - p[0])
            .try_normalize()
            .unwrap_or(Vec3::Z)
            .to_array();

        for (corner, &i) in idx.iter().enumerate() {
            out.indices.push(out.positions.len() as u32);
            out.positions.push(p[corner].to_array());
            out.normals.push(normal);
            if let (Some(dst), Some(src)) = (out.uvs.as_mut(), mesh.uvs.as_ref()) {
                dst.push(src.get(i).copied().unwrap_or([0.0; 2]));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(d: &Descriptor) -> &MeshData {
        match d {
            Descriptor::Mesh(m) => m,
            Descriptor::Texture(_) => panic!("expected a mesh"),
        }
    }

    fn faces_point_outward(m: &MeshData) -> bool {
        m.indices.chunks_exact(3).all(|t| {
            let p: Vec<Vec3> = t.iter().map(|&i| Vec3::from(m.positions[i as usize])).collect();
            let face = (p[1] - p[0]).cross(p[2] - p[0]);
            if face.length_squared() < 1e-10 {
                return true;
            }
            let n: Vec3 = t.iter().map(|&i| Vec3::from(m.normals[i as usize])).sum();
            face.dot(n) > 0.0
        })
    }

    #[test]
    fn shapes_are_valid() {
        for d in [unit_cube(), unit_beam(), unit_cylinder(), unit_sphere(), unit_quad()] {
            assert!(mesh(&d).validate().is_ok());
        }
    }

    #[test]
    fn closed_shapes_wind_outward() {
        for d in [unit_cube(), unit_cylinder(), unit_sphere()] {
            assert!(faces_point_outward(mesh(&d)));
        }
    }

    #[test]
    fn cube_fits_unit_bounds() {
        let cube = unit_cube();
        let m = mesh(&cube);
        assert_eq!(m.vertex_count(), 24);
        assert_eq!(m.index_count(), 36);
        assert!(m.positions.iter().flatten().all(|c| c.abs() <= 0.5 + 1e-6));
    }

    #[test]
    fn beam_starts_at_origin() {
        let beam = unit_beam();
        let xs: Vec<f32> = mesh(&beam).positions.iter().map(|p| p[0]).collect();
        let min = xs.iter().copied().fold(f32::MAX, f32::min);
        let max = xs.iter().copied().fold(f32::MIN, f32::max);
        assert!(min.abs() < 1e-6 && (max - 1.0).abs() < 1e-6);
    }

    #[test]
    fn shared_meshes_are_the_same_allocation() {
        assert!(Arc::ptr_eq(&unit_sphere(), &unit_sphere()));
    }

    #[test]
    fn smooth_normals_of_flat_quad_face_up() {
        let q = quad();
        let normals = smooth_normals(&q.positions, &q.indices);
        assert!(normals.iter().all(|n| Vec3::from(*n).abs_diff_eq(Vec3::Z, 1e-6)));
    }

    #[test]
    fn flatten_gives_face_normals() {
        let cube = unit_cube();
        let flat = flatten(mesh(&cube));
        assert_eq!(flat.vertex_count(), mesh(&cube).index_count());
        assert!(flat.validate().is_ok());
        assert!(faces_point_outward(&flat));
        for tri in flat.indices.chunks_exact(3) {
            let n = flat.normals[tri[0] as usize];
            assert!(tri.iter().all(|&i| flat.normals[i as usize] == n));
        }
    }
}
