use std::collections::HashMap;
use std::path::Path;
use std::str::SplitWhitespace;

use crate::error::ModelLoadError;
use crate::loader::{MeshData, Topology};
use crate::scene::geometry;

/// How normals are generated when the file carries none.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum NormalMode {
    /// Averaged over the faces sharing each vertex.
    #[default]
    Smooth,
    /// One normal per face; vertices are unwelded.
    Flat,
}

/// One `v/vt/vn` corner, zero-based and already resolved.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct Corner {
    v: usize,
    vt: Option<usize>,
    vn: Option<usize>,
}

#[derive(Default)]
struct Builder {
    positions: Vec<[f32; 3]>,
    uvs: Vec<[f32; 2]>,
    normals: Vec<[f32; 3]>,

    corners: HashMap<Corner, u32>,
    mesh: MeshData,
    out_uvs: Vec<[f32; 2]>,
    has_uvs: bool,
    missing_normals: bool,
}

impl Builder {
    fn vertex(&mut self, corner: Corner) -> u32 {
        if let Some(&index) = self.corners.get(&corner) {
            return index;
        }
        let index = self.mesh.positions.len() as u32;
        self.mesh.positions.push(self.positions[corner.v]);
        self.out_uvs.push(corner.vt.map_or([0.0; 2], |t| self.uvs[t]));
        self.mesh.normals.push(corner.vn.map_or([0.0; 3], |n| self.normals[n]));
        self.has_uvs |= corner.vt.is_some();
        self.missing_normals |= corner.vn.is_none();
        self.corners.insert(corner, index);
        index
    }

    fn finish(mut self, mode: NormalMode) -> Result<MeshData, ModelLoadError> {
        if self.mesh.indices.is_empty() {
            return Err(ModelLoadError::Empty);
        }
        self.mesh.topology = Topology::TriangleList;
        if self.has_uvs {
            self.mesh.uvs = Some(self.out_uvs);
        }
        if self.missing_normals {
            self.mesh.normals = geometry::smooth_normals(&self.mesh.positions, &self.mesh.indices);
            if mode == NormalMode::Flat {
                return Ok(geometry::flatten(&self.mesh));
            }
        }
        Ok(self.mesh)
    }
}

fn parse_err(line: usize, message: impl Into<String>) -> ModelLoadError {
    ModelLoadError::Parse { line, message: message.into() }
}

fn floats<const N: usize>(
    fields: SplitWhitespace<'_>,
    line: usize,
    required: usize,
) -> Result<[f32; N], ModelLoadError> {
    let mut out = [0.0; N];
    let mut count = 0;
    for (slot, field) in out.iter_mut().zip(fields) {
        *slot = field
            .parse()
            .map_err(|_| parse_err(line, format!("invalid number `{field}`")))?;
        count += 1;
    }
    if count < required {
        return Err(parse_err(line, format!("expected {required} numbers, got {count}")));
    }
    Ok(out)
}

/// Resolves a one-based (or negative, relative) OBJ index against `len` elements.
fn resolve(field: &str, len: usize, line: usize) -> Result<usize, ModelLoadError> {
    let raw: i64 = field
        .parse()
        .map_err(|_| parse_err(line, format!("invalid index `{field}`")))?;
    let index = match raw {
        0 => None,
        r if r > 0 => usize::try_from(r - 1).ok(),
        r => len.checked_sub(usize::try_from(-r).unwrap_or(usize::MAX)),
    };
    index
        .filter(|&i| i < len)
        .ok_or_else(|| parse_err(line, format!("index {raw} out of range ({len} defined)")))
}

fn corner(b: &Builder, token: &str, line: usize) -> Result<Corner, ModelLoadError> {
    let mut parts = token.split('/');
    let v = resolve(parts.next().unwrap_or_default(), b.positions.len(), line)?;
    let vt = match parts.next() {
        Some(t) if !t.is_empty() => Some(resolve(t, b.uvs.len(), line)?),
        _ => None,
    };
    let vn = match parts.next() {
        Some(n) if !n.is_empty() => Some(resolve(n, b.normals.len(), line)?),
        _ => None,
    };
    Ok(Corner { v, vt, vn })
}

/// Parses Wavefront OBJ text into a triangle mesh.
///
/// Supports `v`, `vt`, `vn` and `f` records; polygons are fan-triangulated. Texture `v` is
/// flipped so that the top image row maps to `vt` 1. Unknown records are ignored.
pub fn parse_obj(source: &str, normals: NormalMode) -> Result<MeshData, ModelLoadError> {
    let mut b = Builder::default();

    for (i, raw) in source.lines().enumerate() {
        let line = i + 1;
        let content = raw.split('#').next().unwrap_or_default();
        let mut fields = content.split_whitespace();
        let Some(tag) = fields.next() else { continue };

        match tag {
            "v" => b.positions.push(floats::<3>(fields, line, 3)?),
            "vt" => {
                let [u, v] = floats::<2>(fields, line, 1)?;
                b.uvs.push([u, 1.0 - v]);
            }
            "vn" => b.normals.push(floats::<3>(fields, line, 3)?),
            "f" => {
                let corners = fields
                    .map(|token| corner(&b, token, line))
                    .collect::<Result<Vec<_>, _>>()?;
                if corners.len() < 3 {
                    return Err(parse_err(line, "face needs at least 3 vertices"));
                }
                let first = b.vertex(corners[0]);
                for pair in corners[1..].windows(2) {
                    let second = b.vertex(pair[0]);
                    let third = b.vertex(pair[1]);
                    b.mesh.indices.extend_from_slice(&[first, second, third]);
                }
            }
            other => log::trace!("obj line {line}: `{other}` ignored"),
        }
    }

    b.finish(normals)
}

pub fn load_obj(path: impl AsRef<Path>, normals: NormalMode) -> Result<MeshData, ModelLoadError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)?;
    let mesh = parse_obj(&source, normals)?;
    log::debug!(
        "imported {} ({} vertices, {} triangles)",
        path.display(),
        mesh.vertex_count(),
        mesh.index_count() / 3
    );
    Ok(mesh)
}
