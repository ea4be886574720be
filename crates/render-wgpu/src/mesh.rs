use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use mipview_scene::CubeFace;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub uv: [f32; 2],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct GridVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

/// Texture axes of a face: u runs along the tangent, v down the bitangent.
/// `tangent x bitangent` is the outward normal.
fn face_axes(face: CubeFace) -> (Vec3, Vec3) {
    match face {
        CubeFace::Front => (Vec3::X, Vec3::Y),
        CubeFace::Back => (Vec3::NEG_X, Vec3::Y),
        CubeFace::Top => (Vec3::X, Vec3::NEG_Z),
        CubeFace::Bottom => (Vec3::X, Vec3::Z),
        CubeFace::Right => (Vec3::NEG_Z, Vec3::Y),
        CubeFace::Left => (Vec3::Z, Vec3::Y),
    }
}

/// Unit cube with four vertices per face, emitted in material slot order so
/// every face maps the full texture.
pub(crate) fn cube_mesh() -> (Vec<Vertex>, Vec<u16>) {
    let mut vertices = Vec::with_capacity(CubeFace::COUNT * 4);
    let mut indices = Vec::with_capacity(CubeFace::COUNT * 6);
    for face in CubeFace::ALL {
        let n = face.normal();
        let (t, b) = face_axes(face);
        let center = n * 0.5;
        let base = vertices.len() as u16;
        // Bottom-left, bottom-right, top-right, top-left; counter-clockwise
        // seen from outside.
        for (su, sv, uv) in [
            (-0.5, -0.5, [0.0, 1.0]),
            (0.5, -0.5, [1.0, 1.0]),
            (0.5, 0.5, [1.0, 0.0]),
            (-0.5, 0.5, [0.0, 0.0]),
        ] {
            vertices.push(Vertex {
                position: (center + t * su + b * sv).to_array(),
                normal: n.to_array(),
                tangent: t.to_array(),
                uv,
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    (vertices, indices)
}

/// Grid floor line vertices at height `y`.
pub(crate) fn grid_mesh(half_extent: i32, spacing: f32, y: f32) -> Vec<GridVertex> {
    let mut verts = Vec::new();
    let color = [0.4, 0.4, 0.4, 1.0];
    let extent = half_extent as f32 * spacing;

    for i in -half_extent..=half_extent {
        let offset = i as f32 * spacing;
        // Lines along X
        verts.push(GridVertex {
            position: [-extent, y, offset],
            color,
        });
        verts.push(GridVertex {
            position: [extent, y, offset],
            color,
        });
        // Lines along Z
        verts.push(GridVertex {
            position: [offset, y, -extent],
            color,
        });
        verts.push(GridVertex {
            position: [offset, y, extent],
            color,
        });
    }
    verts
}
