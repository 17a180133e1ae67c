//! glTF 2.0 reading through the `gltf` crate.
//!
//! Both `.gltf` (JSON with external or embedded buffers) and `.glb` are
//! handled by [`gltf::import`]. Triangle primitives of every mesh reachable
//! from the default scene are flattened into one mesh with node transforms
//! baked into the points.

use std::path::Path;

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use tracing::debug;

use crate::error::{MeshReadError, ReadResult};
use crate::mesh::SurfaceMesh;

/// Read a glTF or GLB file into a single world-space mesh.
///
/// Uses the default scene, else the first scene. A document without scenes
/// contributes all of its meshes untransformed. Primitives other than
/// triangle lists are skipped.
///
/// # Errors
///
/// Returns an error if the document or its buffers cannot be loaded, or if
/// a primitive indexes past its vertex list.
pub fn read_gltf<P: AsRef<Path>>(path: P) -> ReadResult<SurfaceMesh> {
    let (document, buffers, _images) = gltf::import(path.as_ref())?;
    let mut out = SurfaceMesh::new();

    match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => {
            for node in scene.nodes() {
                visit_node(&node, &Matrix4::identity(), &buffers, &mut out)?;
            }
        }
        None => {
            for mesh in document.meshes() {
                append_mesh(&mesh, &Matrix4::identity(), &buffers, &mut out)?;
            }
        }
    }
    Ok(out)
}

fn visit_node(
    node: &gltf::Node<'_>,
    parent: &Matrix4<f64>,
    buffers: &[gltf::buffer::Data],
    out: &mut SurfaceMesh,
) -> ReadResult<()> {
    let local = Matrix4::from(node.transform().matrix()).cast::<f64>();
    let world = parent * local;

    if let Some(mesh) = node.mesh() {
        append_mesh(&mesh, &world, buffers, out)?;
    }
    for child in node.children() {
        visit_node(&child, &world, buffers, out)?;
    }
    Ok(())
}

fn append_mesh(
    mesh: &gltf::Mesh<'_>,
    world: &Matrix4<f64>,
    buffers: &[gltf::buffer::Data],
    out: &mut SurfaceMesh,
) -> ReadResult<()> {
    let normal_matrix: Matrix3<f64> = world
        .fixed_view::<3, 3>(0, 0)
        .into_owned()
        .try_inverse()
        .map_or_else(Matrix3::identity, |m| m.transpose());

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            debug!(mesh = mesh.index(), mode = ?primitive.mode(), "primitive skipped");
            continue;
        }
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));
        let Some(positions) = reader.read_positions() else {
            continue;
        };

        let points: Vec<Vector3<f64>> = positions
            .map(|p| {
                let local = Point3::new(f64::from(p[0]), f64::from(p[1]), f64::from(p[2]));
                world.transform_point(&local).coords
            })
            .collect();
        let normals: Vec<Vector3<f64>> = reader
            .read_normals()
            .map(|iter| {
                iter.map(|n| {
                    let n = Vector3::new(f64::from(n[0]), f64::from(n[1]), f64::from(n[2]));
                    (normal_matrix * n).try_normalize(f64::EPSILON).unwrap_or(n)
                })
                .collect()
            })
            .unwrap_or_default();

        #[allow(clippy::cast_possible_truncation)]
        // Truncation: glTF accessor counts are u32
        let count = points.len() as u32;
        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..count).collect(),
        };
        if let Some(&index) = indices.iter().find(|&&i| i >= count) {
            return Err(MeshReadError::IndexOutOfRange {
                index: i64::from(index),
                count: points.len(),
            });
        }

        let mut part = SurfaceMesh::with_capacity(points.len(), indices.len() / 3);
        part.points = points;
        if normals.len() == part.points.len() {
            part.normals = normals;
        }
        for triangle in indices.chunks_exact(3) {
            part.push_face(triangle);
        }
        out.append(&part);
    }
    Ok(())
}
