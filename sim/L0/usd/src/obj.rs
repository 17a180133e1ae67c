//! Wavefront OBJ reading through `tobj`.
//!
//! Faces are triangulated and every model in the file is merged into one
//! mesh. Texture maps named by the accompanying MTL library are reported so
//! the caller can ship them next to the converted asset.

use std::io::BufReader;
use std::path::{Path, PathBuf};

use nalgebra::Vector3;
use tracing::debug;

use crate::error::ReadResult;
use crate::mesh::SurfaceMesh;

/// Geometry and texture references of one OBJ file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjAsset {
    /// All models merged into one mesh.
    pub mesh: SurfaceMesh,
    /// Texture maps named by the MTL library, resolved against the OBJ's
    /// directory.
    pub textures: Vec<PathBuf>,
}

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        single_index: true,
        triangulate: true,
        ..Default::default()
    }
}

/// Read an OBJ file and its MTL texture references.
///
/// A missing or broken MTL library is not an error; the geometry is still
/// returned without textures.
///
/// # Errors
///
/// Returns an error if the file cannot be read or its geometry is invalid.
pub fn read_obj<P: AsRef<Path>>(path: P) -> ReadResult<ObjAsset> {
    let path = path.as_ref();
    let (models, materials) = tobj::load_obj(path, &load_options())?;

    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let mut textures: Vec<PathBuf> = Vec::new();
    match materials {
        Ok(materials) => {
            for material in &materials {
                let maps = [
                    material.diffuse_texture.as_deref(),
                    material.normal_texture.as_deref(),
                ];
                for map in maps.into_iter().flatten() {
                    let texture = dir.join(map.trim());
                    if !textures.contains(&texture) {
                        textures.push(texture);
                    }
                }
            }
        }
        Err(e) => debug!(path = %path.display(), error = %e, "no usable MTL library"),
    }

    Ok(ObjAsset {
        mesh: merge_models(&models),
        textures,
    })
}

/// Parse OBJ content already in memory. Material libraries are ignored.
///
/// # Errors
///
/// Returns an error on malformed statements or indices outside the vertex
/// list.
pub fn parse_obj(text: &str) -> ReadResult<SurfaceMesh> {
    let mut reader = BufReader::new(text.as_bytes());
    let (models, _) = tobj::load_obj_buf(&mut reader, &load_options(), |_| {
        Err(tobj::LoadError::OpenFileFailed)
    })?;
    Ok(merge_models(&models))
}

fn merge_models(models: &[tobj::Model]) -> SurfaceMesh {
    let mut merged = SurfaceMesh::new();
    for model in models {
        merged.append(&surface_from(&model.mesh));
    }
    merged
}

fn surface_from(mesh: &tobj::Mesh) -> SurfaceMesh {
    let to_vectors = |flat: &[f32]| -> Vec<Vector3<f64>> {
        flat.chunks_exact(3)
            .map(|c| Vector3::new(f64::from(c[0]), f64::from(c[1]), f64::from(c[2])))
            .collect()
    };

    let mut surface = SurfaceMesh::with_capacity(mesh.positions.len() / 3, mesh.indices.len() / 3);
    surface.points = to_vectors(&mesh.positions);
    for triangle in mesh.indices.chunks_exact(3) {
        surface.push_face(triangle);
    }
    // With `single_index` normals line up with positions when present.
    let normals = to_vectors(&mesh.normals);
    if normals.len() == surface.points.len() {
        surface.normals = normals;
    }
    surface
}
