//! Mesh asset conversion to standalone USDA layers.
//!
//! STL, OBJ, glTF and GLB sources are read natively and written as a single
//! `Mesh` prim. COLLADA and FBX are accepted formats without a reader in
//! this crate; they fail per mesh with
//! [`MeshConversionError::BackendUnavailable`].

use std::fs;
use std::path::{Path, PathBuf};

use sim_sdf::{
    MeshAssetConverter, MeshConversionError, MeshFormat, check_format, is_texture, sanitize_name,
};
use tracing::{debug, info};

use crate::error::MeshReadError;
use crate::gltf_read::read_gltf;
use crate::mesh::SurfaceMesh;
use crate::obj::{ObjAsset, read_obj};
use crate::stl::read_stl;
use crate::usda::{UsdaText, escape_string, format_vec3};

/// Converts STL, OBJ and glTF meshes into USDA layers.
///
/// Each produced layer has a single `Mesh` prim as its default prim, so
/// the layer can be referenced directly. Texture maps named by an OBJ's
/// material library are copied beside the artifact.
#[derive(Debug, Clone, Default)]
pub struct UsdaMeshConverter {
    converted: usize,
}

impl UsdaMeshConverter {
    /// Create a converter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of meshes converted so far.
    #[must_use]
    pub fn converted_count(&self) -> usize {
        self.converted
    }

    fn read(source: &Path, format: MeshFormat) -> Result<ObjAsset, MeshConversionError> {
        let asset = match format {
            // STL stores every triangle with its own corners.
            MeshFormat::Stl => read_stl(source).map(|m| ObjAsset {
                mesh: m.welded(),
                textures: Vec::new(),
            }),
            MeshFormat::Obj => read_obj(source),
            MeshFormat::Gltf | MeshFormat::Glb => read_gltf(source).map(|mesh| ObjAsset {
                mesh,
                textures: Vec::new(),
            }),
            MeshFormat::Dae | MeshFormat::Fbx => {
                return Err(MeshConversionError::BackendUnavailable {
                    path: source.to_path_buf(),
                    format,
                });
            }
        };

        asset.map_err(|err| match err {
            MeshReadError::Io(e) => MeshConversionError::io(source, e),
            other => MeshConversionError::parse(source, other.to_string()),
        })
    }
}

/// Copy texture maps next to `dest_dir`, replacing stale copies.
fn copy_textures(textures: &[PathBuf], dest_dir: &Path) {
    for texture in textures {
        if !texture.is_file() || !is_texture(texture) {
            debug!(texture = %texture.display(), "texture not found");
            continue;
        }
        let Some(name) = texture.file_name() else {
            continue;
        };
        match fs::copy(texture, dest_dir.join(name)) {
            Ok(_) => debug!(texture = %texture.display(), "texture copied"),
            Err(e) => debug!(texture = %texture.display(), error = %e, "texture copy failed"),
        }
    }
}

impl MeshAssetConverter for UsdaMeshConverter {
    fn convert(&mut self, source: &Path, dest: &Path) -> Result<PathBuf, MeshConversionError> {
        let format = check_format(source)?;
        let ObjAsset { mesh, textures } = Self::read(source, format)?;
        if mesh.is_empty() {
            return Err(MeshConversionError::parse(source, "mesh has no faces"));
        }

        let prim_name = sanitize_name(
            &dest
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        let layer = mesh_layer(&prim_name, &mesh);

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| MeshConversionError::io(parent, e))?;
        }
        fs::write(dest, layer).map_err(|e| MeshConversionError::io(dest, e))?;

        if let Some(dest_dir) = dest.parent() {
            copy_textures(&textures, dest_dir);
        }

        self.converted += 1;
        info!(
            source = %source.display(),
            points = mesh.points.len(),
            faces = mesh.face_count(),
            "mesh written"
        );
        Ok(dest.to_path_buf())
    }
}

/// Render a mesh as a USDA layer whose default prim is the mesh itself.
#[must_use]
pub fn mesh_layer(prim_name: &str, mesh: &SurfaceMesh) -> String {
    let mut text = UsdaText::new();
    text.header(&[
        format!("defaultPrim = \"{}\"", escape_string(prim_name)),
        "metersPerUnit = 1".to_string(),
    ]);
    text.line("");
    text.line(&format!("def Mesh \"{prim_name}\""));
    text.open();

    if let Some((lo, hi)) = mesh.bounds() {
        text.line(&format!(
            "float3[] extent = [{}, {}]",
            format_vec3(&lo),
            format_vec3(&hi)
        ));
    }
    text.line(&format!(
        "int[] faceVertexCounts = [{}]",
        join(&mesh.face_vertex_counts)
    ));
    text.line(&format!(
        "int[] faceVertexIndices = [{}]",
        join(&mesh.face_vertex_indices)
    ));
    if mesh.has_normals() {
        let normals: Vec<String> = mesh.normals.iter().map(format_vec3).collect();
        text.line(&format!("normal3f[] normals = [{}] (", normals.join(", ")));
        text.line("    interpolation = \"vertex\"");
        text.line(")");
    }
    let points: Vec<String> = mesh.points.iter().map(format_vec3).collect();
    text.line(&format!("point3f[] points = [{}]", points.join(", ")));
    text.line("uniform token subdivisionScheme = \"none\"");

    text.close();
    text.finish()
}

fn join(values: &[u32]) -> String {
    values
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
