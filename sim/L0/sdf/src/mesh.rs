//! Mesh asset conversion interface and the per-run mesh cache.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Texture extensions copied alongside converted meshes.
pub const TEXTURE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tga", "bmp", "tiff", "hdr"];

/// Directory, relative to the output scene, holding converted assets.
pub const ASSET_DIR: &str = "meshes";

/// Errors from a single mesh conversion. Never fatal to a run.
#[derive(Debug, Error)]
pub enum MeshConversionError {
    /// The file extension is not an accepted mesh format.
    #[error("unsupported mesh format '{extension}' for {}", .path.display())]
    UnsupportedFormat {
        /// Source path.
        path: PathBuf,
        /// Offending extension (may be empty).
        extension: String,
    },

    /// The format is accepted but this converter cannot process it.
    #[error("no conversion backend for {format} meshes ({})", .path.display())]
    BackendUnavailable {
        /// Source path.
        path: PathBuf,
        /// Format name.
        format: MeshFormat,
    },

    /// The source could not be read or the artifact could not be written.
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The source file is not a valid mesh.
    #[error("invalid mesh {}: {message}", .path.display())]
    Parse {
        /// Source path.
        path: PathBuf,
        /// What was wrong.
        message: String,
    },
}

impl MeshConversionError {
    /// Create an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Mesh formats accepted by [`MeshAssetConverter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshFormat {
    /// COLLADA.
    Dae,
    /// Stereolithography, ASCII or binary.
    Stl,
    /// Wavefront OBJ.
    Obj,
    /// Autodesk FBX.
    Fbx,
    /// glTF JSON.
    Gltf,
    /// glTF binary.
    Glb,
}

impl MeshFormat {
    /// Every accepted format.
    pub const ALL: [MeshFormat; 6] = [
        Self::Dae,
        Self::Stl,
        Self::Obj,
        Self::Fbx,
        Self::Gltf,
        Self::Glb,
    ];

    /// Format for a file extension (case-insensitive, without the dot).
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "dae" => Some(Self::Dae),
            "stl" => Some(Self::Stl),
            "obj" => Some(Self::Obj),
            "fbx" => Some(Self::Fbx),
            "gltf" => Some(Self::Gltf),
            "glb" => Some(Self::Glb),
            _ => None,
        }
    }

    /// Format for a path, from its extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical extension.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Dae => "dae",
            Self::Stl => "stl",
            Self::Obj => "obj",
            Self::Fbx => "fbx",
            Self::Gltf => "gltf",
            Self::Glb => "glb",
        }
    }
}

impl std::fmt::Display for MeshFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Check that a path has an accepted mesh extension.
///
/// # Errors
///
/// Returns [`MeshConversionError::UnsupportedFormat`] otherwise.
pub fn check_format(path: &Path) -> Result<MeshFormat, MeshConversionError> {
    MeshFormat::from_path(path).ok_or_else(|| MeshConversionError::UnsupportedFormat {
        path: path.to_path_buf(),
        extension: path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default(),
    })
}

/// Whether a path looks like a texture image.
#[must_use]
pub fn is_texture(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| TEXTURE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Converts one mesh file into a scene asset.
///
/// The converter is a single mutable resource: the orchestrator calls it
/// strictly one mesh at a time and waits for each call to finish.
pub trait MeshAssetConverter {
    /// Convert `source` into an asset at `dest`, returning the artifact path.
    ///
    /// # Errors
    ///
    /// Any failure is reported for this mesh only; the run continues.
    fn convert(&mut self, source: &Path, dest: &Path) -> Result<PathBuf, MeshConversionError>;

    /// Extension of produced artifacts, without the dot.
    fn artifact_extension(&self) -> &str {
        "usda"
    }
}

/// What happened to one unique source mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshOutcome {
    /// Converted to this artifact.
    Converted(PathBuf),
    /// The converter failed.
    Failed(String),
    /// The source file does not exist; the converter was not called.
    Missing,
}

/// Per-run memo of mesh conversions keyed by resolved source path.
#[derive(Debug, Default)]
pub struct MeshCache {
    outcomes: BTreeMap<PathBuf, MeshOutcome>,
    artifact_names: HashSet<String>,
}

impl MeshCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcome recorded for a source path.
    #[must_use]
    pub fn get(&self, source: &Path) -> Option<&MeshOutcome> {
        self.outcomes.get(source)
    }

    /// Converted artifact for a source path.
    #[must_use]
    pub fn artifact(&self, source: &Path) -> Option<&Path> {
        match self.outcomes.get(source) {
            Some(MeshOutcome::Converted(artifact)) => Some(artifact.as_path()),
            _ => None,
        }
    }

    /// Record an outcome.
    pub fn insert(&mut self, source: PathBuf, outcome: MeshOutcome) {
        self.outcomes.insert(source, outcome);
    }

    /// Whether a source was already processed.
    #[must_use]
    pub fn contains(&self, source: &Path) -> bool {
        self.outcomes.contains_key(source)
    }

    /// Reserve a destination `<dir>/<stem>.<ext>`, adding `_1`, `_2`, ...
    /// when another source already claimed that name in this run.
    pub fn reserve_destination(&mut self, dir: &Path, source: &Path, extension: &str) -> PathBuf {
        let stem = source
            .file_stem()
            .map_or_else(|| "mesh".to_string(), |s| s.to_string_lossy().into_owned());

        let mut name = format!("{stem}.{extension}");
        let mut counter = 1;
        while self.artifact_names.contains(&name) {
            name = format!("{stem}_{counter}.{extension}");
            counter += 1;
        }
        self.artifact_names.insert(name.clone());
        dir.join(name)
    }

    /// Number of sources converted successfully.
    #[must_use]
    pub fn converted_count(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, MeshOutcome::Converted(_)))
            .count()
    }

    /// Number of sources whose conversion failed.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, MeshOutcome::Failed(_)))
            .count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(MeshFormat::from_path(Path::new("a/b.STL")), Some(MeshFormat::Stl));
        assert_eq!(MeshFormat::from_path(Path::new("b.glb")), Some(MeshFormat::Glb));
        assert_eq!(MeshFormat::from_path(Path::new("b.ply")), None);
        assert_eq!(MeshFormat::from_path(Path::new("noext")), None);
        for format in MeshFormat::ALL {
            assert_eq!(MeshFormat::from_extension(format.extension()), Some(format));
        }
    }

    #[test]
    fn test_check_format_reports_extension() {
        let err = check_format(Path::new("/m/scan.ply")).unwrap_err();
        match err {
            MeshConversionError::UnsupportedFormat { extension, .. } => assert_eq!(extension, "ply"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_is_texture() {
        assert!(is_texture(Path::new("t/albedo.PNG")));
        assert!(is_texture(Path::new("t/env.hdr")));
        assert!(!is_texture(Path::new("t/mesh.dae")));
    }

    #[test]
    fn test_reserve_destination_suffixes() {
        let mut cache = MeshCache::new();
        let dir = Path::new("/out/meshes");
        let a = cache.reserve_destination(dir, Path::new("/m/a/body.stl"), "usda");
        let b = cache.reserve_destination(dir, Path::new("/m/b/body.obj"), "usda");
        let c = cache.reserve_destination(dir, Path::new("/m/c/body.dae"), "usda");
        assert_eq!(a, PathBuf::from("/out/meshes/body.usda"));
        assert_eq!(b, PathBuf::from("/out/meshes/body_1.usda"));
        assert_eq!(c, PathBuf::from("/out/meshes/body_2.usda"));
    }

    #[test]
    fn test_cache_counts() {
        let mut cache = MeshCache::new();
        cache.insert("/m/a.stl".into(), MeshOutcome::Converted("/o/a.usda".into()));
        cache.insert("/m/b.stl".into(), MeshOutcome::Failed("boom".into()));
        cache.insert("/m/c.stl".into(), MeshOutcome::Missing);
        assert_eq!(cache.converted_count(), 1);
        assert_eq!(cache.failed_count(), 1);
        assert_eq!(cache.artifact(Path::new("/m/a.stl")), Some(Path::new("/o/a.usda")));
        assert_eq!(cache.artifact(Path::new("/m/b.stl")), None);
        assert!(cache.contains(Path::new("/m/c.stl")));
    }
}
