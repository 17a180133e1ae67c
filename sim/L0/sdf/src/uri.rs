//! Asset URI resolution.
//!
//! SDF refers to meshes and textures with `model://`, `file://`, absolute or
//! relative references. All of them resolve against the directory holding
//! the model file; nothing here touches the filesystem.

use std::path::{Path, PathBuf};

const MODEL_SCHEME: &str = "model://";
const FILE_SCHEME: &str = "file://";

/// Resolve an asset URI against the model directory.
///
/// - `model://<name>/<rest>` resolves to `model_dir/<rest>`; the model name
///   segment is dropped. A bare `model://<name>` resolves to `model_dir`.
/// - `file://<path>` resolves to `<path>`.
/// - Absolute paths pass through.
/// - Anything else is joined onto `model_dir`.
///
/// ```
/// use std::path::{Path, PathBuf};
/// use sim_sdf::resolve_uri;
///
/// assert_eq!(
///     resolve_uri("model://foo/meshes/x.dae", Path::new("/a/b")),
///     PathBuf::from("/a/b/meshes/x.dae"),
/// );
/// ```
#[must_use]
pub fn resolve_uri(uri: &str, model_dir: &Path) -> PathBuf {
    let uri = uri.trim();

    if let Some(rest) = uri.strip_prefix(MODEL_SCHEME) {
        return match rest.split_once('/') {
            Some((_model_name, tail)) if !tail.is_empty() => model_dir.join(tail),
            _ => model_dir.to_path_buf(),
        };
    }

    if let Some(path) = uri.strip_prefix(FILE_SCHEME) {
        return PathBuf::from(path);
    }

    let path = Path::new(uri);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        model_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_scheme_drops_model_name() {
        assert_eq!(
            resolve_uri("model://foo/meshes/x.dae", Path::new("/a/b")),
            PathBuf::from("/a/b/meshes/x.dae")
        );
    }

    #[test]
    fn test_model_scheme_without_path() {
        assert_eq!(resolve_uri("model://foo", Path::new("/a/b")), PathBuf::from("/a/b"));
        assert_eq!(resolve_uri("model://foo/", Path::new("/a/b")), PathBuf::from("/a/b"));
    }

    #[test]
    fn test_file_scheme() {
        assert_eq!(
            resolve_uri("file:///opt/meshes/base.stl", Path::new("/a/b")),
            PathBuf::from("/opt/meshes/base.stl")
        );
    }

    #[test]
    fn test_absolute_passthrough() {
        assert_eq!(
            resolve_uri("/opt/meshes/base.stl", Path::new("/a/b")),
            PathBuf::from("/opt/meshes/base.stl")
        );
    }

    #[test]
    fn test_relative_joined() {
        assert_eq!(
            resolve_uri("meshes/base.stl", Path::new("/a/b")),
            PathBuf::from("/a/b/meshes/base.stl")
        );
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        assert_eq!(
            resolve_uri("  meshes/base.stl\n", Path::new("/a")),
            PathBuf::from("/a/meshes/base.stl")
        );
    }
}
