//! Error types for SDF loading and scene conversion.

use std::path::PathBuf;

use thiserror::Error;

use crate::scene::SceneError;

/// Fatal errors that abort a conversion run.
///
/// Per-item problems (a mesh that fails to convert, an unknown joint type)
/// never show up here; they are reported as [`Warning`](crate::Warning)s.
#[derive(Debug, Error)]
pub enum SdfError {
    /// The input document does not exist.
    #[error("input file not found: {}", .path.display())]
    InputNotFound {
        /// Path that was requested.
        path: PathBuf,
    },

    /// The input document exists but could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// XML parsing error.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// The document has no usable root model element.
    #[error("malformed model: {0}")]
    MalformedModel(String),

    /// The output location could not be created or written.
    #[error("cannot write output {}: {source}", .path.display())]
    OutputWrite {
        /// Path that could not be written.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Conversion options are inconsistent.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// The scene writer rejected an operation.
    #[error("scene error: {0}")]
    Scene(#[from] SceneError),
}

impl SdfError {
    /// Create an input-not-found error.
    pub fn input_not_found(path: impl Into<PathBuf>) -> Self {
        Self::InputNotFound { path: path.into() }
    }

    /// Create a malformed-model error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedModel(message.into())
    }

    /// Create an output-write error.
    pub fn output_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OutputWrite {
            path: path.into(),
            source,
        }
    }
}

impl From<quick_xml::Error> for SdfError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XmlParse(err.to_string())
    }
}

/// Result type for SDF operations.
pub type Result<T> = std::result::Result<T, SdfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SdfError::input_not_found("/tmp/robot.sdf");
        assert_eq!(err.to_string(), "input file not found: /tmp/robot.sdf");

        let err = SdfError::malformed("no <model> element");
        assert!(err.to_string().contains("no <model> element"));
    }

    #[test]
    fn test_output_write_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = SdfError::output_write("/out", io);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("/out"));
    }
}
