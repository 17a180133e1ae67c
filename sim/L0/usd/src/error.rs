//! Error types for mesh reading.

use thiserror::Error;

/// Result type for mesh reading.
pub type ReadResult<T> = Result<T, MeshReadError>;

/// Errors that can occur while reading a source mesh.
#[derive(Debug, Error)]
pub enum MeshReadError {
    /// Invalid file content.
    #[error("invalid file content: {message}")]
    InvalidContent {
        /// Description of what was invalid.
        message: String,
    },

    /// Binary STL header is truncated.
    #[error("invalid STL header: expected {expected} bytes, got {got}")]
    InvalidHeader {
        /// Expected header size.
        expected: usize,
        /// Actual header size.
        got: usize,
    },

    /// Binary STL ends before the declared number of triangles.
    #[error("invalid face count: expected {expected}, got {got}")]
    InvalidFaceCount {
        /// Declared number of faces.
        expected: u32,
        /// Faces actually read.
        got: u32,
    },

    /// A face references a vertex that does not exist.
    #[error("face references vertex {index}, but only {count} vertices exist")]
    IndexOutOfRange {
        /// Referenced index.
        index: i64,
        /// Number of vertices at that point.
        count: usize,
    },

    /// I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Float parsing error.
    #[error("float parsing error: {0}")]
    ParseFloat(#[from] std::num::ParseFloatError),

    /// OBJ loading error.
    #[error("OBJ error: {0}")]
    Obj(#[from] tobj::LoadError),

    /// glTF loading error.
    #[error("glTF error: {0}")]
    Gltf(#[from] gltf::Error),
}

impl MeshReadError {
    /// Create an `InvalidContent` error with the given message.
    pub fn invalid_content(message: impl Into<String>) -> Self {
        Self::InvalidContent {
            message: message.into(),
        }
    }
}
