//! STL (Stereolithography) reading.
//!
//! Supports both ASCII and binary STL.
//!
//! # Format Detection
//!
//! A file is binary when its size matches the triangle count stored after
//! the 80-byte header. Otherwise a file starting with `solid` is read as
//! ASCII. Some binary exporters write `solid` into the header, which is why
//! the size check comes first.
//!
//! # Binary Format
//!
//! ```text
//! UINT8[80]    – Header (ignored)
//! UINT32       – Number of triangles
//! foreach triangle
//!     REAL32[3] – Normal vector (ignored)
//!     REAL32[3] – Vertex 1
//!     REAL32[3] – Vertex 2
//!     REAL32[3] – Vertex 3
//!     UINT16    – Attribute byte count
//! end
//! ```

use std::path::Path;

use nalgebra::Vector3;

use crate::error::{MeshReadError, ReadResult};
use crate::mesh::SurfaceMesh;

/// STL binary header size in bytes.
const HEADER_SIZE: usize = 80;

/// Size of one triangle in binary STL (normal + 3 vertices + attribute).
const TRIANGLE_SIZE: usize = 50;

/// Read an STL file, ASCII or binary.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid STL.
pub fn read_stl<P: AsRef<Path>>(path: P) -> ReadResult<SurfaceMesh> {
    let bytes = std::fs::read(path)?;
    parse_stl(&bytes)
}

/// Parse STL content already in memory.
///
/// # Errors
///
/// Returns an error if the content is not valid STL.
pub fn parse_stl(bytes: &[u8]) -> ReadResult<SurfaceMesh> {
    if bytes.len() < 6 {
        return Err(MeshReadError::invalid_content("file too small to be valid STL"));
    }
    if is_binary_stl(bytes) {
        return parse_stl_binary(bytes);
    }

    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(HEADER_SIZE)]);
    if head.trim_start().starts_with("solid") {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| MeshReadError::invalid_content(format!("ASCII STL is not UTF-8: {e}")))?;
        parse_stl_ascii(text)
    } else {
        parse_stl_binary(bytes)
    }
}

/// Whether the size matches the triangle count in a binary header.
fn is_binary_stl(bytes: &[u8]) -> bool {
    if bytes.len() < HEADER_SIZE + 4 {
        return false;
    }
    let count = face_count(bytes) as usize;
    count
        .checked_mul(TRIANGLE_SIZE)
        .and_then(|n| n.checked_add(HEADER_SIZE + 4))
        == Some(bytes.len())
}

fn face_count(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([
        bytes[HEADER_SIZE],
        bytes[HEADER_SIZE + 1],
        bytes[HEADER_SIZE + 2],
        bytes[HEADER_SIZE + 3],
    ])
}

fn parse_stl_binary(bytes: &[u8]) -> ReadResult<SurfaceMesh> {
    if bytes.len() < HEADER_SIZE + 4 {
        return Err(MeshReadError::InvalidHeader {
            expected: HEADER_SIZE + 4,
            got: bytes.len(),
        });
    }

    let count = face_count(bytes);
    let body = &bytes[HEADER_SIZE + 4..];

    // The header count is untrusted; size everything from the body.
    let available = body.len() / TRIANGLE_SIZE;
    if (count as usize) > available {
        #[allow(clippy::cast_possible_truncation)]
        // Truncation: available < count, which is a u32
        let got = available as u32;
        return Err(MeshReadError::InvalidFaceCount {
            expected: count,
            got,
        });
    }

    let mut mesh = SurfaceMesh::with_capacity((count as usize) * 3, count as usize);
    for tri in body.chunks_exact(TRIANGLE_SIZE).take(count as usize) {
        // Skip the normal (12 bytes), then three vertices.
        mesh.push_triangle(
            read_vertex(&tri[12..24]),
            read_vertex(&tri[24..36]),
            read_vertex(&tri[36..48]),
        );
    }

    Ok(mesh)
}

/// Read a vertex from 12 bytes (3 f32s).
fn read_vertex(buf: &[u8]) -> Vector3<f64> {
    let x = f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let y = f32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let z = f32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
    Vector3::new(f64::from(x), f64::from(y), f64::from(z))
}

fn parse_stl_ascii(text: &str) -> ReadResult<SurfaceMesh> {
    let mut mesh = SurfaceMesh::new();
    let mut in_loop = false;
    let mut corners: Vec<Vector3<f64>> = Vec::with_capacity(3);

    for line in text.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(keyword) = parts.first() else {
            continue;
        };

        match keyword.to_ascii_lowercase().as_str() {
            "outer" => {
                in_loop = true;
                corners.clear();
            }
            "vertex" if in_loop => {
                if parts.len() < 4 {
                    return Err(MeshReadError::invalid_content(format!(
                        "vertex line needs 3 coordinates: '{}'",
                        line.trim()
                    )));
                }
                corners.push(Vector3::new(
                    parts[1].parse()?,
                    parts[2].parse()?,
                    parts[3].parse()?,
                ));
            }
            "endloop" => in_loop = false,
            "endfacet" => {
                if let [a, b, c] = corners[..] {
                    mesh.push_triangle(a, b, c);
                }
                corners.clear();
            }
            "endsolid" => break,
            _ => {}
        }
    }

    Ok(mesh)
}
