//! Polygon mesh in the layout a USD `Mesh` prim stores.

use std::collections::HashMap;

use nalgebra::Vector3;

/// Polygon mesh with shared points.
///
/// Faces are stored as a flat index list plus per-face vertex counts, which
/// is exactly how `faceVertexIndices` and `faceVertexCounts` are written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceMesh {
    /// Vertex positions.
    pub points: Vec<Vector3<f64>>,
    /// Number of vertices in each face.
    pub face_vertex_counts: Vec<u32>,
    /// Vertex indices of all faces, concatenated.
    pub face_vertex_indices: Vec<u32>,
    /// Per-point normals, empty when the source has none.
    pub normals: Vec<Vector3<f64>>,
}

impl SurfaceMesh {
    /// Empty mesh.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty mesh with room for the given number of points and faces.
    #[must_use]
    pub fn with_capacity(points: usize, faces: usize) -> Self {
        Self {
            points: Vec::with_capacity(points),
            face_vertex_counts: Vec::with_capacity(faces),
            face_vertex_indices: Vec::with_capacity(faces * 3),
            normals: Vec::new(),
        }
    }

    /// Number of faces.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.face_vertex_counts.len()
    }

    /// Whether the mesh has no faces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.face_vertex_counts.is_empty()
    }

    /// Append a face over existing point indices.
    pub fn push_face(&mut self, indices: &[u32]) {
        #[allow(clippy::cast_possible_truncation)]
        // Truncation: faces with more than u32::MAX vertices are unsupported
        let count = indices.len() as u32;
        self.face_vertex_counts.push(count);
        self.face_vertex_indices.extend_from_slice(indices);
    }

    /// Append a triangle with its own three points.
    pub fn push_triangle(&mut self, a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) {
        #[allow(clippy::cast_possible_truncation)]
        // Truncation: mesh indices are u32, meshes with >4B vertices are unsupported
        let base = self.points.len() as u32;
        self.points.extend([a, b, c]);
        self.push_face(&[base, base + 1, base + 2]);
    }

    /// Axis-aligned bounds as `(min, max)`, `None` when there are no points.
    #[must_use]
    pub fn bounds(&self) -> Option<(Vector3<f64>, Vector3<f64>)> {
        let first = *self.points.first()?;
        Some(self.points.iter().fold((first, first), |(lo, hi), p| {
            (lo.inf(p), hi.sup(p))
        }))
    }

    /// Whether every point has a normal.
    #[must_use]
    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty() && self.normals.len() == self.points.len()
    }

    /// Append the faces of `other`, offsetting its indices.
    ///
    /// Normals are kept only while both meshes carry them.
    pub fn append(&mut self, other: &SurfaceMesh) {
        let keep_normals = (self.points.is_empty() || self.has_normals()) && other.has_normals();
        #[allow(clippy::cast_possible_truncation)]
        // Truncation: mesh indices are u32, meshes with >4B vertices are unsupported
        let base = self.points.len() as u32;

        self.points.extend_from_slice(&other.points);
        self.face_vertex_counts
            .extend_from_slice(&other.face_vertex_counts);
        self.face_vertex_indices
            .extend(other.face_vertex_indices.iter().map(|i| i + base));
        if keep_normals {
            self.normals.extend_from_slice(&other.normals);
        } else {
            self.normals.clear();
        }
    }

    /// Merge points with bit-identical coordinates.
    ///
    /// STL stores every triangle with its own corners; welding restores the
    /// shared topology. Normals are dropped.
    #[must_use]
    pub fn welded(&self) -> Self {
        let mut remap: HashMap<[u64; 3], u32> = HashMap::with_capacity(self.points.len());
        let mut points = Vec::with_capacity(self.points.len());
        let mut old_to_new = Vec::with_capacity(self.points.len());

        for p in &self.points {
            let key = [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()];
            let idx = *remap.entry(key).or_insert_with(|| {
                #[allow(clippy::cast_possible_truncation)]
                let idx = points.len() as u32;
                points.push(*p);
                idx
            });
            old_to_new.push(idx);
        }

        Self {
            points,
            face_vertex_counts: self.face_vertex_counts.clone(),
            face_vertex_indices: self
                .face_vertex_indices
                .iter()
                .map(|&i| old_to_new[i as usize])
                .collect(),
            normals: Vec::new(),
        }
    }
}
