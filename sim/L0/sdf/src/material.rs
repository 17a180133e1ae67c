//! Per-run material deduplication.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::naming::NameRegistry;
use crate::scene::ScenePath;
use crate::types::Material;

/// Identity of a material for deduplication.
///
/// Built from the exact bit patterns of the diffuse and specular colors and,
/// when present, the PBR metalness, roughness and albedo map path. Two
/// materials share a key only when those fields are identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaterialKey {
    diffuse: [u64; 3],
    specular: [u64; 3],
    pbr: Option<PbrKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PbrKey {
    metalness: u64,
    roughness: u64,
    albedo_map: Option<PathBuf>,
}

impl MaterialKey {
    /// Key for a material.
    #[must_use]
    pub fn new(material: &Material) -> Self {
        let bits = |v: &nalgebra::Vector3<f64>| [v.x.to_bits(), v.y.to_bits(), v.z.to_bits()];
        Self {
            diffuse: bits(&material.diffuse),
            specular: bits(&material.specular),
            pbr: material.pbr.as_ref().map(|pbr| PbrKey {
                metalness: pbr.metalness.to_bits(),
                roughness: pbr.roughness.to_bits(),
                albedo_map: pbr
                    .albedo_map_path
                    .clone()
                    .or_else(|| pbr.albedo_map.as_ref().map(PathBuf::from)),
            }),
        }
    }
}

/// Memo from material key to the scene node created for it.
#[derive(Debug, Default)]
pub struct MaterialCache {
    handles: HashMap<MaterialKey, ScenePath>,
    names: NameRegistry,
}

impl MaterialCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle of an already created material.
    #[must_use]
    pub fn get(&self, key: &MaterialKey) -> Option<&ScenePath> {
        self.handles.get(key)
    }

    /// Record a created material.
    pub fn insert(&mut self, key: MaterialKey, handle: ScenePath) {
        self.handles.insert(key, handle);
    }

    /// Number of distinct materials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no material was created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Claim a node name derived from `hint`, suffixed `_1`, `_2`, ... if
    /// another material already uses it.
    pub fn unique_name(&mut self, hint: &str) -> String {
        self.names.claim(hint)
    }
}
