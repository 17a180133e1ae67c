//! Scene writer interface.
//!
//! The converter builds its output through [`SceneWriter`], a small
//! tree-building API: hierarchical nodes with local transforms, primitive
//! shapes, mesh references, preview-surface materials and physics
//! annotations. The storage format is the writer's business; `sim-usd`
//! provides a USDA implementation.

use std::path::{Path, PathBuf};

use nalgebra::{Quaternion, Vector3};
use thiserror::Error;

use crate::pose::Pose;

/// Errors reported by a [`SceneWriter`].
#[derive(Debug, Error)]
pub enum SceneError {
    /// An operation referenced a node that was never defined.
    #[error("unknown scene node: {0}")]
    UnknownNode(String),

    /// A path is not a valid absolute node path.
    #[error("invalid scene path: {0}")]
    InvalidPath(String),

    /// Persisting the scene failed.
    #[error("failed to write scene to {}: {source}", .path.display())]
    Io {
        /// Destination path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Paths and metadata
// ============================================================================

/// Absolute, `/`-separated path of a scene node.
///
/// Segments are expected to be sanitized identifiers
/// (see [`sanitize_name`](crate::sanitize_name)).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScenePath(String);

impl ScenePath {
    /// Top-level node path (`/name`).
    #[must_use]
    pub fn root(name: &str) -> Self {
        Self(format!("/{name}"))
    }

    /// Path of a direct child.
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        Self(format!("{}/{name}", self.0))
    }

    /// Full path string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Parent path, `None` for top-level nodes.
    #[must_use]
    pub fn parent(&self) -> Option<ScenePath> {
        match self.0.rfind('/') {
            Some(0) | None => None,
            Some(idx) => Some(Self(self.0[..idx].to_string())),
        }
    }

    /// Path segments from the root down.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }
}

impl std::fmt::Display for ScenePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Up axis of the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpAxis {
    /// Y up.
    Y,
    /// Z up (SDF convention).
    #[default]
    Z,
}

impl UpAxis {
    /// Axis letter.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Y => "Y",
            Self::Z => "Z",
        }
    }
}

/// Layer-level metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StageMetadata {
    /// Up axis.
    pub up_axis: UpAxis,
    /// Scene units in meters.
    pub meters_per_unit: f64,
    /// Name of the default top-level node.
    pub default_prim: String,
}

/// Kind of grouping node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Transformable node.
    Xform,
    /// Pure grouping node without a transform.
    Scope,
}

/// Principal axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// X axis.
    X,
    /// Y axis.
    Y,
    /// Z axis.
    Z,
}

impl Axis {
    /// Axis letter.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X => "X",
            Self::Y => "Y",
            Self::Z => "Z",
        }
    }
}

// ============================================================================
// Node contents
// ============================================================================

/// Local transform: translate, then orient, then optional scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Translation.
    pub translation: Vector3<f64>,
    /// Orientation quaternion (w, i, j, k).
    pub orientation: Quaternion<f64>,
    /// Non-uniform scale, if any.
    pub scale: Option<Vector3<f64>>,
}

impl Transform {
    /// Transform matching a pose, without scale.
    #[must_use]
    pub fn from_pose(pose: &Pose) -> Self {
        Self {
            translation: pose.xyz,
            orientation: pose.to_quaternion(),
            scale: None,
        }
    }

    /// Pure scale.
    #[must_use]
    pub fn scale(scale: Vector3<f64>) -> Self {
        Self {
            translation: Vector3::zeros(),
            orientation: Quaternion::identity(),
            scale: Some(scale),
        }
    }

    /// Attach a scale, dropping it when it is exactly one on every axis.
    #[must_use]
    pub fn with_scale(mut self, scale: Vector3<f64>) -> Self {
        self.scale = (scale != Vector3::new(1.0, 1.0, 1.0)).then_some(scale);
        self
    }
}

/// Primitive shape with its dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// Cube with edge length `size`.
    Cube {
        /// Edge length.
        size: f64,
    },
    /// Cylinder.
    Cylinder {
        /// Radius.
        radius: f64,
        /// Height along `axis`.
        height: f64,
        /// Spine axis.
        axis: Axis,
    },
    /// Sphere.
    Sphere {
        /// Radius.
        radius: f64,
    },
    /// Capsule.
    Capsule {
        /// Radius.
        radius: f64,
        /// Height of the cylindrical section along `axis`.
        height: f64,
        /// Spine axis.
        axis: Axis,
    },
}

impl Shape {
    /// Node name used for the shape under its geometry node.
    #[must_use]
    pub fn node_name(&self) -> &'static str {
        match self {
            Self::Cube { .. } => "Box",
            Self::Cylinder { .. } => "Cylinder",
            Self::Sphere { .. } => "Sphere",
            Self::Capsule { .. } => "Capsule",
        }
    }
}

/// Preview-surface material parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialSpec {
    /// Diffuse RGB.
    pub diffuse: Vector3<f64>,
    /// Metallic factor.
    pub metallic: f64,
    /// Roughness factor.
    pub roughness: f64,
    /// Index of refraction, set for strongly specular materials.
    pub ior: Option<f64>,
    /// Diffuse texture asset path, relative to the scene file.
    pub diffuse_texture: Option<String>,
}

/// Rigid-body mass properties.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassProperties {
    /// Mass in kg.
    pub mass: f64,
    /// Center of mass in the body frame.
    pub center_of_mass: Vector3<f64>,
    /// Principal moments (ixx, iyy, izz).
    pub diagonal_inertia: Vector3<f64>,
}

/// Target joint primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointKind {
    /// One rotational degree of freedom.
    Rotational,
    /// One translational degree of freedom.
    Translational,
    /// No relative motion.
    Rigid,
}

/// Position limits in target units (degrees or meters). `None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointLimits {
    /// Lower limit.
    pub lower: Option<f64>,
    /// Upper limit.
    pub upper: Option<f64>,
}

/// Drive flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveKind {
    /// Rotational drive.
    Angular,
    /// Translational drive.
    Linear,
}

impl DriveKind {
    /// Drive instance name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Angular => "angular",
            Self::Linear => "linear",
        }
    }
}

/// Joint drive parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drive {
    /// Drive flavor.
    pub kind: DriveKind,
    /// Damping.
    pub damping: f64,
    /// Stiffness, when positive.
    pub stiffness: Option<f64>,
}

/// A physics joint between two bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct JointSpec {
    /// Joint primitive.
    pub kind: JointKind,
    /// First body, `None` for the world.
    pub body0: Option<ScenePath>,
    /// Second body.
    pub body1: ScenePath,
    /// Joint axis for 1-DOF joints.
    pub axis: Axis,
    /// Joint frame in body0 coordinates.
    pub local0: Transform,
    /// Joint frame in body1 coordinates.
    pub local1: Transform,
    /// Position limits.
    pub limits: JointLimits,
    /// Optional drive.
    pub drive: Option<Drive>,
}

// ============================================================================
// Writer trait
// ============================================================================

/// Tree-building interface the converter writes through.
///
/// Calls arrive in tree order: a node is always defined before anything is
/// attached to it, and parents before children.
pub trait SceneWriter {
    /// Set layer metadata.
    fn set_stage_metadata(&mut self, metadata: &StageMetadata) -> Result<(), SceneError>;

    /// Define a grouping node.
    fn define_node(&mut self, path: &ScenePath, kind: NodeKind) -> Result<(), SceneError>;

    /// Set the local transform of a node.
    fn set_transform(&mut self, path: &ScenePath, transform: &Transform) -> Result<(), SceneError>;

    /// Reference an external asset (a converted mesh) from a node.
    fn add_mesh_reference(&mut self, path: &ScenePath, asset: &str) -> Result<(), SceneError>;

    /// Define a primitive shape node.
    fn define_shape(&mut self, path: &ScenePath, shape: &Shape) -> Result<(), SceneError>;

    /// Define a material node.
    fn define_material(
        &mut self,
        path: &ScenePath,
        material: &MaterialSpec,
    ) -> Result<(), SceneError>;

    /// Bind a previously defined material to a node.
    fn bind_material(&mut self, path: &ScenePath, material: &ScenePath) -> Result<(), SceneError>;

    /// Mark a node as the root of an articulation.
    fn apply_articulation_root(&mut self, path: &ScenePath) -> Result<(), SceneError>;

    /// Mark a node as a rigid body.
    fn apply_rigid_body(&mut self, path: &ScenePath) -> Result<(), SceneError>;

    /// Attach mass properties to a rigid body.
    fn apply_mass(&mut self, path: &ScenePath, mass: &MassProperties) -> Result<(), SceneError>;

    /// Mark a node as a collider.
    fn apply_collision(&mut self, path: &ScenePath) -> Result<(), SceneError>;

    /// Define a joint node.
    fn define_joint(&mut self, path: &ScenePath, joint: &JointSpec) -> Result<(), SceneError>;

    /// Persist the scene.
    fn save(&mut self, path: &Path) -> Result<(), SceneError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_path_navigation() {
        let root = ScenePath::root("robot");
        let link = root.child("base").child("visuals");
        assert_eq!(link.as_str(), "/robot/base/visuals");
        assert_eq!(link.name(), "visuals");
        assert_eq!(link.parent().unwrap().as_str(), "/robot/base");
        assert_eq!(root.parent(), None);
        assert_eq!(link.segments().collect::<Vec<_>>(), ["robot", "base", "visuals"]);
    }

    #[test]
    fn test_transform_unit_scale_dropped() {
        let t = Transform::from_pose(&Pose::identity()).with_scale(Vector3::new(1.0, 1.0, 1.0));
        assert!(t.scale.is_none());
        let t = t.with_scale(Vector3::new(0.001, 0.001, 0.001));
        assert_eq!(t.scale, Some(Vector3::new(0.001, 0.001, 0.001)));
    }

    #[test]
    fn test_shape_node_names() {
        assert_eq!(Shape::Cube { size: 1.0 }.node_name(), "Box");
        assert_eq!(Shape::Sphere { radius: 1.0 }.node_name(), "Sphere");
    }
}
