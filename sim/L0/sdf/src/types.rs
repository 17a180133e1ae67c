//! Intermediate representation of an SDF model.
//!
//! These types mirror the SDF elements the converter cares about. Missing
//! optional values are filled with SDF's documented defaults at load time,
//! so downstream code never has to guess.

use std::path::PathBuf;

use nalgebra::{Matrix3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::pose::Pose;

/// Joint limit used by SDF when no `<limit>` is given. Anything this large is
/// treated as unbounded.
pub const DEFAULT_JOINT_LIMIT: f64 = 1e16;

// ============================================================================
// Model
// ============================================================================

/// A parsed SDF model.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Model {
    /// Model name.
    pub name: String,
    /// Root pose of the model.
    pub pose: Pose,
    /// Links in document order.
    pub links: Vec<Link>,
    /// Joints in document order.
    pub joints: Vec<Joint>,
}

impl Model {
    /// Create an empty model.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pose: Pose::identity(),
            links: Vec::new(),
            joints: Vec::new(),
        }
    }

    /// Add a link.
    #[must_use]
    pub fn with_link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }

    /// Add a joint.
    #[must_use]
    pub fn with_joint(mut self, joint: Joint) -> Self {
        self.joints.push(joint);
        self
    }
}

// ============================================================================
// Link
// ============================================================================

/// A rigid body with its visual and collision geometry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Link {
    /// Link name.
    pub name: String,
    /// Pose relative to the model frame.
    pub pose: Pose,
    /// Mass properties, if declared.
    pub inertial: Option<Inertial>,
    /// Visual elements in document order.
    pub visuals: Vec<Visual>,
    /// Collision elements in document order.
    pub collisions: Vec<Collision>,
}

impl Link {
    /// Create an empty link at the identity pose.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pose: Pose::identity(),
            inertial: None,
            visuals: Vec::new(),
            collisions: Vec::new(),
        }
    }

    /// Set the pose.
    #[must_use]
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }

    /// Set the inertial.
    #[must_use]
    pub fn with_inertial(mut self, inertial: Inertial) -> Self {
        self.inertial = Some(inertial);
        self
    }

    /// Add a visual.
    #[must_use]
    pub fn with_visual(mut self, visual: Visual) -> Self {
        self.visuals.push(visual);
        self
    }

    /// Add a collision.
    #[must_use]
    pub fn with_collision(mut self, collision: Collision) -> Self {
        self.collisions.push(collision);
        self
    }
}

// ============================================================================
// Inertial
// ============================================================================

/// Mass properties of a link.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Inertial {
    /// Mass in kg. Zero means massless.
    pub mass: f64,
    /// Center-of-mass frame relative to the link.
    pub pose: Pose,
    /// Inertia tensor about the center of mass.
    pub inertia: Inertia,
}

impl Inertial {
    /// Create an inertial with the given mass at the link origin.
    #[must_use]
    pub fn new(mass: f64) -> Self {
        Self {
            mass,
            ..Self::default()
        }
    }

    /// Set the center-of-mass pose.
    #[must_use]
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }

    /// Set the inertia tensor.
    #[must_use]
    pub fn with_inertia(mut self, inertia: Inertia) -> Self {
        self.inertia = inertia;
        self
    }
}

/// The six independent components of a symmetric inertia tensor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct Inertia {
    pub ixx: f64,
    pub ixy: f64,
    pub ixz: f64,
    pub iyy: f64,
    pub iyz: f64,
    pub izz: f64,
}

impl Inertia {
    /// Diagonal tensor.
    #[must_use]
    pub fn diagonal(ixx: f64, iyy: f64, izz: f64) -> Self {
        Self {
            ixx,
            iyy,
            izz,
            ..Self::default()
        }
    }

    /// Diagonal terms (ixx, iyy, izz).
    #[must_use]
    pub fn principal(&self) -> Vector3<f64> {
        Vector3::new(self.ixx, self.iyy, self.izz)
    }

    /// Whether any off-diagonal term is non-zero.
    #[must_use]
    pub fn has_off_diagonal(&self) -> bool {
        self.ixy != 0.0 || self.ixz != 0.0 || self.iyz != 0.0
    }

    /// Full symmetric 3x3 matrix.
    #[must_use]
    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.ixx, self.ixy, self.ixz, self.ixy, self.iyy, self.iyz, self.ixz, self.iyz,
            self.izz,
        )
    }

    /// Build from a 3x3 matrix, reading the upper triangle.
    #[must_use]
    pub fn from_matrix(m: &Matrix3<f64>) -> Self {
        Self {
            ixx: m[(0, 0)],
            ixy: m[(0, 1)],
            ixz: m[(0, 2)],
            iyy: m[(1, 1)],
            iyz: m[(1, 2)],
            izz: m[(2, 2)],
        }
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Shape of a visual or collision element.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Geometry {
    /// External mesh file.
    Mesh {
        /// URI as written in the document.
        uri: String,
        /// Absolute path the URI resolved to.
        resolved_path: PathBuf,
        /// Per-axis scale.
        scale: Vector3<f64>,
    },
    /// Axis-aligned box.
    Box {
        /// Full extents in x, y, z.
        size: Vector3<f64>,
    },
    /// Cylinder along the local Z axis.
    Cylinder {
        /// Radius in meters.
        radius: f64,
        /// Length in meters.
        length: f64,
    },
    /// Sphere.
    Sphere {
        /// Radius in meters.
        radius: f64,
    },
    /// Capsule along the local Z axis.
    Capsule {
        /// Radius in meters.
        radius: f64,
        /// Length of the cylindrical section in meters.
        length: f64,
    },
}

impl Geometry {
    /// Box with the given size.
    #[must_use]
    pub fn box_shape(x: f64, y: f64, z: f64) -> Self {
        Self::Box {
            size: Vector3::new(x, y, z),
        }
    }

    /// Cylinder.
    #[must_use]
    pub fn cylinder(radius: f64, length: f64) -> Self {
        Self::Cylinder { radius, length }
    }

    /// Sphere.
    #[must_use]
    pub fn sphere(radius: f64) -> Self {
        Self::Sphere { radius }
    }

    /// Capsule.
    #[must_use]
    pub fn capsule(radius: f64, length: f64) -> Self {
        Self::Capsule { radius, length }
    }

    /// Unscaled mesh reference.
    #[must_use]
    pub fn mesh(uri: impl Into<String>, resolved_path: impl Into<PathBuf>) -> Self {
        Self::Mesh {
            uri: uri.into(),
            resolved_path: resolved_path.into(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Resolved mesh path, if this is a mesh.
    #[must_use]
    pub fn mesh_path(&self) -> Option<&PathBuf> {
        match self {
            Self::Mesh { resolved_path, .. } => Some(resolved_path),
            _ => None,
        }
    }

    /// Lowercase shape name as used in SDF.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Mesh { .. } => "mesh",
            Self::Box { .. } => "box",
            Self::Cylinder { .. } => "cylinder",
            Self::Sphere { .. } => "sphere",
            Self::Capsule { .. } => "capsule",
        }
    }
}

// ============================================================================
// Material
// ============================================================================

/// Surface appearance of a visual.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Material {
    /// Diffuse RGB.
    pub diffuse: Vector3<f64>,
    /// Specular RGB.
    pub specular: Vector3<f64>,
    /// Physically based parameters, if declared.
    pub pbr: Option<PbrMaterial>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            diffuse: Vector3::new(0.8, 0.8, 0.8),
            specular: Vector3::new(0.1, 0.1, 0.1),
            pbr: None,
        }
    }
}

impl Material {
    /// Default material with the given diffuse color.
    #[must_use]
    pub fn with_diffuse(r: f64, g: f64, b: f64) -> Self {
        Self {
            diffuse: Vector3::new(r, g, b),
            ..Self::default()
        }
    }

    /// Attach PBR parameters.
    #[must_use]
    pub fn with_pbr(mut self, pbr: PbrMaterial) -> Self {
        self.pbr = Some(pbr);
        self
    }
}

/// Metal/roughness workflow parameters from `<pbr><metal>`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PbrMaterial {
    /// Metalness in [0, 1].
    pub metalness: f64,
    /// Roughness in [0, 1].
    pub roughness: f64,
    /// Albedo texture URI as written.
    pub albedo_map: Option<String>,
    /// Resolved albedo texture path.
    pub albedo_map_path: Option<PathBuf>,
}

impl Default for PbrMaterial {
    fn default() -> Self {
        Self {
            metalness: 0.0,
            roughness: 0.5,
            albedo_map: None,
            albedo_map_path: None,
        }
    }
}

// ============================================================================
// Visual / Collision
// ============================================================================

/// Rendered geometry attached to a link.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Visual {
    /// Element name.
    pub name: String,
    /// Pose relative to the owning link.
    pub pose: Pose,
    /// Shape, if a supported one was given.
    pub geometry: Option<Geometry>,
    /// Appearance.
    pub material: Option<Material>,
}

impl Visual {
    /// Visual at the identity pose.
    #[must_use]
    pub fn new(name: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            name: name.into(),
            pose: Pose::identity(),
            geometry: Some(geometry),
            material: None,
        }
    }

    /// Set the pose.
    #[must_use]
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }

    /// Set the material.
    #[must_use]
    pub fn with_material(mut self, material: Material) -> Self {
        self.material = Some(material);
        self
    }
}

/// Collision geometry attached to a link.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Collision {
    /// Element name.
    pub name: String,
    /// Pose relative to the owning link.
    pub pose: Pose,
    /// Shape, if a supported one was given.
    pub geometry: Option<Geometry>,
}

impl Collision {
    /// Collision at the identity pose.
    #[must_use]
    pub fn new(name: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            name: name.into(),
            pose: Pose::identity(),
            geometry: Some(geometry),
        }
    }

    /// Set the pose.
    #[must_use]
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }
}

// ============================================================================
// Joint
// ============================================================================

/// SDF joint type.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JointType {
    /// Hinge with limits.
    Revolute,
    /// Hinge without limits.
    Continuous,
    /// Slider.
    Prismatic,
    /// Rigid connection.
    Fixed,
    /// Spherical joint.
    Ball,
    /// Any other type (`universal`, `screw`, `gearbox`, ...), kept verbatim.
    Other(String),
}

impl JointType {
    /// Parse an SDF `type` attribute. Unknown strings are preserved.
    #[must_use]
    pub fn from_sdf(s: &str) -> Self {
        match s.trim() {
            "revolute" => Self::Revolute,
            "continuous" => Self::Continuous,
            "prismatic" => Self::Prismatic,
            "fixed" => Self::Fixed,
            "ball" => Self::Ball,
            other => Self::Other(other.to_string()),
        }
    }

    /// SDF type string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Revolute => "revolute",
            Self::Continuous => "continuous",
            Self::Prismatic => "prismatic",
            Self::Fixed => "fixed",
            Self::Ball => "ball",
            Self::Other(s) => s,
        }
    }
}

impl std::fmt::Display for JointType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Joint axis with limits and dynamics.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointAxis {
    /// Axis direction in the joint frame.
    pub xyz: Vector3<f64>,
    /// Lower position limit (rad or m).
    pub lower: f64,
    /// Upper position limit (rad or m).
    pub upper: f64,
    /// Viscous damping.
    pub damping: f64,
    /// Spring stiffness.
    pub stiffness: f64,
    /// Coulomb friction.
    pub friction: f64,
}

impl Default for JointAxis {
    fn default() -> Self {
        Self {
            xyz: Vector3::z(),
            lower: -DEFAULT_JOINT_LIMIT,
            upper: DEFAULT_JOINT_LIMIT,
            damping: 0.0,
            stiffness: 0.0,
            friction: 0.0,
        }
    }
}

impl JointAxis {
    /// Axis along the given direction with default limits.
    #[must_use]
    pub fn new(xyz: Vector3<f64>) -> Self {
        Self {
            xyz,
            ..Self::default()
        }
    }

    /// Set the position limits.
    #[must_use]
    pub fn with_limits(mut self, lower: f64, upper: f64) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }

    /// Set damping.
    #[must_use]
    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    /// Set stiffness.
    #[must_use]
    pub fn with_stiffness(mut self, stiffness: f64) -> Self {
        self.stiffness = stiffness;
        self
    }
}

/// A joint connecting two links.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Joint {
    /// Joint name.
    pub name: String,
    /// Joint type.
    pub joint_type: JointType,
    /// Parent link name, or `world`.
    pub parent: String,
    /// Child link name.
    pub child: String,
    /// Joint frame relative to the child link.
    pub pose: Pose,
    /// Axis, limits and dynamics.
    pub axis: JointAxis,
}

impl Joint {
    /// Joint with identity pose and default axis.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        joint_type: JointType,
        parent: impl Into<String>,
        child: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            joint_type,
            parent: parent.into(),
            child: child.into(),
            pose: Pose::identity(),
            axis: JointAxis::default(),
        }
    }

    /// Set the axis.
    #[must_use]
    pub fn with_axis(mut self, axis: JointAxis) -> Self {
        self.axis = axis;
        self
    }

    /// Set the joint pose.
    #[must_use]
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joint_type_round_trip() {
        for s in ["revolute", "continuous", "prismatic", "fixed", "ball", "universal"] {
            assert_eq!(JointType::from_sdf(s).as_str(), s);
        }
        assert_eq!(JointType::from_sdf("screw"), JointType::Other("screw".into()));
    }

    #[test]
    fn test_defaults() {
        let axis = JointAxis::default();
        assert_eq!(axis.xyz, Vector3::z());
        assert_eq!(axis.lower, -DEFAULT_JOINT_LIMIT);
        assert_eq!(axis.upper, DEFAULT_JOINT_LIMIT);

        let mat = Material::default();
        assert_eq!(mat.diffuse, Vector3::new(0.8, 0.8, 0.8));
        assert!(mat.pbr.is_none());

        let pbr = PbrMaterial::default();
        assert_eq!(pbr.roughness, 0.5);
    }

    #[test]
    fn test_inertia_matrix_symmetric() {
        let i = Inertia {
            ixx: 1.0,
            ixy: 0.1,
            ixz: 0.2,
            iyy: 2.0,
            iyz: 0.3,
            izz: 3.0,
        };
        let m = i.to_matrix();
        assert_eq!(m, m.transpose());
        assert_eq!(Inertia::from_matrix(&m), i);
        assert!(i.has_off_diagonal());
        assert!(!Inertia::diagonal(1.0, 1.0, 1.0).has_off_diagonal());
    }

    #[test]
    fn test_geometry_mesh_path() {
        let g = Geometry::mesh("meshes/a.stl", "/m/meshes/a.stl");
        assert_eq!(g.mesh_path(), Some(&PathBuf::from("/m/meshes/a.stl")));
        assert_eq!(Geometry::sphere(1.0).mesh_path(), None);
        assert_eq!(Geometry::capsule(0.1, 0.2).kind(), "capsule");
    }
}
