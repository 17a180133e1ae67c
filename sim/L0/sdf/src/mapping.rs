//! Mapping rules from SDF elements to scene primitives.
//!
//! Every function here is pure. The rules are lossy where the target
//! primitives cannot express the source exactly; callers are told about it
//! through flags so they can report it.

use std::path::PathBuf;

use nalgebra::Vector3;

use crate::pose::Pose;
use crate::scene::{
    Axis, Drive, DriveKind, JointKind, JointLimits, MassProperties, MaterialSpec, Shape,
};
use crate::types::{Geometry, Inertial, JointAxis, JointType, Material};

/// Limits with a magnitude at or above this are unbounded.
pub const UNBOUNDED_LIMIT: f64 = 1e10;

/// Axis components below this magnitude count as zero for obliqueness.
const AXIS_EPSILON: f64 = 1e-9;

/// Mean specular reflectance above which a material gets an explicit IOR.
const SPECULAR_IOR_THRESHOLD: f64 = 0.5;

/// IOR used for strongly specular materials.
const SPECULAR_IOR: f64 = 1.5;

// ============================================================================
// Joints
// ============================================================================

/// Result of snapping a joint axis to a principal axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisSnap {
    /// Principal axis chosen.
    pub axis: Axis,
    /// More than one component was non-zero, so the snap lost information.
    pub oblique: bool,
}

/// Snap an axis to the principal axis with the largest absolute component.
///
/// Ties go to X, then Y, then Z.
#[must_use]
pub fn snap_axis(xyz: &Vector3<f64>) -> AxisSnap {
    let (ax, ay, az) = (xyz.x.abs(), xyz.y.abs(), xyz.z.abs());
    let axis = if ax >= ay && ax >= az {
        Axis::X
    } else if ay >= az {
        Axis::Y
    } else {
        Axis::Z
    };
    let nonzero = [ax, ay, az].iter().filter(|c| **c > AXIS_EPSILON).count();

    AxisSnap {
        axis,
        oblique: nonzero > 1,
    }
}

/// How an SDF joint type maps onto the target joint primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointMapping {
    /// Direct equivalent.
    Exact(JointKind),
    /// Emitted as a weaker primitive (ball as rigid).
    Degraded(JointKind),
    /// No equivalent, skip the joint.
    Unsupported,
}

/// Map an SDF joint type.
#[must_use]
pub fn map_joint_type(joint_type: &JointType) -> JointMapping {
    match joint_type {
        JointType::Revolute | JointType::Continuous => JointMapping::Exact(JointKind::Rotational),
        JointType::Prismatic => JointMapping::Exact(JointKind::Translational),
        JointType::Fixed => JointMapping::Exact(JointKind::Rigid),
        JointType::Ball => JointMapping::Degraded(JointKind::Rigid),
        JointType::Other(_) => JointMapping::Unsupported,
    }
}

/// Position limits in target units.
///
/// Rotational limits are converted from radians to degrees, translational
/// limits pass through. A converted value at or above [`UNBOUNDED_LIMIT`] in
/// magnitude is omitted. Continuous and rigid joints have no limits.
#[must_use]
pub fn joint_limits(joint_type: &JointType, axis: &JointAxis) -> JointLimits {
    match joint_type {
        JointType::Revolute => JointLimits {
            lower: bounded(axis.lower.to_degrees()),
            upper: bounded(axis.upper.to_degrees()),
        },
        JointType::Prismatic => JointLimits {
            lower: bounded(axis.lower),
            upper: bounded(axis.upper),
        },
        _ => JointLimits::default(),
    }
}

fn bounded(value: f64) -> Option<f64> {
    (value.is_finite() && value.abs() < UNBOUNDED_LIMIT).then_some(value)
}

/// Drive for a 1-DOF joint.
///
/// A drive exists only when damping is positive; it then also carries the
/// stiffness if that is positive. Rigid joints never get a drive.
#[must_use]
pub fn joint_drive(kind: JointKind, axis: &JointAxis) -> Option<Drive> {
    let drive_kind = match kind {
        JointKind::Rotational => DriveKind::Angular,
        JointKind::Translational => DriveKind::Linear,
        JointKind::Rigid => return None,
    };
    if axis.damping <= 0.0 {
        return None;
    }

    Some(Drive {
        kind: drive_kind,
        damping: axis.damping,
        stiffness: (axis.stiffness > 0.0).then_some(axis.stiffness),
    })
}

/// Whether [`joint_drive`] discards a positive stiffness for lack of damping.
#[must_use]
pub fn drops_stiffness(kind: JointKind, axis: &JointAxis) -> bool {
    kind != JointKind::Rigid && axis.damping <= 0.0 && axis.stiffness > 0.0
}

/// Joint frames in both bodies' coordinates.
///
/// `parent` and `child` are the link poses in a common frame and
/// `joint_pose` is the joint frame relative to the child. Returns
/// `(local0, local1)`: the joint frame as seen from the parent body and
/// from the child body.
#[must_use]
pub fn joint_frames(parent: &Pose, child: &Pose, joint_pose: &Pose) -> (Pose, Pose) {
    let child_in_parent = parent.inverse().compose(child);
    (child_in_parent.compose(joint_pose), *joint_pose)
}

// ============================================================================
// Mass
// ============================================================================

/// Mass properties to emit for a link, `None` when massless.
///
/// Only the diagonal of the inertia tensor is kept; check
/// [`Inertia::has_off_diagonal`](crate::Inertia::has_off_diagonal) to know
/// whether that lost anything.
#[must_use]
pub fn mass_properties(inertial: &Inertial) -> Option<MassProperties> {
    (inertial.mass > 0.0).then(|| MassProperties {
        mass: inertial.mass,
        center_of_mass: inertial.pose.xyz,
        diagonal_inertia: inertial.inertia.principal(),
    })
}

// ============================================================================
// Geometry
// ============================================================================

/// Scene content for one geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryNode {
    /// Primitive shape, with an optional scale on the shape node.
    Primitive {
        /// Shape and dimensions.
        shape: Shape,
        /// Scale applied to the shape node.
        scale: Option<Vector3<f64>>,
    },
    /// Reference to a converted mesh.
    Mesh {
        /// Source mesh path.
        source: PathBuf,
        /// Scale applied to the geometry node.
        scale: Vector3<f64>,
    },
}

/// Map a geometry to scene content.
///
/// Boxes become a unit cube scaled to the box size; cylinders and capsules
/// keep their radius and use the length as height along Z.
#[must_use]
pub fn map_geometry(geometry: &Geometry) -> GeometryNode {
    match geometry {
        Geometry::Box { size } => GeometryNode::Primitive {
            shape: Shape::Cube { size: 1.0 },
            scale: Some(*size),
        },
        Geometry::Cylinder { radius, length } => GeometryNode::Primitive {
            shape: Shape::Cylinder {
                radius: *radius,
                height: *length,
                axis: Axis::Z,
            },
            scale: None,
        },
        Geometry::Sphere { radius } => GeometryNode::Primitive {
            shape: Shape::Sphere { radius: *radius },
            scale: None,
        },
        Geometry::Capsule { radius, length } => GeometryNode::Primitive {
            shape: Shape::Capsule {
                radius: *radius,
                height: *length,
                axis: Axis::Z,
            },
            scale: None,
        },
        Geometry::Mesh {
            resolved_path,
            scale,
            ..
        } => GeometryNode::Mesh {
            source: resolved_path.clone(),
            scale: *scale,
        },
    }
}

// ============================================================================
// Materials
// ============================================================================

/// Preview-surface parameters for a material.
///
/// `texture` is the diffuse texture asset path as the scene should refer to
/// it, if one was made available.
#[must_use]
pub fn material_spec(material: &Material, texture: Option<String>) -> MaterialSpec {
    let (metallic, roughness) = material
        .pbr
        .as_ref()
        .map_or((0.0, 0.5), |pbr| (pbr.metalness, pbr.roughness));
    let specular_mean = material.specular.mean();

    MaterialSpec {
        diffuse: material.diffuse,
        metallic,
        roughness,
        ior: (specular_mean > SPECULAR_IOR_THRESHOLD).then_some(SPECULAR_IOR),
        diffuse_texture: texture,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::{Inertia, PbrMaterial};
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_snap_axis_dominant_component() {
        let snap = snap_axis(&Vector3::new(0.1, 0.9, 0.05));
        assert_eq!(snap.axis, Axis::Y);
        assert!(snap.oblique);

        let snap = snap_axis(&Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(snap.axis, Axis::Z);
        assert!(!snap.oblique);

        assert_eq!(snap_axis(&Vector3::new(0.0, 0.0, -1.0)).axis, Axis::Z);
        assert_eq!(snap_axis(&Vector3::new(-2.0, 1.0, 0.0)).axis, Axis::X);
    }

    #[test]
    fn test_snap_axis_ties() {
        assert_eq!(snap_axis(&Vector3::new(1.0, 1.0, 1.0)).axis, Axis::X);
        assert_eq!(snap_axis(&Vector3::new(0.0, 1.0, 1.0)).axis, Axis::Y);
        assert_eq!(snap_axis(&Vector3::new(1.0, 0.0, -1.0)).axis, Axis::X);
    }

    #[test]
    fn test_map_joint_type() {
        assert_eq!(
            map_joint_type(&JointType::Revolute),
            JointMapping::Exact(JointKind::Rotational)
        );
        assert_eq!(
            map_joint_type(&JointType::Continuous),
            JointMapping::Exact(JointKind::Rotational)
        );
        assert_eq!(
            map_joint_type(&JointType::Prismatic),
            JointMapping::Exact(JointKind::Translational)
        );
        assert_eq!(
            map_joint_type(&JointType::Fixed),
            JointMapping::Exact(JointKind::Rigid)
        );
        assert_eq!(
            map_joint_type(&JointType::Ball),
            JointMapping::Degraded(JointKind::Rigid)
        );
        assert_eq!(
            map_joint_type(&JointType::Other("screw".into())),
            JointMapping::Unsupported
        );
    }

    #[test]
    fn test_revolute_limits_in_degrees() {
        let axis = JointAxis::default().with_limits(-FRAC_PI_2, PI);
        let limits = joint_limits(&JointType::Revolute, &axis);
        assert_relative_eq!(limits.lower.unwrap(), -90.0, epsilon = 1e-9);
        assert_relative_eq!(limits.upper.unwrap(), 180.0, epsilon = 1e-9);
    }

    #[test]
    fn test_prismatic_limits_pass_through() {
        let axis = JointAxis::default().with_limits(-0.2, 0.5);
        let limits = joint_limits(&JointType::Prismatic, &axis);
        assert_eq!(limits.lower, Some(-0.2));
        assert_eq!(limits.upper, Some(0.5));
    }

    #[test]
    fn test_default_limits_unbounded() {
        let axis = JointAxis::default().with_limits(-1e16, 0.5);
        let limits = joint_limits(&JointType::Revolute, &axis);
        assert_eq!(limits.lower, None);
        assert!(limits.upper.is_some());

        let limits = joint_limits(&JointType::Prismatic, &JointAxis::default());
        assert_eq!(limits, JointLimits::default());
    }

    #[test]
    fn test_limit_unbounded_after_degree_conversion() {
        // 2e8 rad is below the threshold but ~1.15e10 degrees is not.
        let axis = JointAxis::default().with_limits(-2e8, 2e8);
        let limits = joint_limits(&JointType::Revolute, &axis);
        assert_eq!(limits, JointLimits::default());
    }

    #[test]
    fn test_continuous_and_fixed_have_no_limits() {
        let axis = JointAxis::default().with_limits(-1.0, 1.0);
        assert_eq!(joint_limits(&JointType::Continuous, &axis), JointLimits::default());
        assert_eq!(joint_limits(&JointType::Fixed, &axis), JointLimits::default());
    }

    #[test]
    fn test_drive_requires_damping() {
        let axis = JointAxis::default().with_damping(0.01);
        let drive = joint_drive(JointKind::Rotational, &axis).unwrap();
        assert_eq!(drive.kind, DriveKind::Angular);
        assert_relative_eq!(drive.damping, 0.01);
        assert_eq!(drive.stiffness, None);

        let axis = JointAxis::default().with_stiffness(10.0);
        assert!(joint_drive(JointKind::Rotational, &axis).is_none());
        assert!(drops_stiffness(JointKind::Rotational, &axis));
    }

    #[test]
    fn test_drive_carries_stiffness() {
        let axis = JointAxis::default().with_damping(0.5).with_stiffness(20.0);
        let drive = joint_drive(JointKind::Translational, &axis).unwrap();
        assert_eq!(drive.kind, DriveKind::Linear);
        assert_eq!(drive.stiffness, Some(20.0));
        assert!(!drops_stiffness(JointKind::Translational, &axis));
    }

    #[test]
    fn test_rigid_joint_never_driven() {
        let axis = JointAxis::default().with_damping(1.0).with_stiffness(1.0);
        assert!(joint_drive(JointKind::Rigid, &axis).is_none());
        assert!(!drops_stiffness(JointKind::Rigid, &axis));
    }

    #[test]
    fn test_mass_properties() {
        assert!(mass_properties(&Inertial::default()).is_none());

        let inertial = Inertial::new(2.0)
            .with_pose(Pose::from_xyz(Vector3::new(0.0, 0.0, 0.1)))
            .with_inertia(Inertia {
                ixx: 1.0,
                ixy: 0.5,
                ixz: 0.0,
                iyy: 2.0,
                iyz: 0.0,
                izz: 3.0,
            });
        let props = mass_properties(&inertial).unwrap();
        assert_relative_eq!(props.mass, 2.0);
        assert_eq!(props.center_of_mass, Vector3::new(0.0, 0.0, 0.1));
        assert_eq!(props.diagonal_inertia, Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_map_box_geometry() {
        let node = map_geometry(&Geometry::box_shape(0.5, 0.3, 0.2));
        assert_eq!(
            node,
            GeometryNode::Primitive {
                shape: Shape::Cube { size: 1.0 },
                scale: Some(Vector3::new(0.5, 0.3, 0.2)),
            }
        );
    }

    #[test]
    fn test_map_cylinder_geometry() {
        let node = map_geometry(&Geometry::cylinder(0.1, 0.05));
        match node {
            GeometryNode::Primitive {
                shape:
                    Shape::Cylinder {
                        radius,
                        height,
                        axis,
                    },
                scale: None,
            } => {
                assert_relative_eq!(radius, 0.1);
                assert_relative_eq!(height, 0.05);
                assert_eq!(axis, Axis::Z);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_map_mesh_geometry() {
        let node = map_geometry(&Geometry::mesh("a.stl", "/m/a.stl"));
        assert_eq!(
            node,
            GeometryNode::Mesh {
                source: PathBuf::from("/m/a.stl"),
                scale: Vector3::new(1.0, 1.0, 1.0),
            }
        );
    }

    #[test]
    fn test_joint_frames() {
        let parent = Pose::from_xyz(Vector3::new(0.0, 0.0, 1.0));
        let child = Pose::from_xyz(Vector3::new(0.5, 0.0, 1.0));
        let joint = Pose::from_xyz(Vector3::new(0.0, 0.1, 0.0));
        let (local0, local1) = joint_frames(&parent, &child, &joint);
        assert_relative_eq!(local0.xyz, Vector3::new(0.5, 0.1, 0.0), epsilon = 1e-12);
        assert_eq!(local1, joint);
    }

    #[test]
    fn test_material_spec() {
        let plain = material_spec(&Material::default(), None);
        assert_relative_eq!(plain.metallic, 0.0);
        assert_relative_eq!(plain.roughness, 0.5);
        assert_eq!(plain.ior, None);

        let mut shiny = Material::with_diffuse(1.0, 0.0, 0.0).with_pbr(PbrMaterial {
            metalness: 0.8,
            roughness: 0.2,
            ..PbrMaterial::default()
        });
        shiny.specular = Vector3::new(0.9, 0.9, 0.9);
        let spec = material_spec(&shiny, Some("./meshes/red.png".into()));
        assert_relative_eq!(spec.metallic, 0.8);
        assert_eq!(spec.ior, Some(1.5));
        assert_eq!(spec.diffuse_texture.as_deref(), Some("./meshes/red.png"));
    }
}
