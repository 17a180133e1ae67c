//! Rigid transforms in SDF's position + roll/pitch/yaw convention.
//!
//! SDF stores a pose as `x y z roll pitch yaw`, with the rotation applied as
//! `R = Rz(yaw) * Ry(pitch) * Rx(roll)`. This module converts between that
//! representation, 4x4 homogeneous matrices and (w, x, y, z) quaternions.

use nalgebra::{Matrix3, Matrix4, Quaternion, Vector3};
use tracing::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Threshold on `|cos(pitch)|` below which Euler extraction is in gimbal lock.
const GIMBAL_EPSILON: f64 = 1e-6;

/// Position and roll/pitch/yaw orientation.
///
/// Angles are always radians, regardless of how the source document wrote
/// them.
///
/// # Example
///
/// ```
/// use sim_sdf::Pose;
/// use nalgebra::Vector3;
///
/// let base = Pose::from_xyz(Vector3::new(1.0, 0.0, 0.0));
/// let tip = Pose::from_xyz(Vector3::new(0.0, 2.0, 0.0));
/// let world = base.compose(&tip);
/// assert!((world.xyz - Vector3::new(1.0, 2.0, 0.0)).norm() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    /// Translation (x, y, z).
    pub xyz: Vector3<f64>,
    /// Orientation (roll, pitch, yaw) in radians.
    pub rpy: Vector3<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// Create a pose from translation and roll/pitch/yaw.
    #[must_use]
    pub const fn new(xyz: Vector3<f64>, rpy: Vector3<f64>) -> Self {
        Self { xyz, rpy }
    }

    /// The identity pose.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            xyz: Vector3::zeros(),
            rpy: Vector3::zeros(),
        }
    }

    /// Translation-only pose.
    #[must_use]
    pub fn from_xyz(xyz: Vector3<f64>) -> Self {
        Self {
            xyz,
            rpy: Vector3::zeros(),
        }
    }

    /// Whether this pose is exactly the identity.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.xyz == Vector3::zeros() && self.rpy == Vector3::zeros()
    }

    /// Rotation part as a 3x3 matrix, `Rz(yaw) * Ry(pitch) * Rx(roll)`.
    #[must_use]
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        let (sr, cr) = self.rpy.x.sin_cos();
        let (sp, cp) = self.rpy.y.sin_cos();
        let (sy, cy) = self.rpy.z.sin_cos();

        Matrix3::new(
            cy * cp,
            cy * sp * sr - sy * cr,
            cy * sp * cr + sy * sr,
            sy * cp,
            sy * sp * sr + cy * cr,
            sy * sp * cr - cy * sr,
            -sp,
            cp * sr,
            cp * cr,
        )
    }

    /// 4x4 homogeneous transform.
    #[must_use]
    pub fn to_matrix(&self) -> Matrix4<f64> {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&self.rotation_matrix());
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.xyz);
        m
    }

    /// Rotation as a unit quaternion.
    ///
    /// Uses the trace when it is positive and otherwise pivots on the largest
    /// diagonal element, so no branch divides by a value near zero. The sign
    /// is not canonicalized: `q` and `-q` describe the same rotation.
    #[must_use]
    pub fn to_quaternion(&self) -> Quaternion<f64> {
        quaternion_from_rotation(&self.rotation_matrix())
    }

    /// Compose `self` (parent) with `child`, returning the child expressed in
    /// the parent's parent frame.
    #[must_use]
    pub fn compose(&self, child: &Pose) -> Pose {
        Pose::from_matrix(&(self.to_matrix() * child.to_matrix()))
    }

    /// Rigid inverse of this transform.
    #[must_use]
    pub fn inverse(&self) -> Pose {
        let rt = self.rotation_matrix().transpose();
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&rt);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&(-(rt * self.xyz)));
        Pose::from_matrix(&m)
    }

    /// Extract a pose from a homogeneous transform.
    ///
    /// At gimbal lock (`|cos(pitch)|` below 1e-6) yaw is fixed at zero and
    /// the whole remaining rotation is attributed to roll.
    #[must_use]
    pub fn from_matrix(m: &Matrix4<f64>) -> Pose {
        let xyz = Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);

        let pitch = (-m[(2, 0)]).clamp(-1.0, 1.0).asin();
        let (roll, yaw) = if pitch.cos().abs() > GIMBAL_EPSILON {
            (m[(2, 1)].atan2(m[(2, 2)]), m[(1, 0)].atan2(m[(0, 0)]))
        } else {
            ((-m[(1, 2)]).atan2(m[(1, 1)]), 0.0)
        };

        Pose {
            xyz,
            rpy: Vector3::new(roll, pitch, yaw),
        }
    }
}

/// Four-branch rotation matrix to quaternion extraction, renormalized.
fn quaternion_from_rotation(r: &Matrix3<f64>) -> Quaternion<f64> {
    let trace = r[(0, 0)] + r[(1, 1)] + r[(2, 2)];

    let (w, x, y, z) = if trace > 0.0 {
        let s = 0.5 / (trace + 1.0).sqrt();
        (
            0.25 / s,
            (r[(2, 1)] - r[(1, 2)]) * s,
            (r[(0, 2)] - r[(2, 0)]) * s,
            (r[(1, 0)] - r[(0, 1)]) * s,
        )
    } else if r[(0, 0)] > r[(1, 1)] && r[(0, 0)] > r[(2, 2)] {
        let s = 2.0 * (1.0 + r[(0, 0)] - r[(1, 1)] - r[(2, 2)]).sqrt();
        (
            (r[(2, 1)] - r[(1, 2)]) / s,
            0.25 * s,
            (r[(0, 1)] + r[(1, 0)]) / s,
            (r[(0, 2)] + r[(2, 0)]) / s,
        )
    } else if r[(1, 1)] > r[(2, 2)] {
        let s = 2.0 * (1.0 + r[(1, 1)] - r[(0, 0)] - r[(2, 2)]).sqrt();
        (
            (r[(0, 2)] - r[(2, 0)]) / s,
            (r[(0, 1)] + r[(1, 0)]) / s,
            0.25 * s,
            (r[(1, 2)] + r[(2, 1)]) / s,
        )
    } else {
        let s = 2.0 * (1.0 + r[(2, 2)] - r[(0, 0)] - r[(1, 1)]).sqrt();
        (
            (r[(1, 0)] - r[(0, 1)]) / s,
            (r[(0, 2)] + r[(2, 0)]) / s,
            (r[(1, 2)] + r[(2, 1)]) / s,
            0.25 * s,
        )
    };

    let q = Quaternion::new(w, x, y, z);
    let norm = q.norm();
    if norm > 0.0 { q / norm } else { Quaternion::identity() }
}

/// Parse SDF pose text (`x y z roll pitch yaw`).
///
/// With `degrees` set the three angles are converted to radians. Empty text
/// is the identity. Anything other than six numbers logs a warning and also
/// yields the identity; this never fails.
#[must_use]
pub fn parse_pose(text: &str, degrees: bool) -> Pose {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return Pose::identity();
    }
    if tokens.len() != 6 {
        warn!(pose = text, tokens = tokens.len(), "expected 6 values in pose, using identity");
        return Pose::identity();
    }

    let mut values = [0.0_f64; 6];
    for (slot, token) in values.iter_mut().zip(&tokens) {
        match token.parse::<f64>() {
            Ok(v) => *slot = v,
            Err(_) => {
                warn!(pose = text, token = *token, "non-numeric pose value, using identity");
                return Pose::identity();
            }
        }
    }

    let mut rpy = Vector3::new(values[3], values[4], values[5]);
    if degrees {
        rpy = rpy.map(f64::to_radians);
    }

    Pose {
        xyz: Vector3::new(values[0], values[1], values[2]),
        rpy,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    fn sample_poses() -> Vec<Pose> {
        vec![
            Pose::identity(),
            Pose::new(Vector3::new(1.0, -2.0, 3.0), Vector3::new(0.1, 0.2, 0.3)),
            Pose::new(Vector3::new(0.0, 0.5, 0.0), Vector3::new(-1.2, 0.7, 2.9)),
            Pose::new(Vector3::new(4.0, 0.0, -1.0), Vector3::new(PI - 0.01, -1.3, -2.5)),
            Pose::new(Vector3::zeros(), Vector3::new(0.0, 0.0, PI - 0.001)),
            Pose::new(Vector3::zeros(), Vector3::new(3.0, 0.0, 0.0)),
        ]
    }

    fn assert_pose_eq(a: &Pose, b: &Pose) {
        assert_relative_eq!(a.xyz, b.xyz, epsilon = 1e-9);
        assert_relative_eq!(a.rotation_matrix(), b.rotation_matrix(), epsilon = 1e-9);
    }

    #[test]
    fn test_compose_identity_is_noop() {
        for p in sample_poses() {
            let composed = Pose::identity().compose(&p);
            assert_pose_eq(&composed, &p);
            assert_relative_eq!(composed.rpy, p.rpy, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_quaternion_is_unit() {
        for p in sample_poses() {
            assert_relative_eq!(p.to_quaternion().norm(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_quaternion_matches_nalgebra() {
        for p in sample_poses() {
            let q = p.to_quaternion();
            let expected = nalgebra::UnitQuaternion::from_euler_angles(p.rpy.x, p.rpy.y, p.rpy.z);
            let e = expected.into_inner();
            // q and -q are the same rotation
            let same = (q - e).norm() < 1e-9 || (q + e).norm() < 1e-9;
            assert!(same, "quaternion mismatch for {p:?}: {q:?} vs {e:?}");
        }
    }

    #[test]
    fn test_quaternion_yaw_quarter_turn() {
        let p = Pose::new(Vector3::zeros(), Vector3::new(0.0, 0.0, FRAC_PI_2));
        let q = p.to_quaternion();
        let half = (0.5_f64).sqrt();
        let sign = q.w.signum();
        assert_relative_eq!(q.w * sign, half, epsilon = 1e-12);
        assert_relative_eq!(q.k * sign, half, epsilon = 1e-12);
        assert_relative_eq!(q.i, 0.0, epsilon = 1e-12);
        assert_relative_eq!(q.j, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_matrix_round_trip() {
        for p in sample_poses() {
            let back = Pose::from_matrix(&p.to_matrix());
            assert_relative_eq!(back.xyz, p.xyz, epsilon = 1e-9);
            assert_relative_eq!(back.rpy, p.rpy, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_from_matrix_gimbal_lock() {
        let p = Pose::new(Vector3::new(1.0, 2.0, 3.0), Vector3::new(0.3, FRAC_PI_2, 0.0));
        let back = Pose::from_matrix(&p.to_matrix());
        assert_relative_eq!(back.rpy.z, 0.0);
        assert_relative_eq!(back.rpy.y, FRAC_PI_2, epsilon = 1e-6);
        assert_relative_eq!(back.rpy.x, 0.3, epsilon = 1e-6);
        assert_relative_eq!(back.to_matrix(), p.to_matrix(), epsilon = 1e-6);
    }

    #[test]
    fn test_gimbal_lock_yaw_folded_into_roll() {
        let p = Pose::new(Vector3::zeros(), Vector3::new(0.0, -FRAC_PI_2, FRAC_PI_4));
        let back = Pose::from_matrix(&p.to_matrix());
        assert_relative_eq!(back.rpy.z, 0.0);
        assert_relative_eq!(back.rotation_matrix(), p.rotation_matrix(), epsilon = 1e-6);
    }

    #[test]
    fn test_compose_translations_and_rotation() {
        let parent = Pose::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 0.0, FRAC_PI_2));
        let child = Pose::from_xyz(Vector3::new(1.0, 0.0, 0.0));
        let world = parent.compose(&child);
        assert_relative_eq!(world.xyz, Vector3::new(1.0, 1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(world.rpy.z, FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_composes_to_identity() {
        for p in sample_poses() {
            let id = p.compose(&p.inverse());
            assert_relative_eq!(id.to_matrix(), Matrix4::identity(), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_parse_pose_radians() {
        let p = parse_pose("1 2 3 0.1 0.2 0.3", false);
        assert_relative_eq!(p.xyz, Vector3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(p.rpy, Vector3::new(0.1, 0.2, 0.3));
    }

    #[test]
    fn test_parse_pose_degrees() {
        let p = parse_pose("0 0 0 90 0 0", true);
        assert_relative_eq!(p.rpy.x, FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(p.rpy.y, 0.0);
    }

    #[test]
    fn test_parse_pose_wrong_count_is_identity() {
        assert!(parse_pose("1 2 3 4 5", false).is_identity());
        assert!(parse_pose("1 2 3 4 5 6 7", false).is_identity());
    }

    #[test]
    fn test_parse_pose_garbage_is_identity() {
        assert!(parse_pose("1 2 three 0 0 0", false).is_identity());
        assert!(parse_pose("   ", false).is_identity());
    }

    #[test]
    fn test_parse_pose_extra_whitespace() {
        let p = parse_pose("\n  0.5\t0 0   0 0 0\n", false);
        assert_relative_eq!(p.xyz.x, 0.5);
    }
}
