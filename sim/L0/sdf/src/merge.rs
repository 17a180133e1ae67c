//! Fixed-joint merging.
//!
//! Links connected by a `fixed` joint move as one rigid body, so they can be
//! folded into a single link. The child's visuals and collisions are
//! re-expressed in the parent frame, the inertials are combined, the joint
//! is dropped and later references to the child are redirected to the
//! surviving parent.

use std::collections::{HashMap, HashSet};

use nalgebra::{Matrix3, Vector3};
use tracing::{debug, info};

use crate::pose::Pose;
use crate::types::{Inertia, Inertial, JointType, Model};

/// Name SDF uses for the implicit world link.
pub const WORLD_LINK: &str = "world";

/// Fold every link attached through a fixed joint into its parent.
///
/// Joints to `world` and joints naming unknown links are left alone.
#[must_use]
pub fn merge_fixed_joints(model: &Model) -> Model {
    let mut links = model.links.clone();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (i, link) in links.iter().enumerate() {
        index.entry(link.name.clone()).or_insert(i);
    }
    let original_poses: Vec<Pose> = links.iter().map(|l| l.pose).collect();

    let mut alias: HashMap<String, String> = HashMap::new();
    let mut removed: HashSet<usize> = HashSet::new();
    let mut merged_joints: HashSet<usize> = HashSet::new();

    for (joint_idx, joint) in model.joints.iter().enumerate() {
        if joint.joint_type != JointType::Fixed || joint.parent == WORLD_LINK {
            continue;
        }
        let parent_name = resolve(&alias, &joint.parent);
        let (Some(&pi), Some(&ci)) = (index.get(&parent_name), index.get(&joint.child)) else {
            continue;
        };
        if pi == ci || removed.contains(&ci) || alias.contains_key(&joint.child) {
            continue;
        }

        let offset = original_poses[pi].inverse().compose(&original_poses[ci]);
        let child = links[ci].clone();

        let parent = &mut links[pi];
        for mut visual in child.visuals {
            visual.pose = offset.compose(&visual.pose);
            parent.visuals.push(visual);
        }
        for mut collision in child.collisions {
            collision.pose = offset.compose(&collision.pose);
            parent.collisions.push(collision);
        }
        parent.inertial = combine_inertials(parent.inertial, child.inertial, &offset);

        debug!(child = %child.name, parent = %parent.name, joint = %joint.name, "merged fixed joint");
        alias.insert(child.name.clone(), parent.name.clone());
        removed.insert(ci);
        merged_joints.insert(joint_idx);
    }

    let mut merged = Model::new(model.name.clone());
    merged.pose = model.pose;
    merged.links = links
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !removed.contains(i))
        .map(|(_, l)| l)
        .collect();

    for (joint_idx, joint) in model.joints.iter().enumerate() {
        if merged_joints.contains(&joint_idx) {
            continue;
        }
        let mut joint = joint.clone();
        joint.parent = resolve(&alias, &joint.parent);
        let child = resolve(&alias, &joint.child);
        if child != joint.child {
            // Joint frame is relative to the child link, which moved.
            if let (Some(&old), Some(&new)) = (index.get(&joint.child), index.get(&child)) {
                let offset = original_poses[new].inverse().compose(&original_poses[old]);
                joint.pose = offset.compose(&joint.pose);
            }
            joint.child = child;
        }
        merged.joints.push(joint);
    }

    if !merged_joints.is_empty() {
        info!(
            merged = merged_joints.len(),
            links = merged.links.len(),
            "merged links connected by fixed joints"
        );
    }
    merged
}

fn resolve(alias: &HashMap<String, String>, name: &str) -> String {
    let mut current = name;
    let mut hops = 0;
    while let Some(next) = alias.get(current) {
        current = next;
        hops += 1;
        if hops > alias.len() {
            break;
        }
    }
    current.to_string()
}

/// Combine two inertials, the child's given in a frame `offset` from the
/// parent link.
fn combine_inertials(
    parent: Option<Inertial>,
    child: Option<Inertial>,
    offset: &Pose,
) -> Option<Inertial> {
    let child = match child {
        Some(c) if c.mass > 0.0 => c,
        _ => return parent,
    };
    let child_frame = offset.compose(&child.pose);

    let parent = match parent {
        Some(p) if p.mass > 0.0 => p,
        _ => {
            return Some(Inertial {
                mass: child.mass,
                pose: child_frame,
                inertia: child.inertia,
            });
        }
    };

    let m1 = parent.mass;
    let m2 = child.mass;
    let mass = m1 + m2;
    let c1 = parent.pose.xyz;
    let c2 = child_frame.xyz;
    let com = (c1 * m1 + c2 * m2) / mass;

    let i1 = rotate_inertia(&parent.inertia, &parent.pose);
    let i2 = rotate_inertia(&child.inertia, &child_frame);
    let tensor = i1 + parallel_axis(m1, &(c1 - com)) + i2 + parallel_axis(m2, &(c2 - com));

    Some(Inertial {
        mass,
        pose: Pose::from_xyz(com),
        inertia: Inertia::from_matrix(&tensor),
    })
}

/// Inertia tensor expressed in the axes of the enclosing frame.
fn rotate_inertia(inertia: &Inertia, frame: &Pose) -> Matrix3<f64> {
    let r = frame.rotation_matrix();
    r * inertia.to_matrix() * r.transpose()
}

/// Parallel-axis shift of a point mass at displacement `d`.
fn parallel_axis(mass: f64, d: &Vector3<f64>) -> Matrix3<f64> {
    (Matrix3::identity() * d.norm_squared() - d * d.transpose()) * mass
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::{Collision, Geometry, Joint, Link, Visual};
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn at(x: f64, y: f64, z: f64) -> Pose {
        Pose::from_xyz(Vector3::new(x, y, z))
    }

    fn two_link_model() -> Model {
        Model::new("m")
            .with_link(
                Link::new("base")
                    .with_pose(at(0.0, 0.0, 1.0))
                    .with_inertial(Inertial::new(1.0).with_inertia(Inertia::diagonal(0.1, 0.1, 0.1)))
                    .with_visual(Visual::new("base_vis", Geometry::box_shape(1.0, 1.0, 1.0))),
            )
            .with_link(
                Link::new("sensor")
                    .with_pose(at(1.0, 0.0, 1.0))
                    .with_inertial(Inertial::new(1.0).with_inertia(Inertia::diagonal(0.1, 0.1, 0.1)))
                    .with_visual(
                        Visual::new("sensor_vis", Geometry::sphere(0.1)).with_pose(at(0.0, 0.0, 0.2)),
                    )
                    .with_collision(Collision::new("sensor_col", Geometry::sphere(0.1))),
            )
            .with_joint(Joint::new("mount", JointType::Fixed, "base", "sensor"))
    }

    #[test]
    fn test_merge_moves_geometry_into_parent() {
        let merged = merge_fixed_joints(&two_link_model());
        assert_eq!(merged.links.len(), 1);
        assert!(merged.joints.is_empty());

        let base = &merged.links[0];
        assert_eq!(base.visuals.len(), 2);
        assert_eq!(base.collisions.len(), 1);
        assert_relative_eq!(base.visuals[1].pose.xyz, Vector3::new(1.0, 0.0, 0.2), epsilon = 1e-12);
        assert_relative_eq!(base.collisions[0].pose.xyz, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_merge_combines_inertia() {
        let merged = merge_fixed_joints(&two_link_model());
        let inertial = merged.links[0].inertial.unwrap();
        assert_relative_eq!(inertial.mass, 2.0);
        assert_relative_eq!(inertial.pose.xyz, Vector3::new(0.5, 0.0, 0.0), epsilon = 1e-12);
        // Each unit mass sits 0.5 from the combined COM along X.
        assert_relative_eq!(inertial.inertia.ixx, 0.2, epsilon = 1e-12);
        assert_relative_eq!(inertial.inertia.iyy, 0.2 + 0.5, epsilon = 1e-12);
        assert_relative_eq!(inertial.inertia.izz, 0.2 + 0.5, epsilon = 1e-12);
        assert_relative_eq!(inertial.inertia.ixy, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_merge_respects_parent_rotation() {
        let mut model = two_link_model();
        model.links[0].pose = Pose::new(Vector3::new(0.0, 0.0, 1.0), Vector3::new(0.0, 0.0, FRAC_PI_2));
        let merged = merge_fixed_joints(&model);
        // Sensor is +1 X in the model frame, which is -1 Y in the rotated base frame.
        let vis = &merged.links[0].visuals[1];
        assert_relative_eq!(vis.pose.xyz, Vector3::new(0.0, -1.0, 0.2), epsilon = 1e-9);
        assert_relative_eq!(vis.pose.rpy.z, -FRAC_PI_2, epsilon = 1e-9);
    }

    #[test]
    fn test_massless_child_keeps_parent_inertial() {
        let mut model = two_link_model();
        model.links[1].inertial = None;
        let merged = merge_fixed_joints(&model);
        assert_relative_eq!(merged.links[0].inertial.unwrap().mass, 1.0);
    }

    #[test]
    fn test_world_joint_not_merged() {
        let model = Model::new("m")
            .with_link(Link::new("base"))
            .with_joint(Joint::new("anchor", JointType::Fixed, "world", "base"));
        let merged = merge_fixed_joints(&model);
        assert_eq!(merged.links.len(), 1);
        assert_eq!(merged.joints.len(), 1);
    }

    #[test]
    fn test_chain_and_retarget() {
        let model = Model::new("m")
            .with_link(Link::new("a"))
            .with_link(Link::new("b").with_pose(at(1.0, 0.0, 0.0)))
            .with_link(Link::new("c").with_pose(at(2.0, 0.0, 0.0)))
            .with_link(Link::new("d").with_pose(at(3.0, 0.0, 0.0)))
            .with_joint(Joint::new("ab", JointType::Fixed, "a", "b"))
            .with_joint(Joint::new("bc", JointType::Fixed, "b", "c"))
            .with_joint(Joint::new("cd", JointType::Revolute, "c", "d"));

        let merged = merge_fixed_joints(&model);
        let names: Vec<_> = merged.links.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["a", "d"]);
        assert_eq!(merged.joints.len(), 1);
        assert_eq!(merged.joints[0].name, "cd");
        assert_eq!(merged.joints[0].parent, "a");
        assert_eq!(merged.joints[0].child, "d");
    }

    #[test]
    fn test_non_fixed_joints_untouched() {
        let model = Model::new("m")
            .with_link(Link::new("a"))
            .with_link(Link::new("b"))
            .with_joint(Joint::new("hinge", JointType::Revolute, "a", "b"));
        let merged = merge_fixed_joints(&model);
        assert_eq!(merged, model);
    }
}
