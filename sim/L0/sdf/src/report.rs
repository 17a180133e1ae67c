//! Conversion results and recoverable diagnostics.

use std::path::PathBuf;

use thiserror::Error;

use crate::scene::Axis;

/// A lossy mapping the target representation cannot express exactly.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnsupportedFeature {
    /// Joint type with no target primitive; the joint is skipped.
    #[error("joint '{joint}' has unsupported type '{joint_type}', skipped")]
    UnknownJointType {
        /// Joint name.
        joint: String,
        /// Type as written in the document.
        joint_type: String,
    },

    /// Ball joint emitted as a rigid joint.
    #[error("ball joint '{joint}' converted to a fixed joint")]
    BallJoint {
        /// Joint name.
        joint: String,
    },

    /// Oblique axis snapped to a principal axis.
    #[error("joint '{joint}' axis {xyz:?} snapped to {}", .snapped.as_str())]
    ObliqueAxis {
        /// Joint name.
        joint: String,
        /// Original axis.
        xyz: [f64; 3],
        /// Principal axis used instead.
        snapped: Axis,
    },

    /// Products of inertia dropped; only the diagonal is emitted.
    #[error("link '{link}' has off-diagonal inertia terms, only the diagonal is kept")]
    OffDiagonalInertia {
        /// Link name.
        link: String,
    },

    /// Stiffness without damping; no drive is emitted.
    #[error("joint '{joint}' has stiffness {stiffness} but no damping, drive dropped")]
    StiffnessWithoutDamping {
        /// Joint name.
        joint: String,
        /// Dropped stiffness.
        stiffness: f64,
    },
}

/// A recoverable, per-item problem. The run continues past every one of
/// these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Warning {
    /// The mesh converter failed on a source file.
    #[error("mesh conversion failed for {}: {reason}", .path.display())]
    MeshConversionFailed {
        /// Source mesh.
        path: PathBuf,
        /// Converter message.
        reason: String,
    },

    /// A geometry references a mesh file that does not exist.
    #[error("mesh file not found for '{item}': {}", .path.display())]
    MissingMesh {
        /// Visual or collision name.
        item: String,
        /// Resolved mesh path.
        path: PathBuf,
    },

    /// A geometry references a mesh whose conversion failed or was skipped.
    #[error("no converted mesh available for '{item}': {}", .path.display())]
    MeshUnavailable {
        /// Visual or collision name.
        item: String,
        /// Resolved mesh path.
        path: PathBuf,
    },

    /// A visual or collision has no supported geometry.
    #[error("'{item}' has no supported geometry, skipped")]
    MissingGeometry {
        /// Visual or collision name.
        item: String,
    },

    /// A joint references a link that does not exist.
    #[error("joint '{joint}' references unknown link '{link}'")]
    UnresolvedJointLink {
        /// Joint name.
        joint: String,
        /// Missing link name.
        link: String,
    },

    /// Copying a texture next to the output failed.
    #[error("texture copy failed for {}: {reason}", .path.display())]
    TextureCopyFailed {
        /// Source texture.
        path: PathBuf,
        /// IO error message.
        reason: String,
    },

    /// Lossy mapping.
    #[error(transparent)]
    Unsupported(#[from] UnsupportedFeature),
}

/// Summary of a finished conversion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConversionReport {
    /// Written scene file.
    pub output: PathBuf,
    /// Links in the converted model.
    pub links: usize,
    /// Joints in the converted model.
    pub joints: usize,
    /// Unique meshes converted successfully.
    pub meshes_converted: usize,
    /// Unique meshes whose conversion failed.
    pub meshes_failed: usize,
    /// Distinct materials created.
    pub materials: usize,
    /// Recoverable problems, in the order they occurred.
    pub warnings: Vec<Warning>,
}

impl ConversionReport {
    /// Whether the run produced no warnings.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Number of lossy-mapping warnings.
    #[must_use]
    pub fn unsupported_count(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| matches!(w, Warning::Unsupported(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_messages() {
        let w = Warning::from(UnsupportedFeature::BallJoint {
            joint: "hip".into(),
        });
        assert_eq!(w.to_string(), "ball joint 'hip' converted to a fixed joint");

        let w = Warning::MissingMesh {
            item: "body".into(),
            path: PathBuf::from("/m/body.stl"),
        };
        assert!(w.to_string().contains("/m/body.stl"));
    }

    #[test]
    fn test_report_counts() {
        let report = ConversionReport {
            warnings: vec![
                Warning::MissingGeometry { item: "v".into() },
                UnsupportedFeature::OffDiagonalInertia { link: "l".into() }.into(),
            ],
            ..ConversionReport::default()
        };
        assert!(!report.is_clean());
        assert_eq!(report.unsupported_count(), 1);
    }
}
