//! Conversion options.

use std::path::{Path, PathBuf};

use crate::error::{Result, SdfError};
use crate::scene::UpAxis;

/// Options for one conversion run.
///
/// # Example
///
/// ```
/// use sim_sdf::{ConvertOptions, UpAxis};
///
/// let options = ConvertOptions::new("robot/model.sdf", "out/robot.usda")
///     .with_up_axis(UpAxis::Y)
///     .with_collision(false);
/// assert!(options.include_physics);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    /// Source SDF file.
    pub input: PathBuf,
    /// Destination scene file.
    pub output: PathBuf,
    /// Up axis written to the stage.
    pub up_axis: UpAxis,
    /// Uniform scale applied at the model root.
    pub scale: f64,
    /// Emit rigid bodies, mass, colliders and joints.
    pub include_physics: bool,
    /// Emit collision geometry.
    pub include_collision: bool,
    /// Fold links connected by fixed joints into their parent.
    pub merge_fixed_joints: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self::new(PathBuf::new(), PathBuf::new())
    }
}

impl ConvertOptions {
    /// Default options for an input/output pair.
    #[must_use]
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            up_axis: UpAxis::Z,
            scale: 1.0,
            include_physics: true,
            include_collision: true,
            merge_fixed_joints: false,
        }
    }

    /// Set the up axis.
    #[must_use]
    pub fn with_up_axis(mut self, up_axis: UpAxis) -> Self {
        self.up_axis = up_axis;
        self
    }

    /// Set the model scale.
    #[must_use]
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Enable or disable physics annotations.
    #[must_use]
    pub fn with_physics(mut self, enabled: bool) -> Self {
        self.include_physics = enabled;
        self
    }

    /// Enable or disable collision geometry.
    #[must_use]
    pub fn with_collision(mut self, enabled: bool) -> Self {
        self.include_collision = enabled;
        self
    }

    /// Enable or disable the fixed-joint merge pass.
    #[must_use]
    pub fn with_merge_fixed_joints(mut self, enabled: bool) -> Self {
        self.merge_fixed_joints = enabled;
        self
    }

    /// Directory the scene file is written into.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        self.output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// Check option consistency.
    ///
    /// # Errors
    ///
    /// Returns [`SdfError::InvalidOptions`] for a non-positive or non-finite
    /// scale or an empty output path.
    pub fn validate(&self) -> Result<()> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(SdfError::InvalidOptions(format!(
                "scale must be a positive number, got {}",
                self.scale
            )));
        }
        if self.output.as_os_str().is_empty() {
            return Err(SdfError::InvalidOptions("output path is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConvertOptions::new("in.sdf", "out.usda");
        assert_eq!(options.up_axis, UpAxis::Z);
        assert_eq!(options.scale, 1.0);
        assert!(options.include_physics);
        assert!(options.include_collision);
        assert!(!options.merge_fixed_joints);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let options = ConvertOptions::new("in.sdf", "out.usda")
            .with_scale(0.01)
            .with_physics(false)
            .with_merge_fixed_joints(true);
        assert_eq!(options.scale, 0.01);
        assert!(!options.include_physics);
        assert!(options.merge_fixed_joints);
    }

    #[test]
    fn test_default_needs_output() {
        let err = ConvertOptions::default().validate().unwrap_err();
        assert!(matches!(err, SdfError::InvalidOptions(_)));
    }

    #[test]
    fn test_invalid_scale() {
        for scale in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = ConvertOptions::new("in.sdf", "out.usda")
                .with_scale(scale)
                .validate()
                .unwrap_err();
            assert!(matches!(err, SdfError::InvalidOptions(_)));
        }
    }

    #[test]
    fn test_output_dir() {
        let options = ConvertOptions::new("in.sdf", "out.usda");
        assert_eq!(options.output_dir(), Path::new("."));
        let options = ConvertOptions::new("in.sdf", "/tmp/x/out.usda");
        assert_eq!(options.output_dir(), Path::new("/tmp/x"));
    }
}
