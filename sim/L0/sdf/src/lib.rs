//! SDF robot description loader and scene converter.
//!
//! This crate parses [SDF](http://sdformat.org) (Simulation Description
//! Format) model documents into an in-memory model and converts that model
//! into a hierarchical scene with geometry, materials and physics
//! annotations.
//!
//! # Features
//!
//! - Parse SDF XML from files or strings
//! - Pose math in SDF's roll/pitch/yaw convention
//! - `model://`, `file://`, absolute and relative URI resolution
//! - Primitive shapes and mesh references, deduplicated per run
//! - Preview-surface materials, deduplicated by content
//! - Rigid bodies, mass properties, colliders and joints with limits and drives
//! - Optional folding of fixed-joint chains into single bodies
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. The scene format
//! is abstracted behind [`SceneWriter`] and mesh conversion behind
//! [`MeshAssetConverter`]; `sim-usd` provides USDA implementations of both.
//!
//! # Example
//!
//! ```
//! use sim_sdf::parse_sdf_str;
//! use std::path::Path;
//!
//! let sdf = r#"
//!     <sdf version="1.7">
//!         <model name="simple">
//!             <link name="base">
//!                 <inertial><mass>1.0</mass></inertial>
//!                 <visual name="body">
//!                     <geometry><box><size>0.5 0.3 0.2</size></box></geometry>
//!                 </visual>
//!             </link>
//!         </model>
//!     </sdf>
//! "#;
//!
//! let model = parse_sdf_str(sdf, Path::new(".")).expect("should parse");
//! assert_eq!(model.name, "simple");
//! assert_eq!(model.links.len(), 1);
//! ```
//!
//! # Supported SDF Elements
//!
//! ## Links
//!
//! - `<link name="...">` with `<pose>`
//! - `<inertial>` - Mass, pose, inertia tensor
//! - `<visual>` / `<collision>` - Pose, geometry, and (visuals) material
//!
//! ## Geometry
//!
//! - `<box>`, `<cylinder>`, `<sphere>`, `<capsule>`
//! - `<mesh>` with `<uri>` and `<scale>`
//!
//! ## Joints
//!
//! - Types: `revolute`, `continuous`, `prismatic`, `fixed`, `ball`
//! - `<axis>` with `<xyz>`, `<limit>` and `<dynamics>`
//!
//! # Limitations
//!
//! - Only the first model of a document is converted; nested models are skipped
//! - Joint axes are snapped to the closest principal axis
//! - Off-diagonal inertia terms are dropped
//! - Ball joints are emitted as fixed joints

#![doc(html_root_url = "https://docs.rs/sim-sdf/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::items_after_statements,
    clippy::needless_pass_by_value,
    clippy::map_unwrap_or,
    clippy::option_if_let_else,
    clippy::too_many_lines
)]

mod config;
mod converter;
mod error;
mod mapping;
mod material;
mod merge;
mod mesh;
mod naming;
mod parser;
mod pose;
mod report;
mod scene;
mod types;
mod uri;

// Re-export main types
pub use config::ConvertOptions;
pub use converter::{LOOKS_SCOPE, SdfToUsdConverter};
pub use error::{Result, SdfError};
pub use mapping::{
    AxisSnap, GeometryNode, JointMapping, UNBOUNDED_LIMIT, drops_stiffness, joint_drive,
    joint_frames, joint_limits, map_geometry, map_joint_type, mass_properties, material_spec,
    snap_axis,
};
pub use material::{MaterialCache, MaterialKey};
pub use merge::{WORLD_LINK, merge_fixed_joints};
pub use mesh::{
    ASSET_DIR, MeshAssetConverter, MeshCache, MeshConversionError, MeshFormat, MeshOutcome,
    TEXTURE_EXTENSIONS, check_format, is_texture,
};
pub use naming::{NameRegistry, UNNAMED, sanitize_name};
pub use parser::{load_sdf_file, parse_sdf_str};
pub use pose::{Pose, parse_pose};
pub use report::{ConversionReport, UnsupportedFeature, Warning};
pub use scene::{
    Axis, Drive, DriveKind, JointKind, JointLimits, JointSpec, MassProperties, MaterialSpec,
    NodeKind, SceneError, ScenePath, SceneWriter, Shape, StageMetadata, Transform, UpAxis,
};
pub use types::{
    Collision, DEFAULT_JOINT_LIMIT, Geometry, Inertia, Inertial, Joint, JointAxis, JointType,
    Link, Material, Model, PbrMaterial, Visual,
};
pub use uri::resolve_uri;
