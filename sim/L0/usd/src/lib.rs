//! USDA backend for `sim-sdf` conversions.
//!
//! Provides the two collaborators [`sim_sdf::SdfToUsdConverter`] needs:
//!
//! - [`UsdaStage`] - an in-memory stage implementing [`sim_sdf::SceneWriter`]
//!   that serializes to text USD (`.usda`)
//! - [`UsdaMeshConverter`] - a [`sim_sdf::MeshAssetConverter`] writing each
//!   STL, OBJ or glTF source mesh as its own referenceable USDA layer
//!
//! # Example
//!
//! ```no_run
//! use sim_sdf::{ConvertOptions, SdfToUsdConverter};
//! use sim_usd::{UsdaMeshConverter, UsdaStage};
//!
//! let options = ConvertOptions::new("robot/model.sdf", "out/robot.usda");
//! let mut converter = SdfToUsdConverter::new(options, UsdaMeshConverter::new());
//! let report = converter.convert(&mut UsdaStage::new())?;
//! println!("{} links, {} warnings", report.links, report.warnings.len());
//! # Ok::<(), sim_sdf::SdfError>(())
//! ```
//!
//! # Mesh Readers
//!
//! | Format | Read | Notes |
//! |--------|------|-------|
//! | STL    | yes  | ASCII and binary, coincident corners welded |
//! | OBJ    | yes  | Via `tobj`, triangulated, MTL texture maps copied |
//! | glTF, GLB | yes | Via `gltf`, node transforms baked into points |
//! | DAE, FBX | no | Fails per mesh, conversion continues |

#![doc(html_root_url = "https://docs.rs/sim-usd/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::float_cmp
)]

mod converter;
mod error;
mod gltf_read;
mod mesh;
mod obj;
mod stage;
mod stl;
mod usda;

// Re-export main types
pub use converter::{UsdaMeshConverter, mesh_layer};
pub use error::{MeshReadError, ReadResult};
pub use gltf_read::read_gltf;
pub use mesh::SurfaceMesh;
pub use obj::{ObjAsset, parse_obj, read_obj};
pub use stage::UsdaStage;
pub use stl::{parse_stl, read_stl};
pub use usda::{escape_string, format_asset, format_quat, format_real, format_vec3};
