//! Conversion orchestrator.
//!
//! [`SdfToUsdConverter`] drives one run: load the model, convert every unique
//! mesh exactly once, then walk links and joints and emit scene content
//! through a [`SceneWriter`]. Per-item problems become [`Warning`]s in the
//! returned [`ConversionReport`]; only a missing input, a malformed model, an
//! unwritable output or a writer failure abort the run.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Component, Path, PathBuf};

use nalgebra::Vector3;
use tracing::{debug, info, warn};

use crate::config::ConvertOptions;
use crate::error::{Result, SdfError};
use crate::mapping::{
    GeometryNode, JointMapping, drops_stiffness, joint_drive, joint_frames, joint_limits,
    map_geometry, map_joint_type, mass_properties, material_spec, snap_axis,
};
use crate::material::{MaterialCache, MaterialKey};
use crate::merge::{WORLD_LINK, merge_fixed_joints};
use crate::mesh::{ASSET_DIR, MeshAssetConverter, MeshCache, MeshOutcome};
use crate::naming::{NameRegistry, sanitize_name};
use crate::parser::load_sdf_file;
use crate::pose::Pose;
use crate::report::{ConversionReport, UnsupportedFeature, Warning};
use crate::scene::{
    JointKind, JointSpec, NodeKind, SceneWriter, ScenePath, StageMetadata, Transform,
};
use crate::types::{Geometry, Joint, Link, Material, Model};

/// Scope holding every material of the model.
pub const LOOKS_SCOPE: &str = "Looks";

const VISUALS_SCOPE: &str = "visuals";
const COLLISIONS_SCOPE: &str = "collisions";

/// Converts one SDF model into a scene.
///
/// The mesh and material caches live on the instance and are reset at the
/// start of every [`convert`](Self::convert) call.
///
/// # Example
///
/// ```no_run
/// use sim_sdf::{ConvertOptions, SdfToUsdConverter};
/// # fn run<M: sim_sdf::MeshAssetConverter, W: sim_sdf::SceneWriter>(meshes: M, mut stage: W) -> sim_sdf::Result<()> {
/// let options = ConvertOptions::new("robot/model.sdf", "out/robot.usda");
/// let mut converter = SdfToUsdConverter::new(options, meshes);
/// let report = converter.convert(&mut stage)?;
/// println!("{} links, {} warnings", report.links, report.warnings.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SdfToUsdConverter<M> {
    options: ConvertOptions,
    meshes: M,
    mesh_cache: MeshCache,
    materials: MaterialCache,
    textures: HashMap<PathBuf, Option<String>>,
}

impl<M: MeshAssetConverter> SdfToUsdConverter<M> {
    /// Create a converter for the given options and mesh backend.
    #[must_use]
    pub fn new(options: ConvertOptions, meshes: M) -> Self {
        Self {
            options,
            meshes,
            mesh_cache: MeshCache::new(),
            materials: MaterialCache::new(),
            textures: HashMap::new(),
        }
    }

    /// Options in use.
    #[must_use]
    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Mesh backend.
    #[must_use]
    pub fn mesh_converter(&self) -> &M {
        &self.meshes
    }

    /// Mesh outcomes of the last run.
    #[must_use]
    pub fn mesh_cache(&self) -> &MeshCache {
        &self.mesh_cache
    }

    /// Consume the converter, returning the mesh backend.
    pub fn into_mesh_converter(self) -> M {
        self.meshes
    }

    /// Run the conversion, emitting the scene through `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid, the input is missing or
    /// malformed, the output directory cannot be created, or the writer
    /// fails.
    pub fn convert<W: SceneWriter>(&mut self, writer: &mut W) -> Result<ConversionReport> {
        self.options.validate()?;
        self.mesh_cache = MeshCache::new();
        self.materials = MaterialCache::new();
        self.textures.clear();

        info!(
            input = %self.options.input.display(),
            output = %self.options.output.display(),
            "converting SDF model"
        );

        info!("[1/4] loading model");
        let mut model = load_sdf_file(&self.options.input)?;
        if self.options.merge_fixed_joints {
            model = merge_fixed_joints(&model);
        }
        info!(
            model = %model.name,
            links = model.links.len(),
            joints = model.joints.len(),
            "model loaded"
        );

        let mut report = ConversionReport {
            output: self.options.output.clone(),
            links: model.links.len(),
            joints: model.joints.len(),
            ..ConversionReport::default()
        };

        let out_dir = self.options.output_dir().to_path_buf();
        fs::create_dir_all(&out_dir).map_err(|e| SdfError::output_write(&out_dir, e))?;

        info!("[2/4] converting meshes");
        self.convert_meshes(&model, &out_dir, &mut report)?;

        info!("[3/4] building links");
        let mut run = SceneRun {
            writer,
            report: &mut report,
            out_dir: &out_dir,
            root: ScenePath::root(&sanitize_name(&model.name)),
            names: NameRegistry::new(),
            bodies: HashMap::new(),
        };
        self.build_root(&mut run, &model)?;
        for link in &model.links {
            self.build_link(&mut run, link)?;
        }

        info!("[4/4] building joints");
        if self.options.include_physics {
            for joint in &model.joints {
                build_joint(&mut run, &model, joint)?;
            }
        }

        run.writer.save(&self.options.output)?;

        report.meshes_converted = self.mesh_cache.converted_count();
        report.meshes_failed = self.mesh_cache.failed_count();
        report.materials = self.materials.len();

        info!(
            output = %report.output.display(),
            links = report.links,
            joints = report.joints,
            meshes = report.meshes_converted,
            warnings = report.warnings.len(),
            "conversion complete"
        );
        Ok(report)
    }

    // ========================================================================
    // Meshes
    // ========================================================================

    fn collect_mesh_paths(&self, model: &Model) -> BTreeSet<PathBuf> {
        let mut paths = BTreeSet::new();
        for link in &model.links {
            let visuals = link.visuals.iter().filter_map(|v| v.geometry.as_ref());
            let collisions = link
                .collisions
                .iter()
                .filter(|_| self.options.include_collision)
                .filter_map(|c| c.geometry.as_ref());
            paths.extend(
                visuals
                    .chain(collisions)
                    .filter_map(Geometry::mesh_path)
                    .cloned(),
            );
        }
        paths
    }

    fn convert_meshes(
        &mut self,
        model: &Model,
        out_dir: &Path,
        report: &mut ConversionReport,
    ) -> Result<()> {
        let sources = self.collect_mesh_paths(model);
        if sources.is_empty() {
            return Ok(());
        }

        let asset_dir = out_dir.join(ASSET_DIR);
        fs::create_dir_all(&asset_dir).map_err(|e| SdfError::output_write(&asset_dir, e))?;
        let extension = self.meshes.artifact_extension().to_string();

        for source in sources {
            if !source.is_file() {
                debug!(path = %source.display(), "mesh source does not exist");
                self.mesh_cache.insert(source, MeshOutcome::Missing);
                continue;
            }

            let dest = self
                .mesh_cache
                .reserve_destination(&asset_dir, &source, &extension);
            match self.meshes.convert(&source, &dest) {
                Ok(artifact) => {
                    debug!(source = %source.display(), artifact = %artifact.display(), "mesh converted");
                    self.mesh_cache.insert(source, MeshOutcome::Converted(artifact));
                }
                Err(err) => {
                    let reason = err.to_string();
                    record(
                        report,
                        Warning::MeshConversionFailed {
                            path: source.clone(),
                            reason: reason.clone(),
                        },
                    );
                    self.mesh_cache.insert(source, MeshOutcome::Failed(reason));
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Scene content
    // ========================================================================

    fn build_root<W: SceneWriter>(&self, run: &mut SceneRun<'_, W>, model: &Model) -> Result<()> {
        run.writer.set_stage_metadata(&StageMetadata {
            up_axis: self.options.up_axis,
            meters_per_unit: 1.0,
            default_prim: run.root.name().to_string(),
        })?;

        let root = run.root.clone();
        run.writer.define_node(&root, NodeKind::Xform)?;
        let transform =
            Transform::from_pose(&model.pose).with_scale(Vector3::repeat(self.options.scale));
        run.writer.set_transform(&root, &transform)?;

        run.names.reserve(LOOKS_SCOPE);
        run.writer.define_node(&root.child(LOOKS_SCOPE), NodeKind::Scope)?;

        if self.options.include_physics {
            run.writer.apply_articulation_root(&root)?;
        }
        Ok(())
    }

    fn build_link<W: SceneWriter>(&mut self, run: &mut SceneRun<'_, W>, link: &Link) -> Result<()> {
        let sanitized = sanitize_name(&link.name);
        let path = run.root.child(&run.names.claim(&sanitized));
        debug!(link = %link.name, path = %path, "building link");

        run.writer.define_node(&path, NodeKind::Xform)?;
        run.writer.set_transform(&path, &Transform::from_pose(&link.pose))?;
        run.bodies
            .entry(sanitized)
            .or_insert_with(|| (path.clone(), link.pose));

        if self.options.include_physics {
            run.writer.apply_rigid_body(&path)?;
            if let Some(props) = link.inertial.as_ref().and_then(mass_properties) {
                if link.inertial.is_some_and(|i| i.inertia.has_off_diagonal()) {
                    record(
                        run.report,
                        UnsupportedFeature::OffDiagonalInertia {
                            link: link.name.clone(),
                        }
                        .into(),
                    );
                }
                run.writer.apply_mass(&path, &props)?;
            }
        }

        if !link.visuals.is_empty() {
            let scope = path.child(VISUALS_SCOPE);
            run.writer.define_node(&scope, NodeKind::Scope)?;
            let mut names = NameRegistry::new();
            for visual in &link.visuals {
                let node = scope.child(&names.claim(&sanitize_name(&visual.name)));
                let Some(target) =
                    self.build_geometry(run, &node, &visual.name, &visual.pose, visual.geometry.as_ref())?
                else {
                    continue;
                };
                if let Some(material) = &visual.material {
                    let handle = self.material_handle(run, &visual.name, material)?;
                    run.writer.bind_material(&target, &handle)?;
                }
            }
        }

        if self.options.include_collision && !link.collisions.is_empty() {
            let scope = path.child(COLLISIONS_SCOPE);
            run.writer.define_node(&scope, NodeKind::Scope)?;
            let mut names = NameRegistry::new();
            for collision in &link.collisions {
                let node = scope.child(&names.claim(&sanitize_name(&collision.name)));
                let target = self.build_geometry(
                    run,
                    &node,
                    &collision.name,
                    &collision.pose,
                    collision.geometry.as_ref(),
                )?;
                // Collision shapes are marked even without rigid bodies.
                if let Some(target) = target {
                    run.writer.apply_collision(&target)?;
                }
            }
        }
        Ok(())
    }

    /// Emit one visual or collision geometry under `node`.
    ///
    /// Returns the node that carries the shape (for material binding and
    /// collision marking), or `None` when nothing was emitted.
    fn build_geometry<W: SceneWriter>(
        &self,
        run: &mut SceneRun<'_, W>,
        node: &ScenePath,
        item: &str,
        pose: &Pose,
        geometry: Option<&Geometry>,
    ) -> Result<Option<ScenePath>> {
        let Some(geometry) = geometry else {
            record(run.report, Warning::MissingGeometry { item: item.to_string() });
            return Ok(None);
        };

        match map_geometry(geometry) {
            GeometryNode::Primitive { shape, scale } => {
                run.writer.define_node(node, NodeKind::Xform)?;
                run.writer.set_transform(node, &Transform::from_pose(pose))?;

                let shape_path = node.child(shape.node_name());
                run.writer.define_shape(&shape_path, &shape)?;
                if let Some(scale) = scale.filter(|s| *s != Vector3::repeat(1.0)) {
                    run.writer.set_transform(&shape_path, &Transform::scale(scale))?;
                }
                Ok(Some(shape_path))
            }
            GeometryNode::Mesh { source, scale } => match self.mesh_cache.get(&source) {
                Some(MeshOutcome::Converted(artifact)) => {
                    let asset = asset_reference(run.out_dir, artifact);
                    run.writer.define_node(node, NodeKind::Xform)?;
                    run.writer
                        .set_transform(node, &Transform::from_pose(pose).with_scale(scale))?;
                    run.writer.add_mesh_reference(node, &asset)?;
                    Ok(Some(node.clone()))
                }
                Some(MeshOutcome::Missing) => {
                    record(
                        run.report,
                        Warning::MissingMesh {
                            item: item.to_string(),
                            path: source,
                        },
                    );
                    Ok(None)
                }
                Some(MeshOutcome::Failed(_)) | None => {
                    record(
                        run.report,
                        Warning::MeshUnavailable {
                            item: item.to_string(),
                            path: source,
                        },
                    );
                    Ok(None)
                }
            },
        }
    }

    // ========================================================================
    // Materials
    // ========================================================================

    fn material_handle<W: SceneWriter>(
        &mut self,
        run: &mut SceneRun<'_, W>,
        visual_name: &str,
        material: &Material,
    ) -> Result<ScenePath> {
        let key = MaterialKey::new(material);
        if let Some(handle) = self.materials.get(&key) {
            return Ok(handle.clone());
        }

        let texture = material
            .pbr
            .as_ref()
            .and_then(|pbr| pbr.albedo_map_path.as_deref())
            .and_then(|path| self.copy_texture(path, run.out_dir, run.report));

        let name = self.materials.unique_name(&sanitize_name(visual_name));
        let handle = run.root.child(LOOKS_SCOPE).child(&name);
        run.writer
            .define_material(&handle, &material_spec(material, texture))?;
        debug!(material = %handle, "material defined");

        self.materials.insert(key, handle.clone());
        Ok(handle)
    }

    /// Copy a texture into the asset directory once per run, returning the
    /// scene-relative asset path.
    ///
    /// Textures from different directories that share a file name get
    /// suffixed destinations. Copies from earlier runs are replaced.
    fn copy_texture(
        &mut self,
        source: &Path,
        out_dir: &Path,
        report: &mut ConversionReport,
    ) -> Option<String> {
        if let Some(done) = self.textures.get(source) {
            return done.clone();
        }

        let asset = if source.is_file() {
            let dest_dir = out_dir.join(ASSET_DIR);
            let extension = source
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default();
            let dest = self
                .mesh_cache
                .reserve_destination(&dest_dir, source, &extension);
            let copied = fs::create_dir_all(&dest_dir).and_then(|()| fs::copy(source, &dest));
            match (copied, dest.file_name()) {
                (Ok(_), Some(file_name)) => {
                    Some(format!("./{ASSET_DIR}/{}", file_name.to_string_lossy()))
                }
                (Ok(_), None) => None,
                (Err(err), _) => {
                    record(
                        report,
                        Warning::TextureCopyFailed {
                            path: source.to_path_buf(),
                            reason: err.to_string(),
                        },
                    );
                    None
                }
            }
        } else {
            debug!(path = %source.display(), "albedo texture not found, skipped");
            None
        };

        self.textures.insert(source.to_path_buf(), asset.clone());
        asset
    }
}

/// Mutable state of one scene build.
struct SceneRun<'a, W> {
    writer: &'a mut W,
    report: &'a mut ConversionReport,
    out_dir: &'a Path,
    root: ScenePath,
    names: NameRegistry,
    /// Link node and link pose by sanitized link name, first link wins.
    bodies: HashMap<String, (ScenePath, Pose)>,
}

fn build_joint<W: SceneWriter>(
    run: &mut SceneRun<'_, W>,
    model: &Model,
    joint: &Joint,
) -> Result<()> {
    let kind = match map_joint_type(&joint.joint_type) {
        JointMapping::Exact(kind) => kind,
        JointMapping::Degraded(kind) => {
            record(
                run.report,
                UnsupportedFeature::BallJoint {
                    joint: joint.name.clone(),
                }
                .into(),
            );
            kind
        }
        JointMapping::Unsupported => {
            record(
                run.report,
                UnsupportedFeature::UnknownJointType {
                    joint: joint.name.clone(),
                    joint_type: joint.joint_type.as_str().to_string(),
                }
                .into(),
            );
            return Ok(());
        }
    };

    let Some((body1, child_pose)) = run.bodies.get(&sanitize_name(&joint.child)).cloned() else {
        record(
            run.report,
            Warning::UnresolvedJointLink {
                joint: joint.name.clone(),
                link: joint.child.clone(),
            },
        );
        return Ok(());
    };

    let (body0, parent_pose) = match run.bodies.get(&sanitize_name(&joint.parent)) {
        Some((path, pose)) => (Some(path.clone()), *pose),
        None => {
            if joint.parent != WORLD_LINK {
                record(
                    run.report,
                    Warning::UnresolvedJointLink {
                        joint: joint.name.clone(),
                        link: joint.parent.clone(),
                    },
                );
            }
            // World frame expressed in model coordinates.
            (None, model.pose.inverse())
        }
    };

    let axis = &joint.axis;
    let snap = snap_axis(&axis.xyz);
    if snap.oblique && kind != JointKind::Rigid {
        record(
            run.report,
            UnsupportedFeature::ObliqueAxis {
                joint: joint.name.clone(),
                xyz: [axis.xyz.x, axis.xyz.y, axis.xyz.z],
                snapped: snap.axis,
            }
            .into(),
        );
    }
    if drops_stiffness(kind, axis) {
        record(
            run.report,
            UnsupportedFeature::StiffnessWithoutDamping {
                joint: joint.name.clone(),
                stiffness: axis.stiffness,
            }
            .into(),
        );
    }

    let (local0, local1) = joint_frames(&parent_pose, &child_pose, &joint.pose);
    let spec = JointSpec {
        kind,
        body0,
        body1,
        axis: snap.axis,
        local0: Transform::from_pose(&local0),
        local1: Transform::from_pose(&local1),
        limits: joint_limits(&joint.joint_type, axis),
        drive: joint_drive(kind, axis),
    };

    let path = run.root.child(&run.names.claim(&sanitize_name(&joint.name)));
    debug!(joint = %joint.name, path = %path, kind = ?kind, "building joint");
    run.writer.define_joint(&path, &spec)?;
    Ok(())
}

fn record(report: &mut ConversionReport, warning: Warning) {
    warn!("{warning}");
    report.warnings.push(warning);
}

/// Scene-relative reference to an artifact, `./`-prefixed with `/`
/// separators when the artifact lives under the output directory.
fn asset_reference(out_dir: &Path, artifact: &Path) -> String {
    match artifact.strip_prefix(out_dir) {
        Ok(relative) => {
            let parts: Vec<_> = relative
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part.to_string_lossy()),
                    _ => None,
                })
                .collect();
            format!("./{}", parts.join("/"))
        }
        Err(_) => artifact.to_string_lossy().replace('\\', "/"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_reference_relative() {
        let out = Path::new("/out");
        assert_eq!(
            asset_reference(out, Path::new("/out/meshes/arm.usda")),
            "./meshes/arm.usda"
        );
        assert_eq!(
            asset_reference(out, Path::new("/elsewhere/arm.usda")),
            "/elsewhere/arm.usda"
        );
    }

    #[test]
    fn test_asset_reference_relative_output_dir() {
        assert_eq!(
            asset_reference(Path::new("."), Path::new("./meshes/a.usda")),
            "./meshes/a.usda"
        );
    }
}
