//! In-memory USDA stage implementing [`SceneWriter`].
//!
//! Prims are kept in definition order in an arena indexed by path. Nothing
//! touches the filesystem until [`SceneWriter::save`], which writes a
//! sibling temporary file and renames it over the destination.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use sim_sdf::{
    JointKind, JointSpec, MassProperties, MaterialSpec, NodeKind, SceneError, ScenePath,
    SceneWriter, Shape, StageMetadata, Transform,
};
use tracing::debug;

use crate::usda::{UsdaText, escape_string, format_asset, format_quat, format_real, format_vec3};

const PREVIEW_SURFACE: &str = "PreviewSurface";
const DIFFUSE_TEXTURE: &str = "diffuse_texture";
const UV_READER: &str = "uv_reader";

#[derive(Debug, Clone)]
struct Prim {
    name: String,
    type_name: &'static str,
    api_schemas: Vec<String>,
    references: Vec<String>,
    transform: Option<Transform>,
    /// Rendered `declaration = value` lines.
    properties: Vec<String>,
    children: Vec<usize>,
}

impl Prim {
    fn new(name: &str, type_name: &'static str) -> Self {
        Self {
            name: name.to_string(),
            type_name,
            api_schemas: Vec::new(),
            references: Vec::new(),
            transform: None,
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    fn apply_schema(&mut self, schema: &str) {
        if !self.api_schemas.iter().any(|s| s == schema) {
            self.api_schemas.push(schema.to_string());
        }
    }

    fn set(&mut self, declaration: &str, value: impl AsRef<str>) {
        let prefix = format!("{declaration} = ");
        let line = format!("{prefix}{}", value.as_ref());
        match self.properties.iter_mut().find(|p| p.starts_with(&prefix)) {
            Some(existing) => *existing = line,
            None => self.properties.push(line),
        }
    }
}

/// A USD stage rendered as USDA text.
///
/// # Example
///
/// ```
/// use sim_sdf::{NodeKind, ScenePath, SceneWriter, StageMetadata, UpAxis};
/// use sim_usd::UsdaStage;
///
/// let mut stage = UsdaStage::new();
/// stage.set_stage_metadata(&StageMetadata {
///     up_axis: UpAxis::Z,
///     meters_per_unit: 1.0,
///     default_prim: "robot".into(),
/// }).unwrap();
/// stage.define_node(&ScenePath::root("robot"), NodeKind::Xform).unwrap();
///
/// let text = stage.to_usda();
/// assert!(text.starts_with("#usda 1.0"));
/// assert!(text.contains("def Xform \"robot\""));
/// ```
#[derive(Debug, Default, Clone)]
pub struct UsdaStage {
    metadata: Option<StageMetadata>,
    prims: Vec<Prim>,
    index: HashMap<String, usize>,
    roots: Vec<usize>,
}

impl UsdaStage {
    /// Empty stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of prims.
    #[must_use]
    pub fn prim_count(&self) -> usize {
        self.prims.len()
    }

    /// Whether a prim exists at `path`.
    #[must_use]
    pub fn has_prim(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Type name of the prim at `path`.
    #[must_use]
    pub fn prim_type(&self, path: &str) -> Option<&str> {
        self.index.get(path).map(|&i| self.prims[i].type_name)
    }

    fn prim_mut(&mut self, path: &ScenePath) -> Result<&mut Prim, SceneError> {
        let idx = *self
            .index
            .get(path.as_str())
            .ok_or_else(|| SceneError::UnknownNode(path.to_string()))?;
        Ok(&mut self.prims[idx])
    }

    /// Define a prim, or retype it if it already exists.
    fn define(&mut self, path: &ScenePath, type_name: &'static str) -> Result<&mut Prim, SceneError> {
        validate_path(path)?;
        if let Some(&idx) = self.index.get(path.as_str()) {
            self.prims[idx].type_name = type_name;
            return Ok(&mut self.prims[idx]);
        }

        let parent = match path.parent() {
            Some(parent) => Some(
                *self
                    .index
                    .get(parent.as_str())
                    .ok_or_else(|| SceneError::UnknownNode(parent.to_string()))?,
            ),
            None => None,
        };

        let idx = self.prims.len();
        self.prims.push(Prim::new(path.name(), type_name));
        self.index.insert(path.to_string(), idx);
        match parent {
            Some(p) => self.prims[p].children.push(idx),
            None => self.roots.push(idx),
        }
        Ok(&mut self.prims[idx])
    }

    /// Render the stage as USDA text.
    #[must_use]
    pub fn to_usda(&self) -> String {
        let mut text = UsdaText::new();

        let mut header = Vec::new();
        if let Some(meta) = &self.metadata {
            header.push(format!("defaultPrim = \"{}\"", escape_string(&meta.default_prim)));
            header.push(format!("metersPerUnit = {}", format_real(meta.meters_per_unit)));
            header.push(format!("upAxis = \"{}\"", meta.up_axis.as_str()));
        }
        text.header(&header);

        for &root in &self.roots {
            text.line("");
            self.write_prim(&mut text, root);
        }
        text.finish()
    }

    fn write_prim(&self, text: &mut UsdaText, idx: usize) {
        let prim = &self.prims[idx];

        let mut metadata = Vec::new();
        if !prim.api_schemas.is_empty() {
            let schemas: Vec<_> = prim.api_schemas.iter().map(|s| format!("\"{s}\"")).collect();
            metadata.push(format!("prepend apiSchemas = [{}]", schemas.join(", ")));
        }
        match prim.references.as_slice() {
            [] => {}
            [single] => metadata.push(format!("prepend references = {}", format_asset(single))),
            many => {
                let refs: Vec<_> = many.iter().map(|r| format_asset(r)).collect();
                metadata.push(format!("prepend references = [{}]", refs.join(", ")));
            }
        }

        let def = if prim.type_name.is_empty() {
            format!("def \"{}\"", prim.name)
        } else {
            format!("def {} \"{}\"", prim.type_name, prim.name)
        };
        if metadata.is_empty() {
            text.line(&def);
        } else {
            text.line(&format!("{def} ("));
            for entry in &metadata {
                text.line(&format!("    {entry}"));
            }
            text.line(")");
        }
        text.open();

        if let Some(transform) = &prim.transform {
            write_transform(text, transform);
        }
        for property in &prim.properties {
            text.line(property);
        }
        for (i, &child) in prim.children.iter().enumerate() {
            if i > 0 || prim.transform.is_some() || !prim.properties.is_empty() {
                text.line("");
            }
            self.write_prim(text, child);
        }

        text.close();
    }

    fn write_file(&self, path: &Path) -> Result<(), SceneError> {
        let io_err = |source| SceneError::Io {
            path: path.to_path_buf(),
            source,
        };

        let tmp = temporary_sibling(path);
        fs::write(&tmp, self.to_usda()).map_err(io_err)?;
        if let Err(err) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(io_err(err));
        }
        Ok(())
    }
}

impl SceneWriter for UsdaStage {
    fn set_stage_metadata(&mut self, metadata: &StageMetadata) -> Result<(), SceneError> {
        self.metadata = Some(metadata.clone());
        Ok(())
    }

    fn define_node(&mut self, path: &ScenePath, kind: NodeKind) -> Result<(), SceneError> {
        let type_name = match kind {
            NodeKind::Xform => "Xform",
            NodeKind::Scope => "Scope",
        };
        self.define(path, type_name)?;
        Ok(())
    }

    fn set_transform(&mut self, path: &ScenePath, transform: &Transform) -> Result<(), SceneError> {
        self.prim_mut(path)?.transform = Some(*transform);
        Ok(())
    }

    fn add_mesh_reference(&mut self, path: &ScenePath, asset: &str) -> Result<(), SceneError> {
        let prim = self.prim_mut(path)?;
        // Type comes from the referenced layer.
        prim.type_name = "";
        prim.references.push(asset.to_string());
        Ok(())
    }

    fn define_shape(&mut self, path: &ScenePath, shape: &Shape) -> Result<(), SceneError> {
        let prim = match shape {
            Shape::Cube { size } => {
                let prim = self.define(path, "Cube")?;
                prim.set("double size", format_real(*size));
                prim
            }
            Shape::Cylinder {
                radius,
                height,
                axis,
            } => {
                let prim = self.define(path, "Cylinder")?;
                prim.set("double radius", format_real(*radius));
                prim.set("double height", format_real(*height));
                prim.set("uniform token axis", format!("\"{}\"", axis.as_str()));
                prim
            }
            Shape::Sphere { radius } => {
                let prim = self.define(path, "Sphere")?;
                prim.set("double radius", format_real(*radius));
                prim
            }
            Shape::Capsule {
                radius,
                height,
                axis,
            } => {
                let prim = self.define(path, "Capsule")?;
                prim.set("double radius", format_real(*radius));
                prim.set("double height", format_real(*height));
                prim.set("uniform token axis", format!("\"{}\"", axis.as_str()));
                prim
            }
        };
        debug!(path = %path, shape = prim.type_name, "shape defined");
        Ok(())
    }

    fn define_material(
        &mut self,
        path: &ScenePath,
        material: &MaterialSpec,
    ) -> Result<(), SceneError> {
        let surface = path.child(PREVIEW_SURFACE);
        self.define(path, "Material")?.set(
            "token outputs:surface.connect",
            format!("<{surface}.outputs:surface>"),
        );

        let shader = self.define(&surface, "Shader")?;
        shader.set("uniform token info:id", "\"UsdPreviewSurface\"");
        match &material.diffuse_texture {
            Some(_) => shader.set(
                "color3f inputs:diffuseColor.connect",
                format!("<{}.outputs:rgb>", path.child(DIFFUSE_TEXTURE)),
            ),
            None => shader.set("color3f inputs:diffuseColor", format_vec3(&material.diffuse)),
        }
        shader.set("float inputs:metallic", format_real(material.metallic));
        shader.set("float inputs:roughness", format_real(material.roughness));
        if let Some(ior) = material.ior {
            shader.set("float inputs:ior", format_real(ior));
        }
        shader.properties.push("token outputs:surface".to_string());

        if let Some(texture) = &material.diffuse_texture {
            let reader = path.child(UV_READER);
            let tex = self.define(&path.child(DIFFUSE_TEXTURE), "Shader")?;
            tex.set("uniform token info:id", "\"UsdUVTexture\"");
            tex.set("asset inputs:file", format_asset(texture));
            tex.set("token inputs:wrapS", "\"repeat\"");
            tex.set("token inputs:wrapT", "\"repeat\"");
            tex.set("float2 inputs:st.connect", format!("<{reader}.outputs:result>"));
            tex.properties.push("float3 outputs:rgb".to_string());

            let uv = self.define(&reader, "Shader")?;
            uv.set("uniform token info:id", "\"UsdPrimvarReader_float2\"");
            uv.set("string inputs:varname", "\"st\"");
            uv.properties.push("float2 outputs:result".to_string());
        }
        Ok(())
    }

    fn bind_material(&mut self, path: &ScenePath, material: &ScenePath) -> Result<(), SceneError> {
        if !self.has_prim(material.as_str()) {
            return Err(SceneError::UnknownNode(material.to_string()));
        }
        let prim = self.prim_mut(path)?;
        prim.apply_schema("MaterialBindingAPI");
        prim.set("rel material:binding", format!("<{material}>"));
        Ok(())
    }

    fn apply_articulation_root(&mut self, path: &ScenePath) -> Result<(), SceneError> {
        self.prim_mut(path)?.apply_schema("PhysicsArticulationRootAPI");
        Ok(())
    }

    fn apply_rigid_body(&mut self, path: &ScenePath) -> Result<(), SceneError> {
        self.prim_mut(path)?.apply_schema("PhysicsRigidBodyAPI");
        Ok(())
    }

    fn apply_mass(&mut self, path: &ScenePath, mass: &MassProperties) -> Result<(), SceneError> {
        let prim = self.prim_mut(path)?;
        prim.apply_schema("PhysicsMassAPI");
        prim.set("float physics:mass", format_real(mass.mass));
        prim.set("point3f physics:centerOfMass", format_vec3(&mass.center_of_mass));
        prim.set("float3 physics:diagonalInertia", format_vec3(&mass.diagonal_inertia));
        Ok(())
    }

    fn apply_collision(&mut self, path: &ScenePath) -> Result<(), SceneError> {
        self.prim_mut(path)?.apply_schema("PhysicsCollisionAPI");
        Ok(())
    }

    fn define_joint(&mut self, path: &ScenePath, joint: &JointSpec) -> Result<(), SceneError> {
        let type_name = match joint.kind {
            JointKind::Rotational => "PhysicsRevoluteJoint",
            JointKind::Translational => "PhysicsPrismaticJoint",
            JointKind::Rigid => "PhysicsFixedJoint",
        };
        let prim = self.define(path, type_name)?;

        if let Some(body0) = &joint.body0 {
            prim.set("rel physics:body0", format!("<{body0}>"));
        }
        prim.set("rel physics:body1", format!("<{}>", joint.body1));
        prim.set("point3f physics:localPos0", format_vec3(&joint.local0.translation));
        prim.set("quatf physics:localRot0", format_quat(&joint.local0.orientation));
        prim.set("point3f physics:localPos1", format_vec3(&joint.local1.translation));
        prim.set("quatf physics:localRot1", format_quat(&joint.local1.orientation));

        if joint.kind != JointKind::Rigid {
            prim.set("uniform token physics:axis", format!("\"{}\"", joint.axis.as_str()));
            if let Some(lower) = joint.limits.lower {
                prim.set("float physics:lowerLimit", format_real(lower));
            }
            if let Some(upper) = joint.limits.upper {
                prim.set("float physics:upperLimit", format_real(upper));
            }
        }

        if let Some(drive) = &joint.drive {
            let instance = drive.kind.as_str();
            prim.apply_schema(&format!("PhysicsDriveAPI:{instance}"));
            prim.set(
                &format!("float drive:{instance}:physics:damping"),
                format_real(drive.damping),
            );
            if let Some(stiffness) = drive.stiffness {
                prim.set(
                    &format!("float drive:{instance}:physics:stiffness"),
                    format_real(stiffness),
                );
            }
        }
        Ok(())
    }

    fn save(&mut self, path: &Path) -> Result<(), SceneError> {
        self.write_file(path)?;
        debug!(path = %path.display(), prims = self.prims.len(), "stage saved");
        Ok(())
    }
}

fn write_transform(text: &mut UsdaText, transform: &Transform) {
    let mut order = vec!["\"xformOp:translate\"", "\"xformOp:orient\""];
    text.line(&format!(
        "double3 xformOp:translate = {}",
        format_vec3(&transform.translation)
    ));
    text.line(&format!(
        "quatd xformOp:orient = {}",
        format_quat(&transform.orientation)
    ));
    if let Some(scale) = &transform.scale {
        text.line(&format!("double3 xformOp:scale = {}", format_vec3(scale)));
        order.push("\"xformOp:scale\"");
    }
    text.line(&format!(
        "uniform token[] xformOpOrder = [{}]",
        order.join(", ")
    ));
}

fn validate_path(path: &ScenePath) -> Result<(), SceneError> {
    let valid = path.as_str().starts_with('/')
        && path.segments().all(|segment| {
            !segment.is_empty()
                && !segment.starts_with(char::is_numeric)
                && segment.chars().all(|c| c.is_alphanumeric() || c == '_')
        });
    if valid {
        Ok(())
    } else {
        Err(SceneError::InvalidPath(path.to_string()))
    }
}

fn temporary_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use sim_sdf::{Axis, Drive, DriveKind, JointLimits, Pose, UpAxis};

    fn stage_with_root() -> (UsdaStage, ScenePath) {
        let mut stage = UsdaStage::new();
        let root = ScenePath::root("robot");
        stage
            .set_stage_metadata(&StageMetadata {
                up_axis: UpAxis::Z,
                meters_per_unit: 1.0,
                default_prim: "robot".into(),
            })
            .unwrap();
        stage.define_node(&root, NodeKind::Xform).unwrap();
        (stage, root)
    }

    #[test]
    fn test_header() {
        let (stage, _) = stage_with_root();
        let text = stage.to_usda();
        assert!(text.starts_with("#usda 1.0\n(\n"));
        assert!(text.contains("defaultPrim = \"robot\""));
        assert!(text.contains("metersPerUnit = 1"));
        assert!(text.contains("upAxis = \"Z\""));
    }

    #[test]
    fn test_parent_must_exist() {
        let mut stage = UsdaStage::new();
        let orphan = ScenePath::root("robot").child("base");
        let err = stage.define_node(&orphan, NodeKind::Xform).unwrap_err();
        assert!(matches!(err, SceneError::UnknownNode(p) if p == "/robot"));
        assert_eq!(stage.prim_count(), 0);
    }

    #[test]
    fn test_invalid_path_rejected() {
        let mut stage = UsdaStage::new();
        for name in ["9bad", "٣arm", "has-dash", "a.b"] {
            let err = stage
                .define_node(&ScenePath::root(name), NodeKind::Xform)
                .unwrap_err();
            assert!(matches!(err, SceneError::InvalidPath(_)), "{name}");
        }
        assert_eq!(stage.prim_count(), 0);
    }

    #[test]
    fn test_unicode_prim_names() {
        let (mut stage, root) = stage_with_root();
        let link = root.child("grüße_arm");
        stage.define_node(&link, NodeKind::Xform).unwrap();
        assert_eq!(stage.prim_count(), 2);
        assert!(stage.to_usda().contains("def Xform \"grüße_arm\""));
    }

    #[test]
    fn test_transform_ops() {
        let (mut stage, root) = stage_with_root();
        let pose = Pose::from_xyz(Vector3::new(0.0, 0.0, 0.1));
        stage
            .set_transform(
                &root,
                &Transform::from_pose(&pose).with_scale(Vector3::new(2.0, 2.0, 2.0)),
            )
            .unwrap();
        let text = stage.to_usda();
        assert!(text.contains("double3 xformOp:translate = (0, 0, 0.1)"));
        assert!(text.contains("quatd xformOp:orient = (1, 0, 0, 0)"));
        assert!(text.contains("double3 xformOp:scale = (2, 2, 2)"));
        assert!(text.contains(
            "uniform token[] xformOpOrder = [\"xformOp:translate\", \"xformOp:orient\", \"xformOp:scale\"]"
        ));
    }

    #[test]
    fn test_shapes_and_schemas() {
        let (mut stage, root) = stage_with_root();
        let cyl = root.child("Cylinder");
        stage
            .define_shape(
                &cyl,
                &Shape::Cylinder {
                    radius: 0.05,
                    height: 0.4,
                    axis: Axis::Z,
                },
            )
            .unwrap();
        stage.apply_collision(&cyl).unwrap();
        stage.apply_collision(&cyl).unwrap();
        stage.apply_articulation_root(&root).unwrap();

        let text = stage.to_usda();
        assert_eq!(stage.prim_type("/robot/Cylinder"), Some("Cylinder"));
        assert!(text.contains("def Cylinder \"Cylinder\" (\n"));
        assert_eq!(text.matches("PhysicsCollisionAPI").count(), 1);
        assert!(text.contains("double radius = 0.05"));
        assert!(text.contains("uniform token axis = \"Z\""));
        assert!(text.contains("prepend apiSchemas = [\"PhysicsArticulationRootAPI\"]"));
    }

    #[test]
    fn test_textured_material() {
        let (mut stage, root) = stage_with_root();
        let looks = root.child("Looks");
        stage.define_node(&looks, NodeKind::Scope).unwrap();
        let mat = looks.child("body");
        stage
            .define_material(
                &mat,
                &MaterialSpec {
                    diffuse: Vector3::new(1.0, 0.0, 0.0),
                    metallic: 0.0,
                    roughness: 0.5,
                    ior: Some(1.5),
                    diffuse_texture: Some("./meshes/albedo.png".into()),
                },
            )
            .unwrap();

        let text = stage.to_usda();
        assert!(stage.has_prim("/robot/Looks/body/PreviewSurface"));
        assert!(stage.has_prim("/robot/Looks/body/uv_reader"));
        assert!(text.contains(
            "token outputs:surface.connect = </robot/Looks/body/PreviewSurface.outputs:surface>"
        ));
        assert!(text.contains(
            "color3f inputs:diffuseColor.connect = </robot/Looks/body/diffuse_texture.outputs:rgb>"
        ));
        assert!(text.contains("asset inputs:file = @./meshes/albedo.png@"));
        assert!(text.contains("float inputs:ior = 1.5"));
        assert!(text.contains("string inputs:varname = \"st\""));
    }

    #[test]
    fn test_mesh_reference_is_typeless() {
        let (mut stage, root) = stage_with_root();
        let shell = root.child("shell");
        stage.define_node(&shell, NodeKind::Xform).unwrap();
        stage.add_mesh_reference(&shell, "./meshes/body.usda").unwrap();

        let text = stage.to_usda();
        assert_eq!(stage.prim_type("/robot/shell"), Some(""));
        assert!(text.contains("def \"shell\" (\n"));
        assert!(text.contains("prepend references = @./meshes/body.usda@"));
    }

    #[test]
    fn test_bind_requires_material() {
        let (mut stage, root) = stage_with_root();
        let err = stage
            .bind_material(&root, &root.child("Looks").child("missing"))
            .unwrap_err();
        assert!(matches!(err, SceneError::UnknownNode(_)));
    }

    #[test]
    fn test_revolute_joint() {
        let (mut stage, root) = stage_with_root();
        let joint = JointSpec {
            kind: JointKind::Rotational,
            body0: Some(root.child("base")),
            body1: root.child("upper"),
            axis: Axis::Y,
            local0: Transform::from_pose(&Pose::from_xyz(Vector3::new(0.0, 0.0, 0.5))),
            local1: Transform::from_pose(&Pose::identity()),
            limits: JointLimits {
                lower: Some(-90.0),
                upper: None,
            },
            drive: Some(Drive {
                kind: DriveKind::Angular,
                damping: 0.5,
                stiffness: Some(10.0),
            }),
        };
        stage.define_joint(&root.child("shoulder"), &joint).unwrap();

        let text = stage.to_usda();
        assert!(text.contains("def PhysicsRevoluteJoint \"shoulder\""));
        assert!(text.contains("rel physics:body0 = </robot/base>"));
        assert!(text.contains("point3f physics:localPos0 = (0, 0, 0.5)"));
        assert!(text.contains("uniform token physics:axis = \"Y\""));
        assert!(text.contains("float physics:lowerLimit = -90"));
        assert!(!text.contains("physics:upperLimit"));
        assert!(text.contains("\"PhysicsDriveAPI:angular\""));
        assert!(text.contains("float drive:angular:physics:damping = 0.5"));
        assert!(text.contains("float drive:angular:physics:stiffness = 10"));
    }

    #[test]
    fn test_world_fixed_joint() {
        let (mut stage, root) = stage_with_root();
        let joint = JointSpec {
            kind: JointKind::Rigid,
            body0: None,
            body1: root.child("base"),
            axis: Axis::Z,
            local0: Transform::from_pose(&Pose::identity()),
            local1: Transform::from_pose(&Pose::identity()),
            limits: JointLimits::default(),
            drive: None,
        };
        stage.define_joint(&root.child("anchor"), &joint).unwrap();
        let text = stage.to_usda();
        assert!(text.contains("def PhysicsFixedJoint \"anchor\""));
        assert!(!text.contains("physics:body0"));
        assert!(!text.contains("physics:axis"));
    }

    #[test]
    fn test_save_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("robot.usda");
        let (mut stage, _) = stage_with_root();
        stage.save(&path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, stage.to_usda());
        assert!(!dir.path().join("robot.usda.tmp").exists());
    }

    #[test]
    fn test_save_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing/robot.usda");
        let (mut stage, _) = stage_with_root();
        assert!(matches!(stage.save(&path).unwrap_err(), SceneError::Io { .. }));
    }
}
