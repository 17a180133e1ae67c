//! SDF XML parser.
//!
//! Streams the document with `quick-xml` and builds the intermediate
//! [`Model`]. Only the elements the converter needs are interpreted; every
//! other element is skipped. Singular child elements follow "first one
//! wins", and numeric fields that fail to parse fall back to their default
//! with a warning instead of failing the load.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use nalgebra::Vector3;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, warn};

use crate::error::{Result, SdfError};
use crate::pose::{Pose, parse_pose};
use crate::types::{
    Collision, Geometry, Inertia, Inertial, Joint, JointAxis, JointType, Link, Material, Model,
    PbrMaterial, Visual,
};
use crate::uri::resolve_uri;

/// Parse an SDF document from a string.
///
/// Asset URIs are resolved against `model_dir`, which should be the absolute
/// directory of the document.
///
/// # Errors
///
/// Returns [`SdfError::XmlParse`] for malformed XML and
/// [`SdfError::MalformedModel`] when no root `<model>` is found, either as
/// the document root or as a direct child of `<sdf>`.
pub fn parse_sdf_str(xml: &str, model_dir: &Path) -> Result<Model> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let ctx = ParseContext { model_dir };
    parse_document(&mut reader, &ctx)
}

/// Load and parse an SDF file.
///
/// # Errors
///
/// Returns [`SdfError::InputNotFound`] if the file does not exist,
/// [`SdfError::Io`] if it cannot be read, and any error from
/// [`parse_sdf_str`].
pub fn load_sdf_file(path: impl AsRef<Path>) -> Result<Model> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(SdfError::input_not_found(path));
    }

    let absolute = std::path::absolute(path).map_err(|source| SdfError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let xml = std::fs::read_to_string(&absolute).map_err(|source| SdfError::Io {
        path: absolute.clone(),
        source,
    })?;

    let model_dir = absolute
        .parent()
        .map_or_else(|| PathBuf::from("/"), Path::to_path_buf);
    debug!(path = %absolute.display(), "loading SDF");
    parse_sdf_str(&xml, &model_dir)
}

/// State shared by every element parser.
struct ParseContext<'a> {
    model_dir: &'a Path,
}

// ============================================================================
// Document structure
// ============================================================================

/// Find the root model: `<sdf><model>` or a bare `<model>` root.
fn parse_document<R: BufRead>(reader: &mut Reader<R>, ctx: &ParseContext) -> Result<Model> {
    let mut buf = Vec::new();
    let mut inside_sdf = false;
    let mut seen_root = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = e.name().as_ref().to_vec();
                let at_root = !inside_sdf && !seen_root;
                match name.as_slice() {
                    b"model" if inside_sdf || at_root => return parse_model(reader, e, ctx),
                    b"sdf" if at_root => {
                        inside_sdf = true;
                        seen_root = true;
                    }
                    _ => {
                        seen_root = true;
                        skip_element(reader, &name)?;
                    }
                }
            }
            Ok(Event::Empty(ref e)) => {
                let at_root = !inside_sdf && !seen_root;
                if e.name().as_ref() == b"model" && (inside_sdf || at_root) {
                    return Ok(Model::new(name_attribute(e, "model")));
                }
                seen_root = true;
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"sdf" => break,
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }
        buf.clear();
    }

    Err(SdfError::malformed(
        "no <model> element found at the document root or under <sdf>",
    ))
}

fn parse_model<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    ctx: &ParseContext,
) -> Result<Model> {
    let mut model = Model::new(name_attribute(start, "model"));
    let mut pose: Option<Pose> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"pose" => {
                        let p = parse_pose_element(reader, e)?;
                        pose.get_or_insert(p);
                    }
                    b"link" => model.links.push(parse_link(reader, e, ctx)?),
                    b"joint" => model.joints.push(parse_joint(reader, e)?),
                    b"model" => {
                        debug!(model = %model.name, "nested models are not supported, skipping");
                        skip_element(reader, &elem_name)?;
                    }
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"link" => model.links.push(Link::new(name_attribute(e, "link"))),
                b"joint" => model.joints.push(joint_from_attributes(e)),
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"model" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("model")),
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }
        buf.clear();
    }

    model.pose = pose.unwrap_or_default();
    Ok(model)
}

// ============================================================================
// Links
// ============================================================================

fn parse_link<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    ctx: &ParseContext,
) -> Result<Link> {
    let mut link = Link::new(name_attribute(start, "link"));
    let mut pose: Option<Pose> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"pose" => {
                        let p = parse_pose_element(reader, e)?;
                        pose.get_or_insert(p);
                    }
                    b"inertial" => {
                        let inertial = parse_inertial(reader)?;
                        link.inertial.get_or_insert(inertial);
                    }
                    b"visual" => link.visuals.push(parse_visual(reader, e, ctx)?),
                    b"collision" => link.collisions.push(parse_collision(reader, e, ctx)?),
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"visual" => link.visuals.push(Visual {
                    name: name_attribute(e, "visual"),
                    pose: Pose::identity(),
                    geometry: None,
                    material: None,
                }),
                b"collision" => link.collisions.push(Collision {
                    name: name_attribute(e, "collision"),
                    pose: Pose::identity(),
                    geometry: None,
                }),
                b"inertial" => {
                    link.inertial.get_or_insert_with(Inertial::default);
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"link" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("link")),
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }
        buf.clear();
    }

    link.pose = pose.unwrap_or_default();
    Ok(link)
}

fn parse_inertial<R: BufRead>(reader: &mut Reader<R>) -> Result<Inertial> {
    let mut mass: Option<f64> = None;
    let mut pose: Option<Pose> = None;
    let mut inertia: Option<Inertia> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"mass" => {
                        let text = read_text(reader, &elem_name)?;
                        mass.get_or_insert(parse_number(&text, "mass", 0.0));
                    }
                    b"pose" => {
                        let p = parse_pose_element(reader, e)?;
                        pose.get_or_insert(p);
                    }
                    b"inertia" => {
                        let fields = read_child_text(reader, &elem_name)?;
                        inertia.get_or_insert(Inertia {
                            ixx: fields.number("ixx", 0.0),
                            ixy: fields.number("ixy", 0.0),
                            ixz: fields.number("ixz", 0.0),
                            iyy: fields.number("iyy", 0.0),
                            iyz: fields.number("iyz", 0.0),
                            izz: fields.number("izz", 0.0),
                        });
                    }
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"inertial" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("inertial")),
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }
        buf.clear();
    }

    Ok(Inertial {
        mass: mass.unwrap_or(0.0),
        pose: pose.unwrap_or_default(),
        inertia: inertia.unwrap_or_default(),
    })
}

fn parse_visual<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    ctx: &ParseContext,
) -> Result<Visual> {
    let name = name_attribute(start, "visual");
    let mut pose: Option<Pose> = None;
    let mut geometry: Option<Option<Geometry>> = None;
    let mut material: Option<Material> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"pose" => {
                        let p = parse_pose_element(reader, e)?;
                        pose.get_or_insert(p);
                    }
                    b"geometry" => {
                        let g = parse_geometry(reader, ctx)?;
                        geometry.get_or_insert(g);
                    }
                    b"material" => {
                        let m = parse_material(reader, ctx)?;
                        material.get_or_insert(m);
                    }
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"material" => {
                material.get_or_insert_with(Material::default);
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"visual" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("visual")),
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }
        buf.clear();
    }

    Ok(Visual {
        name,
        pose: pose.unwrap_or_default(),
        geometry: geometry.flatten(),
        material,
    })
}

fn parse_collision<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    ctx: &ParseContext,
) -> Result<Collision> {
    let name = name_attribute(start, "collision");
    let mut pose: Option<Pose> = None;
    let mut geometry: Option<Option<Geometry>> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"pose" => {
                        let p = parse_pose_element(reader, e)?;
                        pose.get_or_insert(p);
                    }
                    b"geometry" => {
                        let g = parse_geometry(reader, ctx)?;
                        geometry.get_or_insert(g);
                    }
                    // surface, laser_retro, max_contacts
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"collision" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("collision")),
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }
        buf.clear();
    }

    Ok(Collision {
        name,
        pose: pose.unwrap_or_default(),
        geometry: geometry.flatten(),
    })
}

// ============================================================================
// Geometry
// ============================================================================

/// Shapes seen under one `<geometry>`, first of each kind.
#[derive(Default)]
struct ShapeSlots {
    mesh: Option<Option<Geometry>>,
    box_shape: Option<Geometry>,
    cylinder: Option<Geometry>,
    sphere: Option<Geometry>,
    capsule: Option<Geometry>,
}

impl ShapeSlots {
    /// Highest-priority shape: mesh, box, cylinder, sphere, capsule.
    fn pick(self) -> Option<Geometry> {
        if let Some(mesh) = self.mesh {
            return mesh;
        }
        self.box_shape
            .or(self.cylinder)
            .or(self.sphere)
            .or(self.capsule)
    }
}

fn parse_geometry<R: BufRead>(
    reader: &mut Reader<R>,
    ctx: &ParseContext,
) -> Result<Option<Geometry>> {
    let mut slots = ShapeSlots::default();
    let mut buf = Vec::new();

    loop {
        let shape = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                let fields = read_child_text(reader, &elem_name)?;
                Some((elem_name, fields))
            }
            Ok(Event::Empty(ref e)) => Some((e.name().as_ref().to_vec(), ChildText::default())),
            Ok(Event::End(ref e)) if e.name().as_ref() == b"geometry" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("geometry")),
            Ok(_) => None,
            Err(e) => return Err(e.into()),
        };
        buf.clear();
        let Some((elem_name, fields)) = shape else {
            continue;
        };

        match elem_name.as_slice() {
            b"mesh" => {
                if slots.mesh.is_none() {
                    slots.mesh = Some(mesh_from_fields(&fields, ctx));
                }
            }
            b"box" => {
                slots.box_shape.get_or_insert_with(|| Geometry::Box {
                    size: fields.vector3("size", Vector3::new(1.0, 1.0, 1.0)),
                });
            }
            b"cylinder" => {
                slots.cylinder.get_or_insert_with(|| Geometry::Cylinder {
                    radius: fields.number("radius", 0.5),
                    length: fields.number("length", 1.0),
                });
            }
            b"sphere" => {
                slots.sphere.get_or_insert_with(|| Geometry::Sphere {
                    radius: fields.number("radius", 0.5),
                });
            }
            b"capsule" => {
                slots.capsule.get_or_insert_with(|| Geometry::Capsule {
                    radius: fields.number("radius", 0.5),
                    length: fields.number("length", 1.0),
                });
            }
            other => {
                debug!(shape = %String::from_utf8_lossy(other), "unsupported geometry shape ignored");
            }
        }
    }

    Ok(slots.pick())
}

fn mesh_from_fields(fields: &ChildText, ctx: &ParseContext) -> Option<Geometry> {
    let Some(uri) = fields.get("uri").filter(|u| !u.is_empty()) else {
        warn!("<mesh> without <uri>, geometry ignored");
        return None;
    };

    Some(Geometry::Mesh {
        uri: uri.to_string(),
        resolved_path: resolve_uri(uri, ctx.model_dir),
        scale: fields.vector3("scale", Vector3::new(1.0, 1.0, 1.0)),
    })
}

// ============================================================================
// Materials
// ============================================================================

fn parse_material<R: BufRead>(reader: &mut Reader<R>, ctx: &ParseContext) -> Result<Material> {
    let mut material = Material::default();
    let mut diffuse_seen = false;
    let mut specular_seen = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"diffuse" => {
                        let text = read_text(reader, &elem_name)?;
                        if !diffuse_seen {
                            material.diffuse = parse_vector3(&text, "diffuse", material.diffuse);
                            diffuse_seen = true;
                        }
                    }
                    b"specular" => {
                        let text = read_text(reader, &elem_name)?;
                        if !specular_seen {
                            material.specular =
                                parse_vector3(&text, "specular", material.specular);
                            specular_seen = true;
                        }
                    }
                    b"pbr" => {
                        let pbr = parse_pbr(reader, ctx)?;
                        if material.pbr.is_none() {
                            material.pbr = pbr;
                        }
                    }
                    // ambient, emissive, script, shader
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"material" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("material")),
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }
        buf.clear();
    }

    Ok(material)
}

/// Parse `<pbr>`; only the `<metal>` workflow is understood.
fn parse_pbr<R: BufRead>(
    reader: &mut Reader<R>,
    ctx: &ParseContext,
) -> Result<Option<PbrMaterial>> {
    let mut pbr: Option<PbrMaterial> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                if elem_name.as_slice() == b"metal" {
                    let fields = read_child_text(reader, &elem_name)?;
                    pbr.get_or_insert_with(|| {
                        let albedo_map = fields
                            .get("albedo_map")
                            .filter(|s| !s.is_empty())
                            .map(str::to_string);
                        let albedo_map_path =
                            albedo_map.as_deref().map(|uri| resolve_uri(uri, ctx.model_dir));
                        PbrMaterial {
                            metalness: fields.number("metalness", 0.0),
                            roughness: fields.number("roughness", 0.5),
                            albedo_map,
                            albedo_map_path,
                        }
                    });
                } else {
                    debug!(workflow = %String::from_utf8_lossy(&elem_name), "unsupported PBR workflow ignored");
                    skip_element(reader, &elem_name)?;
                }
            }
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"metal" => {
                pbr.get_or_insert_with(PbrMaterial::default);
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"pbr" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("pbr")),
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }
        buf.clear();
    }

    Ok(pbr)
}

// ============================================================================
// Joints
// ============================================================================

fn joint_from_attributes(start: &BytesStart) -> Joint {
    let joint_type = get_attribute_opt(start, "type")
        .map_or(JointType::Revolute, |t| JointType::from_sdf(&t));
    Joint::new(name_attribute(start, "joint"), joint_type, "", "")
}

fn parse_joint<R: BufRead>(reader: &mut Reader<R>, start: &BytesStart) -> Result<Joint> {
    let mut joint = joint_from_attributes(start);
    let mut parent: Option<String> = None;
    let mut child: Option<String> = None;
    let mut pose: Option<Pose> = None;
    let mut axis: Option<JointAxis> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"parent" => {
                        let text = read_text(reader, &elem_name)?;
                        parent.get_or_insert(text);
                    }
                    b"child" => {
                        let text = read_text(reader, &elem_name)?;
                        child.get_or_insert(text);
                    }
                    b"pose" => {
                        let p = parse_pose_element(reader, e)?;
                        pose.get_or_insert(p);
                    }
                    b"axis" => {
                        let a = parse_axis(reader)?;
                        axis.get_or_insert(a);
                    }
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"joint" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("joint")),
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }
        buf.clear();
    }

    joint.parent = parent.unwrap_or_default();
    joint.child = child.unwrap_or_default();
    joint.pose = pose.unwrap_or_default();
    joint.axis = axis.unwrap_or_default();
    Ok(joint)
}

fn parse_axis<R: BufRead>(reader: &mut Reader<R>) -> Result<JointAxis> {
    let mut axis = JointAxis::default();
    let mut xyz: Option<Vector3<f64>> = None;
    let mut limit: Option<ChildText> = None;
    let mut dynamics: Option<ChildText> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"xyz" => {
                        let text = read_text(reader, &elem_name)?;
                        xyz.get_or_insert_with(|| parse_vector3(&text, "axis xyz", Vector3::z()));
                    }
                    b"limit" => {
                        let fields = read_child_text(reader, &elem_name)?;
                        limit.get_or_insert(fields);
                    }
                    b"dynamics" => {
                        let fields = read_child_text(reader, &elem_name)?;
                        dynamics.get_or_insert(fields);
                    }
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"axis" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("axis")),
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }
        buf.clear();
    }

    if let Some(xyz) = xyz {
        axis.xyz = xyz;
    }
    if let Some(limit) = limit {
        axis.lower = limit.number("lower", axis.lower);
        axis.upper = limit.number("upper", axis.upper);
    }
    if let Some(dynamics) = dynamics {
        axis.damping = dynamics.number("damping", 0.0);
        axis.stiffness = dynamics.number("spring_stiffness", 0.0);
        axis.stiffness = dynamics.number("stiffness", axis.stiffness);
        axis.friction = dynamics.number("friction", 0.0);
    }
    Ok(axis)
}

// ============================================================================
// Helpers
// ============================================================================

/// Text content of the direct children of one element, first occurrence
/// of each tag wins.
#[derive(Debug, Default)]
struct ChildText {
    entries: Vec<(Vec<u8>, String)>,
}

impl ChildText {
    fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(tag, _)| tag.as_slice() == name.as_bytes())
            .map(|(_, text)| text.as_str())
    }

    fn number(&self, name: &str, default: f64) -> f64 {
        self.get(name)
            .map_or(default, |text| parse_number(text, name, default))
    }

    fn vector3(&self, name: &str, default: Vector3<f64>) -> Vector3<f64> {
        self.get(name)
            .map_or(default, |text| parse_vector3(text, name, default))
    }
}

/// Collect the text of each direct child until the closing tag of `name`.
fn read_child_text<R: BufRead>(reader: &mut Reader<R>, name: &[u8]) -> Result<ChildText> {
    let mut fields = ChildText::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let tag = e.name().as_ref().to_vec();
                let text = read_text(reader, &tag)?;
                fields.entries.push((tag, text));
            }
            Ok(Event::Empty(ref e)) => {
                fields.entries.push((e.name().as_ref().to_vec(), String::new()));
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == name => break,
            Ok(Event::Eof) => return Err(unexpected_eof(&String::from_utf8_lossy(name))),
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }
        buf.clear();
    }

    Ok(fields)
}

/// Read the trimmed text of the current element, skipping nested elements.
fn read_text<R: BufRead>(reader: &mut Reader<R>, name: &[u8]) -> Result<String> {
    let mut text = String::new();
    let mut depth = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(t)) if depth == 0 => text.push_str(&t.unescape()?),
            Ok(Event::CData(t)) if depth == 0 => text.push_str(&String::from_utf8_lossy(&t)),
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            Ok(Event::Eof) => return Err(unexpected_eof(&String::from_utf8_lossy(name))),
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }
        buf.clear();
    }

    Ok(text.trim().to_string())
}

/// Parse a `<pose>` element, honoring `degrees="true"`.
fn parse_pose_element<R: BufRead>(reader: &mut Reader<R>, start: &BytesStart) -> Result<Pose> {
    let degrees = get_attribute_opt(start, "degrees")
        .is_some_and(|v| matches!(v.trim(), "true" | "1"));
    let text = read_text(reader, b"pose")?;
    Ok(parse_pose(&text, degrees))
}

fn parse_number(text: &str, field: &str, default: f64) -> f64 {
    if text.is_empty() {
        return default;
    }
    match text.parse::<f64>() {
        Ok(v) => v,
        Err(_) => {
            warn!(field, value = text, default, "non-numeric value, using default");
            default
        }
    }
}

/// Parse at least three numbers, keeping the first three (so RGBA colors
/// read as RGB).
fn parse_vector3(text: &str, field: &str, default: Vector3<f64>) -> Vector3<f64> {
    let parsed: std::result::Result<Vec<f64>, _> =
        text.split_whitespace().map(str::parse::<f64>).collect();
    match parsed {
        Ok(values) if values.len() >= 3 => Vector3::new(values[0], values[1], values[2]),
        Ok(values) if values.is_empty() => default,
        _ => {
            warn!(field, value = text, "expected 3 numbers, using default");
            default
        }
    }
}

/// Get an optional attribute value.
fn get_attribute_opt(e: &BytesStart, name: &str) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == name.as_bytes() {
            return String::from_utf8(attr.value.to_vec()).ok();
        }
    }
    None
}

/// The `name` attribute, or `default` when absent.
fn name_attribute(e: &BytesStart, default: &str) -> String {
    get_attribute_opt(e, "name").unwrap_or_else(|| default.to_string())
}

fn unexpected_eof(element: &str) -> SdfError {
    SdfError::XmlParse(format!("unexpected EOF in <{element}>"))
}

/// Skip an element and all its children.
fn skip_element<R: BufRead>(reader: &mut Reader<R>, name: &[u8]) -> Result<()> {
    let mut buf = Vec::new();
    let mut depth = 1;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == name => {
                depth += 1;
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == name => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }
        buf.clear();
    }

    Ok(())
}
