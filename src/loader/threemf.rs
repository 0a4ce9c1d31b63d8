//! 3MF decoding
//!
//! A 3MF file is a zip package whose model part is XML. Mesh objects,
//! component references, build-item transforms, and base-material display
//! colors are honored; textures and extensions are not.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use glam::{Mat4, Vec3, Vec4};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::core::error::Error;
use crate::core::types::Result;
use crate::loader::FormatDecoder;
use crate::scene::node::{Material, MeshPrimitive};

const DEFAULT_MODEL_PART: &str = "3D/3dmodel.model";

/// Components may not nest deeper than this
const MAX_COMPONENT_DEPTH: usize = 16;

/// Upper bound on object instances expanded from the build
const MAX_INSTANCES: usize = 10_000;

/// Upper bound on triangles across all expanded instances
const MAX_TRIANGLES: usize = 8_000_000;

#[derive(Clone, Copy, Debug, Default)]
pub struct ThreeMfDecoder;

impl FormatDecoder for ThreeMfDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<MeshPrimitive>> {
        let xml = read_model_part(bytes)?;
        let doc = parse_model(&xml)?;
        let primitives = doc.instantiate()?;
        if primitives.is_empty() {
            return Err(Error::Decode("3MF package contains no meshes".into()));
        }
        Ok(primitives)
    }
}

fn read_model_part(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::Decode(format!("3MF is not a valid zip package: {}", e)))?;

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    let part = names
        .iter()
        .find(|n| n.eq_ignore_ascii_case(DEFAULT_MODEL_PART))
        .or_else(|| names.iter().find(|n| n.to_ascii_lowercase().ends_with(".model")))
        .cloned()
        .ok_or_else(|| Error::Decode("3MF package has no model part".into()))?;

    let mut file = archive
        .by_name(&part)
        .map_err(|e| Error::Decode(format!("cannot open {}: {}", part, e)))?;
    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|e| Error::Decode(format!("cannot read {}: {}", part, e)))?;
    Ok(xml)
}

#[derive(Debug, Default)]
struct ObjectDef {
    mesh: Option<MeshPrimitive>,
    components: Vec<(u32, Mat4)>,
}

#[derive(Debug, Default)]
struct ModelDoc {
    objects: HashMap<u32, ObjectDef>,
    build: Vec<(u32, Mat4)>,
}

impl ModelDoc {
    /// Expand build items (or every mesh object when there is no build)
    fn instantiate(&self) -> Result<Vec<MeshPrimitive>> {
        let mut out = Vec::new();
        if self.build.is_empty() {
            let mut ids: Vec<u32> = self.objects.keys().copied().collect();
            ids.sort_unstable();
            for id in ids {
                if let Some(mesh) = self.objects.get(&id).and_then(|o| o.mesh.as_ref()) {
                    out.push(mesh.clone());
                }
            }
        } else {
            let mut budget = Budget::default();
            for (id, transform) in &self.build {
                self.emit(*id, *transform, 0, &mut budget, &mut out)?;
            }
        }
        Ok(out)
    }

    fn emit(
        &self,
        id: u32,
        transform: Mat4,
        depth: usize,
        budget: &mut Budget,
        out: &mut Vec<MeshPrimitive>,
    ) -> Result<()> {
        if depth > MAX_COMPONENT_DEPTH {
            return Err(Error::Decode("3MF components nest too deeply".into()));
        }
        let object = self
            .objects
            .get(&id)
            .ok_or_else(|| Error::Decode(format!("3MF references unknown object {}", id)))?;
        budget.charge(object.mesh.as_ref().map_or(0, MeshPrimitive::triangle_count))?;
        if let Some(mesh) = &object.mesh {
            let mut mesh = mesh.clone();
            for p in &mut mesh.positions {
                *p = transform.transform_point3(*p);
            }
            mesh.normals.clear();
            out.push(mesh);
        }
        for (child, child_transform) in &object.components {
            self.emit(*child, transform * *child_transform, depth + 1, budget, out)?;
        }
        Ok(())
    }
}

/// Running totals while expanding the build
#[derive(Debug, Default)]
struct Budget {
    instances: usize,
    triangles: usize,
}

impl Budget {
    fn charge(&mut self, triangles: usize) -> Result<()> {
        self.instances += 1;
        self.triangles += triangles;
        if self.instances > MAX_INSTANCES {
            return Err(Error::Decode(format!("3MF build expands to more than {} objects", MAX_INSTANCES)));
        }
        if self.triangles > MAX_TRIANGLES {
            return Err(Error::Decode(format!("3MF build expands to more than {} triangles", MAX_TRIANGLES)));
        }
        Ok(())
    }
}

/// Object currently being read
struct OpenObject {
    id: u32,
    material: Option<Material>,
    positions: Vec<Vec3>,
    indices: Vec<u32>,
    components: Vec<(u32, Mat4)>,
    has_mesh: bool,
}

fn parse_model(xml: &str) -> Result<ModelDoc> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut doc = ModelDoc::default();
    // basematerials group id -> display colors
    let mut base_materials: HashMap<u32, Vec<Vec3>> = HashMap::new();
    let mut open_group: Option<u32> = None;
    let mut open: Option<OpenObject> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::Decode(format!("3MF XML error at {}: {}", reader.buffer_position(), e)))?;
        match event {
            Event::Start(e) | Event::Empty(e) => {
                match e.local_name().as_ref() {
                    b"basematerials" => {
                        let id = required_u32(&e, b"id")?;
                        base_materials.entry(id).or_default();
                        open_group = Some(id);
                    }
                    b"base" => {
                        if let Some(group) = open_group {
                            let color = attr(&e, b"displaycolor")
                                .and_then(|c| parse_color(&c))
                                .unwrap_or(Vec3::splat(0.8));
                            base_materials.entry(group).or_default().push(color);
                        }
                    }
                    b"object" => {
                        // A self-closing <object/> never sees an End event
                        if let Some(prev) = open.take() {
                            let (id, def) = close_object(prev)?;
                            doc.objects.insert(id, def);
                        }
                        let id = required_u32(&e, b"id")?;
                        let material = match (optional_u32(&e, b"pid")?, optional_u32(&e, b"pindex")?) {
                            (Some(pid), index) => base_materials
                                .get(&pid)
                                .and_then(|colors| colors.get(index.unwrap_or(0) as usize))
                                .map(|color| Material::Phong { color: *color }),
                            _ => None,
                        };
                        open = Some(OpenObject {
                            id,
                            material,
                            positions: Vec::new(),
                            indices: Vec::new(),
                            components: Vec::new(),
                            has_mesh: false,
                        });
                    }
                    b"mesh" => {
                        if let Some(obj) = open.as_mut() {
                            obj.has_mesh = true;
                        }
                    }
                    b"vertex" => {
                        if let Some(obj) = open.as_mut() {
                            obj.positions.push(Vec3::new(
                                required_f32(&e, b"x")?,
                                required_f32(&e, b"y")?,
                                required_f32(&e, b"z")?,
                            ));
                        }
                    }
                    b"triangle" => {
                        if let Some(obj) = open.as_mut() {
                            obj.indices.extend_from_slice(&[
                                required_u32(&e, b"v1")?,
                                required_u32(&e, b"v2")?,
                                required_u32(&e, b"v3")?,
                            ]);
                        }
                    }
                    b"component" => {
                        if let Some(obj) = open.as_mut() {
                            let child = required_u32(&e, b"objectid")?;
                            obj.components.push((child, parse_transform(&e)?));
                        }
                    }
                    b"item" => {
                        let id = required_u32(&e, b"objectid")?;
                        doc.build.push((id, parse_transform(&e)?));
                    }
                    _ => {}
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"basematerials" => open_group = None,
                b"object" => {
                    if let Some(obj) = open.take() {
                        let (id, def) = close_object(obj)?;
                        doc.objects.insert(id, def);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(obj) = open.take() {
        let (id, def) = close_object(obj)?;
        doc.objects.insert(id, def);
    }

    Ok(doc)
}

fn close_object(obj: OpenObject) -> Result<(u32, ObjectDef)> {
    let vertex_count = obj.positions.len() as u32;
    if let Some(bad) = obj.indices.iter().find(|&&i| i >= vertex_count) {
        return Err(Error::Decode(format!(
            "3MF object {} references vertex {} of {}",
            obj.id, bad, vertex_count
        )));
    }
    let mesh = if obj.has_mesh && !obj.indices.is_empty() {
        let mut prim = MeshPrimitive::new(obj.positions, obj.indices);
        if let Some(material) = obj.material {
            prim.material = material;
        }
        Some(prim)
    } else {
        None
    };
    Ok((obj.id, ObjectDef { mesh, components: obj.components }))
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| std::str::from_utf8(&a.value).ok().map(str::to_string))
}

fn optional_u32(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<u32>> {
    attr(e, name)
        .map(|v| {
            v.trim().parse::<u32>().map_err(|_| {
                Error::Decode(format!("bad integer '{}' in {}", v, String::from_utf8_lossy(name)))
            })
        })
        .transpose()
}

fn required_u32(e: &BytesStart<'_>, name: &[u8]) -> Result<u32> {
    optional_u32(e, name)?.ok_or_else(|| missing(e, name))
}

fn required_f32(e: &BytesStart<'_>, name: &[u8]) -> Result<f32> {
    let v = attr(e, name).ok_or_else(|| missing(e, name))?;
    v.trim()
        .parse::<f32>()
        .map_err(|_| Error::Decode(format!("bad number '{}' in {}", v, String::from_utf8_lossy(name))))
}

fn missing(e: &BytesStart<'_>, name: &[u8]) -> Error {
    Error::Decode(format!(
        "<{}> is missing attribute {}",
        String::from_utf8_lossy(e.local_name().as_ref()),
        String::from_utf8_lossy(name)
    ))
}

/// 3MF transforms are 12 numbers: a 3x3 matrix in row-vector convention
/// followed by the translation
fn parse_transform(e: &BytesStart<'_>) -> Result<Mat4> {
    let Some(text) = attr(e, b"transform") else {
        return Ok(Mat4::IDENTITY);
    };
    let values: Vec<f32> = text
        .split_whitespace()
        .map(|t| t.parse::<f32>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| Error::Decode(format!("bad transform '{}'", text)))?;
    if values.len() != 12 {
        return Err(Error::Decode(format!("transform has {} values, expected 12", values.len())));
    }
    let m = |i: usize| values[i];
    Ok(Mat4::from_cols(
        Vec4::new(m(0), m(1), m(2), 0.0),
        Vec4::new(m(3), m(4), m(5), 0.0),
        Vec4::new(m(6), m(7), m(8), 0.0),
        Vec4::new(m(9), m(10), m(11), 1.0),
    ))
}

/// `#RRGGBB` or `#RRGGBBAA`
fn parse_color(text: &str) -> Option<Vec3> {
    let hex = text.trim().strip_prefix('#')?;
    if (hex.len() != 6 && hex.len() != 8) || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let value = u32::from_str_radix(hex.get(..6)?, 16).ok()?;
    Some(crate::core::types::rgb(value))
}
