//! Wavefront OBJ decoding

use ahash::AHashMap;
use glam::Vec3;

use crate::core::error::Error;
use crate::core::types::Result;
use crate::loader::FormatDecoder;
use crate::scene::node::{Material, MeshPrimitive};

#[derive(Clone, Copy, Debug, Default)]
pub struct ObjDecoder;

impl FormatDecoder for ObjDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<MeshPrimitive>> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::Decode(format!("OBJ file is not valid UTF-8: {}", e)))?;

        // Material libraries are never fetched
        let (models, _materials) = tobj::load_obj_buf(
            &mut std::io::Cursor::new(text),
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
            |_| Ok((Vec::new(), AHashMap::new())),
        )
        .map_err(|e| Error::Decode(format!("failed to parse OBJ: {}", e)))?;

        let material_names = usemtl_names(text);

        let primitives: Vec<MeshPrimitive> = models
            .into_iter()
            .filter(|m| !m.mesh.positions.is_empty() && !m.mesh.indices.is_empty())
            .map(|model| {
                let mesh = model.mesh;
                let positions: Vec<Vec3> = mesh
                    .positions
                    .chunks_exact(3)
                    .map(|v| Vec3::new(v[0], v[1], v[2]))
                    .collect();
                let normals = if mesh.normals.len() == mesh.positions.len() {
                    mesh.normals
                        .chunks_exact(3)
                        .map(|n| Vec3::new(n[0], n[1], n[2]).normalize_or(Vec3::Y))
                        .collect()
                } else {
                    Vec::new()
                };
                let mut prim = MeshPrimitive::new(positions, mesh.indices);
                prim.normals = normals;
                prim.material = match material_names.first() {
                    Some(name) => Material::Unresolved { name: name.clone() },
                    None => Material::Unresolved { name: model.name },
                };
                prim
            })
            .collect();

        if primitives.is_empty() {
            return Err(Error::Decode("OBJ contains no faces".into()));
        }
        Ok(primitives)
    }

    /// Embedded material references cannot be resolved; every primitive
    /// gets the neutral gray instead
    fn finish(&self, primitives: &mut [MeshPrimitive]) {
        for prim in primitives {
            prim.material = Material::neutral();
        }
    }
}

fn usemtl_names(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.trim_start().strip_prefix("usemtl"))
        .map(|rest| rest.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}
