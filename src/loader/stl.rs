//! STL decoding (binary and ASCII)

use glam::Vec3;

use crate::core::error::Error;
use crate::core::types::Result;
use crate::loader::FormatDecoder;
use crate::scene::node::MeshPrimitive;

const HEADER_LEN: usize = 80;
const TRIANGLE_LEN: usize = 50;

#[derive(Clone, Copy, Debug, Default)]
pub struct StlDecoder;

impl FormatDecoder for StlDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<MeshPrimitive>> {
        let prim = if is_binary(bytes) {
            decode_binary(bytes)?
        } else if bytes.trim_ascii_start().starts_with(b"solid") {
            decode_ascii(bytes)?
        } else {
            return Err(Error::Decode("not a binary or ASCII STL file".into()));
        };
        if prim.positions.is_empty() {
            return Err(Error::Decode("STL contains no triangles".into()));
        }
        Ok(vec![prim])
    }
}

/// Binary files announce their triangle count; the size must match it.
/// Some exporters write "solid" into binary headers, so the size check wins.
fn is_binary(bytes: &[u8]) -> bool {
    if bytes.len() < HEADER_LEN + 4 {
        return false;
    }
    let count = read_u32(bytes, HEADER_LEN) as usize;
    count
        .checked_mul(TRIANGLE_LEN)
        .and_then(|n| n.checked_add(HEADER_LEN + 4))
        == Some(bytes.len())
}

fn decode_binary(bytes: &[u8]) -> Result<MeshPrimitive> {
    let count = read_u32(bytes, HEADER_LEN) as usize;
    let mut positions = Vec::with_capacity(count * 3);
    let mut normals = Vec::with_capacity(count * 3);

    for tri in bytes[HEADER_LEN + 4..].chunks_exact(TRIANGLE_LEN) {
        let normal = read_vec3(tri, 0);
        let a = read_vec3(tri, 12);
        let b = read_vec3(tri, 24);
        let c = read_vec3(tri, 36);
        let n = face_normal(normal, a, b, c);
        positions.extend_from_slice(&[a, b, c]);
        normals.extend_from_slice(&[n, n, n]);
    }

    Ok(flat_primitive(positions, normals))
}

fn decode_ascii(bytes: &[u8]) -> Result<MeshPrimitive> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::Decode(format!("ASCII STL is not valid UTF-8: {}", e)))?;

    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut facet_normal = Vec3::ZERO;
    let mut facet: Vec<Vec3> = Vec::with_capacity(3);

    for (line_no, line) in text.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("facet") => {
                facet.clear();
                facet_normal = match tokens.next() {
                    Some("normal") => parse_vec3(&mut tokens, line_no)?,
                    _ => Vec3::ZERO,
                };
            }
            Some("vertex") => {
                facet.push(parse_vec3(&mut tokens, line_no)?);
            }
            Some("endfacet") => {
                if facet.len() != 3 {
                    return Err(Error::Decode(format!(
                        "facet ending on line {} has {} vertices",
                        line_no + 1,
                        facet.len()
                    )));
                }
                let n = face_normal(facet_normal, facet[0], facet[1], facet[2]);
                positions.extend_from_slice(&facet);
                normals.extend_from_slice(&[n, n, n]);
                facet.clear();
            }
            _ => {}
        }
    }

    Ok(flat_primitive(positions, normals))
}

fn flat_primitive(positions: Vec<Vec3>, normals: Vec<Vec3>) -> MeshPrimitive {
    let indices = (0..positions.len() as u32).collect();
    let mut prim = MeshPrimitive::new(positions, indices);
    prim.normals = normals;
    prim
}

/// Stored normals are often zero; fall back to the winding normal
fn face_normal(stored: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    if stored.length_squared() > 1e-12 && stored.is_finite() {
        return stored.normalize();
    }
    (b - a).cross(c - a).normalize_or(Vec3::Y)
}

fn parse_vec3<'a>(tokens: &mut impl Iterator<Item = &'a str>, line_no: usize) -> Result<Vec3> {
    let mut v = [0.0f32; 3];
    for slot in &mut v {
        let token = tokens
            .next()
            .ok_or_else(|| Error::Decode(format!("missing coordinate on line {}", line_no + 1)))?;
        *slot = token
            .parse()
            .map_err(|_| Error::Decode(format!("bad number '{}' on line {}", token, line_no + 1)))?;
    }
    Ok(Vec3::from_array(v))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    f32::from_bits(read_u32(bytes, offset))
}

fn read_vec3(bytes: &[u8], offset: usize) -> Vec3 {
    Vec3::new(
        read_f32(bytes, offset),
        read_f32(bytes, offset + 4),
        read_f32(bytes, offset + 8),
    )
}

/// Encode triangles as a binary STL (used by tests and benches)
pub fn encode_binary(triangles: &[[Vec3; 3]]) -> Vec<u8> {
    let mut out = vec![0u8; HEADER_LEN];
    out.extend_from_slice(&(triangles.len() as u32).to_le_bytes());
    for tri in triangles {
        let n = (tri[1] - tri[0]).cross(tri[2] - tri[0]).normalize_or_zero();
        for v in std::iter::once(n).chain(tri.iter().copied()) {
            for c in v.to_array() {
                out.extend_from_slice(&c.to_le_bytes());
            }
        }
        out.extend_from_slice(&0u16.to_le_bytes());
    }
    out
}
