//! Mesh format loading
//!
//! Each supported format decodes raw bytes into mesh primitives; the shared
//! normalization pass turns them into a display object that is centered,
//! uniformly scaled, reoriented to Y-up, and resting on the ground plane.

pub mod normalize;
pub mod obj;
pub mod stl;
pub mod threemf;

pub use normalize::normalize;
pub use obj::ObjDecoder;
pub use stl::StlDecoder;
pub use threemf::ThreeMfDecoder;

use glam::Vec3;

use crate::core::camera::OrbitControls;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::scene::node::{DisplayObject, MeshPrimitive, SceneHandle};

/// Format-specific decoder
pub trait FormatDecoder {
    /// Parse raw bytes into one or more mesh primitives
    fn decode(&self, bytes: &[u8]) -> Result<Vec<MeshPrimitive>>;

    /// Per-format fixups applied after decoding
    fn finish(&self, _primitives: &mut [MeshPrimitive]) {}
}

/// Supported mesh file formats
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeshFormat {
    Stl,
    Obj,
    ThreeMf,
}

impl MeshFormat {
    /// Match a file extension (without the dot, any case)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "stl" => Some(MeshFormat::Stl),
            "obj" => Some(MeshFormat::Obj),
            "3mf" => Some(MeshFormat::ThreeMf),
            _ => None,
        }
    }

    /// Match the extension of a file name
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    pub fn extension(self) -> &'static str {
        match self {
            MeshFormat::Stl => "stl",
            MeshFormat::Obj => "obj",
            MeshFormat::ThreeMf => "3mf",
        }
    }

    pub fn decoder(self) -> &'static dyn FormatDecoder {
        match self {
            MeshFormat::Stl => &StlDecoder,
            MeshFormat::Obj => &ObjDecoder,
            MeshFormat::ThreeMf => &ThreeMfDecoder,
        }
    }
}

impl std::fmt::Display for MeshFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for MeshFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s).ok_or_else(|| Error::UnsupportedFormat(s.to_string()))
    }
}

/// Decode and normalize without touching a scene
pub fn decode_and_normalize(format: MeshFormat, bytes: &[u8], target_size: f32) -> Result<DisplayObject> {
    let decoder = format.decoder();
    let mut primitives = decoder.decode(bytes)?;
    decoder.finish(&mut primitives);
    let object = normalize(primitives, target_size)?;
    log::debug!(
        "Loaded {} mesh: {} primitives, {} vertices, scale {:.4}",
        format,
        object.primitives.len(),
        object.vertex_count(),
        object.transform.scale
    );
    Ok(object)
}

/// Load a mesh into `scene`, replacing any previous display object.
///
/// When `controls` is given its target moves to the object's resting center.
/// On error the scene is left untouched.
pub fn load(
    format: MeshFormat,
    bytes: &[u8],
    target_size: f32,
    scene: &mut SceneHandle,
    controls: Option<&mut OrbitControls>,
) -> Result<()> {
    let object = decode_and_normalize(format, bytes, target_size)?;
    if let Some(controls) = controls {
        controls.target = Vec3::new(0.0, object.transform.position.y, 0.0);
    }
    scene.display_object = Some(object);
    Ok(())
}
