//! Preview scenes: lights, materials, and normalized display objects

pub mod builder;
pub mod node;

pub use builder::{build_detail_aids, build_scene};
pub use node::{
    DisplayObject, GroundAids, LightDescriptor, LightKind, LocalTransform, Material,
    MeshPrimitive, SceneHandle,
};
