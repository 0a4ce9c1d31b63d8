//! Scene content types
//!
//! Lights, materials, mesh primitives, and the normalized display object a
//! preview renders.

use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat4, Quat, Vec3};

use crate::core::types::rgb;
use crate::math::Aabb;

/// Neutral gray applied to meshes without usable materials
pub const NEUTRAL_GRAY: u32 = 0xcccccc;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Local transform relative to the scene origin.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: 1.0,
        }
    }
}

impl LocalTransform {
    /// Identity transform (no translation, rotation, or scaling).
    pub fn identity() -> Self {
        Self::default()
    }

    /// Convert to a 4x4 matrix.
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            self.rotation,
            self.position,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightKind {
    Ambient,
    /// Light arriving from `position` towards the origin
    Directional { position: Vec3 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightDescriptor {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
}

impl LightDescriptor {
    pub fn ambient(hex: u32, intensity: f32) -> Self {
        Self { kind: LightKind::Ambient, color: rgb(hex), intensity }
    }

    pub fn directional(hex: u32, intensity: f32, position: Vec3) -> Self {
        Self { kind: LightKind::Directional { position }, color: rgb(hex), intensity }
    }
}

/// Surface appearance of a primitive
#[derive(Clone, Debug, PartialEq)]
pub enum Material {
    /// Flat shaded color
    Phong { color: Vec3 },
    /// Reference into a material library that was not fetched
    Unresolved { name: String },
}

impl Material {
    pub fn neutral() -> Self {
        Material::Phong { color: rgb(NEUTRAL_GRAY) }
    }

    /// Color used when drawing; unresolved references draw black
    pub fn base_color(&self) -> Vec3 {
        match self {
            Material::Phong { color } => *color,
            Material::Unresolved { .. } => Vec3::ZERO,
        }
    }
}

/// Indexed triangle mesh
#[derive(Clone, Debug, PartialEq)]
pub struct MeshPrimitive {
    pub positions: Vec<Vec3>,
    /// Per-vertex normals, same length as `positions` or empty
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub material: Material,
}

impl MeshPrimitive {
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            normals: Vec::new(),
            indices,
            material: Material::neutral(),
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.positions.iter().copied())
    }

    /// Shift every vertex by `offset`
    pub fn translate(&mut self, offset: Vec3) {
        for p in &mut self.positions {
            *p += offset;
        }
    }

    /// Fill `normals` with area-weighted vertex normals when missing
    pub fn ensure_normals(&mut self) {
        if self.normals.len() == self.positions.len() {
            return;
        }
        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            if a >= normals.len() || b >= normals.len() || c >= normals.len() {
                continue;
            }
            let n = (self.positions[b] - self.positions[a]).cross(self.positions[c] - self.positions[a]);
            normals[a] += n;
            normals[b] += n;
            normals[c] += n;
        }
        self.normals = normals.into_iter().map(|n| n.normalize_or(Vec3::Y)).collect();
    }
}

/// Combined bounds of all primitives
pub fn combined_bounds(primitives: &[MeshPrimitive]) -> Option<Aabb> {
    primitives
        .iter()
        .filter_map(MeshPrimitive::bounds)
        .reduce(|a, b| a.merged(&b))
}

/// Normalized geometry ready for display
///
/// Geometry is stored centered at the origin in source units; `transform`
/// carries the uniform scale, the Z-up to Y-up reorientation, and the lift
/// onto the ground plane.
#[derive(Clone, Debug)]
pub struct DisplayObject {
    id: u64,
    pub primitives: Vec<MeshPrimitive>,
    pub transform: LocalTransform,
    /// Extra rotation about the object's own vertical axis (card spin)
    pub spin: f32,
}

impl DisplayObject {
    pub fn new(primitives: Vec<MeshPrimitive>, transform: LocalTransform) -> Self {
        Self {
            id: NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
            primitives,
            transform,
            spin: 0.0,
        }
    }

    /// Process-unique identity, used by renderers to cache uploads
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Object-to-world matrix including spin
    pub fn world_matrix(&self) -> Mat4 {
        let rotation = self.transform.rotation * Quat::from_rotation_z(self.spin);
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.transform.scale),
            rotation,
            self.transform.position,
        )
    }

    /// Bounds of the untransformed (centered) geometry
    pub fn local_bounds(&self) -> Option<Aabb> {
        combined_bounds(&self.primitives)
    }

    /// Exact world-space bounds of every transformed vertex
    pub fn world_bounds(&self) -> Option<Aabb> {
        let m = self.world_matrix();
        Aabb::from_points(
            self.primitives
                .iter()
                .flat_map(|p| p.positions.iter().map(move |v| m.transform_point3(*v))),
        )
    }

    pub fn vertex_count(&self) -> usize {
        self.primitives.iter().map(|p| p.positions.len()).sum()
    }
}

/// Flat grid on the ground plane
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridHelper {
    pub size: f32,
    pub divisions: u32,
    pub center_color: Vec3,
    pub line_color: Vec3,
}

/// RGB axis indicator at the origin
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxesHelper {
    pub size: f32,
}

/// Orientation aids shown under detail previews
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundAids {
    pub grid: GridHelper,
    pub axes: AxesHelper,
}

/// Everything one preview draws
#[derive(Clone, Debug)]
pub struct SceneHandle {
    pub background: Vec3,
    pub lights: Vec<LightDescriptor>,
    pub display_object: Option<DisplayObject>,
    pub ground_aids: Option<GroundAids>,
}
