//! Centering, uniform scaling, and reorientation of decoded geometry

use std::f32::consts::FRAC_PI_2;

use glam::{Quat, Vec3};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::scene::node::{combined_bounds, DisplayObject, LocalTransform, MeshPrimitive};

/// Rotation about X that maps source Z-up onto viewer Y-up
pub const Z_UP_TO_Y_UP: f32 = -FRAC_PI_2;

/// Turn decoded primitives into a display object whose largest dimension is
/// `target_size`, centered horizontally and resting on the ground plane.
pub fn normalize(mut primitives: Vec<MeshPrimitive>, target_size: f32) -> Result<DisplayObject> {
    if !(target_size > 0.0 && target_size.is_finite()) {
        return Err(Error::DegenerateGeometry(format!("invalid target size {}", target_size)));
    }

    // f32::min/max skip NaN, so the box alone would hide bad vertices
    if primitives.iter().any(|p| p.positions.iter().any(|v| !v.is_finite())) {
        return Err(Error::DegenerateGeometry("non-finite vertex coordinates".into()));
    }

    let bounds = combined_bounds(&primitives)
        .ok_or_else(|| Error::DegenerateGeometry("no vertices".into()))?;
    if !bounds.is_finite() {
        return Err(Error::DegenerateGeometry("non-finite vertex coordinates".into()));
    }

    // Translation must happen before scale
    let center = bounds.center();
    for prim in &mut primitives {
        prim.translate(-center);
    }

    let bounds = combined_bounds(&primitives)
        .ok_or_else(|| Error::DegenerateGeometry("no vertices".into()))?;
    let size = bounds.size();
    let max_dim = size.max_element();
    if !(max_dim > 0.0 && max_dim.is_finite()) {
        return Err(Error::DegenerateGeometry(format!("bounding box max dimension is {}", max_dim)));
    }

    let scale = target_size / max_dim;
    if !(scale > 0.0 && scale.is_finite()) {
        return Err(Error::DegenerateGeometry(format!("scale factor {} is not usable", scale)));
    }

    // Source Z becomes vertical after the rotation; lift by half of it
    let rest_height = size.z * scale * 0.5;

    for prim in &mut primitives {
        prim.ensure_normals();
    }

    Ok(DisplayObject::new(
        primitives,
        LocalTransform {
            position: Vec3::new(0.0, rest_height, 0.0),
            rotation: Quat::from_rotation_x(Z_UP_TO_Y_UP),
            scale,
        },
    ))
}
