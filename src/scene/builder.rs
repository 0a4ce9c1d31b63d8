//! Fresh scenes for individual previews

use glam::Vec3;

use crate::core::types::rgb;
use crate::scene::node::{AxesHelper, GridHelper, GroundAids, LightDescriptor, SceneHandle};

/// Background behind every preview
pub const BACKGROUND: u32 = 0x0f0f23;

/// Build an empty preview scene: background plus one ambient and one
/// directional light
pub fn build_scene() -> SceneHandle {
    SceneHandle {
        background: rgb(BACKGROUND),
        lights: vec![
            LightDescriptor::ambient(0xffffff, 0.6),
            LightDescriptor::directional(0xffffff, 0.8, Vec3::new(1.0, 1.0, 1.0)),
        ],
        display_object: None,
        ground_aids: None,
    }
}

/// Grid and axes shown under detail previews
pub fn build_detail_aids() -> GroundAids {
    GroundAids {
        grid: GridHelper {
            size: 100.0,
            divisions: 20,
            center_color: rgb(0x444444),
            line_color: rgb(0x222222),
        },
        axes: AxesHelper { size: 30.0 },
    }
}
