//! The per-tick draw step of a 3D preview

use crate::core::camera::{Camera, OrbitControls};
use crate::core::types::Result;
use crate::host::{ContainerId, SharedContainers};
use crate::render::SharedContext;
use crate::scene::SceneHandle;

/// Time-based motion applied before each draw
#[derive(Clone, Debug)]
pub enum Motion {
    /// Rotate the object by this many radians per frame
    Spin(f32),
    /// Damped orbit around a target
    Orbit(OrbitControls),
}

/// Everything one running preview needs to draw a frame.
///
/// The scene is owned here and dropped when the session stops.
pub struct PreviewFrame {
    pub container: ContainerId,
    pub scene: SceneHandle,
    pub camera: Camera,
    pub motion: Motion,
    context: SharedContext,
    containers: SharedContainers,
}

impl PreviewFrame {
    pub fn new(
        container: ContainerId,
        scene: SceneHandle,
        camera: Camera,
        motion: Motion,
        context: SharedContext,
        containers: SharedContainers,
    ) -> Self {
        Self { container, scene, camera, motion, context, containers }
    }

    /// Advance motion, render through the shared context, and blit the
    /// result into the container within the same tick
    pub fn draw(&mut self) -> Result<()> {
        match &mut self.motion {
            Motion::Spin(step) => {
                if let Some(object) = self.scene.display_object.as_mut() {
                    object.spin += *step;
                }
            }
            Motion::Orbit(controls) => controls.update(&mut self.camera),
        }

        let (width, height) = self.containers.borrow().pixel_size(self.container)?;
        self.camera.set_aspect(width as f32, height as f32);

        let mut context = self.context.borrow_mut();
        context.resize(width, height);
        context.render(&self.scene, &self.camera)?;
        let frame = context.frame()?;
        self.containers.borrow_mut().blit(self.container, frame)
    }
}

impl Drop for PreviewFrame {
    fn drop(&mut self) {
        let Some(object) = &self.scene.display_object else {
            return;
        };
        match self.context.try_borrow_mut() {
            Ok(mut context) => context.evict(object.id()),
            Err(_) => log::warn!("Render context busy; object {} stays cached", object.id()),
        }
    }
}
