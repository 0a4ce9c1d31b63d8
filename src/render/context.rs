//! Render context abstraction
//!
//! A render context draws a scene through a camera into an offscreen frame
//! that sessions copy into their own container. Contexts are expensive, so
//! one is shared by every session through the renderer pool.

use std::cell::RefCell;
use std::rc::Rc;

use image::RgbaImage;

use crate::core::camera::Camera;
use crate::core::types::Result;
use crate::scene::SceneHandle;

/// Drawing surface capability
pub trait RenderContext {
    /// Resize the drawing surface. Zero dimensions are ignored.
    fn resize(&mut self, width: u32, height: u32);

    fn size(&self) -> (u32, u32);

    /// Draw `scene` into the frame. Fails with `DisposedContext` after
    /// `dispose`.
    fn render(&mut self, scene: &SceneHandle, camera: &Camera) -> Result<()>;

    /// The most recently rendered frame
    fn frame(&self) -> Result<&RgbaImage>;

    /// Drop anything cached for a display object that will not be drawn
    /// again
    fn evict(&mut self, _object_id: u64) {}

    /// Release GPU resources. Later draws fail.
    fn dispose(&mut self);

    fn is_disposed(&self) -> bool;
}

/// Constructs render contexts for the pool
pub trait ContextFactory {
    /// Fails with `RenderContextUnavailable` when the host cannot render
    fn create(&self) -> Result<Box<dyn RenderContext>>;

    /// Whether creating a context can currently succeed
    fn is_available(&self) -> bool {
        true
    }
}

/// A context shared between the pool and running sessions
pub type SharedContext = Rc<RefCell<Box<dyn RenderContext>>>;
