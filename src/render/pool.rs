//! Shared render context pool
//!
//! At most one context is live at a time. Releasing a container only stops
//! its session; the context survives until `dispose_all`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::animation::{AnimationSession, FrameLoop, SessionTable};
use crate::core::error::Error;
use crate::core::types::Result;
use crate::host::ContainerId;
use crate::render::context::{ContextFactory, SharedContext};

pub struct RendererPool {
    factory: Box<dyn ContextFactory>,
    shared: Option<SharedContext>,
    frames: FrameLoop,
    sessions: SessionTable,
    contexts_created: usize,
}

/// Pool handle shared by the preview service and the view
pub type SharedPool = Rc<RefCell<RendererPool>>;

impl RendererPool {
    pub fn new(factory: Box<dyn ContextFactory>, frames: FrameLoop) -> Self {
        Self {
            factory,
            shared: None,
            frames,
            sessions: SessionTable::new(),
            contexts_created: 0,
        }
    }

    pub fn shared(factory: Box<dyn ContextFactory>, frames: FrameLoop) -> SharedPool {
        Rc::new(RefCell::new(Self::new(factory, frames)))
    }

    /// The shared context, created on first use
    pub fn acquire(&mut self) -> Result<SharedContext> {
        if let Some(context) = &self.shared {
            return Ok(context.clone());
        }
        let context = self.factory.create().map_err(|e| match e {
            Error::RenderContextUnavailable(_) => e,
            other => Error::RenderContextUnavailable(other.to_string()),
        })?;
        self.contexts_created += 1;
        log::info!("Created shared render context ({} so far)", self.contexts_created);
        let context = Rc::new(RefCell::new(context));
        self.shared = Some(context.clone());
        Ok(context)
    }

    /// Start drawing into `container`, stopping its previous session first
    pub fn start_session<F>(&mut self, container: ContainerId, draw: F) -> AnimationSession
    where
        F: FnMut() -> Result<()> + 'static,
    {
        self.sessions.start(&self.frames, container, draw)
    }

    /// Stop the session bound to `container`. The context stays alive.
    pub fn release(&mut self, container: ContainerId) -> bool {
        self.sessions.stop(&self.frames, container)
    }

    pub fn release_all(&mut self) -> usize {
        self.sessions.stop_all(&self.frames)
    }

    /// Tear down the shared context. Sessions still running will fail their
    /// next draw with `DisposedContext`.
    pub fn dispose_all(&mut self) {
        let running = self.sessions.running();
        if running > 0 {
            log::warn!("Disposing render context with {} sessions still running", running);
        }
        if let Some(context) = self.shared.take() {
            context.borrow_mut().dispose();
            log::info!("Disposed shared render context");
        }
    }

    pub fn session(&self, container: ContainerId) -> Option<&AnimationSession> {
        self.sessions.get(container)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.running()
    }

    pub fn has_context(&self) -> bool {
        self.shared.is_some()
    }

    pub fn contexts_created(&self) -> usize {
        self.contexts_created
    }

    pub fn capability_available(&self) -> bool {
        self.shared.is_some() || self.factory.is_available()
    }

    pub fn frames(&self) -> &FrameLoop {
        &self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::camera::Camera;
    use crate::render::context::RenderContext;
    use crate::scene::SceneHandle;
    use image::RgbaImage;

    struct BlankContext {
        frame: RgbaImage,
        disposed: bool,
    }

    impl RenderContext for BlankContext {
        fn resize(&mut self, width: u32, height: u32) {
            if width > 0 && height > 0 {
                self.frame = RgbaImage::new(width, height);
            }
        }
        fn size(&self) -> (u32, u32) {
            self.frame.dimensions()
        }
        fn render(&mut self, _scene: &SceneHandle, _camera: &Camera) -> Result<()> {
            if self.disposed {
                return Err(Error::DisposedContext);
            }
            Ok(())
        }
        fn frame(&self) -> Result<&RgbaImage> {
            Ok(&self.frame)
        }
        fn dispose(&mut self) {
            self.disposed = true;
        }
        fn is_disposed(&self) -> bool {
            self.disposed
        }
    }

    struct BlankFactory {
        available: bool,
    }

    impl ContextFactory for BlankFactory {
        fn create(&self) -> Result<Box<dyn RenderContext>> {
            if !self.available {
                return Err(Error::RenderContextUnavailable("no adapter".into()));
            }
            Ok(Box::new(BlankContext { frame: RgbaImage::new(1, 1), disposed: false }))
        }
        fn is_available(&self) -> bool {
            self.available
        }
    }

    fn pool(available: bool) -> RendererPool {
        RendererPool::new(Box::new(BlankFactory { available }), FrameLoop::new())
    }

    #[test]
    fn test_acquire_shares_one_context() {
        let mut pool = pool(true);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(pool.contexts_created(), 1);
    }

    #[test]
    fn test_release_keeps_context() {
        let mut pool = pool(true);
        let a = pool.acquire().unwrap();
        pool.start_session(ContainerId(1), || Ok(()));
        assert!(pool.release(ContainerId(1)));
        assert!(!pool.release(ContainerId(1)));
        let b = pool.acquire().unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert!(!b.borrow().is_disposed());
    }

    #[test]
    fn test_dispose_then_acquire_creates_new() {
        let mut pool = pool(true);
        let a = pool.acquire().unwrap();
        pool.dispose_all();
        assert!(a.borrow().is_disposed());
        let b = pool.acquire().unwrap();
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(pool.contexts_created(), 2);
    }

    #[test]
    fn test_draw_after_dispose_stops_session() {
        let mut pool = pool(true);
        let context = pool.acquire().unwrap();
        let scene = crate::scene::builder::build_scene();
        let camera = Camera::default();
        let session = pool.start_session(ContainerId(3), move || context.borrow_mut().render(&scene, &camera));
        pool.frames().tick();
        assert!(session.is_running());

        pool.dispose_all();
        pool.frames().tick();
        assert!(!session.is_running());
        assert_eq!(pool.active_sessions(), 0);
    }

    #[test]
    fn test_unavailable() {
        let mut pool = pool(false);
        assert!(!pool.capability_available());
        assert!(matches!(pool.acquire(), Err(Error::RenderContextUnavailable(_))));
        assert!(!pool.has_context());
    }
}
