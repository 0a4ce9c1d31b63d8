//! Render contexts and the shared pool

pub mod context;
pub mod gpu;
pub mod pool;

pub use context::{ContextFactory, RenderContext, SharedContext};
pub use gpu::{GpuContextFactory, GpuRenderContext};
pub use pool::{RendererPool, SharedPool};
