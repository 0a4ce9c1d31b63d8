//! Frame scheduling and per-container render loops

pub mod frame_loop;
pub mod session;

pub use frame_loop::{FrameHandle, FrameLoop};
pub use session::{AnimationSession, SessionState, SessionTable};
