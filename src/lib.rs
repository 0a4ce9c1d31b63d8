//! Shelfview - preview loading and renderer lifecycle for a 3D-model library browser

pub mod core;
pub mod math;
pub mod scene;
pub mod loader;
pub mod render;
pub mod animation;
pub mod host;
pub mod visibility;
pub mod preview;
pub mod view;
