//! Mathematical utilities and data structures

pub mod aabb;
pub mod rect;

pub use aabb::Aabb;
pub use rect::Rect;
