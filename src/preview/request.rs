//! Preview requests

use crate::host::{ContainerId, ImageFit};
use crate::preview::classify::FileKind;

/// Card (small, rotating, list context) or detail (large, orbit-controlled)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SizeClass {
    Card,
    Detail,
}

impl SizeClass {
    pub fn image_fit(self) -> ImageFit {
        match self {
            SizeClass::Card => ImageFit::Cover,
            SizeClass::Detail => ImageFit::Contain,
        }
    }
}

/// One preview to produce for one container. Consumed once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreviewRequest {
    pub file_id: i64,
    pub container: ContainerId,
    pub size_class: SizeClass,
    pub format_hint: FileKind,
}
