//! Preview loading: classification, data source, and the load entry points

pub mod classify;
pub mod frame;
pub mod request;
pub mod service;
pub mod source;

pub use classify::{is_3d_file, is_image_file, manual_trigger_label, select_preview_file, FileKind};
pub use frame::{Motion, PreviewFrame};
pub use request::{PreviewRequest, SizeClass};
pub use service::PreviewService;
pub use source::LibrarySource;
