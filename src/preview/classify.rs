//! File classification and preview selection

use shelfview_api::{Model, ModelFile};

use crate::loader::MeshFormat;

/// What kind of preview a file can have
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileKind {
    Mesh(MeshFormat),
    Image,
    Other,
}

impl FileKind {
    /// Classify by the extension after the last dot, any case
    pub fn of(filename: &str) -> Self {
        let Some((_, ext)) = filename.rsplit_once('.') else {
            return FileKind::Other;
        };
        if let Some(format) = MeshFormat::from_extension(ext) {
            return FileKind::Mesh(format);
        }
        match ext.to_ascii_lowercase().as_str() {
            "png" | "jpg" | "jpeg" => FileKind::Image,
            _ => FileKind::Other,
        }
    }

    pub fn is_previewable(self) -> bool {
        !matches!(self, FileKind::Other)
    }
}

pub fn is_3d_file(filename: &str) -> bool {
    matches!(FileKind::of(filename), FileKind::Mesh(_))
}

pub fn is_image_file(filename: &str) -> bool {
    FileKind::of(filename) == FileKind::Image
}

/// The file a model card previews: the model's chosen preview file when it
/// is among `files`, otherwise the first mesh or image.
pub fn select_preview_file<'a>(model: &Model, files: &'a [ModelFile]) -> Option<&'a ModelFile> {
    if let Some(preview_id) = model.preview_file_id {
        if let Some(file) = files.iter().find(|f| f.id == preview_id) {
            return Some(file);
        }
    }
    files.iter().find(|f| FileKind::of(&f.filename).is_previewable())
}

/// Size in megabytes with one decimal, as shown on manual triggers
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.1}", bytes as f64 / 1024.0 / 1024.0)
}

pub fn manual_trigger_label(bytes: u64) -> String {
    format!("Load 3D Preview ({} MB)", format_megabytes(bytes))
}

/// Size in kilobytes with one decimal, as listed in model details
pub fn format_kilobytes(bytes: u64) -> String {
    format!("{:.1} KB", bytes as f64 / 1024.0)
}
