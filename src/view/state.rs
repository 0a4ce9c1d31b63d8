//! What each view shows

use crate::host::ContainerId;
use crate::preview::classify::FileKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum View {
    Dashboard,
    Models,
    Libraries,
    Collections,
    ModelDetail(i64),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub models: usize,
    pub libraries: usize,
    pub collections: usize,
    pub tags: usize,
}

/// One model card with its preview container
#[derive(Clone, Debug, PartialEq)]
pub struct ModelCard {
    pub model_id: i64,
    pub name: String,
    pub description: String,
    pub library: String,
    pub created: String,
    pub container: ContainerId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LibraryEntry {
    pub id: i64,
    pub name: String,
    pub path: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionEntry {
    pub id: i64,
    pub name: String,
    pub description: String,
}

/// Deep link opening a file in a desktop slicer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlicerLink {
    pub name: &'static str,
    pub url: String,
}

/// One file row of the model detail view
#[derive(Clone, Debug, PartialEq)]
pub struct FileEntry {
    pub file_id: i64,
    pub filename: String,
    pub kind: FileKind,
    pub byte_size: u64,
    pub size_label: String,
    pub download_url: String,
    pub is_preview: bool,
    /// Offered for previewable files that are not the preview yet
    pub can_set_preview: bool,
    pub slicer_links: Vec<SlicerLink>,
    /// Preview container, for meshes and images only
    pub container: Option<ContainerId>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ViewState {
    Dashboard { stats: DashboardStats, recent: Vec<ModelCard> },
    Models { cards: Vec<ModelCard> },
    Libraries { libraries: Vec<LibraryEntry> },
    Collections { collections: Vec<CollectionEntry> },
    ModelDetail { model_id: i64, name: String, files: Vec<FileEntry> },
}
