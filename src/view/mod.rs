//! Views over the library and the actions they offer

pub mod controller;
pub mod state;

pub use controller::{encode_uri_component, slicer_links, ViewController};
pub use state::{
    CollectionEntry, DashboardStats, FileEntry, LibraryEntry, ModelCard, SlicerLink, View, ViewState,
};
