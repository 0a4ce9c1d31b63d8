//! View switching and user actions
//!
//! Switching views stops every running session and drops every container
//! before the new view's containers are created and watched.

use std::collections::HashMap;

use shelfview_api::{Model, ModelFile};

use crate::core::types::Result;
use crate::host::{ContainerId, ContainerRegistry};
use crate::math::Rect;
use crate::preview::classify::{format_kilobytes, FileKind};
use crate::preview::request::SizeClass;
use crate::preview::service::PreviewService;
use crate::preview::source::LibrarySource;
use crate::view::state::{
    CollectionEntry, DashboardStats, FileEntry, LibraryEntry, ModelCard, SlicerLink, View, ViewState,
};
use crate::visibility::{ContainerObservationRecord, ScheduledLoad, VisibilityScheduler, WatchOptions};

/// Card grid columns
pub const GRID_COLUMNS: usize = 3;
/// Gap between cards and between detail rows
pub const GRID_GAP: f32 = 20.0;
/// Height of the text block under a card preview
pub const CARD_INFO_HEIGHT: f32 = 100.0;
/// Vertical offset of the first card row (header, dashboard stats)
pub const CONTENT_TOP: f32 = 120.0;

const SLICERS: [(&str, &str); 4] = [
    ("PrusaSlicer", "prusaslicer://open?file="),
    ("Bambu Studio", "bambu-studio://open?file="),
    ("OrcaSlicer", "orcaslicer://open?file="),
    ("Cura", "cura://open?file="),
];

pub struct ViewController<S> {
    service: PreviewService<S>,
    scheduler: VisibilityScheduler,
    current: Option<View>,
    state: Option<ViewState>,
}

impl<S: LibrarySource + 'static> ViewController<S> {
    pub fn new(service: PreviewService<S>) -> Self {
        Self {
            service,
            scheduler: VisibilityScheduler::new(),
            current: None,
            state: None,
        }
    }

    pub fn service(&self) -> &PreviewService<S> {
        &self.service
    }

    pub fn scheduler(&self) -> &VisibilityScheduler {
        &self.scheduler
    }

    pub fn current_view(&self) -> Option<View> {
        self.current
    }

    pub fn state(&self) -> Option<&ViewState> {
        self.state.as_ref()
    }

    /// Fetch the data for `view` and lay out its containers.
    ///
    /// The previous view is torn down first, even if fetching fails.
    pub async fn switch_view(&mut self, view: View) -> Result<()> {
        self.teardown();
        log::info!("Switching to {:?}", view);

        let state = match view {
            View::Dashboard => self.dashboard().await?,
            View::Models => {
                let (models, libraries) = tokio::try_join!(self.service.source().models(), self.service.source().libraries())?;
                let names = library_names(&libraries);
                ViewState::Models { cards: self.model_cards(&models, &names) }
            }
            View::Libraries => {
                let libraries = self.service.source().libraries().await?;
                ViewState::Libraries {
                    libraries: libraries
                        .into_iter()
                        .map(|l| LibraryEntry { id: l.id, name: l.name, path: l.path })
                        .collect(),
                }
            }
            View::Collections => {
                let collections = self.service.source().collections().await?;
                ViewState::Collections {
                    collections: collections
                        .into_iter()
                        .map(|c| CollectionEntry {
                            id: c.id,
                            name: c.name,
                            description: c.description.unwrap_or_else(|| "No description".into()),
                        })
                        .collect(),
                }
            }
            View::ModelDetail(model_id) => {
                let (model, files) = tokio::try_join!(
                    self.service.source().model(model_id),
                    self.service.source().model_files(model_id)
                )?;
                self.model_detail(&model, &files)
            }
        };

        self.current = Some(view);
        self.state = Some(state);
        Ok(())
    }

    /// Stop all sessions and remove all containers of the current view
    fn teardown(&mut self) {
        {
            let mut pool = self.service.pool().borrow_mut();
            let mut containers = self.service.containers().borrow_mut();
            let stopped = self.scheduler.unwatch_all(&mut pool, &mut containers);
            let remaining = pool.release_all();
            log::debug!("Stopped {} watched and {} other sessions", stopped, remaining);
        }
        self.service.containers().borrow_mut().clear();
        self.current = None;
        self.state = None;
    }

    async fn dashboard(&mut self) -> Result<ViewState> {
        let source = self.service.source();
        let (models, libraries, collections, tags) =
            tokio::try_join!(source.models(), source.libraries(), source.collections(), source.tags())?;
        let stats = DashboardStats {
            models: models.len(),
            libraries: libraries.len(),
            collections: collections.len(),
            tags: tags.len(),
        };
        let names = library_names(&libraries);
        let recent_count = self.service.config().dashboard_recent_models.min(models.len());
        let recent = self.model_cards(&models[..recent_count], &names);
        Ok(ViewState::Dashboard { stats, recent })
    }

    fn model_cards(&mut self, models: &[Model], library_names: &HashMap<i64, String>) -> Vec<ModelCard> {
        let size = self.service.config().preview_size as f32;
        let mut records = Vec::with_capacity(models.len());
        let cards: Vec<ModelCard> = {
            let mut containers = self.service.containers().borrow_mut();
            models
                .iter()
                .enumerate()
                .map(|(i, model)| {
                    let container = containers.create(card_bounds(i, size), "📦");
                    records.push(ContainerObservationRecord::model(container, model.id));
                    ModelCard {
                        model_id: model.id,
                        name: model.name.clone(),
                        description: model.description.clone().unwrap_or_else(|| "No description".into()),
                        library: library_names
                            .get(&model.library_id)
                            .cloned()
                            .unwrap_or_else(|| format!("Library {}", model.library_id)),
                        created: model.created_date().to_string(),
                        container,
                    }
                })
                .collect()
        };

        let config = self.service.config();
        let options = WatchOptions {
            margin: config.card_margin_px,
            size_class: SizeClass::Card,
            autoload_max_bytes: config.autoload_max_bytes,
        };
        self.scheduler.watch(records, options);
        cards
    }

    fn model_detail(&mut self, model: &Model, files: &[ModelFile]) -> ViewState {
        let size = self.service.config().preview_size as f32;
        let mut records = Vec::new();
        let entries: Vec<FileEntry> = {
            let mut containers = self.service.containers().borrow_mut();
            files
                .iter()
                .enumerate()
                .map(|(i, file)| {
                    let kind = FileKind::of(&file.filename);
                    let download_url = self.service.source().download_url(file.id);
                    let is_preview = model.preview_file_id == Some(file.id);
                    let container = kind.is_previewable().then(|| {
                        let placeholder = if matches!(kind, FileKind::Mesh(_)) { "Scroll to load..." } else { "" };
                        let id = containers.create(detail_bounds(i, size), placeholder);
                        records.push(ContainerObservationRecord::file(id, file.id, kind, file.size));
                        id
                    });
                    let slicer_links = match kind {
                        FileKind::Mesh(_) => slicer_links(&download_url),
                        _ => Vec::new(),
                    };
                    FileEntry {
                        file_id: file.id,
                        filename: file.filename.clone(),
                        kind,
                        byte_size: file.size,
                        size_label: format_kilobytes(file.size),
                        download_url,
                        is_preview,
                        can_set_preview: kind.is_previewable() && !is_preview,
                        slicer_links,
                        container,
                    }
                })
                .collect()
        };

        let config = self.service.config();
        let options = WatchOptions {
            margin: config.detail_margin_px,
            size_class: SizeClass::Detail,
            autoload_max_bytes: config.autoload_max_bytes,
        };
        self.scheduler.watch(records, options);

        ViewState::ModelDetail { model_id: model.id, name: model.name.clone(), files: entries }
    }

    /// Loads for containers that became visible in `viewport`
    pub fn observe(&mut self, viewport: Rect) -> Vec<ScheduledLoad> {
        let containers = self.service.containers().borrow();
        self.scheduler.observe(viewport, &containers)
    }

    /// Start loads in the background; requires a `tokio::task::LocalSet`
    pub fn spawn_loads(&self, loads: Vec<ScheduledLoad>) -> Vec<tokio::task::JoinHandle<()>> {
        loads
            .into_iter()
            .map(|load| {
                let service = self.service.clone();
                tokio::task::spawn_local(async move { service.dispatch(load).await })
            })
            .collect()
    }

    /// Run loads one after another
    pub async fn run_loads(&self, loads: Vec<ScheduledLoad>) {
        for load in loads {
            self.service.dispatch(load).await;
        }
    }

    /// Explicit user request for a preview (manual trigger buttons)
    pub async fn load_preview(&self, file_id: i64, container: ContainerId, is_3d: bool) {
        if !self.service.containers().borrow().contains(container) {
            return;
        }
        if is_3d {
            self.service.load_detail_preview(file_id, container).await;
        } else {
            self.service.load_image_preview(file_id, container).await;
        }
    }

    /// Make `file_id` the model's preview, then reload its detail view
    pub async fn set_preview(&mut self, model_id: i64, file_id: i64) -> Result<()> {
        self.service.source().set_model_preview(model_id, file_id).await?;
        log::info!("File {} is now the preview of model {}", file_id, model_id);
        self.switch_view(View::ModelDetail(model_id)).await
    }

    /// Ask the server to rescan a library; returns the notice to show
    pub async fn scan_library(&self, library_id: i64) -> String {
        match self.service.source().scan_library(library_id).await {
            Ok(response) => {
                log::info!("Scan of library {} started: {:?}", library_id, response.job_id);
                "Library scan started".to_string()
            }
            Err(e) => {
                log::error!("Failed to scan library {}: {}", library_id, e);
                "Failed to scan library".to_string()
            }
        }
    }

    /// Bounds of the current view's preview containers
    pub fn containers(&self) -> std::cell::Ref<'_, ContainerRegistry> {
        self.service.containers().borrow()
    }
}

fn library_names(libraries: &[shelfview_api::Library]) -> HashMap<i64, String> {
    libraries.iter().map(|l| (l.id, l.name.clone())).collect()
}

/// Cell `index` of the card grid
pub fn card_bounds(index: usize, preview_size: f32) -> Rect {
    let column = (index % GRID_COLUMNS) as f32;
    let row = (index / GRID_COLUMNS) as f32;
    Rect::from_xywh(
        column * (preview_size + GRID_GAP),
        CONTENT_TOP + row * (preview_size + CARD_INFO_HEIGHT + GRID_GAP),
        preview_size,
        preview_size,
    )
}

/// Preview box of detail row `index`
pub fn detail_bounds(index: usize, preview_size: f32) -> Rect {
    Rect::from_xywh(
        GRID_GAP,
        CONTENT_TOP + index as f32 * (preview_size + 2.0 * GRID_GAP),
        preview_size,
        preview_size,
    )
}

pub fn slicer_links(download_url: &str) -> Vec<SlicerLink> {
    let encoded = encode_uri_component(download_url);
    SLICERS
        .iter()
        .map(|&(name, scheme)| SlicerLink { name, url: format!("{}{}", scheme, encoded) })
        .collect()
}

/// Percent-encode everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )`
pub fn encode_uri_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
