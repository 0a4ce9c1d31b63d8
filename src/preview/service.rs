//! Preview loading entry points
//!
//! Every entry point is fire-and-forget: errors are logged and turned into a
//! visible status on the container, never returned to the caller. A load
//! holds a ticket for its container; if another load for the same container
//! starts while it is suspended, the older one finishes silently.

use std::rc::Rc;

use crate::core::camera::{Camera, OrbitControls};
use crate::core::config::ViewerConfig;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::host::{CapabilityGate, ContainerContent, ContainerId, SharedContainers};
use crate::loader::{self, MeshFormat};
use crate::preview::classify::{manual_trigger_label, select_preview_file, FileKind};
use crate::preview::frame::{Motion, PreviewFrame};
use crate::preview::request::SizeClass;
use crate::preview::source::LibrarySource;
use crate::render::SharedPool;
use crate::scene::{build_detail_aids, build_scene};
use crate::visibility::ScheduledLoad;

pub struct PreviewService<S> {
    source: Rc<S>,
    pool: SharedPool,
    containers: SharedContainers,
    config: Rc<ViewerConfig>,
    gate: CapabilityGate,
}

impl<S> Clone for PreviewService<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            pool: self.pool.clone(),
            containers: self.containers.clone(),
            config: self.config.clone(),
            gate: self.gate,
        }
    }
}

impl<S: LibrarySource> PreviewService<S> {
    pub fn new(source: Rc<S>, pool: SharedPool, containers: SharedContainers, config: Rc<ViewerConfig>) -> Self {
        let gate = CapabilityGate::from_config(&config);
        Self { source, pool, containers, config, gate }
    }

    pub fn source(&self) -> &Rc<S> {
        &self.source
    }

    pub fn pool(&self) -> &SharedPool {
        &self.pool
    }

    pub fn containers(&self) -> &SharedContainers {
        &self.containers
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Interactive 3D preview with ground aids and orbit controls
    pub async fn load_detail_preview(&self, file_id: i64, container: ContainerId) {
        self.load_mesh(file_id, None, container, SizeClass::Detail).await;
    }

    /// Small rotating 3D preview
    pub async fn load_card_preview(&self, file_id: i64, container: ContainerId) {
        self.load_mesh(file_id, None, container, SizeClass::Card).await;
    }

    /// Still image letterboxed into a detail container
    pub async fn load_image_preview(&self, file_id: i64, container: ContainerId) {
        self.load_image(file_id, container, SizeClass::Detail).await;
    }

    /// Still image cropped to fill a card
    pub async fn load_card_image_preview(&self, file_id: i64, container: ContainerId) {
        self.load_image(file_id, container, SizeClass::Card).await;
    }

    /// Pick a model's preview file and load it as a card
    pub async fn load_model_card(&self, model_id: i64, container: ContainerId) {
        if let Err(e) = self.model_card(model_id, container).await {
            log::error!("Failed to load card for model {}: {}", model_id, e);
            self.show_failure(container, &e);
        }
    }

    /// Carry out a load decided by the visibility scheduler
    pub async fn dispatch(&self, load: ScheduledLoad) {
        match load {
            ScheduledLoad::Preview(request) => match request.format_hint {
                FileKind::Mesh(format) => {
                    self.load_mesh(request.file_id, Some(format), request.container, request.size_class).await
                }
                FileKind::Image => self.load_image(request.file_id, request.container, request.size_class).await,
                FileKind::Other => log::debug!("File {} has no preview", request.file_id),
            },
            ScheduledLoad::ModelCard { model_id, container } => self.load_model_card(model_id, container).await,
            ScheduledLoad::ManualTrigger { container, file_id, byte_size } => {
                self.show_manual_trigger(container, file_id, byte_size)
            }
        }
    }

    /// Replace the container's content with a button that loads on demand
    pub fn show_manual_trigger(&self, container: ContainerId, file_id: i64, byte_size: u64) {
        self.pool.borrow_mut().release(container);
        let label = manual_trigger_label(byte_size);
        if let Err(e) = self
            .containers
            .borrow_mut()
            .set_content(container, ContainerContent::ManualTrigger { label, file_id })
        {
            log::debug!("Manual trigger for file {} not shown: {}", file_id, e);
        }
    }

    async fn load_mesh(&self, file_id: i64, format: Option<MeshFormat>, container: ContainerId, size_class: SizeClass) {
        let Some(ticket) = self.begin(container, size_class) else {
            return;
        };
        let result = self.mesh_preview(file_id, format, container, size_class, ticket).await;
        self.finish(file_id, container, ticket, result);
    }

    async fn load_image(&self, file_id: i64, container: ContainerId, size_class: SizeClass) {
        let Some(ticket) = self.begin(container, size_class) else {
            return;
        };
        let result = self.image_preview(file_id, container, size_class, ticket).await;
        self.finish(file_id, container, ticket, result);
    }

    /// Stop whatever the container was showing and take a new ticket
    fn begin(&self, container: ContainerId, size_class: SizeClass) -> Option<u64> {
        self.pool.borrow_mut().release(container);
        let mut containers = self.containers.borrow_mut();
        let status = match size_class {
            SizeClass::Detail => ContainerContent::Loading,
            SizeClass::Card => ContainerContent::Empty,
        };
        match containers.begin_load(container).and_then(|ticket| {
            containers.set_content(container, status)?;
            Ok(ticket)
        }) {
            Ok(ticket) => Some(ticket),
            Err(e) => {
                log::debug!("Preview for container {} skipped: {}", container, e);
                None
            }
        }
    }

    fn is_current(&self, container: ContainerId, ticket: u64) -> bool {
        self.containers.borrow().is_current(container, ticket)
    }

    fn finish(&self, file_id: i64, container: ContainerId, ticket: u64, result: Result<()>) {
        let Err(e) = result else {
            return;
        };
        if !self.is_current(container, ticket) {
            log::debug!("Superseded preview of file {} failed: {}", file_id, e);
            return;
        }
        log::error!("Failed to load preview of file {} into container {}: {}", file_id, container, e);
        self.show_failure(container, &e);
    }

    fn show_failure(&self, container: ContainerId, error: &Error) {
        let content = match error {
            Error::RenderContextUnavailable(_) | Error::CapabilityTimeout(_) => ContainerContent::Unavailable,
            _ => ContainerContent::LoadFailed,
        };
        if let Err(e) = self.containers.borrow_mut().set_content(container, content) {
            log::debug!("Failure status for container {} not shown: {}", container, e);
        }
    }

    async fn mesh_preview(
        &self,
        file_id: i64,
        format: Option<MeshFormat>,
        container: ContainerId,
        size_class: SizeClass,
        ticket: u64,
    ) -> Result<()> {
        self.gate.wait(|| self.pool.borrow().capability_available()).await?;

        let format = match format {
            Some(format) => format,
            None => {
                let file = self.source.file(file_id).await?;
                match FileKind::of(&file.filename) {
                    FileKind::Mesh(format) => format,
                    _ => return Err(Error::UnsupportedFormat(file.filename)),
                }
            }
        };

        let bytes = self.source.download(file_id).await?;
        if !self.is_current(container, ticket) {
            log::debug!("Dropping superseded preview of file {}", file_id);
            return Ok(());
        }

        let config = &self.config;
        let mut scene = build_scene();
        let (camera, motion) = match size_class {
            SizeClass::Detail => {
                scene.ground_aids = Some(build_detail_aids());
                let mut controls = OrbitControls::new();
                loader::load(format, &bytes, config.model_scale, &mut scene, Some(&mut controls))?;
                let mut camera = Camera::diagonal(config.detail_camera_distance, 1.0);
                camera.look_at(controls.target);
                (camera, Motion::Orbit(controls))
            }
            SizeClass::Card => {
                loader::load(format, &bytes, config.model_scale, &mut scene, None)?;
                (
                    Camera::diagonal(config.card_camera_distance, 1.0),
                    Motion::Spin(config.card_rotation_step),
                )
            }
        };

        let context = self.pool.borrow_mut().acquire()?;
        self.containers
            .borrow_mut()
            .set_content(container, ContainerContent::Canvas)?;

        let mut frame = PreviewFrame::new(container, scene, camera, motion, context, self.containers.clone());
        self.pool
            .borrow_mut()
            .start_session(container, move || frame.draw());
        log::debug!("Preview of {} file {} running in container {}", format, file_id, container);
        Ok(())
    }

    async fn image_preview(&self, file_id: i64, container: ContainerId, size_class: SizeClass, ticket: u64) -> Result<()> {
        let bytes = self.source.download(file_id).await?;
        if !self.is_current(container, ticket) {
            return Ok(());
        }
        let image = image::load_from_memory(&bytes)?.to_rgba8();
        self.containers
            .borrow_mut()
            .place_image(container, &image, size_class.image_fit())
    }

    async fn model_card(&self, model_id: i64, container: ContainerId) -> Result<()> {
        // The placeholder stays up until a file is picked
        let ticket = match self.containers.borrow_mut().begin_load(container) {
            Ok(ticket) => ticket,
            Err(e) => {
                log::debug!("Card for model {} skipped: {}", model_id, e);
                return Ok(());
            }
        };
        let (model, files) = tokio::try_join!(self.source.model(model_id), self.source.model_files(model_id))?;
        if !self.is_current(container, ticket) {
            log::debug!("Dropping superseded card of model {}", model_id);
            return Ok(());
        }
        let Some(file) = select_preview_file(&model, &files) else {
            log::debug!("Model {} has no previewable files", model_id);
            return Ok(());
        };
        match FileKind::of(&file.filename) {
            FileKind::Mesh(format) => self.load_mesh(file.id, Some(format), container, SizeClass::Card).await,
            FileKind::Image => self.load_image(file.id, container, SizeClass::Card).await,
            FileKind::Other => {}
        }
        Ok(())
    }
}
