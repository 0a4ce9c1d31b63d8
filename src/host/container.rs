//! Preview containers and their display surfaces
//!
//! A container is an on-screen box that shows a placeholder, a status, an
//! image, or the frames of a running preview. Everything the preview path
//! knows about a container lives here, keyed by `ContainerId`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use image::{imageops, RgbaImage};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::math::Rect;

/// Identity of one preview container
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(pub u64);

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a container currently shows
#[derive(Clone, Debug, PartialEq)]
pub enum ContainerContent {
    /// Static text shown before any preview was attempted
    Placeholder(String),
    /// Bytes are being fetched
    Loading,
    /// Frames from a render session are blitted into the surface
    Canvas,
    /// A still image fills the surface
    Image,
    /// 3D preview needs an explicit user action
    ManualTrigger { label: String, file_id: i64 },
    /// The preview failed; the user may re-trigger it
    LoadFailed,
    /// No 3D rendering capability; non-3D fallback
    Unavailable,
    /// Nothing drawn yet
    Empty,
}

/// How a still image is fitted into the container
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFit {
    /// Whole image visible, letterboxed
    Contain,
    /// Container fully covered, overflow cropped
    Cover,
}

#[derive(Clone, Debug)]
pub struct Container {
    id: ContainerId,
    pub bounds: Rect,
    pub content: ContainerContent,
    /// Pixels currently displayed
    pub surface: Option<RgbaImage>,
    /// Incremented by every `begin_load`; stale loads compare against it
    ticket: u64,
    blits: u64,
}

impl Container {
    pub fn id(&self) -> ContainerId {
        self.id
    }

    /// Integer pixel size, never zero
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            self.bounds.width().round().max(1.0) as u32,
            self.bounds.height().round().max(1.0) as u32,
        )
    }

    /// Number of frames blitted since the container was created
    pub fn blit_count(&self) -> u64 {
        self.blits
    }
}

/// Side table of every live container
#[derive(Debug, Default)]
pub struct ContainerRegistry {
    next_id: u64,
    containers: BTreeMap<ContainerId, Container>,
}

/// Registry shared between the view, the scheduler, and running sessions
pub type SharedContainers = Rc<RefCell<ContainerRegistry>>;

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedContainers {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Add a container showing `placeholder`
    pub fn create(&mut self, bounds: Rect, placeholder: impl Into<String>) -> ContainerId {
        self.next_id += 1;
        let id = ContainerId(self.next_id);
        self.containers.insert(
            id,
            Container {
                id,
                bounds,
                content: ContainerContent::Placeholder(placeholder.into()),
                surface: None,
                ticket: 0,
                blits: 0,
            },
        );
        id
    }

    pub fn remove(&mut self, id: ContainerId) -> Option<Container> {
        self.containers.remove(&id)
    }

    pub fn clear(&mut self) -> Vec<ContainerId> {
        let ids = self.ids();
        self.containers.clear();
        ids
    }

    pub fn get(&self, id: ContainerId) -> Option<&Container> {
        self.containers.get(&id)
    }

    pub fn contains(&self, id: ContainerId) -> bool {
        self.containers.contains_key(&id)
    }

    pub fn ids(&self) -> Vec<ContainerId> {
        self.containers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    fn get_mut(&mut self, id: ContainerId) -> Result<&mut Container> {
        self.containers.get_mut(&id).ok_or(Error::ContainerDetached(id.0))
    }

    pub fn content(&self, id: ContainerId) -> Option<&ContainerContent> {
        self.get(id).map(|c| &c.content)
    }

    pub fn set_content(&mut self, id: ContainerId, content: ContainerContent) -> Result<()> {
        let container = self.get_mut(id)?;
        if !matches!(content, ContainerContent::Canvas | ContainerContent::Image) {
            container.surface = None;
        }
        container.content = content;
        Ok(())
    }

    pub fn set_bounds(&mut self, id: ContainerId, bounds: Rect) -> Result<()> {
        self.get_mut(id)?.bounds = bounds;
        Ok(())
    }

    pub fn pixel_size(&self, id: ContainerId) -> Result<(u32, u32)> {
        self.get(id)
            .map(Container::pixel_size)
            .ok_or(Error::ContainerDetached(id.0))
    }

    /// Start a new load; any load holding an older ticket is superseded
    pub fn begin_load(&mut self, id: ContainerId) -> Result<u64> {
        let container = self.get_mut(id)?;
        container.ticket += 1;
        Ok(container.ticket)
    }

    /// Supersede any in-flight load without starting a new one
    pub fn cancel_load(&mut self, id: ContainerId) {
        if let Ok(container) = self.get_mut(id) {
            container.ticket += 1;
        }
    }

    /// Whether `ticket` is still the latest load for a live container
    pub fn is_current(&self, id: ContainerId, ticket: u64) -> bool {
        self.get(id).is_some_and(|c| c.ticket == ticket)
    }

    /// Copy a rendered frame into the container's own surface
    pub fn blit(&mut self, id: ContainerId, frame: &RgbaImage) -> Result<()> {
        let container = self.get_mut(id)?;
        match container.surface.as_mut() {
            Some(surface) if surface.dimensions() == frame.dimensions() => {
                surface.copy_from_slice(frame.as_raw());
            }
            _ => container.surface = Some(frame.clone()),
        }
        container.blits += 1;
        Ok(())
    }

    /// Fit a still image into the container and show it
    pub fn place_image(&mut self, id: ContainerId, image: &RgbaImage, fit: ImageFit) -> Result<()> {
        let container = self.get_mut(id)?;
        let (width, height) = container.pixel_size();
        container.surface = Some(fit_image(image, width, height, fit));
        container.content = ContainerContent::Image;
        Ok(())
    }
}

/// Scale `image` into a `width` x `height` surface
pub fn fit_image(image: &RgbaImage, width: u32, height: u32, fit: ImageFit) -> RgbaImage {
    let (src_w, src_h) = image.dimensions();
    if src_w == 0 || src_h == 0 {
        return RgbaImage::new(width, height);
    }
    let scale_x = width as f32 / src_w as f32;
    let scale_y = height as f32 / src_h as f32;
    let scale = match fit {
        ImageFit::Contain => scale_x.min(scale_y),
        ImageFit::Cover => scale_x.max(scale_y),
    };
    let scaled_w = ((src_w as f32 * scale).round() as u32).max(1);
    let scaled_h = ((src_h as f32 * scale).round() as u32).max(1);
    let scaled = imageops::resize(image, scaled_w, scaled_h, imageops::FilterType::Triangle);

    match fit {
        ImageFit::Contain => {
            let mut out = RgbaImage::new(width, height);
            let x = (width.saturating_sub(scaled_w) / 2) as i64;
            let y = (height.saturating_sub(scaled_h) / 2) as i64;
            imageops::overlay(&mut out, &scaled, x, y);
            out
        }
        ImageFit::Cover => {
            let x = scaled_w.saturating_sub(width) / 2;
            let y = scaled_h.saturating_sub(height) / 2;
            imageops::crop_imm(&scaled, x, y, width.min(scaled_w), height.min(scaled_h)).to_image()
        }
    }
}
