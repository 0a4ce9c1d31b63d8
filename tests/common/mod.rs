//! In-memory library server and render context shared by the integration tests

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::rc::Rc;

use glam::Vec3;
use image::RgbaImage;

use shelfview::animation::FrameLoop;
use shelfview::core::camera::Camera;
use shelfview::core::{Error, Result, ViewerConfig};
use shelfview::host::{ContainerRegistry, SharedContainers};
use shelfview::loader::stl;
use shelfview::preview::{LibrarySource, PreviewService};
use shelfview::render::{ContextFactory, RenderContext, RendererPool, SharedPool};
use shelfview::scene::SceneHandle;
use shelfview::view::ViewController;
use shelfview_api::{Collection, Library, Model, ModelFile, ScanResponse, Tag};

/// Library server held in memory. Every call yields once so concurrent
/// loads interleave the way they would over the network.
#[derive(Default)]
pub struct MemorySource {
    pub models: Vec<Model>,
    pub files: Vec<ModelFile>,
    pub blobs: HashMap<i64, Vec<u8>>,
    pub libraries: Vec<Library>,
    pub downloads: Cell<usize>,
    pub previews_set: RefCell<Vec<(i64, i64)>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            libraries: vec![Library {
                id: 1,
                name: "Prints".into(),
                path: "/srv/prints".into(),
                storage: "local".into(),
                created_at: String::new(),
                updated_at: String::new(),
            }],
            ..Default::default()
        }
    }

    pub fn add_model(&mut self, id: i64, name: &str, preview_file_id: Option<i64>) {
        self.models.push(Model {
            id,
            library_id: 1,
            name: name.into(),
            path: format!("/srv/prints/{}", name),
            description: None,
            preview_file_id,
            created_at: "2024-03-01T10:00:00Z".into(),
            updated_at: String::new(),
        });
    }

    /// Add a file whose listed size may differ from its actual bytes
    pub fn add_file(&mut self, model_id: i64, id: i64, filename: &str, listed_size: u64, bytes: Vec<u8>) {
        self.files.push(ModelFile {
            id,
            model_id,
            filename: filename.into(),
            path: String::new(),
            size: listed_size,
            mime_type: None,
            digest: None,
            created_at: String::new(),
        });
        self.blobs.insert(id, bytes);
    }
}

fn not_found(what: &str, id: i64) -> Error {
    Error::Fetch(format!("HTTP 404 for {} {}", what, id))
}

impl LibrarySource for MemorySource {
    async fn models(&self) -> Result<Vec<Model>> {
        tokio::task::yield_now().await;
        Ok(self.models.clone())
    }

    async fn model(&self, id: i64) -> Result<Model> {
        tokio::task::yield_now().await;
        self.models.iter().find(|m| m.id == id).cloned().ok_or_else(|| not_found("model", id))
    }

    async fn model_files(&self, id: i64) -> Result<Vec<ModelFile>> {
        tokio::task::yield_now().await;
        Ok(self.files.iter().filter(|f| f.model_id == id).cloned().collect())
    }

    async fn file(&self, id: i64) -> Result<ModelFile> {
        tokio::task::yield_now().await;
        self.files.iter().find(|f| f.id == id).cloned().ok_or_else(|| not_found("file", id))
    }

    async fn libraries(&self) -> Result<Vec<Library>> {
        Ok(self.libraries.clone())
    }

    async fn collections(&self) -> Result<Vec<Collection>> {
        Ok(Vec::new())
    }

    async fn tags(&self) -> Result<Vec<Tag>> {
        Ok(Vec::new())
    }

    async fn set_model_preview(&self, model_id: i64, file_id: i64) -> Result<()> {
        self.previews_set.borrow_mut().push((model_id, file_id));
        Ok(())
    }

    async fn scan_library(&self, id: i64) -> Result<ScanResponse> {
        if self.libraries.iter().any(|l| l.id == id) {
            Ok(ScanResponse { message: "Scan started".into(), job_id: Some("job-1".into()) })
        } else {
            Err(not_found("library", id))
        }
    }

    async fn download(&self, file_id: i64) -> Result<Vec<u8>> {
        tokio::task::yield_now().await;
        self.downloads.set(self.downloads.get() + 1);
        self.blobs.get(&file_id).cloned().ok_or_else(|| not_found("file", file_id))
    }

    fn download_url(&self, file_id: i64) -> String {
        format!("http://library.test/api/files/{}/download", file_id)
    }
}

/// Render context that fills its frame with the scene background
pub struct FlatContext {
    frame: RgbaImage,
    disposed: bool,
    pub renders: Rc<Cell<usize>>,
    pub evicted: Rc<RefCell<Vec<u64>>>,
}

impl RenderContext for FlatContext {
    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 && self.frame.dimensions() != (width, height) {
            self.frame = RgbaImage::new(width, height);
        }
    }

    fn size(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    fn render(&mut self, scene: &SceneHandle, _camera: &Camera) -> Result<()> {
        if self.disposed {
            return Err(Error::DisposedContext);
        }
        let bg = scene.background * 255.0;
        let pixel = image::Rgba([bg.x as u8, bg.y as u8, bg.z as u8, 255]);
        for p in self.frame.pixels_mut() {
            *p = pixel;
        }
        self.renders.set(self.renders.get() + 1);
        Ok(())
    }

    fn frame(&self) -> Result<&RgbaImage> {
        if self.disposed {
            return Err(Error::DisposedContext);
        }
        Ok(&self.frame)
    }

    fn evict(&mut self, object_id: u64) {
        self.evicted.borrow_mut().push(object_id);
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

#[derive(Clone, Default)]
pub struct FlatFactory {
    pub unavailable: bool,
    pub renders: Rc<Cell<usize>>,
    pub evicted: Rc<RefCell<Vec<u64>>>,
}

impl ContextFactory for FlatFactory {
    fn create(&self) -> Result<Box<dyn RenderContext>> {
        if self.unavailable {
            return Err(Error::RenderContextUnavailable("no adapter".into()));
        }
        Ok(Box::new(FlatContext {
            frame: RgbaImage::new(1, 1),
            disposed: false,
            renders: self.renders.clone(),
            evicted: self.evicted.clone(),
        }))
    }

    fn is_available(&self) -> bool {
        !self.unavailable
    }
}

/// Everything a test needs to drive previews end to end
pub struct Harness {
    pub frames: FrameLoop,
    pub pool: SharedPool,
    pub containers: SharedContainers,
    pub source: Rc<MemorySource>,
    pub factory: FlatFactory,
}

impl Harness {
    pub fn new(source: MemorySource) -> Self {
        Self::with_factory(source, FlatFactory::default())
    }

    pub fn with_factory(source: MemorySource, factory: FlatFactory) -> Self {
        let frames = FrameLoop::new();
        let pool = RendererPool::shared(Box::new(factory.clone()), frames.clone());
        Self {
            frames,
            pool,
            containers: ContainerRegistry::shared(),
            source: Rc::new(source),
            factory,
        }
    }

    pub fn service(&self) -> PreviewService<MemorySource> {
        PreviewService::new(
            self.source.clone(),
            self.pool.clone(),
            self.containers.clone(),
            Rc::new(ViewerConfig::default()),
        )
    }

    pub fn controller(&self) -> ViewController<MemorySource> {
        ViewController::new(self.service())
    }
}

/// Binary STL of a tetrahedron whose largest side is `size`
pub fn tetra_stl(size: f32) -> Vec<u8> {
    let a = Vec3::ZERO;
    let b = Vec3::new(size, 0.0, 0.0);
    let c = Vec3::new(0.0, size * 0.5, 0.0);
    let d = Vec3::new(0.0, 0.0, size * 0.25);
    stl::encode_binary(&[[a, c, b], [a, b, d], [a, d, c], [b, c, d]])
}

pub const MISSING_MTL_OBJ: &str = "\
mtllib wedge.mtl
o wedge
v 5 5 0
v 25 5 0
v 5 15 0
v 5 5 8
usemtl brass
f 1 3 2
f 1 2 4
f 1 4 3
f 2 3 4
";

/// 3MF package with one tetrahedron placed twice
pub fn tetra_3mf() -> Vec<u8> {
    let model = r#"<?xml version="1.0" encoding="UTF-8"?>
<model unit="millimeter" xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02">
  <resources>
    <object id="1" type="model">
      <mesh>
        <vertices>
          <vertex x="0" y="0" z="0"/>
          <vertex x="30" y="0" z="0"/>
          <vertex x="0" y="12" z="0"/>
          <vertex x="0" y="0" z="6"/>
        </vertices>
        <triangles>
          <triangle v1="0" v2="2" v3="1"/>
          <triangle v1="0" v2="1" v3="3"/>
          <triangle v1="0" v2="3" v3="2"/>
          <triangle v1="1" v2="2" v3="3"/>
        </triangles>
      </mesh>
    </object>
  </resources>
  <build>
    <item objectid="1"/>
    <item objectid="1" transform="1 0 0 0 1 0 0 0 1 40 0 0"/>
  </build>
</model>"#;

    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(b"<Types/>").unwrap();
        zip.start_file("3D/3dmodel.model", options).unwrap();
        zip.write_all(model.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf.into_inner()
}

/// Small PNG with a distinct left and right half
pub fn two_tone_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            image::Rgba([255, 0, 0, 255])
        } else {
            image::Rgba([0, 0, 255, 255])
        }
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}
