//! Offscreen wgpu render context
//!
//! Draws into an sRGB texture and reads every frame back into CPU memory so
//! sessions can blit it into their own container.

use std::collections::HashMap;
use std::sync::mpsc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use image::RgbaImage;
use wgpu::util::DeviceExt;

use crate::core::camera::Camera;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::render::context::{ContextFactory, RenderContext};
use crate::scene::node::{DisplayObject, GroundAids, LightKind, SceneHandle};

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const BYTES_PER_PIXEL: u32 = 4;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PreviewVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
}

impl PreviewVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x3];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PreviewVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct GlobalsUniform {
    view_proj: [[f32; 4]; 4],
    ambient: [f32; 4],
    light_dir: [f32; 4],
    light_color: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct DrawUniform {
    model: [[f32; 4]; 4],
}

fn srgb_to_linear(c: Vec3) -> Vec3 {
    c.powf(2.2)
}

/// Flatten a display object into vertices and indices with per-vertex
/// material colors
pub fn mesh_vertices(object: &DisplayObject) -> (Vec<PreviewVertex>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(object.vertex_count());
    let mut indices = Vec::new();
    for prim in &object.primitives {
        let base = vertices.len() as u32;
        let color = srgb_to_linear(prim.material.base_color()).to_array();
        for (i, p) in prim.positions.iter().enumerate() {
            let normal = prim.normals.get(i).copied().unwrap_or(Vec3::Y);
            vertices.push(PreviewVertex {
                position: p.to_array(),
                normal: normal.to_array(),
                color,
            });
        }
        indices.extend(prim.indices.iter().map(|i| base + i));
    }
    (vertices, indices)
}

/// Line-list vertices for the ground grid and axis indicator
pub fn ground_aid_vertices(aids: &GroundAids) -> Vec<PreviewVertex> {
    let mut out = Vec::new();
    let mut line = |a: Vec3, b: Vec3, color: Vec3| {
        let color = srgb_to_linear(color).to_array();
        for p in [a, b] {
            out.push(PreviewVertex { position: p.to_array(), normal: [0.0; 3], color });
        }
    };

    let grid = &aids.grid;
    let half = grid.size / 2.0;
    let step = grid.size / grid.divisions.max(1) as f32;
    let center = grid.divisions / 2;
    for i in 0..=grid.divisions {
        let k = -half + i as f32 * step;
        let color = if i == center { grid.center_color } else { grid.line_color };
        line(Vec3::new(-half, 0.0, k), Vec3::new(half, 0.0, k), color);
        line(Vec3::new(k, 0.0, -half), Vec3::new(k, 0.0, half), color);
    }

    let s = aids.axes.size;
    line(Vec3::ZERO, Vec3::X * s, Vec3::new(1.0, 0.0, 0.0));
    line(Vec3::ZERO, Vec3::Y * s, Vec3::new(0.0, 1.0, 0.0));
    line(Vec3::ZERO, Vec3::Z * s, Vec3::new(0.0, 0.0, 1.0));
    out
}

fn globals_for(scene: &SceneHandle, camera: &Camera) -> GlobalsUniform {
    let mut ambient = Vec3::ZERO;
    let mut light_dir = Vec3::Y;
    let mut light_color = Vec3::ZERO;
    for light in &scene.lights {
        let color = light.color * light.intensity;
        match light.kind {
            LightKind::Ambient => ambient += color,
            LightKind::Directional { position } => {
                light_dir = position.normalize_or(Vec3::Y);
                light_color += color;
            }
        }
    }
    GlobalsUniform {
        view_proj: camera.view_projection().to_cols_array_2d(),
        ambient: ambient.extend(1.0).to_array(),
        light_dir: light_dir.extend(0.0).to_array(),
        light_color: light_color.extend(1.0).to_array(),
    }
}

/// GPU data keyed by display object, kept until the object is evicted
struct ObjectCache<T> {
    entries: HashMap<u64, T>,
}

impl<T> ObjectCache<T> {
    fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    fn get_or_insert_with(&mut self, id: u64, build: impl FnOnce() -> T) -> &T {
        self.entries.entry(id).or_insert_with(build)
    }

    fn get(&self, id: u64) -> Option<&T> {
        self.entries.get(&id)
    }

    fn evict(&mut self, id: u64) -> bool {
        self.entries.remove(&id).is_some()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

struct MeshBuffers {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

struct LineBuffers {
    aids: GroundAids,
    vertices: wgpu::Buffer,
    vertex_count: u32,
}

struct Target {
    width: u32,
    height: u32,
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    readback: wgpu::Buffer,
    padded_bytes_per_row: u32,
}

impl Target {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let size = wgpu::Extent3d { width, height, depth_or_array_layers: 1 };
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("preview_color"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("preview_depth"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        // Rows must be 256-byte aligned for texture-to-buffer copies
        let padded_bytes_per_row = (width * BYTES_PER_PIXEL).div_ceil(256) * 256;
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("preview_readback"),
            size: (padded_bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Self {
            width,
            height,
            color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
            color,
            depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
            readback,
            padded_bytes_per_row,
        }
    }
}

struct GpuState {
    device: wgpu::Device,
    queue: wgpu::Queue,
    lit_pipeline: wgpu::RenderPipeline,
    line_pipeline: wgpu::RenderPipeline,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    object_buffer: wgpu::Buffer,
    object_bind_group: wgpu::BindGroup,
    identity_bind_group: wgpu::BindGroup,
    target: Target,
    meshes: ObjectCache<MeshBuffers>,
    lines: Option<LineBuffers>,
}

/// GPU-backed render context drawing offscreen
pub struct GpuRenderContext {
    state: Option<GpuState>,
    /// Requested size; the target is rebuilt lazily on the next render
    width: u32,
    height: u32,
    frame: RgbaImage,
}

impl GpuRenderContext {
    /// Request an adapter and device without a window surface
    pub async fn new(width: u32, height: u32) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| Error::RenderContextUnavailable(format!("No suitable adapter found: {:?}", e)))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("shelfview_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::MemoryUsage,
                experimental_features: Default::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|e| Error::RenderContextUnavailable(e.to_string()))?;

        log::info!("Render context on {}", adapter.get_info().name);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("preview_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../shaders/preview.wgsl").into()),
        });

        let uniform_layout = |label: &'static str| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            })
        };
        let globals_layout = uniform_layout("preview_globals_layout");
        let draw_layout = uniform_layout("preview_draw_layout");

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("preview_pipeline_layout"),
            bind_group_layouts: &[&globals_layout, &draw_layout],
            immediate_size: 0,
        });

        let lit_pipeline = create_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            "preview_lit_pipeline",
            wgpu::PrimitiveTopology::TriangleList,
            "fs_lit",
        );
        let line_pipeline = create_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            "preview_line_pipeline",
            wgpu::PrimitiveTopology::LineList,
            "fs_unlit",
        );

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("preview_globals"),
            size: std::mem::size_of::<GlobalsUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let object_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("preview_object"),
            size: std::mem::size_of::<DrawUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let identity_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("preview_identity"),
            contents: bytemuck::bytes_of(&DrawUniform { model: Mat4::IDENTITY.to_cols_array_2d() }),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind = |layout: &wgpu::BindGroupLayout, buffer: &wgpu::Buffer, label: &'static str| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            })
        };
        let globals_bind_group = bind(&globals_layout, &globals_buffer, "preview_globals_bind_group");
        let object_bind_group = bind(&draw_layout, &object_buffer, "preview_object_bind_group");
        let identity_bind_group = bind(&draw_layout, &identity_buffer, "preview_identity_bind_group");

        let (width, height) = (width.max(1), height.max(1));
        let target = Target::new(&device, width, height);

        Ok(Self {
            state: Some(GpuState {
                device,
                queue,
                lit_pipeline,
                line_pipeline,
                globals_buffer,
                globals_bind_group,
                object_buffer,
                object_bind_group,
                identity_bind_group,
                target,
                meshes: ObjectCache::new(),
                lines: None,
            }),
            width,
            height,
            frame: RgbaImage::new(width, height),
        })
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    label: &'static str,
    topology: wgpu::PrimitiveTopology,
    fragment_entry: &'static str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[PreviewVertex::layout()],
            compilation_options: Default::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology,
            // Mesh winding from arbitrary files is unreliable
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: COLOR_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        multiview_mask: None,
        cache: None,
    })
}

impl GpuState {
    fn sync_mesh(&mut self, object: &DisplayObject) {
        let device = &self.device;
        self.meshes.get_or_insert_with(object.id(), || {
            let (vertices, indices) = mesh_vertices(object);
            log::debug!("Uploading object {} ({} vertices)", object.id(), vertices.len());
            MeshBuffers {
                vertices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("preview_mesh_vertices"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                indices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("preview_mesh_indices"),
                    contents: bytemuck::cast_slice(&indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
                index_count: indices.len() as u32,
            }
        });
    }

    fn sync_lines(&mut self, aids: &GroundAids) {
        if self.lines.as_ref().is_some_and(|l| l.aids == *aids) {
            return;
        }
        let vertices = ground_aid_vertices(aids);
        self.lines = Some(LineBuffers {
            aids: *aids,
            vertices: self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("preview_aid_vertices"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            }),
            vertex_count: vertices.len() as u32,
        });
    }

    fn draw(&mut self, scene: &SceneHandle, camera: &Camera, frame: &mut RgbaImage) -> Result<()> {
        self.queue
            .write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals_for(scene, camera)));

        let object = scene.display_object.as_ref().filter(|o| o.vertex_count() > 0);
        if let Some(object) = object {
            self.sync_mesh(object);
            let model = DrawUniform { model: object.world_matrix().to_cols_array_2d() };
            self.queue.write_buffer(&self.object_buffer, 0, bytemuck::bytes_of(&model));
        }
        if let Some(aids) = &scene.ground_aids {
            self.sync_lines(aids);
        }

        let mesh = object.and_then(|o| self.meshes.get(o.id()));
        let bg = srgb_to_linear(scene.background);
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("preview_encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("preview_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: bg.x as f64,
                            g: bg.y as f64,
                            b: bg.z as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.target.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            pass.set_bind_group(0, &self.globals_bind_group, &[]);

            if let (Some(_), Some(lines)) = (&scene.ground_aids, &self.lines) {
                pass.set_pipeline(&self.line_pipeline);
                pass.set_bind_group(1, &self.identity_bind_group, &[]);
                pass.set_vertex_buffer(0, lines.vertices.slice(..));
                pass.draw(0..lines.vertex_count, 0..1);
            }

            if let Some(mesh) = mesh {
                pass.set_pipeline(&self.lit_pipeline);
                pass.set_bind_group(1, &self.object_bind_group, &[]);
                pass.set_vertex_buffer(0, mesh.vertices.slice(..));
                pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        let target = &self.target;
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &target.color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &target.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(target.padded_bytes_per_row),
                    rows_per_image: Some(target.height),
                },
            },
            wgpu::Extent3d {
                width: target.width,
                height: target.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        self.read_frame(frame)
    }

    fn read_frame(&self, frame: &mut RgbaImage) -> Result<()> {
        let target = &self.target;
        let slice = target.readback.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).ok();
        });
        self.device
            .poll(wgpu::PollType::Wait { submission_index: None, timeout: None })
            .map_err(|e| Error::RenderContextUnavailable(format!("device poll failed: {}", e)))?;
        rx.recv()
            .map_err(|e| Error::RenderContextUnavailable(e.to_string()))?
            .map_err(|e| Error::RenderContextUnavailable(format!("readback failed: {}", e)))?;

        {
            let data = slice.get_mapped_range();
            let row_len = (target.width * BYTES_PER_PIXEL) as usize;
            let mut pixels = Vec::with_capacity(row_len * target.height as usize);
            for row in data.chunks(target.padded_bytes_per_row as usize).take(target.height as usize) {
                pixels.extend_from_slice(&row[..row_len]);
            }
            *frame = RgbaImage::from_raw(target.width, target.height, pixels)
                .ok_or_else(|| Error::RenderContextUnavailable("readback size mismatch".into()))?;
        }
        target.readback.unmap();
        Ok(())
    }
}

impl RenderContext for GpuRenderContext {
    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.width = width;
            self.height = height;
        }
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn render(&mut self, scene: &SceneHandle, camera: &Camera) -> Result<()> {
        let state = self.state.as_mut().ok_or(Error::DisposedContext)?;
        if state.target.width != self.width || state.target.height != self.height {
            state.target = Target::new(&state.device, self.width, self.height);
        }
        state.draw(scene, camera, &mut self.frame)
    }

    fn frame(&self) -> Result<&RgbaImage> {
        if self.state.is_none() {
            return Err(Error::DisposedContext);
        }
        Ok(&self.frame)
    }

    fn evict(&mut self, object_id: u64) {
        if let Some(state) = self.state.as_mut() {
            if state.meshes.evict(object_id) {
                log::debug!("Evicted object {} ({} still cached)", object_id, state.meshes.len());
            }
        }
    }

    fn dispose(&mut self) {
        self.state = None;
    }

    fn is_disposed(&self) -> bool {
        self.state.is_none()
    }
}

/// Creates `GpuRenderContext`s, blocking on device setup
#[derive(Clone, Copy, Debug)]
pub struct GpuContextFactory {
    pub initial_size: u32,
}

impl GpuContextFactory {
    pub fn new(initial_size: u32) -> Self {
        Self { initial_size }
    }
}

impl ContextFactory for GpuContextFactory {
    fn create(&self) -> Result<Box<dyn RenderContext>> {
        let context = pollster::block_on(GpuRenderContext::new(self.initial_size, self.initial_size))?;
        Ok(Box::new(context))
    }
}
