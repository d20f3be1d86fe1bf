// renderer.rs — wgpu renderer: curved panels → ripple → fisheye → edge blur → egui overlay

use crate::assets::LoadedTexture;
use crate::orchestrator::CarouselState;
use crate::panel::{PanelSource, Ring};
use crate::params::{PostParams, FOCUSED_GRAYSCALE, POINTER_CENTER};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use wgpu::util::DeviceExt;
use winit::window::Window;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const CLEAR_COLOR: wgpu::Color = wgpu::Color { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    uv: [f32; 2],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct GlobalsUniform {
    view_proj: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct PanelUniform {
    model: [[f32; 4]; 4],
    parallax_strength: f32,
    pointer_x: f32,
    pointer_y: f32,
    grayscale: f32,
    kind: u32, // 0=parallax, 1=flat, 2=video
    pad: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct PostUniform {
    time: f32,
    scroll: f32,
    mouse_x: f32,
    segment_width: f32,
    ripple_edge: f32,
    fisheye_strength: f32,
    edge_size: f32,
    blur_amount: f32,
    resolution: [f32; 2],
    pad: [f32; 2],
}

impl From<&PostParams> for PostUniform {
    fn from(p: &PostParams) -> Self {
        Self {
            time: p.time,
            scroll: p.scroll,
            mouse_x: p.mouse_x,
            segment_width: p.segment_width,
            ripple_edge: p.ripple_edge,
            fisheye_strength: p.fisheye_strength,
            edge_size: p.edge_size,
            blur_amount: p.blur_amount,
            resolution: p.resolution,
            pad: [0.0; 2],
        }
    }
}

struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

fn create_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    width: u32,
    height: u32,
    rgba: &[u8],
    format: wgpu::TextureFormat,
    label: &str,
) -> GpuTexture {
    let size = wgpu::Extent3d { width, height, depth_or_array_layers: 1 };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        label: Some(label),
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        rgba,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture { _texture: texture, view }
}

fn create_target(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    format: wgpu::TextureFormat,
    label: &str,
) -> GpuTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        size: wgpu::Extent3d {
            width: config.width.max(1),
            height: config.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        label: Some(label),
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture { _texture: texture, view }
}

/// Drops cache entries whose path is not in `referenced`; returns how many went.
fn prune_unreferenced<V>(cache: &mut HashMap<PathBuf, V>, referenced: &HashSet<PathBuf>) -> usize {
    let before = cache.len();
    cache.retain(|path, _| referenced.contains(path));
    before - cache.len()
}

/// Offscreen attachments, recreated on resize.
struct Targets {
    depth: GpuTexture,
    scene: GpuTexture,
    ping: GpuTexture,
    scene_bind_group: wgpu::BindGroup,
    ping_bind_group: wgpu::BindGroup,
}

struct PanelGpu {
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    textures: [Option<PathBuf>; 4],
    kind: u32,
}

pub struct Renderer {
    surface: wgpu::Surface,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,

    // 面板
    panel_pipeline: wgpu::RenderPipeline,
    panel_bind_group_layout: wgpu::BindGroupLayout,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    panel_sampler: wgpu::Sampler,
    vertex_buffer: Option<wgpu::Buffer>,
    index_buffer: Option<wgpu::Buffer>,
    index_count: u32,
    panels: Vec<PanelGpu>,
    ring_generation: u64,

    // 纹理缓存
    textures: HashMap<PathBuf, GpuTexture>,
    linear_paths: HashSet<PathBuf>,
    placeholder_color: GpuTexture,
    placeholder_depth: GpuTexture,

    // 后处理
    post_bind_group_layout: wgpu::BindGroupLayout,
    post_buffer: wgpu::Buffer,
    post_sampler: wgpu::Sampler,
    ripple_pipeline: wgpu::RenderPipeline,
    fisheye_pipeline: wgpu::RenderPipeline,
    edge_blur_pipeline: wgpu::RenderPipeline,
    targets: Targets,

    // UI
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Renderer {
    pub async fn new(window: std::sync::Arc<Window>) -> Self {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = unsafe { instance.create_surface(window.as_ref()) }.unwrap();
        let adapter = instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }).await.unwrap();

        let (device, queue) = adapter.request_device(
            &wgpu::DeviceDescriptor {
                features: wgpu::Features::empty(),
                limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default().using_resolution(adapter.limits())
                },
                label: None,
            },
            None,
        ).await.unwrap();

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps.formats.iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo, // VSync on
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        // --- 1. Placeholders: mid gray colour, white depth (no parallax offset) ---
        let placeholder_color = create_texture(
            &device, &queue, 1, 1, &[128, 128, 128, 255],
            wgpu::TextureFormat::Rgba8UnormSrgb, "placeholder_color",
        );
        let placeholder_depth = create_texture(
            &device, &queue, 1, 1, &[255, 255, 255, 255],
            wgpu::TextureFormat::Rgba8Unorm, "placeholder_depth",
        );

        let panel_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let post_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        // --- 2. Uniform Setup ---
        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Globals Buffer"),
            contents: bytemuck::cast_slice(&[GlobalsUniform { view_proj: glam::Mat4::IDENTITY.to_cols_array_2d() }]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let post_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Post Buffer"),
            contents: bytemuck::cast_slice(&[PostUniform::from(&PostParams::default())]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_entry = |binding: u32, visibility: wgpu::ShaderStages| wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
            },
            count: None,
        };
        let sampler_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };

        let globals_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX)],
            label: Some("globals_bind_group_layout"),
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &globals_bind_group_layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: globals_buffer.as_entire_binding() }],
            label: Some("globals_bind_group"),
        });

        let panel_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
                texture_entry(1), // foreground
                texture_entry(2), // background
                texture_entry(3), // foreground depth
                texture_entry(4), // background depth
                sampler_entry(5),
            ],
            label: Some("panel_bind_group_layout"),
        });

        let post_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                texture_entry(1),
                sampler_entry(2),
            ],
            label: Some("post_bind_group_layout"),
        });

        // --- 3. Pipeline Setup ---
        let panel_shader = device.create_shader_module(wgpu::include_wgsl!("shaders/panel.wgsl"));
        let panel_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Panel Pipeline Layout"),
            bind_group_layouts: &[&globals_bind_group_layout, &panel_bind_group_layout],
            push_constant_ranges: &[],
        });
        let panel_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Panel Pipeline"),
            layout: Some(&panel_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &panel_shader,
                entry_point: "vs_main",
                buffers: &[Vertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &panel_shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None, // 面板两面可见
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        let post_shader = device.create_shader_module(wgpu::include_wgsl!("shaders/post.wgsl"));
        let post_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Post Pipeline Layout"),
            bind_group_layouts: &[&post_bind_group_layout],
            push_constant_ranges: &[],
        });
        let post_pipeline = |entry_point: &str, label: &str| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&post_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &post_shader,
                    entry_point: "vs_main",
                    buffers: &[], // 无顶点缓冲，Shader 自生成
                },
                fragment: Some(wgpu::FragmentState {
                    module: &post_shader,
                    entry_point,
                    targets: &[Some(wgpu::ColorTargetState {
                        format: config.format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        };
        let ripple_pipeline = post_pipeline("fs_ripple", "Ripple Pipeline");
        let fisheye_pipeline = post_pipeline("fs_fisheye", "Fisheye Pipeline");
        let edge_blur_pipeline = post_pipeline("fs_edge_blur", "Edge Blur Pipeline");

        let targets = Self::create_targets(&device, &config, &post_bind_group_layout, &post_buffer, &post_sampler);

        // --- 4. Egui Setup ---
        let egui_ctx = egui::Context::default();
        let mut egui_state = egui_winit::State::new(window.as_ref());
        egui_state.set_pixels_per_point(window.scale_factor() as f32);
        let egui_renderer = egui_wgpu::Renderer::new(&device, config.format, None, 1);

        Self {
            surface, device, queue, config, size,
            panel_pipeline, panel_bind_group_layout,
            globals_buffer, globals_bind_group, panel_sampler,
            vertex_buffer: None, index_buffer: None, index_count: 0,
            panels: Vec::new(), ring_generation: 0,
            textures: HashMap::new(), linear_paths: HashSet::new(),
            placeholder_color, placeholder_depth,
            post_bind_group_layout, post_buffer, post_sampler,
            ripple_pipeline, fisheye_pipeline, edge_blur_pipeline,
            targets,
            egui_ctx, egui_state, egui_renderer,
        }
    }

    fn create_targets(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
        layout: &wgpu::BindGroupLayout,
        post_buffer: &wgpu::Buffer,
        sampler: &wgpu::Sampler,
    ) -> Targets {
        let depth = create_target(device, config, DEPTH_FORMAT, "depth_target");
        let scene = create_target(device, config, config.format, "scene_target");
        let ping = create_target(device, config, config.format, "ping_target");

        let bind = |view: &wgpu::TextureView, label: &str| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: post_buffer.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(view) },
                    wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(sampler) },
                ],
                label: Some(label),
            })
        };
        let scene_bind_group = bind(&scene.view, "scene_post_bind_group");
        let ping_bind_group = bind(&ping.view, "ping_post_bind_group");

        Targets { depth, scene, ping, scene_bind_group, ping_bind_group }
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.targets = Self::create_targets(
                &self.device, &self.config, &self.post_bind_group_layout, &self.post_buffer, &self.post_sampler,
            );
        }
    }

    fn texture_view(&self, path: Option<&PathBuf>, depth_slot: bool) -> &wgpu::TextureView {
        match path.and_then(|p| self.textures.get(p)) {
            Some(texture) => &texture.view,
            None if depth_slot => &self.placeholder_depth.view,
            None => &self.placeholder_color.view,
        }
    }

    fn panel_bind_group(&self, uniform_buffer: &wgpu::Buffer, textures: &[Option<PathBuf>; 4]) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.panel_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: uniform_buffer.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(self.texture_view(textures[0].as_ref(), false)),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(self.texture_view(textures[1].as_ref(), false)),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(self.texture_view(textures[2].as_ref(), true)),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(self.texture_view(textures[3].as_ref(), true)),
                },
                wgpu::BindGroupEntry { binding: 5, resource: wgpu::BindingResource::Sampler(&self.panel_sampler) },
            ],
            label: Some("panel_bind_group"),
        })
    }

    /// Replaces all panel GPU state with the given ring. Returns the texture
    /// files that are not cached yet.
    pub fn sync_ring(&mut self, ring: &Ring) -> Vec<PathBuf> {
        let vertices: Vec<Vertex> = ring
            .mesh
            .positions
            .iter()
            .zip(&ring.mesh.uvs)
            .map(|(p, uv)| Vertex { position: *p, uv: *uv })
            .collect();
        self.vertex_buffer = Some(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Panel Vertex Buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        }));
        self.index_buffer = Some(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Panel Index Buffer"),
            contents: bytemuck::cast_slice(&ring.mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        }));
        self.index_count = ring.mesh.indices.len() as u32;

        let mut missing = Vec::new();
        let mut referenced = HashSet::new();
        let mut panels = Vec::with_capacity(ring.panels.len());
        for panel in &ring.panels {
            let paths = panel.source.texture_paths();
            let textures = paths.map(|p| p.cloned());
            for (slot, path) in textures.iter().enumerate() {
                if let Some(path) = path {
                    referenced.insert(path.clone());
                    if slot >= 2 {
                        self.linear_paths.insert(path.clone());
                    }
                    if !self.textures.contains_key(path) && !missing.contains(path) {
                        missing.push(path.clone());
                    }
                }
            }
            let kind = match panel.source {
                PanelSource::Parallax { .. } => 0,
                PanelSource::Flat { .. } => 1,
                PanelSource::Video { .. } => 2,
            };
            let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Panel Uniform Buffer"),
                size: std::mem::size_of::<PanelUniform>() as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = self.panel_bind_group(&uniform_buffer, &textures);
            panels.push(PanelGpu { uniform_buffer, bind_group, textures, kind });
        }
        self.panels = panels;
        self.ring_generation = ring.generation;

        let dropped = prune_unreferenced(&mut self.textures, &referenced);
        if dropped > 0 {
            log::debug!("Released {} textures no longer on the ring", dropped);
        }
        self.linear_paths.retain(|p| referenced.contains(p));
        missing
    }

    /// Uploads a decoded texture and rebinds every panel that samples it.
    pub fn upload_texture(&mut self, loaded: LoadedTexture) {
        let max_texture_dimension = self.device.limits().max_texture_dimension_2d;
        let LoadedTexture { path, rgba } = loaded;
        let affected: Vec<usize> = self
            .panels
            .iter()
            .enumerate()
            .filter(|(_, p)| p.textures.iter().flatten().any(|t| *t == path))
            .map(|(i, _)| i)
            .collect();
        if affected.is_empty() {
            // finished after the ring moved on
            log::debug!("Discarding unused texture {}", path.display());
            return;
        }
        let (src_w, src_h) = rgba.dimensions();

        let rgba = if src_w > max_texture_dimension || src_h > max_texture_dimension {
            let scale = (max_texture_dimension as f32 / src_w.max(src_h) as f32).min(1.0);
            let new_w = ((src_w as f32 * scale) as u32).max(1);
            let new_h = ((src_h as f32 * scale) as u32).max(1);
            log::warn!(
                "{} is {}x{}, above the GPU limit {}; scaled to {}x{}",
                path.display(), src_w, src_h, max_texture_dimension, new_w, new_h
            );
            image::DynamicImage::ImageRgba8(rgba)
                .resize(new_w, new_h, image::imageops::FilterType::Lanczos3)
                .to_rgba8()
        } else {
            rgba
        };

        let format = if self.linear_paths.contains(&path) {
            wgpu::TextureFormat::Rgba8Unorm
        } else {
            wgpu::TextureFormat::Rgba8UnormSrgb
        };
        let (width, height) = rgba.dimensions();
        let texture = create_texture(&self.device, &self.queue, width, height, &rgba, format, "panel_texture");
        self.textures.insert(path, texture);

        for i in affected {
            let bind_group = self.panel_bind_group(&self.panels[i].uniform_buffer, &self.panels[i].textures);
            self.panels[i].bind_group = bind_group;
        }
    }

    fn write_uniforms(&self, state: &CarouselState) {
        let globals = GlobalsUniform { view_proj: state.camera.view_proj().to_cols_array_2d() };
        self.queue.write_buffer(&self.globals_buffer, 0, bytemuck::cast_slice(&[globals]));

        let rotation = state.rendered_rotation();
        for (i, (panel, gpu)) in state.ring.panels.iter().zip(&self.panels).enumerate() {
            let params = panel.params;
            let uniform = PanelUniform {
                model: state.ring.model_matrix(i, rotation).to_cols_array_2d(),
                parallax_strength: params.parallax_strength.unwrap_or(0.0),
                pointer_x: params.pointer_x.unwrap_or(POINTER_CENTER),
                pointer_y: params.pointer_y.unwrap_or(POINTER_CENTER),
                grayscale: params.grayscale.unwrap_or(FOCUSED_GRAYSCALE),
                kind: gpu.kind,
                pad: [0; 3],
            };
            self.queue.write_buffer(&gpu.uniform_buffer, 0, bytemuck::cast_slice(&[uniform]));
        }

        self.queue.write_buffer(&self.post_buffer, 0, bytemuck::cast_slice(&[PostUniform::from(&state.post)]));
    }

    /// Panel indices ordered far to near so blended edges composite correctly.
    fn draw_order(state: &CarouselState) -> Vec<usize> {
        let eye = state.camera.eye;
        let rotation = state.rendered_rotation();
        let mut order: Vec<(usize, f32)> = (0..state.ring.panels.len())
            .map(|i| (i, state.ring.world_position(i, rotation).distance_squared(eye)))
            .collect();
        order.sort_by(|a, b| b.1.total_cmp(&a.1));
        order.into_iter().map(|(i, _)| i).collect()
    }

    fn post_pass(
        encoder: &mut wgpu::CommandEncoder,
        label: &str,
        pipeline: &wgpu::RenderPipeline,
        source: &wgpu::BindGroup,
        target: &wgpu::TextureView,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations { load: wgpu::LoadOp::Clear(CLEAR_COLOR), store: true },
            })],
            depth_stencil_attachment: None,
        });
        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, source, &[]);
        render_pass.draw(0..3, 0..1); // Draw 3 vertices for fullscreen coverage
    }

    pub fn render_with_ui(
        &mut self,
        window: &Window,
        state: &CarouselState,
        run_ui: impl FnOnce(&egui::Context),
    ) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        self.write_uniforms(state);

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        // 1. Render Scene
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.targets.scene.view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Clear(CLEAR_COLOR), store: true },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth.view,
                    depth_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Clear(1.0), store: true }),
                    stencil_ops: None,
                }),
            });

            let ready = !state.ring.is_empty()
                && self.ring_generation == state.ring.generation
                && self.panels.len() == state.ring.panels.len();
            if let (true, Some(vertices), Some(indices)) = (ready, &self.vertex_buffer, &self.index_buffer) {
                render_pass.set_pipeline(&self.panel_pipeline);
                render_pass.set_bind_group(0, &self.globals_bind_group, &[]);
                render_pass.set_vertex_buffer(0, vertices.slice(..));
                render_pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                for i in Self::draw_order(state) {
                    render_pass.set_bind_group(1, &self.panels[i].bind_group, &[]);
                    render_pass.draw_indexed(0..self.index_count, 0, 0..1);
                }
            }
        }

        // 2. Post chain: scene → ripple → ping → fisheye → scene → edge blur → surface
        Self::post_pass(&mut encoder, "Ripple Pass", &self.ripple_pipeline, &self.targets.scene_bind_group, &self.targets.ping.view);
        Self::post_pass(&mut encoder, "Fisheye Pass", &self.fisheye_pipeline, &self.targets.ping_bind_group, &self.targets.scene.view);
        Self::post_pass(&mut encoder, "Edge Blur Pass", &self.edge_blur_pipeline, &self.targets.scene_bind_group, &view);

        // 3. Render UI
        let raw_input = self.egui_state.take_egui_input(window);
        let full_output = self.egui_ctx.run(raw_input, run_ui);

        self.egui_state.handle_platform_output(window, &self.egui_ctx, full_output.platform_output);
        let clipped_primitives = self.egui_ctx.tessellate(full_output.shapes);

        let screen_descriptor = egui_wgpu::renderer::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: window.scale_factor() as f32,
        };

        for (id, delta) in &full_output.textures_delta.set {
            self.egui_renderer.update_texture(&self.device, &self.queue, *id, delta);
        }

        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &clipped_primitives,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: true },
                })],
                depth_stencil_attachment: None,
            });
            self.egui_renderer.render(&mut render_pass, &clipped_primitives, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_keeps_only_textures_on_the_ring() {
        let mut cache: HashMap<PathBuf, u32> = HashMap::new();
        cache.insert(PathBuf::from("old/a.png"), 1);
        cache.insert(PathBuf::from("new/b.png"), 2);
        let referenced: HashSet<PathBuf> = [PathBuf::from("new/b.png"), PathBuf::from("new/c.png")]
            .into_iter()
            .collect();
        assert_eq!(prune_unreferenced(&mut cache, &referenced), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains_key(&PathBuf::from("new/b.png")));
    }

    #[test]
    fn uniform_layouts_match_the_shaders() {
        assert_eq!(std::mem::size_of::<PanelUniform>(), 96);
        assert_eq!(std::mem::size_of::<PostUniform>(), 48);
    }
}
