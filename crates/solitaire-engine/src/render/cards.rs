use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use solitaire_atlas::TextureAtlas;

use crate::coords::Vec2;
use crate::render::{RenderCtx, RenderTarget};
use crate::shader::{LinkedProgram, ResourceKind, ShaderError};

use super::common::{
    premul_alpha_blend, viewport_ubo_min_binding_size, QuadVertex, ViewportUniform, QUAD_INDICES,
    QUAD_VERTICES,
};
use super::texture_array::GpuLayerTexture;

// ── requests ──────────────────────────────────────────────────────────────

/// Which sprite a card shows when face up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardFace {
    Layer(u32),
    Name(String),
}

/// One card to draw this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CardDrawRequest {
    /// Top-left corner in logical pixels.
    pub position: Vec2,
    pub face: CardFace,
    /// Face-down cards show the back sprite.
    pub face_up: bool,
}

impl CardDrawRequest {
    pub fn named(x: f32, y: f32, name: impl Into<String>) -> Self {
        Self {
            position: Vec2::new(x, y),
            face: CardFace::Name(name.into()),
            face_up: true,
        }
    }

    pub fn layer(x: f32, y: f32, layer: u32) -> Self {
        Self {
            position: Vec2::new(x, y),
            face: CardFace::Layer(layer),
            face_up: true,
        }
    }

    pub fn face_down(mut self) -> Self {
        self.face_up = false;
        self
    }
}

/// Why a request could not be mapped to a layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Unresolved {
    #[error("no sprite named `{0}`")]
    UnknownName(String),
    #[error("layer {layer} out of range (atlas has {count})")]
    LayerOutOfRange { layer: u32, count: u32 },
    #[error("face-down card but the atlas has no back sprite")]
    NoBackSprite,
}

/// Maps a request to the layer it samples.
pub fn resolve_layer<T>(
    atlas: &TextureAtlas<T>,
    back_layer: Option<u32>,
    req: &CardDrawRequest,
) -> Result<u32, Unresolved> {
    if !req.face_up {
        return back_layer.ok_or(Unresolved::NoBackSprite);
    }
    match &req.face {
        CardFace::Layer(layer) if *layer < atlas.layer_count() => Ok(*layer),
        CardFace::Layer(layer) => Err(Unresolved::LayerOutOfRange {
            layer: *layer,
            count: atlas.layer_count(),
        }),
        CardFace::Name(name) => atlas
            .layer_index(name)
            .ok_or_else(|| Unresolved::UnknownName(name.clone())),
    }
}

/// Builds one instance per resolvable request, in request order.
///
/// Unresolvable requests are skipped; the first one is logged as a warning
/// and `warned` suppresses the rest.
pub fn build_instances<T>(
    atlas: &TextureAtlas<T>,
    back_layer: Option<u32>,
    card_size: Vec2,
    requests: &[CardDrawRequest],
    warned: &mut bool,
) -> Vec<CardInstance> {
    let mut out = Vec::with_capacity(requests.len());
    for req in requests {
        match resolve_layer(atlas, back_layer, req) {
            Ok(layer) => out.push(CardInstance {
                origin: req.position.to_array(),
                size: card_size.to_array(),
                layer,
                _pad: 0,
            }),
            Err(why) => {
                if !*warned {
                    log::warn!("skipping card draw: {why} (further skips are not logged)");
                    *warned = true;
                }
            }
        }
    }
    out
}

// ── renderer ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CardRendererConfig {
    /// Drawn card size in logical pixels; defaults to the atlas cell size.
    pub card_size: Option<Vec2>,
    /// Sprite drawn for face-down cards.
    pub back_sprite: Option<String>,
}

impl Default for CardRendererConfig {
    fn default() -> Self {
        Self {
            card_size: None,
            back_sprite: Some("back".to_string()),
        }
    }
}

/// Draws card quads textured from a sprite-sheet texture array.
///
/// Owns the pipeline built from the linked program and the atlas texture;
/// everything is released when the renderer drops.
pub struct CardRenderer {
    program: LinkedProgram,
    atlas: TextureAtlas<GpuLayerTexture>,
    back_layer: Option<u32>,
    card_size: Vec2,

    vs_module: wgpu::ShaderModule,
    fs_module: wgpu::ShaderModule,
    pipeline_format: wgpu::TextureFormat,
    pipeline: wgpu::RenderPipeline,

    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    viewport_ubo: wgpu::Buffer,

    quad_vbo: wgpu::Buffer,
    quad_ibo: wgpu::Buffer,

    instance_vbo: Option<wgpu::Buffer>,
    instance_capacity: usize,

    warned_unresolved: bool,
}

/// `(binding, kind)` of every resource the pipeline layout provides in group 0.
const BINDINGS: [(u32, ResourceKind); 3] = [
    (0, ResourceKind::Uniform),
    (1, ResourceKind::Texture),
    (2, ResourceKind::Sampler),
];

/// Vertex attributes the renderer feeds: quad corner, origin, size, layer.
const VERTEX_INPUTS: [u32; 4] = [0, 1, 2, 3];

/// Checks that `program` only uses what the card pipeline binds.
fn check_program(program: &LinkedProgram) -> Result<(), ShaderError> {
    let mut log = Vec::new();

    for slot in program.resources() {
        let expected = BINDINGS
            .iter()
            .find(|(b, _)| slot.group == 0 && *b == slot.binding)
            .map(|(_, kind)| *kind);
        match expected {
            Some(kind) if kind == slot.kind => {}
            Some(kind) => log.push(format!(
                "@group(0) @binding({}) must be {kind:?}, shader declares {:?}",
                slot.binding, slot.kind
            )),
            None => log.push(format!(
                "@group({}) @binding({}) is not provided by the card pipeline",
                slot.group, slot.binding
            )),
        }
    }
    for location in program.vertex_inputs() {
        if !VERTEX_INPUTS.contains(location) {
            log.push(format!("vertex input @location({location}) is not provided"));
        }
    }

    if log.is_empty() {
        Ok(())
    } else {
        Err(ShaderError::Link { log: log.join("\n") })
    }
}

impl CardRenderer {
    /// Builds the pipeline and GPU resources.
    ///
    /// Fails when the program reads bindings or vertex attributes the card
    /// pipeline does not supply.
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        program: LinkedProgram,
        atlas: TextureAtlas<GpuLayerTexture>,
        config: CardRendererConfig,
    ) -> Result<Self, ShaderError> {
        check_program(&program)?;

        let back_layer = config.back_sprite.as_deref().and_then(|name| {
            let layer = atlas.layer_index(name);
            if layer.is_none() {
                log::warn!("back sprite `{name}` not in atlas; face-down cards will be skipped");
            }
            layer
        });
        let card_size = config.card_size.unwrap_or_else(|| {
            Vec2::new(atlas.layer_width() as f32, atlas.layer_height() as f32)
        });

        let vs_module = program.vertex().create_module(device);
        let fs_module = program.fragment().create_module(device);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("solitaire card bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: Some(viewport_ubo_min_binding_size()),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2Array,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let viewport_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("solitaire card viewport ubo"),
            size: std::mem::size_of::<ViewportUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("solitaire card sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        // The bind group keeps the sampler alive.
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("solitaire card bind group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: viewport_ubo.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(atlas.texture().view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let quad_vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("solitaire card quad vbo"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let quad_ibo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("solitaire card quad ibo"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let pipeline = create_pipeline(
            device,
            surface_format,
            &program,
            &vs_module,
            &fs_module,
            &bind_group_layout,
        );

        log::info!(
            "card renderer ready: {} layers of {}x{}, card size {}x{}",
            atlas.layer_count(),
            atlas.layer_width(),
            atlas.layer_height(),
            card_size.x,
            card_size.y
        );

        Ok(Self {
            program,
            atlas,
            back_layer,
            card_size,
            vs_module,
            fs_module,
            pipeline_format: surface_format,
            pipeline,
            bind_group_layout,
            bind_group,
            viewport_ubo,
            quad_vbo,
            quad_ibo,
            instance_vbo: None,
            instance_capacity: 0,
            warned_unresolved: false,
        })
    }

    pub fn atlas(&self) -> &TextureAtlas<GpuLayerTexture> {
        &self.atlas
    }

    pub fn card_size(&self) -> Vec2 {
        self.card_size
    }

    /// Draws `requests` in order, one draw call each.
    pub fn draw(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        requests: &[CardDrawRequest],
    ) {
        self.ensure_pipeline(ctx);

        let instances = build_instances(
            &self.atlas,
            self.back_layer,
            self.card_size,
            requests,
            &mut self.warned_unresolved,
        );
        if instances.is_empty() {
            return;
        }

        self.write_viewport_uniform(ctx);
        self.ensure_instance_capacity(ctx, instances.len());

        let Some(instance_vbo) = self.instance_vbo.as_ref() else { return };
        ctx.queue.write_buffer(instance_vbo, 0, bytemuck::cast_slice(&instances));

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("solitaire card pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.bind_group, &[]);
        rpass.set_vertex_buffer(0, self.quad_vbo.slice(..));
        rpass.set_vertex_buffer(1, instance_vbo.slice(..));
        rpass.set_index_buffer(self.quad_ibo.slice(..), wgpu::IndexFormat::Uint16);

        for i in 0..instances.len() as u32 {
            rpass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, i..i + 1);
        }
    }

    fn ensure_pipeline(&mut self, ctx: &RenderCtx<'_>) {
        if self.pipeline_format == ctx.surface_format {
            return;
        }
        log::debug!(
            "surface format changed {:?} -> {:?}; rebuilding card pipeline",
            self.pipeline_format,
            ctx.surface_format
        );
        self.pipeline = create_pipeline(
            ctx.device,
            ctx.surface_format,
            &self.program,
            &self.vs_module,
            &self.fs_module,
            &self.bind_group_layout,
        );
        self.pipeline_format = ctx.surface_format;
    }

    fn write_viewport_uniform(&self, ctx: &RenderCtx<'_>) {
        let u = ViewportUniform {
            viewport: [ctx.viewport.width.max(1.0), ctx.viewport.height.max(1.0)],
            _pad: [0.0; 2],
        };
        ctx.queue.write_buffer(&self.viewport_ubo, 0, bytemuck::bytes_of(&u));
    }

    fn ensure_instance_capacity(&mut self, ctx: &RenderCtx<'_>, required_instances: usize) {
        if required_instances <= self.instance_capacity && self.instance_vbo.is_some() {
            return;
        }

        let new_cap = required_instances.next_power_of_two().max(64);
        let new_size = (new_cap * std::mem::size_of::<CardInstance>()) as u64;

        self.instance_vbo = Some(ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("solitaire card instance vbo"),
            size: new_size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.instance_capacity = new_cap;
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    program: &LinkedProgram,
    vs_module: &wgpu::ShaderModule,
    fs_module: &wgpu::ShaderModule,
    bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("solitaire card pipeline layout"),
        bind_group_layouts: &[bind_group_layout],
        immediate_size: 0,
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("solitaire card pipeline"),
        layout: Some(&pipeline_layout),

        vertex: wgpu::VertexState {
            module: vs_module,
            entry_point: Some(program.vertex().entry_point()),
            compilation_options: Default::default(),
            buffers: &[QuadVertex::layout(), CardInstance::layout()],
        },

        fragment: Some(wgpu::FragmentState {
            module: fs_module,
            entry_point: Some(program.fragment().entry_point()),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(premul_alpha_blend()),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

/// Per-card vertex data (instance step).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct CardInstance {
    pub origin: [f32; 2],
    pub size: [f32; 2],
    pub layer: u32,
    pub _pad: u32,
}

impl CardInstance {
    const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        1 => Float32x2, // origin
        2 => Float32x2, // size
        3 => Uint32     // layer
    ];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<CardInstance>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRS,
        }
    }
}
