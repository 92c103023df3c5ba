use super::BlendMode;
use super::shader_gen::shader_source;
use crate::error::SpriteError;
use crate::sprites::{MAX_SUPPORTED_TEXTURES, SpriteRecord};

// ── ShaderVariantCache ───────────────────────────────────────────────────────

/// One pre-built program per bound-texture count, `0..=MAX_SUPPORTED_TEXTURES`.
///
/// Every variant is built up front; lookup is a plain array index. `P` is
/// whatever the builder produces (GPU pipelines in practice).
pub struct ShaderVariantCache<P> {
    variants: Vec<P>,
}

impl<P> ShaderVariantCache<P> {
    /// Generate the WGSL for every texture count and hand it to `builder`.
    /// Any failure aborts the whole cache.
    pub fn build<F>(mut builder: F) -> Result<Self, SpriteError>
    where
        F: FnMut(usize, &str) -> Result<P, SpriteError>,
    {
        let mut variants = Vec::with_capacity(MAX_SUPPORTED_TEXTURES + 1);
        for count in 0..=MAX_SUPPORTED_TEXTURES {
            let source = shader_source(count)?;
            let program = builder(count, &source).map_err(|e| match e {
                e @ SpriteError::ShaderBuild { .. } => e,
                other => SpriteError::ShaderBuild { count, reason: other.to_string() },
            })?;
            variants.push(program);
        }
        Ok(Self { variants })
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// The variant for exactly `texture_count` textures.
    pub fn get(&self, texture_count: usize) -> Result<&P, SpriteError> {
        self.variants.get(texture_count).ok_or(SpriteError::TooManyTextures {
            requested: texture_count,
            max: MAX_SUPPORTED_TEXTURES,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &P> {
        self.variants.iter()
    }
}

// ── Vertex layouts ───────────────────────────────────────────────────────────

/// Unit quad corner, per vertex.
pub const QUAD_ATTRIBS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![
    0 => Float32x2,  // corner in {0,1}²
];

/// `SpriteRecord`, per instance. Offsets come out as 0, 8, 16, 20, 24.
pub const GEOMETRY_ATTRIBS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
    1 => Float32x2,  // x, y
    2 => Float32x2,  // scale_x, scale_y
    3 => Float32,    // angle
    4 => Unorm16x2,  // anchor
    5 => Uint16x4,   // uv0, uv1 texels
];

pub const COLOR_ATTRIBS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![
    6 => Unorm8x4,
];

pub const TEX_SLOT_ATTRIBS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![
    7 => Uint32,
];

pub fn instanced_buffer_layouts() -> [wgpu::VertexBufferLayout<'static>; 4] {
    [
        wgpu::VertexBufferLayout {
            array_stride: 8,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &QUAD_ATTRIBS,
        },
        wgpu::VertexBufferLayout {
            array_stride: SpriteRecord::STRIDE as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &GEOMETRY_ATTRIBS,
        },
        wgpu::VertexBufferLayout {
            array_stride: 4,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &COLOR_ATTRIBS,
        },
        wgpu::VertexBufferLayout {
            array_stride: 4,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &TEX_SLOT_ATTRIBS,
        },
    ]
}

// ── SpriteVariant ────────────────────────────────────────────────────────────

/// GPU objects for one texture count: the texture bind group layout (absent
/// for zero textures) and one pipeline per blend mode.
pub struct SpriteVariant {
    pub texture_count: usize,
    pub texture_bind_group_layout: Option<wgpu::BindGroupLayout>,
    pipelines: [wgpu::RenderPipeline; BlendMode::COUNT],
}

impl SpriteVariant {
    pub fn pipeline(&self, blend: BlendMode) -> &wgpu::RenderPipeline {
        &self.pipelines[blend.index()]
    }
}

/// All instanced sprite variants for one surface format, plus the uniform
/// layout they share.
pub struct SpriteVariants {
    pub globals_bind_group_layout: wgpu::BindGroupLayout,
    pub cache: ShaderVariantCache<SpriteVariant>,
}

impl SpriteVariants {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self, SpriteError> {
        let globals_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("sprite_globals_bgl"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<super::instanced::SpriteGlobals>() as u64,
                        ),
                    },
                    count: None,
                }],
            });

        let cache = ShaderVariantCache::build(|count, source| {
            create_variant(device, surface_format, &globals_bind_group_layout, count, source)
        })?;
        log::debug!("built {} instanced sprite variants", cache.len());

        Ok(Self { globals_bind_group_layout, cache })
    }

    pub fn get(&self, texture_count: usize) -> Result<&SpriteVariant, SpriteError> {
        self.cache.get(texture_count)
    }
}

fn texture_bind_group_layout(device: &wgpu::Device, count: usize) -> wgpu::BindGroupLayout {
    let mut entries: Vec<wgpu::BindGroupLayoutEntry> = (0..count as u32)
        .map(|binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        })
        .collect();
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: count as u32,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    });

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("sprite_textures_bgl"),
        entries: &entries,
    })
}

fn create_variant(
    device: &wgpu::Device,
    surface_format: wgpu::TextureFormat,
    globals_layout: &wgpu::BindGroupLayout,
    count: usize,
    source: &str,
) -> Result<SpriteVariant, SpriteError> {
    let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("sprite_variant_shader"),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let texture_layout = (count > 0).then(|| texture_bind_group_layout(device, count));
    let bind_group_layouts: Vec<&wgpu::BindGroupLayout> =
        std::iter::once(globals_layout).chain(texture_layout.as_ref()).collect();

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("sprite_variant_layout"),
        bind_group_layouts: &bind_group_layouts,
        ..Default::default()
    });

    let buffers = instanced_buffer_layouts();
    let pipelines = BlendMode::ALL.map(|blend| {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sprite_variant_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: blend.state(),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    });

    let variant =
        SpriteVariant { texture_count: count, texture_bind_group_layout: texture_layout, pipelines };
    checked_variant(count, variant, pollster::block_on(scope.pop()))
}

/// Turn an error captured while building variant `count` into `ShaderBuild`.
fn checked_variant<P>(
    count: usize,
    variant: P,
    captured: Option<wgpu::Error>,
) -> Result<P, SpriteError> {
    match captured {
        None => Ok(variant),
        Some(err) => {
            log::error!("sprite variant {count} failed validation: {err}");
            Err(SpriteError::ShaderBuild { count, reason: err.to_string() })
        }
    }
}
