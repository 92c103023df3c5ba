use glam::Mat4;
use wgpu::util::DeviceExt;

use super::texture::{TextureId, TextureManager};
use super::{BlendMode, RenderContext, RenderNode};
use crate::camera::CameraUniform;
use crate::error::SpriteError;
use crate::fast_sprite::FastSpriteContainer;
use crate::sprites::Rgba;

/// Largest quad count whose vertices are still addressable by `u16` indices.
pub const MAX_BATCH_QUADS: usize = 16383;
pub const DEFAULT_BATCH_QUADS: usize = 8192;

// ── QuadVertex ───────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    /// Normalized texture coordinates.
    pub uv: [f32; 2],
    pub color: Rgba,
}

impl QuadVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x2,  // position
        1 => Float32x2,  // uv
        2 => Unorm8x4,   // color
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Index pattern for `quads` quads: `[0,1,2, 3,0,2]` shifted by 4 per quad.
pub fn quad_indices(quads: usize) -> Vec<u16> {
    let mut indices = Vec::with_capacity(quads * 6);
    for q in 0..quads.min(MAX_BATCH_QUADS) {
        let v = (q * 4) as u16;
        indices.extend_from_slice(&[v, v + 1, v + 2, v + 3, v, v + 2]);
    }
    indices
}

// ── QuadBatcher ──────────────────────────────────────────────────────────────

/// A contiguous run of quads drawn with one indexed call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QuadChunk {
    pub first_quad: u32,
    pub quads: u32,
}

/// CPU-side vertex stream for one frame, split into draw-sized chunks.
pub struct QuadBatcher {
    vertices: Vec<QuadVertex>,
    max_quads: usize,
}

impl QuadBatcher {
    pub fn new(max_quads: usize) -> Self {
        let max_quads = max_quads.clamp(1, MAX_BATCH_QUADS);
        Self { vertices: Vec::with_capacity(max_quads * 4), max_quads }
    }

    pub fn max_quads(&self) -> usize {
        self.max_quads
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
    }

    pub fn push_quad(&mut self, quad: [QuadVertex; 4]) {
        self.vertices.extend_from_slice(&quad);
    }

    pub fn quad_count(&self) -> usize {
        self.vertices.len() / 4
    }

    pub fn vertices(&self) -> &[QuadVertex] {
        &self.vertices
    }

    /// Vertices of one chunk.
    pub fn chunk_vertices(&self, chunk: QuadChunk) -> &[QuadVertex] {
        let start = chunk.first_quad as usize * 4;
        &self.vertices[start..start + chunk.quads as usize * 4]
    }

    pub fn chunks(&self) -> impl Iterator<Item = QuadChunk> + '_ {
        let total = self.quad_count();
        (0..total).step_by(self.max_quads).map(move |first| QuadChunk {
            first_quad: first as u32,
            quads: (total - first).min(self.max_quads) as u32,
        })
    }
}

// ── QuadBatchRenderer ────────────────────────────────────────────────────────

/// Streams a `QuadBatcher` to the GPU each frame. Every chunk is written to
/// its own region of the vertex buffer so no region is rewritten while an
/// earlier draw in the same submission still reads it.
pub struct QuadBatchRenderer {
    pipelines: [wgpu::RenderPipeline; BlendMode::COUNT],
    texture_bind_group_layout: wgpu::BindGroupLayout,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    index_buffer: wgpu::Buffer,
    /// Quads the shared index buffer covers; chunks may not exceed it.
    max_quads: usize,
    vertex_buffer: Option<wgpu::Buffer>,
    /// Quads the current vertex buffer can hold.
    vertex_capacity: usize,
    texture_bind_group: Option<(TextureId, wgpu::BindGroup)>,
}

impl QuadBatchRenderer {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat, max_quads: usize) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("quad_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/quad_shader.wgsl").into()),
        });

        let globals_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("quad_globals_bgl"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        // mat4x4<f32> = 64 bytes
                        min_binding_size: wgpu::BufferSize::new(64),
                    },
                    count: None,
                }],
            });

        let texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("quad_texture_bgl"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("quad_pipeline_layout"),
            bind_group_layouts: &[&globals_bind_group_layout, &texture_bind_group_layout],
            ..Default::default()
        });

        let pipelines = BlendMode::ALL.map(|blend| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("quad_pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[QuadVertex::layout()],
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
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
        });

        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_globals"),
            contents: bytemuck::bytes_of(&CameraUniform::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quad_globals_bg"),
            layout: &globals_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        // Shared by every chunk: chunk vertex slices always start at quad 0.
        let max_quads = max_quads.clamp(1, MAX_BATCH_QUADS);
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_indices"),
            contents: bytemuck::cast_slice(&quad_indices(max_quads)),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            pipelines,
            texture_bind_group_layout,
            globals_buffer,
            globals_bind_group,
            index_buffer,
            max_quads,
            vertex_buffer: None,
            vertex_capacity: 0,
            texture_bind_group: None,
        }
    }

    /// Upload and draw every chunk of `batcher` with `texture`.
    pub fn render(
        &mut self,
        ctx: &mut RenderContext<'_, '_>,
        batcher: &QuadBatcher,
        texture: TextureId,
        world: Mat4,
        blend: BlendMode,
    ) -> Result<(), SpriteError> {
        if batcher.max_quads() > self.max_quads {
            return Err(SpriteError::InvalidConfig(format!(
                "batcher chunks of {} quads exceed the renderer's {}",
                batcher.max_quads(),
                self.max_quads
            )));
        }
        let quads = batcher.quad_count();
        if quads == 0 {
            return Ok(());
        }

        if quads > self.vertex_capacity || self.vertex_buffer.is_none() {
            // Grow the buffer (next power-of-two, min 256 quads).
            let capacity = quads.next_power_of_two().max(256);
            self.vertex_buffer = Some(ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("quad_vertices"),
                size: (capacity * 4 * std::mem::size_of::<QuadVertex>()) as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.vertex_capacity = capacity;
            log::debug!("grew quad vertex buffer to {capacity} quads");
        }
        let Some(vertex_buffer) = &self.vertex_buffer else {
            return Ok(());
        };

        let stale = !matches!(&self.texture_bind_group, Some((id, _)) if *id == texture);
        if stale {
            let group = create_texture_bind_group(
                ctx.device,
                &self.texture_bind_group_layout,
                ctx.textures,
                texture,
            )?;
            self.texture_bind_group = Some((texture, group));
        }

        let camera = CameraUniform::from_mat4(ctx.view_proj(world));
        ctx.queue.write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&camera));

        let pass = &mut *ctx.pass;
        pass.set_pipeline(&self.pipelines[blend.index()]);
        pass.set_bind_group(0, &self.globals_bind_group, &[]);
        if let Some((_, group)) = &self.texture_bind_group {
            pass.set_bind_group(1, group, &[]);
        }
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);

        let quad_bytes = (4 * std::mem::size_of::<QuadVertex>()) as u64;
        for chunk in batcher.chunks() {
            let start = chunk.first_quad as u64 * quad_bytes;
            let end = start + chunk.quads as u64 * quad_bytes;
            ctx.queue.write_buffer(
                vertex_buffer,
                start,
                bytemuck::cast_slice(batcher.chunk_vertices(chunk)),
            );
            pass.set_vertex_buffer(0, vertex_buffer.slice(start..end));
            pass.draw_indexed(0..chunk.quads * 6, 0, 0..1);
        }
        Ok(())
    }
}

fn create_texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    manager: &TextureManager,
    texture: TextureId,
) -> Result<wgpu::BindGroup, SpriteError> {
    let gpu = manager.get(texture)?;
    Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("quad_texture_bg"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&gpu.texture_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&manager.sampler),
            },
        ],
    }))
}

// ── FastSpriteLayer ──────────────────────────────────────────────────────────

/// Scene node drawing a `FastSpriteContainer` through the immediate path.
pub struct FastSpriteLayer {
    pub container: FastSpriteContainer,
    batcher: QuadBatcher,
    renderer: QuadBatchRenderer,
}

impl FastSpriteLayer {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat, max_quads: usize) -> Self {
        Self {
            container: FastSpriteContainer::new(),
            batcher: QuadBatcher::new(max_quads),
            renderer: QuadBatchRenderer::new(device, surface_format, max_quads),
        }
    }
}

impl RenderNode for FastSpriteLayer {
    fn render(
        &mut self,
        ctx: &mut RenderContext<'_, '_>,
        world: Mat4,
        blend: BlendMode,
    ) -> Result<(), SpriteError> {
        match self.container.build_batches(&mut self.batcher)? {
            Some(texture) => self.renderer.render(ctx, &self.batcher, texture, world, blend),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_stride_is_word_aligned() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), 20);
    }

    #[test]
    fn max_batch_fits_u16_indices() {
        let indices = quad_indices(MAX_BATCH_QUADS);
        assert!(indices.iter().all(|&i| (i as usize) < MAX_BATCH_QUADS * 4));
        assert_eq!(*indices.iter().max().unwrap() as usize, MAX_BATCH_QUADS * 4 - 1);
    }

    #[test]
    fn empty_batcher_has_no_chunks() {
        let b = QuadBatcher::new(4);
        assert_eq!(b.chunks().count(), 0);
    }

    #[test]
    fn batcher_clamps_max_quads() {
        assert_eq!(QuadBatcher::new(0).max_quads(), 1);
        assert_eq!(QuadBatcher::new(1 << 20).max_quads(), MAX_BATCH_QUADS);
    }
}
