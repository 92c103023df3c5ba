use std::sync::Arc;

use glam::Mat4;
use wgpu::util::DeviceExt;

use super::texture::{TextureId, TextureManager, texture_size_uniform};
use super::variants::SpriteVariants;
use super::{BlendMode, GpuCaps, RenderContext, RenderNode};
use crate::error::SpriteError;
use crate::sprites::{MAX_SUPPORTED_TEXTURES, SpritePool, SpriteRecord};

/// Triangle-strip unit quad shared by every instance.
const UNIT_QUAD: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];

// ── SpriteGlobals ────────────────────────────────────────────────────────────

/// Uniform block of the instanced sprite shader. Unused size slots are zero.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpriteGlobals {
    pub view_proj: [[f32; 4]; 4],
    /// `(w, h, 1/w, 1/h)` per bound texture slot.
    pub tex_sizes: [[f32; 4]; MAX_SUPPORTED_TEXTURES],
}

impl SpriteGlobals {
    pub fn new(view_proj: Mat4, texture_sizes: &[(u32, u32)]) -> Result<Self, SpriteError> {
        if texture_sizes.len() > MAX_SUPPORTED_TEXTURES {
            return Err(SpriteError::TooManyTextures {
                requested: texture_sizes.len(),
                max: MAX_SUPPORTED_TEXTURES,
            });
        }
        let mut tex_sizes = [[0.0; 4]; MAX_SUPPORTED_TEXTURES];
        for (slot, &(w, h)) in tex_sizes.iter_mut().zip(texture_sizes) {
            *slot = texture_size_uniform(w, h);
        }
        Ok(Self { view_proj: view_proj.to_cols_array_2d(), tex_sizes })
    }
}

// ── InstancingGate ───────────────────────────────────────────────────────────

/// Decides per frame whether the instanced draw may run. When instancing is
/// off every call skips, and only the first one logs.
#[derive(Copy, Clone, Debug)]
pub struct InstancingGate {
    enabled: bool,
    warned: bool,
}

impl InstancingGate {
    pub fn new(caps: GpuCaps) -> Self {
        Self { enabled: caps.instancing, warned: false }
    }

    pub fn allow(&mut self) -> bool {
        if self.enabled {
            return true;
        }
        if !self.warned {
            log::warn!("instanced rendering unsupported on this adapter; sprite batch disabled");
            self.warned = true;
        }
        false
    }

    pub fn warned(&self) -> bool {
        self.warned
    }
}

// ── InstancedSpriteRenderer ──────────────────────────────────────────────────

/// Draws a whole `SpritePool` with one instanced call per frame.
///
/// Owns the GPU copies of the pool's three stores. Each frame uploads the
/// `[0, size)` prefix of every store, holes included, and draws `size`
/// instances of a 4-vertex strip. One renderer serves one pool; rendering it
/// twice in the same submission overwrites the first upload.
pub struct InstancedSpriteRenderer {
    variants: Arc<SpriteVariants>,
    caps: GpuCaps,
    gate: InstancingGate,
    capacity: usize,
    quad_buffer: wgpu::Buffer,
    geometry_buffer: wgpu::Buffer,
    color_buffer: wgpu::Buffer,
    tex_slot_buffer: wgpu::Buffer,
    /// Texture slots widened to `u32`, rebuilt before each upload.
    tex_slot_scratch: Vec<u32>,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    /// Texture bind group plus the ids it was built from.
    texture_bind_group: Option<(Vec<TextureId>, wgpu::BindGroup)>,
}

impl InstancedSpriteRenderer {
    pub fn new(
        device: &wgpu::Device,
        variants: Arc<SpriteVariants>,
        caps: GpuCaps,
        capacity: usize,
    ) -> Self {
        let quad_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sprite_unit_quad"),
            contents: bytemuck::cast_slice(&UNIT_QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let [geometry_buffer, color_buffer, tex_slot_buffer] =
            create_instance_buffers(device, capacity);

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sprite_globals"),
            size: std::mem::size_of::<SpriteGlobals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sprite_globals_bg"),
            layout: &variants.globals_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        Self {
            variants,
            caps,
            gate: InstancingGate::new(caps),
            capacity,
            quad_buffer,
            geometry_buffer,
            color_buffer,
            tex_slot_buffer,
            tex_slot_scratch: Vec::with_capacity(capacity),
            globals_buffer,
            globals_bind_group,
            texture_bind_group: None,
        }
    }

    pub fn caps(&self) -> GpuCaps {
        self.caps
    }

    /// Upload the pool and record its draw into `ctx.pass`.
    ///
    /// `textures[i]` is bound to slot `i`; the variant is picked by
    /// `textures.len()`. Does nothing (after one warning) when the adapter
    /// cannot do instancing.
    pub fn render(
        &mut self,
        ctx: &mut RenderContext<'_, '_>,
        pool: &SpritePool,
        textures: &[TextureId],
        world: Mat4,
        blend: BlendMode,
    ) -> Result<(), SpriteError> {
        if !self.gate.allow() {
            return Ok(());
        }
        if textures.len() > self.caps.max_textures {
            return Err(SpriteError::TooManyTextures {
                requested: textures.len(),
                max: self.caps.max_textures,
            });
        }
        let variants = Arc::clone(&self.variants);
        let variant = variants.get(textures.len())?;

        let count = pool.size();
        if count == 0 {
            return Ok(());
        }
        if count > self.capacity {
            self.grow(ctx.device, count);
        }

        // ── Uniforms ──────────────────────────────────────────────────────────
        let sizes = texture_sizes(ctx.textures, textures)?;
        let globals = SpriteGlobals::new(ctx.view_proj(world), &sizes)?;
        ctx.queue.write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));

        // ── Instance data ─────────────────────────────────────────────────────
        ctx.queue.write_buffer(&self.geometry_buffer, 0, pool.geometry_bytes());
        ctx.queue.write_buffer(&self.color_buffer, 0, pool.color_bytes());
        pool.widen_tex_slots(&mut self.tex_slot_scratch);
        ctx.queue.write_buffer(
            &self.tex_slot_buffer,
            0,
            bytemuck::cast_slice(&self.tex_slot_scratch),
        );

        // ── Draw ──────────────────────────────────────────────────────────────
        let pass = &mut *ctx.pass;
        pass.set_pipeline(variant.pipeline(blend));
        pass.set_bind_group(0, &self.globals_bind_group, &[]);
        if let Some(layout) = &variant.texture_bind_group_layout {
            let stale = match &self.texture_bind_group {
                Some((ids, _)) => ids.as_slice() != textures,
                None => true,
            };
            if stale {
                let group = create_texture_bind_group(ctx.device, layout, ctx.textures, textures)?;
                self.texture_bind_group = Some((textures.to_vec(), group));
            }
            if let Some((_, group)) = &self.texture_bind_group {
                pass.set_bind_group(1, group, &[]);
            }
        }

        let geometry_len = (count * SpriteRecord::STRIDE) as u64;
        let slot_len = (count * 4) as u64;
        pass.set_vertex_buffer(0, self.quad_buffer.slice(..));
        pass.set_vertex_buffer(1, self.geometry_buffer.slice(..geometry_len));
        pass.set_vertex_buffer(2, self.color_buffer.slice(..slot_len));
        pass.set_vertex_buffer(3, self.tex_slot_buffer.slice(..slot_len));
        pass.draw(0..UNIT_QUAD.len() as u32, 0..count as u32);
        Ok(())
    }

    fn grow(&mut self, device: &wgpu::Device, needed: usize) {
        let capacity = needed.next_power_of_two();
        [self.geometry_buffer, self.color_buffer, self.tex_slot_buffer] =
            create_instance_buffers(device, capacity);
        self.capacity = capacity;
        log::debug!("grew sprite instance buffers to {capacity} records");
    }
}

fn create_instance_buffers(device: &wgpu::Device, capacity: usize) -> [wgpu::Buffer; 3] {
    let make = |label: &str, stride: usize| {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (capacity.max(1) * stride) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    };
    [
        make("sprite_geometry", SpriteRecord::STRIDE),
        make("sprite_colors", 4),
        make("sprite_tex_slots", 4),
    ]
}

fn texture_sizes(
    manager: &TextureManager,
    textures: &[TextureId],
) -> Result<Vec<(u32, u32)>, SpriteError> {
    textures
        .iter()
        .map(|&id| manager.get(id).map(|t| (t.width, t.height)))
        .collect()
}

fn create_texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    manager: &TextureManager,
    textures: &[TextureId],
) -> Result<wgpu::BindGroup, SpriteError> {
    let views = textures
        .iter()
        .map(|&id| manager.get(id).map(|t| &t.texture_view))
        .collect::<Result<Vec<_>, _>>()?;

    let mut entries: Vec<wgpu::BindGroupEntry> = views
        .into_iter()
        .enumerate()
        .map(|(i, view)| wgpu::BindGroupEntry {
            binding: i as u32,
            resource: wgpu::BindingResource::TextureView(view),
        })
        .collect();
    entries.push(wgpu::BindGroupEntry {
        binding: textures.len() as u32,
        resource: wgpu::BindingResource::Sampler(&manager.sampler),
    });

    Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("sprite_textures_bg"),
        layout,
        entries: &entries,
    }))
}

// ── SpriteBatch ──────────────────────────────────────────────────────────────

/// A sprite pool bound to as many textures as the adapter caps allow, drawable
/// as a scene node.
pub struct SpriteBatch {
    pub pool: SpritePool,
    textures: Vec<TextureId>,
    renderer: InstancedSpriteRenderer,
}

impl SpriteBatch {
    pub fn new(
        device: &wgpu::Device,
        variants: Arc<SpriteVariants>,
        caps: GpuCaps,
        pool: SpritePool,
    ) -> Self {
        let renderer = InstancedSpriteRenderer::new(device, variants, caps, pool.capacity());
        Self { pool, textures: Vec::new(), renderer }
    }

    /// Bind `texture` to the next free slot and return that slot.
    pub fn add_texture(&mut self, texture: TextureId) -> Result<u8, SpriteError> {
        if let Some(slot) = self.textures.iter().position(|&t| t == texture) {
            return Ok(slot as u8);
        }
        let max = self.renderer.caps().max_textures;
        if self.textures.len() >= max {
            return Err(SpriteError::TooManyTextures { requested: self.textures.len() + 1, max });
        }
        self.textures.push(texture);
        Ok((self.textures.len() - 1) as u8)
    }

    pub fn textures(&self) -> &[TextureId] {
        &self.textures
    }
}

impl RenderNode for SpriteBatch {
    fn render(
        &mut self,
        ctx: &mut RenderContext<'_, '_>,
        world: Mat4,
        blend: BlendMode,
    ) -> Result<(), SpriteError> {
        self.renderer.render(ctx, &self.pool, &self.textures, world, blend)
    }
}
