pub mod instanced;
pub mod quad_batch;
pub mod shader_gen;
pub mod texture;
pub mod variants;

use std::sync::Arc;

use glam::Mat4;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::camera::CameraUniform;
use crate::error::SpriteError;
use crate::sprites::MAX_SUPPORTED_TEXTURES;
use texture::TextureManager;

// ── BlendMode ────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Straight-alpha "over".
    #[default]
    Normal,
    Add,
    Multiply,
    /// Overwrite the target.
    None,
}

impl BlendMode {
    pub const COUNT: usize = 4;
    pub const ALL: [BlendMode; Self::COUNT] =
        [BlendMode::Normal, BlendMode::Add, BlendMode::Multiply, BlendMode::None];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn state(self) -> Option<wgpu::BlendState> {
        use wgpu::{BlendComponent, BlendFactor, BlendOperation, BlendState};
        match self {
            BlendMode::Normal => Some(BlendState::ALPHA_BLENDING),
            BlendMode::Add => Some(BlendState {
                color: BlendComponent {
                    src_factor: BlendFactor::SrcAlpha,
                    dst_factor: BlendFactor::One,
                    operation: BlendOperation::Add,
                },
                alpha: BlendComponent {
                    src_factor: BlendFactor::One,
                    dst_factor: BlendFactor::One,
                    operation: BlendOperation::Add,
                },
            }),
            BlendMode::Multiply => Some(BlendState {
                color: BlendComponent {
                    src_factor: BlendFactor::Dst,
                    dst_factor: BlendFactor::OneMinusSrcAlpha,
                    operation: BlendOperation::Add,
                },
                alpha: BlendComponent::OVER,
            }),
            BlendMode::None => Some(BlendState::REPLACE),
        }
    }
}

// ── GpuCaps ──────────────────────────────────────────────────────────────────

/// What the active adapter can do for the sprite renderers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GpuCaps {
    /// Per-instance vertex attributes are usable.
    pub instancing: bool,
    /// Textures one instanced batch may bind, capped at `MAX_SUPPORTED_TEXTURES`.
    pub max_textures: usize,
}

impl GpuCaps {
    /// wgpu adapters that can create a device all report shader model 5 or
    /// better, so `instancing` only comes out false for an SM2 report. Hosts
    /// that must avoid instancing build `GpuCaps { instancing: false, .. }`
    /// themselves.
    pub fn from_adapter(adapter: &wgpu::Adapter) -> Self {
        let downlevel = adapter.get_downlevel_capabilities();
        let limits = adapter.limits();
        Self {
            instancing: !matches!(downlevel.shader_model, wgpu::ShaderModel::Sm2),
            max_textures: (limits.max_sampled_textures_per_shader_stage as usize)
                .min(MAX_SUPPORTED_TEXTURES),
        }
    }

    /// Everything enabled; for hosts that already know their backend.
    pub fn full() -> Self {
        Self { instancing: true, max_textures: MAX_SUPPORTED_TEXTURES }
    }

    /// Lower the texture limit to `max_textures` (never raises it).
    pub fn limited(self, max_textures: usize) -> Self {
        Self { max_textures: self.max_textures.min(max_textures), ..self }
    }
}

// ── RenderContext / RenderNode ───────────────────────────────────────────────

/// Everything a node needs to draw into the current render pass.
pub struct RenderContext<'a, 'pass> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub pass: &'a mut wgpu::RenderPass<'pass>,
    pub textures: &'a TextureManager,
    pub camera: CameraUniform,
}

impl RenderContext<'_, '_> {
    /// Camera view-projection composed with a node's world transform.
    pub fn view_proj(&self, world: Mat4) -> Mat4 {
        self.camera.to_mat4() * world
    }
}

/// Scene-graph hook: called once per frame by whatever owns the node.
pub trait RenderNode {
    fn render(
        &mut self,
        ctx: &mut RenderContext<'_, '_>,
        world: Mat4,
        blend: BlendMode,
    ) -> Result<(), SpriteError>;
}

// ── Renderer ─────────────────────────────────────────────────────────────────

/// Window surface plus device; drives one render pass per frame over a list
/// of nodes.
pub struct Renderer {
    pub window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pub caps: GpuCaps,
    pub textures: TextureManager,
    pub clear_color: wgpu::Color,
}

impl Renderer {
    pub async fn new(window: Arc<Window>) -> Result<Self, SpriteError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(Arc::clone(&window))
            .map_err(|e| SpriteError::Gpu(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                compatible_surface: Some(&surface),
                ..Default::default()
            })
            .await
            .map_err(|e| SpriteError::Gpu(e.to_string()))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await
            .map_err(|e| SpriteError::Gpu(e.to_string()))?;

        let caps = GpuCaps::from_adapter(&adapter);
        log::info!("adapter {:?}, caps {caps:?}", adapter.get_info().name);

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .first()
            .copied()
            .ok_or_else(|| SpriteError::Gpu("surface reports no formats".into()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let textures = TextureManager::new(&device);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            caps,
            textures,
            clear_color: wgpu::Color::BLACK,
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Render one frame: clear, then let every node draw in order with an
    /// identity world transform and its own blend mode.
    pub fn render(
        &mut self,
        camera: CameraUniform,
        nodes: &mut [(&mut dyn RenderNode, BlendMode)],
    ) -> Result<(), SpriteError> {
        let frame = self.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("sprite_frame") });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sprite_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            let mut ctx = RenderContext {
                device: &self.device,
                queue: &self.queue,
                pass: &mut pass,
                textures: &self.textures,
                camera,
            };
            for (node, blend) in nodes.iter_mut() {
                node.render(&mut ctx, Mat4::IDENTITY, *blend)?;
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_indices_follow_all_order() {
        for (i, mode) in BlendMode::ALL.iter().enumerate() {
            assert_eq!(mode.index(), i);
        }
    }

    #[test]
    fn limited_caps_only_shrink() {
        assert_eq!(GpuCaps::full().limited(2).max_textures, 2);
        assert_eq!(GpuCaps::full().limited(99).max_textures, MAX_SUPPORTED_TEXTURES);
    }

    #[test]
    fn every_blend_mode_has_a_state() {
        assert!(BlendMode::ALL.iter().all(|m| m.state().is_some()));
    }
}
