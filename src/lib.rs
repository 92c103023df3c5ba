pub mod camera;
pub mod config;
pub mod error;
pub mod fast_sprite;
pub mod renderer;
pub mod sprites;

pub use camera::{Camera2D, CameraUniform};
pub use config::BatchConfig;
pub use error::SpriteError;
pub use fast_sprite::{FastSprite, FastSpriteContainer, SharedFastSprite};
pub use renderer::instanced::{InstancedSpriteRenderer, SpriteBatch};
pub use renderer::quad_batch::{FastSpriteLayer, QuadBatcher, QuadVertex};
pub use renderer::texture::{TextureId, TextureManager, TextureRegion};
pub use renderer::variants::{ShaderVariantCache, SpriteVariants};
pub use renderer::{BlendMode, GpuCaps, RenderContext, RenderNode, Renderer};
pub use sprites::{MAX_SUPPORTED_TEXTURES, PackedAnchor, Rgba, SpriteHandle, SpritePool, TexelRect};
