use thiserror::Error;

use crate::renderer::texture::TextureId;

/// Errors raised by sprite pools, batchers and the renderers that draw them.
#[derive(Error, Debug)]
pub enum SpriteError {
    #[error("sprite pool is full ({capacity} slots)")]
    CapacityExhausted { capacity: usize },

    #[error("batch requests {requested} textures, at most {max} are supported")]
    TooManyTextures { requested: usize, max: usize },

    #[error("container mixes textures: expected {expected:?}, found {found:?}")]
    MixedTextures { expected: TextureId, found: TextureId },

    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureId),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to build shader variant for {count} textures: {reason}")]
    ShaderBuild { count: usize, reason: String },

    #[error("gpu setup failed: {0}")]
    Gpu(String),

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),
}
