use wgpu::util::DeviceExt;

use crate::error::SpriteError;
use crate::sprites::TexelRect;

// ── TextureId ────────────────────────────────────────────────────────────────

/// Opaque key of a texture owned by a `TextureManager`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

// ── TextureRegion ────────────────────────────────────────────────────────────

/// A sub-rectangle of a texture, in pixels, plus the full texture size so
/// normalized UVs can be derived without a manager lookup.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TextureRegion {
    pub texture: TextureId,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub tex_width: u32,
    pub tex_height: u32,
}

impl TextureRegion {
    /// Region covering the whole texture.
    pub fn full(texture: TextureId, width: u32, height: u32) -> Self {
        Self { texture, x: 0, y: 0, width, height, tex_width: width, tex_height: height }
    }

    pub fn slice(&self, x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x: self.x.saturating_add(x), y: self.y.saturating_add(y), width, height, ..*self }
    }

    /// Integer texel corners for the instanced path.
    pub fn texel_rect(&self) -> TexelRect {
        TexelRect::from_xywh(self.x, self.y, self.width, self.height)
    }

    /// Normalized `(tx0, ty0, tx1, ty1)` for the immediate path.
    pub fn uv_rect(&self) -> [f32; 4] {
        let tw = self.tex_width.max(1) as f32;
        let th = self.tex_height.max(1) as f32;
        [
            self.x as f32 / tw,
            self.y as f32 / th,
            self.x.saturating_add(self.width) as f32 / tw,
            self.y.saturating_add(self.height) as f32 / th,
        ]
    }
}

// ── GpuTexture ───────────────────────────────────────────────────────────────

pub struct GpuTexture {
    pub texture_view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl GpuTexture {
    /// `(w, h, 1/w, 1/h)` as consumed by the instanced shader.
    pub fn size_uniform(&self) -> [f32; 4] {
        texture_size_uniform(self.width, self.height)
    }
}

pub fn texture_size_uniform(width: u32, height: u32) -> [f32; 4] {
    let w = width.max(1) as f32;
    let h = height.max(1) as f32;
    [w, h, 1.0 / w, 1.0 / h]
}

// ── TextureManager ───────────────────────────────────────────────────────────

/// Owns every sprite texture and the single sampler they are read with.
pub struct TextureManager {
    textures: Vec<GpuTexture>,
    pub sampler: wgpu::Sampler,
}

impl TextureManager {
    pub fn new(device: &wgpu::Device) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sprite_sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        Self { textures: Vec::new(), sampler }
    }

    /// Decode a PNG and upload it as an sRGB texture.
    pub fn load_png(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        png_bytes: &[u8],
    ) -> Result<TextureRegion, SpriteError> {
        let img = image::load_from_memory(png_bytes)?.to_rgba8();
        let (w, h) = img.dimensions();
        Ok(self.insert_rgba(device, queue, w, h, &img))
    }

    /// Upload tightly packed RGBA8 pixels.
    pub fn insert_rgba(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> TextureRegion {
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("sprite_texture"),
                size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            rgba,
        );
        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let id = TextureId(self.textures.len() as u32);
        self.textures.push(GpuTexture { texture_view, width, height });
        log::debug!("texture {id:?} uploaded ({width}x{height})");
        TextureRegion::full(id, width, height)
    }

    pub fn get(&self, id: TextureId) -> Result<&GpuTexture, SpriteError> {
        self.textures.get(id.0 as usize).ok_or(SpriteError::UnknownTexture(id))
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uv_rect_normalizes_by_texture_size() {
        let atlas = TextureRegion::full(TextureId(0), 64, 32);
        let r = atlas.slice(16, 8, 16, 8);
        assert_eq!(r.uv_rect(), [0.25, 0.25, 0.5, 0.5]);
        assert_eq!(r.texel_rect(), TexelRect::new(16, 8, 32, 16));
    }

    #[test]
    fn regions_near_u32_max_saturate() {
        let far = TextureRegion { x: u32::MAX - 1, width: 4, ..TextureRegion::full(TextureId(0), 8, 8) };
        let uv = far.uv_rect();
        assert_eq!(uv[2], u32::MAX as f32 / 8.0);

        let nested = far.slice(10, 0, 2, 2);
        assert_eq!(nested.x, u32::MAX);
        assert!(nested.uv_rect().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn size_uniform_has_reciprocals() {
        assert_eq!(texture_size_uniform(4, 8), [4.0, 8.0, 0.25, 0.125]);
    }
}
