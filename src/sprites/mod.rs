pub mod allocator;
pub mod packing;
pub mod store;

pub use allocator::{SlotAllocator, SpriteHandle};
pub use packing::{PackedAnchor, Rgba, TexelRect, pack_anchor_component, unpack_anchor_component};
pub use store::{ColorStore, MAX_SUPPORTED_TEXTURES, PackedVertexStore, SpriteRecord, TextureIdStore};

use crate::config::BatchConfig;
use crate::error::SpriteError;
use crate::renderer::texture::TextureRegion;

// ── SpritePool ───────────────────────────────────────────────────────────────

/// Fixed-capacity set of instanced sprites.
///
/// Owns the geometry, color and texture-slot stores plus the allocator that
/// indexes all three, so record `i` of each store always describes the same
/// sprite. Freed slots are never compacted: uploads always cover `[0, size)`
/// and freed records are hidden by a transparent color.
pub struct SpritePool {
    allocator: SlotAllocator,
    geometry: PackedVertexStore,
    colors: ColorStore,
    tex_slots: TextureIdStore,
}

impl SpritePool {
    pub fn new(capacity: usize) -> Self {
        Self::build(capacity, cfg!(debug_assertions))
    }

    pub fn with_config(config: &BatchConfig) -> Result<Self, SpriteError> {
        config.validate()?;
        Ok(Self::build(config.capacity, config.checked_handles))
    }

    fn build(capacity: usize, checked: bool) -> Self {
        Self {
            allocator: SlotAllocator::new(capacity, checked),
            geometry: PackedVertexStore::new(capacity),
            colors: ColorStore::new(capacity),
            tex_slots: TextureIdStore::new(capacity),
        }
    }

    // ── Allocation ───────────────────────────────────────────────────────────

    /// Claim a slot and reset it to the identity transform, opaque white,
    /// texture slot 0. The texel rect is left as it was.
    pub fn alloc(&mut self) -> Result<SpriteHandle, SpriteError> {
        let handle = self.allocator.alloc()?;
        let i = handle.index();
        let rec = self.geometry.get_mut(i);
        *rec = SpriteRecord { uv0: rec.uv0, uv1: rec.uv1, ..SpriteRecord::DEFAULT };
        self.colors.set(i, Rgba::WHITE);
        self.tex_slots.set(i, 0);
        Ok(handle)
    }

    /// Release a slot. Its geometry stays in place but its color becomes
    /// fully transparent, which the fragment stage discards.
    pub fn free(&mut self, handle: SpriteHandle) {
        self.allocator.free(handle);
        self.colors.set(handle.index(), Rgba::TRANSPARENT);
    }

    /// Drop every sprite. Records are left as-is; nothing is uploaded until
    /// new slots are allocated.
    pub fn reset(&mut self) {
        self.allocator.reset();
    }

    pub fn capacity(&self) -> usize {
        self.allocator.capacity()
    }

    /// High-water mark: the number of records every upload covers.
    pub fn size(&self) -> usize {
        self.allocator.size()
    }

    /// Headroom above the high-water mark.
    pub fn available(&self) -> usize {
        self.allocator.available()
    }

    /// Headroom plus reclaimed slots below the high-water mark.
    pub fn free_slots(&self) -> usize {
        self.allocator.free_slots()
    }

    pub fn live_count(&self) -> usize {
        self.allocator.live_count()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    #[inline]
    fn rec(&self, h: SpriteHandle) -> &SpriteRecord {
        self.allocator.validate(h);
        self.geometry.get(h.index())
    }

    #[inline]
    fn rec_mut(&mut self, h: SpriteHandle) -> &mut SpriteRecord {
        self.allocator.validate(h);
        self.geometry.get_mut(h.index())
    }

    pub fn record(&self, h: SpriteHandle) -> SpriteRecord {
        *self.rec(h)
    }

    pub fn x(&self, h: SpriteHandle) -> f32 {
        self.rec(h).x
    }

    pub fn set_x(&mut self, h: SpriteHandle, x: f32) {
        self.rec_mut(h).x = x;
    }

    pub fn y(&self, h: SpriteHandle) -> f32 {
        self.rec(h).y
    }

    pub fn set_y(&mut self, h: SpriteHandle, y: f32) {
        self.rec_mut(h).y = y;
    }

    pub fn position(&self, h: SpriteHandle) -> (f32, f32) {
        let r = self.rec(h);
        (r.x, r.y)
    }

    pub fn set_position(&mut self, h: SpriteHandle, x: f32, y: f32) {
        let r = self.rec_mut(h);
        r.x = x;
        r.y = y;
    }

    pub fn scale_x(&self, h: SpriteHandle) -> f32 {
        self.rec(h).scale_x
    }

    pub fn scale_y(&self, h: SpriteHandle) -> f32 {
        self.rec(h).scale_y
    }

    pub fn set_scale(&mut self, h: SpriteHandle, sx: f32, sy: f32) {
        let r = self.rec_mut(h);
        r.scale_x = sx;
        r.scale_y = sy;
    }

    pub fn set_scale_uniform(&mut self, h: SpriteHandle, s: f32) {
        self.set_scale(h, s, s);
    }

    /// Rotation in radians.
    pub fn angle(&self, h: SpriteHandle) -> f32 {
        self.rec(h).angle
    }

    pub fn set_angle(&mut self, h: SpriteHandle, radians: f32) {
        self.rec_mut(h).angle = radians;
    }

    /// Decoded anchor, each component within 1/65535 of what was set.
    pub fn anchor(&self, h: SpriteHandle) -> (f32, f32) {
        let a = self.rec(h).anchor;
        (a.x(), a.y())
    }

    /// Components are clamped to `[0, 1]`.
    pub fn set_anchor(&mut self, h: SpriteHandle, x: f32, y: f32) {
        self.rec_mut(h).anchor = PackedAnchor::new(x, y);
    }

    pub fn texel_rect(&self, h: SpriteHandle) -> TexelRect {
        self.rec(h).texel_rect()
    }

    pub fn set_texel_rect(&mut self, h: SpriteHandle, rect: TexelRect) {
        let r = self.rec_mut(h);
        r.uv0 = rect.uv0();
        r.uv1 = rect.uv1();
    }

    /// Point the sprite at an atlas region. Only the texel rect changes; the
    /// texture itself is chosen with `set_tex_slot`.
    pub fn set_region(&mut self, h: SpriteHandle, region: &TextureRegion) {
        self.set_texel_rect(h, region.texel_rect());
    }

    pub fn tex_slot(&self, h: SpriteHandle) -> u8 {
        self.allocator.validate(h);
        self.tex_slots.get(h.index())
    }

    pub fn set_tex_slot(&mut self, h: SpriteHandle, slot: u8) {
        self.allocator.validate(h);
        self.tex_slots.set(h.index(), slot);
    }

    pub fn color(&self, h: SpriteHandle) -> Rgba {
        self.allocator.validate(h);
        self.colors.get(h.index())
    }

    pub fn set_color(&mut self, h: SpriteHandle, color: Rgba) {
        self.allocator.validate(h);
        self.colors.set(h.index(), color);
    }

    // ── Raw views (upload) ───────────────────────────────────────────────────

    /// Color of record `index` regardless of liveness; freed slots read back
    /// as transparent.
    pub fn color_at(&self, index: usize) -> Rgba {
        self.colors.get(index)
    }

    pub fn record_at(&self, index: usize) -> SpriteRecord {
        *self.geometry.get(index)
    }

    pub fn geometry_bytes(&self) -> &[u8] {
        self.geometry.bytes(self.size())
    }

    pub fn color_bytes(&self) -> &[u8] {
        self.colors.bytes(self.size())
    }

    pub fn tex_slot_bytes(&self) -> &[u8] {
        self.tex_slots.bytes(self.size())
    }

    /// Texture slots of `[0, size)` widened to one `u32` each.
    pub fn widen_tex_slots(&self, out: &mut Vec<u32>) {
        self.tex_slots.widen_into(self.size(), out);
    }
}
