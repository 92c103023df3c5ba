use super::packing::{PackedAnchor, Rgba, TexelRect};

/// Upper bound on textures one instanced batch may sample from.
pub const MAX_SUPPORTED_TEXTURES: usize = 4;

// ── SpriteRecord ─────────────────────────────────────────────────────────────

/// One packed geometry record. Layout (byte offsets):
///
/// ```text
///  0 x        f32
///  4 y        f32
///  8 scale_x  f32
/// 12 scale_y  f32
/// 16 angle    f32   radians
/// 20 anchor   u32   x | y << 16, 16-bit fractions
/// 24 uv0      u32   left | top << 16, texels
/// 28 uv1      u32   right | bottom << 16, texels
/// ```
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpriteRecord {
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub angle: f32,
    pub anchor: PackedAnchor,
    pub uv0: u32,
    pub uv1: u32,
}

impl SpriteRecord {
    pub const STRIDE: usize = std::mem::size_of::<SpriteRecord>();

    pub const OFFSET_POSITION: u64 = 0;
    pub const OFFSET_SCALE: u64 = 8;
    pub const OFFSET_ANGLE: u64 = 16;
    pub const OFFSET_ANCHOR: u64 = 20;
    pub const OFFSET_RECT: u64 = 24;

    /// Identity transform at the origin. The texel rect is preserved by
    /// `reset` callers that want to keep it; this default zeroes it.
    pub const DEFAULT: Self = Self {
        x: 0.0,
        y: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
        angle: 0.0,
        anchor: PackedAnchor::TOP_LEFT,
        uv0: 0,
        uv1: 0,
    };

    pub fn texel_rect(&self) -> TexelRect {
        TexelRect::from_words(self.uv0, self.uv1)
    }
}

impl Default for SpriteRecord {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ── PackedVertexStore ────────────────────────────────────────────────────────

/// Fixed-capacity array of geometry records. Indices are trusted: the slot
/// allocator is the only thing that hands them out.
pub struct PackedVertexStore {
    records: Box<[SpriteRecord]>,
}

impl PackedVertexStore {
    pub fn new(capacity: usize) -> Self {
        Self { records: vec![SpriteRecord::DEFAULT; capacity].into_boxed_slice() }
    }

    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn get(&self, index: usize) -> &SpriteRecord {
        &self.records[index]
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> &mut SpriteRecord {
        &mut self.records[index]
    }

    /// Raw bytes of records `[0, len)`, ready for a GPU upload.
    pub fn bytes(&self, len: usize) -> &[u8] {
        bytemuck::cast_slice(&self.records[..len])
    }
}

// ── ColorStore ───────────────────────────────────────────────────────────────

/// One packed color per record, kept apart from geometry so it binds as its
/// own instance buffer.
pub struct ColorStore {
    colors: Box<[Rgba]>,
}

impl ColorStore {
    pub fn new(capacity: usize) -> Self {
        Self { colors: vec![Rgba::WHITE; capacity].into_boxed_slice() }
    }

    #[inline]
    pub fn get(&self, index: usize) -> Rgba {
        self.colors[index]
    }

    #[inline]
    pub fn set(&mut self, index: usize, color: Rgba) {
        self.colors[index] = color;
    }

    pub fn bytes(&self, len: usize) -> &[u8] {
        bytemuck::cast_slice(&self.colors[..len])
    }
}

// ── TextureIdStore ───────────────────────────────────────────────────────────

/// One texture-slot byte per record, in `[0, MAX_SUPPORTED_TEXTURES)`.
pub struct TextureIdStore {
    slots: Box<[u8]>,
}

impl TextureIdStore {
    pub fn new(capacity: usize) -> Self {
        Self { slots: vec![0; capacity].into_boxed_slice() }
    }

    #[inline]
    pub fn get(&self, index: usize) -> u8 {
        self.slots[index]
    }

    #[inline]
    pub fn set(&mut self, index: usize, slot: u8) {
        debug_assert!(
            (slot as usize) < MAX_SUPPORTED_TEXTURES,
            "texture slot {slot} out of range"
        );
        self.slots[index] = slot;
    }

    pub fn bytes(&self, len: usize) -> &[u8] {
        &self.slots[..len]
    }

    /// Copy `[0, len)` into `out`, one `u32` per record (vertex buffers need
    /// a 4-byte stride).
    pub fn widen_into(&self, len: usize, out: &mut Vec<u32>) {
        out.clear();
        out.extend(self.slots[..len].iter().map(|&s| s as u32));
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_eight_words() {
        assert_eq!(SpriteRecord::STRIDE, 32);
        assert_eq!(std::mem::align_of::<SpriteRecord>(), 4);
    }

    #[test]
    fn record_field_offsets_match_constants() {
        let r = SpriteRecord {
            anchor: PackedAnchor(0xAABB_CCDD),
            uv0: 0x1111_2222,
            ..SpriteRecord::DEFAULT
        };
        let bytes = bytemuck::bytes_of(&r);
        let word = |off: u64| {
            let o = off as usize;
            u32::from_le_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]])
        };
        assert_eq!(word(SpriteRecord::OFFSET_ANCHOR), 0xAABB_CCDD);
        assert_eq!(word(SpriteRecord::OFFSET_RECT), 0x1111_2222);
        assert_eq!(f32::from_bits(word(SpriteRecord::OFFSET_SCALE)), 1.0);
    }

    #[test]
    fn bytes_cover_only_prefix() {
        let store = PackedVertexStore::new(8);
        assert_eq!(store.bytes(3).len(), 3 * SpriteRecord::STRIDE);
        let colors = ColorStore::new(8);
        assert_eq!(colors.bytes(3).len(), 12);
    }

    #[test]
    fn widen_texture_slots() {
        let mut ids = TextureIdStore::new(4);
        ids.set(1, 3);
        ids.set(2, 2);
        let mut out = vec![99];
        ids.widen_into(3, &mut out);
        assert_eq!(out, vec![0, 3, 2]);
    }
}
