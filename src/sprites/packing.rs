// ── Packed per-instance value types ─────────────────────────────────────────
//
// Bit layouts shared between the CPU stores and the instanced vertex shader.
// The GPU reads these words directly (`Unorm16x2`, `Uint16x4`, `Unorm8x4`),
// so every encoder here must stay bit-compatible with `instanced.rs`.

/// Largest value of a 16-bit unsigned fixed-point fraction.
const ANCHOR_SCALE: f32 = 65535.0;

/// Encode one anchor component as a 16-bit fraction.
///
/// Input is clamped to `[0, 1]` first, so `-0.5` packs like `0.0` and `1.5`
/// packs like `1.0`. NaN packs as `0`.
#[inline]
pub fn pack_anchor_component(v: f32) -> u32 {
    let clamped = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
    ((clamped * ANCHOR_SCALE).round() as u32) & 0xFFFF
}

/// Decode the low 16 bits of `v` back into `[0, 1]`.
#[inline]
pub fn unpack_anchor_component(v: u32) -> f32 {
    (v & 0xFFFF) as f32 / ANCHOR_SCALE
}

// ── PackedAnchor ─────────────────────────────────────────────────────────────

/// Two 16-bit anchor fractions in one word: x in bits 0..16, y in bits 16..32.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedAnchor(pub u32);

impl PackedAnchor {
    pub const TOP_LEFT: Self = Self(0);
    pub const CENTER: Self = Self(0x8000_8000);

    pub fn new(x: f32, y: f32) -> Self {
        Self((pack_anchor_component(y) << 16) | pack_anchor_component(x))
    }

    pub fn x(self) -> f32 {
        unpack_anchor_component(self.0)
    }

    pub fn y(self) -> f32 {
        unpack_anchor_component(self.0 >> 16)
    }
}

// ── TexelRect ────────────────────────────────────────────────────────────────

/// Source rectangle inside a texture, in raw texel coordinates.
///
/// Stored on the GPU as two words, `uv0 = left | top << 16` and
/// `uv1 = right | bottom << 16`. Only the instanced path uses this form; the
/// immediate path carries normalized float UVs instead.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TexelRect {
    pub left: u16,
    pub top: u16,
    pub right: u16,
    pub bottom: u16,
}

impl TexelRect {
    pub fn new(left: u16, top: u16, right: u16, bottom: u16) -> Self {
        Self { left, top, right, bottom }
    }

    /// Rectangle from an origin and a size, saturating at `u16::MAX`.
    pub fn from_xywh(x: u32, y: u32, w: u32, h: u32) -> Self {
        let clamp = |v: u32| v.min(u16::MAX as u32) as u16;
        Self {
            left: clamp(x),
            top: clamp(y),
            right: clamp(x.saturating_add(w)),
            bottom: clamp(y.saturating_add(h)),
        }
    }

    pub fn uv0(self) -> u32 {
        self.left as u32 | ((self.top as u32) << 16)
    }

    pub fn uv1(self) -> u32 {
        self.right as u32 | ((self.bottom as u32) << 16)
    }

    pub fn from_words(uv0: u32, uv1: u32) -> Self {
        Self {
            left: (uv0 & 0xFFFF) as u16,
            top: (uv0 >> 16) as u16,
            right: (uv1 & 0xFFFF) as u16,
            bottom: (uv1 >> 16) as u16,
        }
    }

    /// Width in texels; negative for horizontally flipped rects.
    pub fn width(self) -> i32 {
        self.right as i32 - self.left as i32
    }

    /// Height in texels; negative for vertically flipped rects.
    pub fn height(self) -> i32 {
        self.bottom as i32 - self.top as i32
    }
}

// ── Rgba ─────────────────────────────────────────────────────────────────────

/// Packed 8-bit-per-channel color; red in the lowest byte so the in-memory
/// byte order is R, G, B, A (`Unorm8x4` on the GPU).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Rgba(pub u32);

impl Rgba {
    pub const WHITE: Self = Self(0xFFFF_FFFF);
    pub const BLACK: Self = Self(0xFF00_0000);
    pub const TRANSPARENT: Self = Self(0);

    pub const fn from_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self(r as u32 | (g as u32) << 8 | (b as u32) << 16 | (a as u32) << 24)
    }

    /// From normalized float channels, clamped to `[0, 1]`.
    pub fn from_f32(r: f32, g: f32, b: f32, a: f32) -> Self {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::from_rgba(q(r), q(g), q(b), q(a))
    }

    pub fn r(self) -> u8 {
        self.0 as u8
    }

    pub fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn b(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn a(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn to_f32(self) -> [f32; 4] {
        [
            self.r() as f32 / 255.0,
            self.g() as f32 / 255.0,
            self.b() as f32 / 255.0,
            self.a() as f32 / 255.0,
        ]
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_extremes_are_exact() {
        assert_eq!(pack_anchor_component(0.0), 0);
        assert_eq!(pack_anchor_component(1.0), 0xFFFF);
        assert_eq!(unpack_anchor_component(0xFFFF), 1.0);
    }

    #[test]
    fn anchor_half_rounds_up() {
        // 0.5 * 65535 = 32767.5
        assert_eq!(pack_anchor_component(0.5), 32768);
    }

    #[test]
    fn anchor_nan_packs_to_zero() {
        assert_eq!(pack_anchor_component(f32::NAN), 0);
    }

    #[test]
    fn packed_anchor_puts_x_in_low_half() {
        let a = PackedAnchor::new(1.0, 0.0);
        assert_eq!(a.0, 0x0000_FFFF);
        let b = PackedAnchor::new(0.0, 1.0);
        assert_eq!(b.0, 0xFFFF_0000);
    }

    #[test]
    fn texel_rect_words() {
        let r = TexelRect::new(1, 2, 3, 4);
        assert_eq!(r.uv0(), 0x0002_0001);
        assert_eq!(r.uv1(), 0x0004_0003);
        assert_eq!(TexelRect::from_words(r.uv0(), r.uv1()), r);
    }

    #[test]
    fn texel_rect_from_xywh_saturates() {
        let r = TexelRect::from_xywh(65000, 0, 1000, 16);
        assert_eq!(r.right, u16::MAX);
        assert_eq!(r.height(), 16);
    }

    #[test]
    fn rgba_byte_order_is_r_g_b_a() {
        let c = Rgba::from_rgba(1, 2, 3, 4);
        assert_eq!(bytemuck::bytes_of(&c), &[1, 2, 3, 4]);
        assert_eq!((c.r(), c.g(), c.b(), c.a()), (1, 2, 3, 4));
    }
}
