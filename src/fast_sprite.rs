// =============================================================================
// FAST_SPRITE.RS — CPU-transformed sprites for the immediate quad path
//
// Each sprite caches its four world-space corners. What gets recomputed
// depends on what changed:
// - position only: add the new translation to the cached local offsets
// - scale / anchor / size: rebuild the local offsets, then translate
// - rotation: refresh cos/sin (only if the angle really changed), rebuild
// =============================================================================

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::SpriteError;
use crate::renderer::quad_batch::{QuadBatcher, QuadVertex};
use crate::renderer::texture::{TextureId, TextureRegion};
use crate::sprites::Rgba;

// ── FastSprite ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct FastSprite {
    region: TextureRegion,
    /// Normalized `(tx0, ty0, tx1, ty1)` of `region`.
    uv: [f32; 4],
    x: f32,
    y: f32,
    scale_x: f32,
    scale_y: f32,
    anchor_x: f32,
    anchor_y: f32,
    rotation: f32,
    cos: f32,
    sin: f32,
    /// False while `rotation == 0`; corners skip the rotation terms.
    use_rotation: bool,
    color: Rgba,
    visible: bool,
    /// Corner offsets relative to the position, order TL, TR, BR, BL.
    local: [[f32; 2]; 4],
    corners: [[f32; 2]; 4],
}

impl FastSprite {
    pub fn new(region: &TextureRegion) -> Self {
        let mut sprite = Self {
            region: *region,
            uv: region.uv_rect(),
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            anchor_x: 0.0,
            anchor_y: 0.0,
            rotation: 0.0,
            cos: 1.0,
            sin: 0.0,
            use_rotation: false,
            color: Rgba::WHITE,
            visible: true,
            local: [[0.0; 2]; 4],
            corners: [[0.0; 2]; 4],
        };
        sprite.update_local();
        sprite
    }

    // ── Position (cheap path) ────────────────────────────────────────────────

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn set_x(&mut self, x: f32) {
        self.set_position(x, self.y);
    }

    pub fn set_y(&mut self, y: f32) {
        self.set_position(self.x, y);
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        self.update_translation();
    }

    // ── Shape (full path) ────────────────────────────────────────────────────

    pub fn scale(&self) -> (f32, f32) {
        (self.scale_x, self.scale_y)
    }

    pub fn set_scale(&mut self, sx: f32, sy: f32) {
        if sx == self.scale_x && sy == self.scale_y {
            return;
        }
        self.scale_x = sx;
        self.scale_y = sy;
        self.update_local();
    }

    pub fn anchor(&self) -> (f32, f32) {
        (self.anchor_x, self.anchor_y)
    }

    pub fn set_anchor(&mut self, ax: f32, ay: f32) {
        if ax == self.anchor_x && ay == self.anchor_y {
            return;
        }
        self.anchor_x = ax;
        self.anchor_y = ay;
        self.update_local();
    }

    /// Rotation in radians.
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn set_rotation(&mut self, radians: f32) {
        if radians == self.rotation {
            return;
        }
        self.rotation = radians;
        self.cos = radians.cos();
        self.sin = radians.sin();
        self.use_rotation = radians != 0.0;
        self.update_local();
    }

    pub fn region(&self) -> &TextureRegion {
        &self.region
    }

    pub fn texture(&self) -> TextureId {
        self.region.texture
    }

    pub fn set_texture_region(&mut self, region: &TextureRegion) {
        let resized = region.width != self.region.width || region.height != self.region.height;
        self.region = *region;
        self.uv = region.uv_rect();
        if resized {
            self.update_local();
        }
    }

    pub fn uv_rect(&self) -> [f32; 4] {
        self.uv
    }

    // ── Appearance ───────────────────────────────────────────────────────────

    pub fn color(&self) -> Rgba {
        self.color
    }

    pub fn set_color(&mut self, color: Rgba) {
        self.color = color;
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// World-space corners, order TL, TR, BR, BL (before rotation).
    pub fn corners(&self) -> [[f32; 2]; 4] {
        self.corners
    }

    pub fn vertices(&self) -> [QuadVertex; 4] {
        let [tx0, ty0, tx1, ty1] = self.uv;
        let uvs = [[tx0, ty0], [tx1, ty0], [tx1, ty1], [tx0, ty1]];
        std::array::from_fn(|i| QuadVertex {
            position: self.corners[i],
            uv: uvs[i],
            color: self.color,
        })
    }

    // ── Corner maintenance ───────────────────────────────────────────────────

    fn update_local(&mut self) {
        let w = self.region.width as f32 * self.scale_x;
        let h = self.region.height as f32 * self.scale_y;
        let l = -self.anchor_x * w;
        let t = -self.anchor_y * h;
        let r = l + w;
        let b = t + h;
        let unrotated = [[l, t], [r, t], [r, b], [l, b]];

        self.local = if self.use_rotation {
            let (c, s) = (self.cos, self.sin);
            unrotated.map(|[px, py]| [px * c - py * s, px * s + py * c])
        } else {
            unrotated
        };
        self.update_translation();
    }

    fn update_translation(&mut self) {
        for (corner, local) in self.corners.iter_mut().zip(&self.local) {
            corner[0] = local[0] + self.x;
            corner[1] = local[1] + self.y;
        }
    }
}

// ── FastSpriteContainer ──────────────────────────────────────────────────────

pub type SharedFastSprite = Rc<RefCell<FastSprite>>;

/// Display-ordered list of sprites that all sample the same texture.
///
/// The container does not own its sprites' lifetimes; callers keep their
/// own `Rc` and mutate through it between frames.
#[derive(Default)]
pub struct FastSpriteContainer {
    children: Vec<SharedFastSprite>,
}

impl FastSpriteContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `sprite` in a shared handle, append it, and return the handle.
    pub fn add(&mut self, sprite: FastSprite) -> SharedFastSprite {
        let shared = Rc::new(RefCell::new(sprite));
        self.children.push(Rc::clone(&shared));
        shared
    }

    pub fn add_child(&mut self, sprite: SharedFastSprite) {
        self.children.push(sprite);
    }

    /// Remove by identity. Returns false if `sprite` was not a child.
    pub fn remove_child(&mut self, sprite: &SharedFastSprite) -> bool {
        match self.children.iter().position(|c| Rc::ptr_eq(c, sprite)) {
            Some(i) => {
                self.children.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.children.clear();
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn children(&self) -> &[SharedFastSprite] {
        &self.children
    }

    /// The one texture every visible child uses, or `None` when nothing is
    /// visible. Fails on the first child that disagrees.
    pub fn texture(&self) -> Result<Option<TextureId>, SpriteError> {
        let mut expected = None;
        for child in &self.children {
            let sprite = child.borrow();
            if !sprite.visible() {
                continue;
            }
            match expected {
                None => expected = Some(sprite.texture()),
                Some(e) if e != sprite.texture() => {
                    return Err(SpriteError::MixedTextures { expected: e, found: sprite.texture() });
                }
                Some(_) => {}
            }
        }
        Ok(expected)
    }

    /// Fill `batcher` with one quad per visible child, in display order.
    pub fn build_batches(&self, batcher: &mut QuadBatcher) -> Result<Option<TextureId>, SpriteError> {
        let texture = self.texture()?;
        batcher.clear();
        if texture.is_some() {
            for child in &self.children {
                let sprite = child.borrow();
                if sprite.visible() {
                    batcher.push_quad(sprite.vertices());
                }
            }
        }
        Ok(texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(w: u32, h: u32) -> TextureRegion {
        TextureRegion::full(TextureId(0), w, h)
    }

    #[test]
    fn default_anchor_is_top_left() {
        let mut s = FastSprite::new(&region(10, 20));
        s.set_position(5.0, 5.0);
        assert_eq!(s.corners(), [[5.0, 5.0], [15.0, 5.0], [15.0, 25.0], [5.0, 25.0]]);
    }

    #[test]
    fn move_keeps_shape() {
        let mut s = FastSprite::new(&region(4, 4));
        s.set_rotation(0.3);
        let before = s.corners();
        s.set_position(10.0, -2.0);
        for (a, b) in before.iter().zip(s.corners().iter()) {
            assert!((b[0] - a[0] - 10.0).abs() < 1e-5);
            assert!((b[1] - a[1] + 2.0).abs() < 1e-5);
        }
    }

    #[test]
    fn rotation_back_to_zero_restores_axis_aligned_corners() {
        let mut s = FastSprite::new(&region(8, 8));
        let original = s.corners();
        s.set_rotation(1.0);
        s.set_rotation(0.0);
        assert_eq!(s.corners(), original);
    }

    #[test]
    fn vertices_carry_uvs_per_corner() {
        let atlas = region(32, 32);
        let s = FastSprite::new(&atlas.slice(16, 0, 16, 16));
        let v = s.vertices();
        assert_eq!(v[0].uv, [0.5, 0.0]);
        assert_eq!(v[2].uv, [1.0, 0.5]);
        assert_eq!(v[3].color, Rgba::WHITE);
    }

    #[test]
    fn remove_child_by_identity() {
        let mut c = FastSpriteContainer::new();
        let a = c.add(FastSprite::new(&region(1, 1)));
        let b = c.add(FastSprite::new(&region(1, 1)));
        assert!(c.remove_child(&a));
        assert!(!c.remove_child(&a));
        assert_eq!(c.len(), 1);
        assert!(Rc::ptr_eq(&c.children()[0], &b));
    }
}
