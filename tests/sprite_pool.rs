use fsprites::sprites::{pack_anchor_component, unpack_anchor_component};
use fsprites::{BatchConfig, PackedAnchor, Rgba, SpriteError, SpritePool, TexelRect};

fn checked_pool(capacity: usize) -> SpritePool {
    let config = BatchConfig { capacity, checked_handles: true, ..Default::default() };
    SpritePool::with_config(&config).unwrap()
}

fn word(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

fn float(bytes: &[u8], offset: usize) -> f32 {
    f32::from_bits(word(bytes, offset))
}

// ── Anchor packing ───────────────────────────────────────────────────────────

#[test]
fn anchor_round_trip_within_one_step() {
    for i in 0..=1000 {
        let v = i as f32 / 1000.0;
        let back = unpack_anchor_component(pack_anchor_component(v));
        assert!((back - v).abs() <= 1.0 / 65535.0, "{v} came back as {back}");
    }
}

#[test]
fn anchor_out_of_range_clamps() {
    assert_eq!(pack_anchor_component(-0.5), pack_anchor_component(0.0));
    assert_eq!(pack_anchor_component(1.5), pack_anchor_component(1.0));
    assert_eq!(pack_anchor_component(1.0), 0xFFFF);
    assert_eq!(pack_anchor_component(f32::NAN), 0);
}

#[test]
fn anchor_words_put_x_low() {
    let a = PackedAnchor::new(1.0, 0.0);
    assert_eq!(a.0, 0x0000_FFFF);
    assert_eq!(PackedAnchor::new(0.5, 0.5), PackedAnchor::CENTER);
}

// ── Allocation ───────────────────────────────────────────────────────────────

#[test]
fn freed_slots_come_back_last_in_first_out() {
    let mut pool = SpritePool::new(8);
    let a = pool.alloc().unwrap();
    let b = pool.alloc().unwrap();
    let c = pool.alloc().unwrap();
    pool.free(a);
    pool.free(c);
    assert_eq!(pool.alloc().unwrap().index(), c.index());
    assert_eq!(pool.alloc().unwrap().index(), a.index());
    assert_eq!(pool.alloc().unwrap().index(), 3);
    assert_eq!(b.index(), 1);
}

#[test]
fn size_never_shrinks_on_free() {
    let mut pool = SpritePool::new(16);
    let handles: Vec<_> = (0..10).map(|_| pool.alloc().unwrap()).collect();
    let mut last = pool.size();
    for (i, h) in handles.into_iter().enumerate() {
        pool.free(h);
        assert_eq!(pool.size(), last, "size changed after free #{i}");
        if i % 3 == 0 {
            pool.alloc().unwrap();
        }
        assert!(pool.size() >= last);
        last = pool.size();
    }
    assert_eq!(pool.size(), 10);
}

#[test]
fn offset_is_index_times_stride() {
    let mut pool = SpritePool::new(4);
    pool.alloc().unwrap();
    let h = pool.alloc().unwrap();
    assert_eq!(h.index(), 1);
    assert_eq!(h.offset(), 32);
}

#[test]
fn capacity_exhaustion_is_an_error() {
    let mut pool = SpritePool::new(2);
    pool.alloc().unwrap();
    pool.alloc().unwrap();
    assert!(matches!(pool.alloc(), Err(SpriteError::CapacityExhausted { capacity: 2 })));
    assert_eq!(pool.size(), 2);
}

#[test]
fn free_slots_counts_holes_and_headroom() {
    let mut pool = SpritePool::new(5);
    let a = pool.alloc().unwrap();
    pool.alloc().unwrap();
    pool.free(a);
    assert_eq!(pool.available(), 3);
    assert_eq!(pool.free_slots(), 4);
    assert_eq!(pool.live_count(), 1);
}

#[test]
#[should_panic(expected = "stale sprite handle")]
fn stale_handle_panics_in_checked_pool() {
    let mut pool = checked_pool(4);
    let old = pool.alloc().unwrap();
    pool.free(old);
    let new = pool.alloc().unwrap();
    assert_eq!(new.index(), old.index());
    pool.set_x(old, 1.0);
}

#[test]
fn reused_slot_starts_from_defaults() {
    let mut pool = SpritePool::new(2);
    let h = pool.alloc().unwrap();
    pool.set_position(h, 5.0, 6.0);
    pool.set_angle(h, 1.0);
    pool.set_tex_slot(h, 3);
    pool.set_texel_rect(h, TexelRect::new(1, 2, 3, 4));
    pool.free(h);

    let h = pool.alloc().unwrap();
    assert_eq!(pool.position(h), (0.0, 0.0));
    assert_eq!(pool.angle(h), 0.0);
    assert_eq!(pool.tex_slot(h), 0);
    assert_eq!(pool.color(h), Rgba::WHITE);
    assert_eq!(pool.texel_rect(h), TexelRect::new(1, 2, 3, 4));
}

// ── Store layout ─────────────────────────────────────────────────────────────

#[test]
fn stores_stay_in_parity() {
    let mut pool = SpritePool::new(32);
    let mut live = Vec::new();
    for i in 0..20u8 {
        let h = pool.alloc().unwrap();
        pool.set_x(h, i as f32);
        pool.set_color(h, Rgba::from_rgba(i, 0, 0, 255));
        pool.set_tex_slot(h, i % 4);
        live.push((h, i));
        if i % 4 == 3 {
            let (dead, _) = live.remove(live.len() / 2);
            pool.free(dead);
        }
    }

    let geometry = pool.geometry_bytes();
    let colors = pool.color_bytes();
    let slots = pool.tex_slot_bytes();
    assert_eq!(geometry.len(), pool.size() * 32);
    assert_eq!(colors.len(), pool.size() * 4);
    assert_eq!(slots.len(), pool.size());

    for (h, i) in live {
        let idx = h.index();
        assert_eq!(float(geometry, h.offset()), i as f32);
        assert_eq!(colors[idx * 4], i);
        assert_eq!(slots[idx], i % 4);
        assert_eq!(pool.record_at(idx).x, i as f32);
    }
}

#[test]
fn freed_sprite_is_transparent() {
    let mut pool = SpritePool::new(4);
    let a = pool.alloc().unwrap();
    let b = pool.alloc().unwrap();
    pool.set_color(b, Rgba::from_rgba(9, 9, 9, 9));
    pool.free(a);
    assert_eq!(pool.color_at(a.index()), Rgba::TRANSPARENT);
    assert_eq!(pool.color_at(b.index()), Rgba::from_rgba(9, 9, 9, 9));
}

#[test]
fn first_record_decodes_from_raw_bytes() {
    let mut pool = SpritePool::new(4);
    let h = pool.alloc().unwrap();
    assert_eq!(h.offset(), 0);
    pool.set_position(h, 10.0, 20.0);
    pool.set_scale_uniform(h, 2.0);
    pool.set_angle(h, 0.0);
    pool.set_anchor(h, 0.5, 0.5);

    let bytes = pool.geometry_bytes();
    assert_eq!(float(bytes, 0), 10.0);
    assert_eq!(float(bytes, 4), 20.0);
    assert_eq!(float(bytes, 8), 2.0);
    assert_eq!(float(bytes, 12), 2.0);
    assert_eq!(float(bytes, 16), 0.0);
    let anchor = word(bytes, 20);
    assert!((unpack_anchor_component(anchor) - 0.5).abs() <= 1.0 / 65535.0);
    assert!((unpack_anchor_component(anchor >> 16) - 0.5).abs() <= 1.0 / 65535.0);
    assert_eq!(&pool.color_bytes()[0..4], &[255, 255, 255, 255]);

    pool.free(h);
    assert_eq!(&pool.color_bytes()[0..4], &[0, 0, 0, 0]);
}

#[test]
fn widened_slots_match_bytes() {
    let mut pool = SpritePool::new(4);
    for slot in [2u8, 0, 3] {
        let h = pool.alloc().unwrap();
        pool.set_tex_slot(h, slot);
    }
    let mut wide = Vec::new();
    pool.widen_tex_slots(&mut wide);
    assert_eq!(wide, vec![2, 0, 3]);
}

#[test]
fn reset_empties_the_pool() {
    let mut pool = SpritePool::new(4);
    pool.alloc().unwrap();
    pool.alloc().unwrap();
    pool.reset();
    assert!(pool.is_empty());
    assert!(pool.geometry_bytes().is_empty());
    assert_eq!(pool.alloc().unwrap().index(), 0);
}
