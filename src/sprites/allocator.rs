use crate::error::SpriteError;

// ── SpriteHandle ─────────────────────────────────────────────────────────────

/// Reference to one record slot of a `SpritePool`.
///
/// `generation` is only compared when the owning allocator has handle
/// checking enabled; otherwise a stale handle silently aliases whatever
/// sprite reuses its slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SpriteHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl SpriteHandle {
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Byte offset of this handle's record in the geometry store.
    pub fn offset(self) -> usize {
        self.index as usize * crate::sprites::store::SpriteRecord::STRIDE
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

// ── SlotAllocator ────────────────────────────────────────────────────────────

/// Free-list index allocator over a fixed number of slots.
///
/// `size` is a high-water mark: it only grows when the free list is empty
/// and only shrinks on `reset`. Freed indices are reused LIFO.
pub struct SlotAllocator {
    capacity: usize,
    size: usize,
    free_list: Vec<u32>,
    /// Bumped on every free; present only when handle checking is on.
    generations: Option<Vec<u32>>,
    /// Parallel liveness flags for double-free detection (checked mode only).
    live: Option<Vec<bool>>,
}

impl SlotAllocator {
    pub fn new(capacity: usize, checked: bool) -> Self {
        Self {
            capacity,
            size: 0,
            free_list: Vec::new(),
            generations: checked.then(|| vec![0; capacity]),
            live: checked.then(|| vec![false; capacity]),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_checked(&self) -> bool {
        self.generations.is_some()
    }

    /// Slots never handed out yet (`capacity - size`). Reclaimed slots below
    /// the high-water mark are not counted; see `free_slots`.
    pub fn available(&self) -> usize {
        self.capacity - self.size
    }

    /// Every slot `alloc` could still return without failing.
    pub fn free_slots(&self) -> usize {
        self.available() + self.free_list.len()
    }

    pub fn live_count(&self) -> usize {
        self.size - self.free_list.len()
    }

    pub fn alloc(&mut self) -> Result<SpriteHandle, SpriteError> {
        let index = match self.free_list.pop() {
            Some(index) => index,
            None => {
                if self.size >= self.capacity {
                    return Err(SpriteError::CapacityExhausted { capacity: self.capacity });
                }
                let index = self.size as u32;
                self.size += 1;
                index
            }
        };

        if let Some(live) = &mut self.live {
            live[index as usize] = true;
        }

        Ok(SpriteHandle { index, generation: self.generation_of(index) })
    }

    pub fn free(&mut self, handle: SpriteHandle) {
        self.validate(handle);
        if let Some(live) = &mut self.live {
            live[handle.index as usize] = false;
        }
        if let Some(generations) = &mut self.generations {
            let g = &mut generations[handle.index as usize];
            *g = g.wrapping_add(1);
        }
        self.free_list.push(handle.index);
    }

    /// Forget every allocation. Outstanding handles become stale.
    pub fn reset(&mut self) {
        if let Some(generations) = &mut self.generations {
            for g in generations[..self.size].iter_mut() {
                *g = g.wrapping_add(1);
            }
        }
        if let Some(live) = &mut self.live {
            live[..self.size].fill(false);
        }
        self.size = 0;
        self.free_list.clear();
    }

    /// Panics on a stale or freed handle when checking is enabled; no-op
    /// otherwise.
    #[inline]
    pub fn validate(&self, handle: SpriteHandle) {
        let (Some(generations), Some(live)) = (&self.generations, &self.live) else {
            return;
        };
        let i = handle.index as usize;
        assert!(i < self.size, "sprite handle {i} was never allocated");
        assert!(
            live[i] && generations[i] == handle.generation,
            "stale sprite handle {i} (generation {}, current {})",
            handle.generation,
            generations[i]
        );
    }

    fn generation_of(&self, index: u32) -> u32 {
        self.generations.as_ref().map_or(0, |g| g[index as usize])
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bumps_size_until_capacity() {
        let mut a = SlotAllocator::new(2, false);
        assert_eq!(a.alloc().unwrap().index(), 0);
        assert_eq!(a.alloc().unwrap().index(), 1);
        assert!(matches!(a.alloc(), Err(SpriteError::CapacityExhausted { capacity: 2 })));
        assert_eq!(a.size(), 2);
    }

    #[test]
    fn free_slots_counts_reclaimed_indices() {
        let mut a = SlotAllocator::new(4, false);
        let h0 = a.alloc().unwrap();
        a.alloc().unwrap();
        a.free(h0);
        assert_eq!(a.available(), 2);
        assert_eq!(a.free_slots(), 3);
        assert_eq!(a.live_count(), 1);
    }

    #[test]
    fn unchecked_generation_stays_zero() {
        let mut a = SlotAllocator::new(1, false);
        let h = a.alloc().unwrap();
        a.free(h);
        assert_eq!(a.alloc().unwrap().generation(), 0);
    }

    #[test]
    fn checked_generation_advances_on_reuse() {
        let mut a = SlotAllocator::new(1, true);
        let h = a.alloc().unwrap();
        a.free(h);
        let h2 = a.alloc().unwrap();
        assert_eq!(h2.index(), h.index());
        assert_eq!(h2.generation(), h.generation() + 1);
    }

    #[test]
    #[should_panic(expected = "stale sprite handle")]
    fn checked_double_free_panics() {
        let mut a = SlotAllocator::new(2, true);
        let h = a.alloc().unwrap();
        a.free(h);
        a.free(h);
    }

    #[test]
    fn reset_clears_high_water_mark() {
        let mut a = SlotAllocator::new(3, true);
        a.alloc().unwrap();
        a.alloc().unwrap();
        a.reset();
        assert_eq!(a.size(), 0);
        assert_eq!(a.available(), 3);
        assert_eq!(a.alloc().unwrap().index(), 0);
    }
}
