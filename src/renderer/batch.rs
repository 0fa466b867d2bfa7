//! CPU side of the sprite batch renderer
//!
//! Each category owns a fixed-capacity arena of [`SpriteInstance`]s. Slots are
//! handed out from a free list and never move, so a sprite keeps its index for
//! its whole life. Dirty slots are coalesced into contiguous ranges so the GPU
//! side can upload only the bytes that changed.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::instance::SpriteInstance;
use crate::error::BatchError;

/// Sprite groups that are drawn with one call each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchCategory {
    /// Title, logo and other overlay sprites
    Menu,
    /// Tiles, glyphs and the play-field background
    Play,
}

impl BatchCategory {
    /// Draw order: play field first, menu overlay on top
    pub const ALL: [BatchCategory; 2] = [BatchCategory::Play, BatchCategory::Menu];
}

/// Stable address of one sprite's render attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotHandle {
    pub category: BatchCategory,
    pub index: u32,
}

/// What the GPU side has to upload for a category this frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPlan {
    /// Nothing changed
    None,
    /// Upload every slot up to the high-water mark
    Full,
    /// Upload these slot ranges (half-open, ascending, non-adjacent)
    Ranges(Vec<Range<usize>>),
}

/// Fixed-capacity slot arena for one category
#[derive(Debug)]
pub struct SpriteBatch {
    category: BatchCategory,
    instances: Vec<SpriteInstance>,
    occupied: Vec<bool>,
    dirty: Vec<bool>,
    any_dirty: bool,
    /// Free indices, lowest on top
    free: BinaryHeap<Reverse<u32>>,
    /// One past the highest index ever handed out
    high_water: usize,
}

impl SpriteBatch {
    pub fn new(category: BatchCategory, capacity: usize) -> Self {
        Self {
            category,
            instances: vec![SpriteInstance::HIDDEN; capacity],
            occupied: vec![false; capacity],
            dirty: vec![false; capacity],
            any_dirty: false,
            free: (0..capacity as u32).map(Reverse).collect(),
            high_water: 0,
        }
    }

    pub fn category(&self) -> BatchCategory {
        self.category
    }

    pub fn capacity(&self) -> usize {
        self.instances.len()
    }

    /// Number of slots currently in use
    pub fn live(&self) -> usize {
        self.capacity() - self.free.len()
    }

    /// Instances the draw call has to cover
    pub fn instance_count(&self) -> u32 {
        self.high_water as u32
    }

    pub fn instances(&self) -> &[SpriteInstance] {
        &self.instances
    }

    pub fn instance(&self, index: u32) -> Option<&SpriteInstance> {
        self.instances.get(index as usize)
    }

    pub fn is_dirty(&self, index: u32) -> bool {
        self.dirty.get(index as usize).copied().unwrap_or(false)
    }

    pub fn has_dirty(&self) -> bool {
        self.any_dirty
    }

    /// Take a free slot, or fail once the arena is full
    pub fn acquire(&mut self) -> Result<u32, BatchError> {
        let Some(Reverse(index)) = self.free.pop() else {
            return Err(BatchError::CapacityExceeded {
                category: self.category,
                capacity: self.capacity(),
            });
        };
        let i = index as usize;
        self.occupied[i] = true;
        self.instances[i] = SpriteInstance::HIDDEN;
        self.high_water = self.high_water.max(i + 1);
        self.mark(i);
        Ok(index)
    }

    /// Return a slot to the free list; it renders hidden until reused
    pub fn release(&mut self, index: u32) {
        let i = index as usize;
        if !self.occupied.get(i).copied().unwrap_or(false) {
            log::error!("{:?} batch: release of unused slot {}", self.category, index);
            debug_assert!(false, "release of unused slot {index}");
            return;
        }
        self.occupied[i] = false;
        self.instances[i].visible = 0;
        self.mark(i);
        // Lowest index is reused first so layering stays compact
        self.free.push(Reverse(index));
    }

    /// Store a sprite's attributes and flag the slot for upload
    pub fn write(&mut self, index: u32, instance: SpriteInstance) {
        let i = index as usize;
        if !self.occupied.get(i).copied().unwrap_or(false) {
            log::error!("{:?} batch: write to unused slot {}", self.category, index);
            debug_assert!(false, "write to unused slot {index}");
            return;
        }
        self.instances[i] = instance;
        self.mark(i);
    }

    /// Flag a slot for re-upload on the next draw
    pub fn mark_dirty(&mut self, index: u32) {
        let i = index as usize;
        if i < self.capacity() {
            self.mark(i);
        }
    }

    /// Flag every slot up to the high-water mark (fresh GPU buffers)
    pub fn mark_all_dirty(&mut self) {
        if self.high_water > 0 {
            self.dirty[..self.high_water].fill(true);
            self.any_dirty = true;
        }
    }

    fn mark(&mut self, i: usize) {
        self.dirty[i] = true;
        self.any_dirty = true;
    }

    /// Decide what to upload and clear every dirty flag
    pub fn plan_upload(&mut self, partial: bool) -> UploadPlan {
        if !self.any_dirty {
            return UploadPlan::None;
        }
        let plan = if partial {
            let mut ranges: Vec<Range<usize>> = Vec::new();
            for i in 0..self.high_water {
                if !self.dirty[i] {
                    continue;
                }
                match ranges.last_mut() {
                    Some(last) if last.end == i => last.end = i + 1,
                    _ => ranges.push(i..i + 1),
                }
            }
            if ranges.is_empty() {
                UploadPlan::None
            } else {
                UploadPlan::Ranges(ranges)
            }
        } else {
            UploadPlan::Full
        };
        self.dirty[..self.high_water].fill(false);
        self.any_dirty = false;
        plan
    }
}

/// All categories, addressed by [`SlotHandle`]
#[derive(Debug)]
pub struct BatchSet {
    menu: SpriteBatch,
    play: SpriteBatch,
}

impl BatchSet {
    pub fn new(menu_capacity: usize, play_capacity: usize) -> Self {
        Self {
            menu: SpriteBatch::new(BatchCategory::Menu, menu_capacity),
            play: SpriteBatch::new(BatchCategory::Play, play_capacity),
        }
    }

    pub fn get(&self, category: BatchCategory) -> &SpriteBatch {
        match category {
            BatchCategory::Menu => &self.menu,
            BatchCategory::Play => &self.play,
        }
    }

    pub fn get_mut(&mut self, category: BatchCategory) -> &mut SpriteBatch {
        match category {
            BatchCategory::Menu => &mut self.menu,
            BatchCategory::Play => &mut self.play,
        }
    }

    pub fn acquire_slot(&mut self, category: BatchCategory) -> Result<SlotHandle, BatchError> {
        let index = self.get_mut(category).acquire()?;
        Ok(SlotHandle { category, index })
    }

    pub fn release_slot(&mut self, slot: SlotHandle) {
        self.get_mut(slot.category).release(slot.index);
    }

    pub fn mark_dirty(&mut self, slot: SlotHandle) {
        self.get_mut(slot.category).mark_dirty(slot.index);
    }

    pub fn mark_all_dirty(&mut self) {
        self.menu.mark_all_dirty();
        self.play.mark_all_dirty();
    }

    pub fn write_slot(&mut self, slot: SlotHandle, instance: SpriteInstance) {
        self.get_mut(slot.category).write(slot.index, instance);
    }

    pub fn instance(&self, slot: SlotHandle) -> Option<&SpriteInstance> {
        self.get(slot.category).instance(slot.index)
    }
}
