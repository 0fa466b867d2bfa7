//! Object registry: owns every live entity and hands out identity
//!
//! Entities are a closed set ([`Entity::Sprite`], [`Entity::TileSet`]) stored
//! by id. Iteration order is a hash order and nothing may depend on it; tile
//! collision checks run against a snapshot taken at the start of each step.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec2;

use super::event::GameEvent;
use super::sprite::{Sprite, SpriteDesc};
use super::tile::{SLOTS, Step, StepRules, TileExtent, TileSet, decode_bits, encode_bits};
use crate::error::BatchError;
use crate::renderer::{BatchCategory, BatchSet};

/// Unique entity identity, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic id source
///
/// Input may arrive on a host thread, so allocation is an atomic increment
/// rather than a plain counter; no lock is needed for a single integer.
#[derive(Debug, Default)]
pub struct IdAllocator {
    last: AtomicU64,
}

impl IdAllocator {
    pub fn next(&self) -> EntityId {
        EntityId(self.last.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// A live object in the scene
#[derive(Debug, Clone)]
pub enum Entity {
    Sprite(Sprite),
    TileSet(TileSet),
}

impl From<Sprite> for Entity {
    fn from(sprite: Sprite) -> Self {
        Entity::Sprite(sprite)
    }
}

impl From<TileSet> for Entity {
    fn from(tile: TileSet) -> Self {
        Entity::TileSet(tile)
    }
}

impl Entity {
    pub fn id(&self) -> EntityId {
        match self {
            Entity::Sprite(s) => s.id(),
            Entity::TileSet(t) => t.id(),
        }
    }

    pub fn position(&self) -> Vec2 {
        match self {
            Entity::Sprite(s) => s.position().truncate(),
            Entity::TileSet(t) => Vec2::new(t.x(), t.y()),
        }
    }

    /// Advance one fixed step; sprites only move with their tile
    pub fn update(&mut self, dt: f32, rules: &StepRules, tiles: &[TileExtent]) -> Step {
        match self {
            Entity::Sprite(_) => Step::Idle,
            Entity::TileSet(t) => t.step(dt, rules, tiles),
        }
    }

    /// Sync render attributes into the batch
    pub fn draw(&mut self, batches: &mut BatchSet) {
        match self {
            Entity::Sprite(s) => s.draw(batches),
            Entity::TileSet(_) => {}
        }
    }
}

/// Result of routing a click to a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Debounced, off the tile, or no such tile
    Ignored,
    /// A slot flipped; `value` is the newly decoded number
    Toggled { slot: usize, value: u8 },
    /// The flip matched the target and the tile is gone
    Solved { target: u8 },
}

#[derive(Debug)]
pub struct ObjectRegistry {
    objects: HashMap<EntityId, Entity>,
    ids: IdAllocator,
    rules: StepRules,
    events: Vec<GameEvent>,
}

impl ObjectRegistry {
    pub fn new(rules: StepRules) -> Self {
        Self {
            objects: HashMap::new(),
            ids: IdAllocator::default(),
            rules,
            events: Vec::new(),
        }
    }

    /// Strictly increasing id; safe to call from any thread
    pub fn new_id(&self) -> EntityId {
        self.ids.next()
    }

    pub fn rules(&self) -> &StepRules {
        &self.rules
    }

    /// Insert entities, skipping ids that are already present
    pub fn add(&mut self, entities: impl IntoIterator<Item = Entity>) -> usize {
        let mut added = 0;
        for entity in entities {
            let id = entity.id();
            if let std::collections::hash_map::Entry::Vacant(slot) = self.objects.entry(id) {
                slot.insert(entity);
                added += 1;
            }
        }
        added
    }

    /// Tear an entity down and forget it; unknown ids are a no-op
    ///
    /// Sprites give their batch slot back. Tiles take every sprite they own
    /// with them.
    pub fn delete(&mut self, id: EntityId, batches: &mut BatchSet) -> bool {
        let Some(entity) = self.objects.remove(&id) else {
            return false;
        };
        match entity {
            Entity::Sprite(sprite) => sprite.release(batches),
            Entity::TileSet(tile) => {
                for sprite in tile.owned_sprites() {
                    self.delete(sprite, batches);
                }
            }
        }
        true
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.objects.get(&id)
    }

    pub fn sprite(&self, id: EntityId) -> Option<&Sprite> {
        match self.objects.get(&id) {
            Some(Entity::Sprite(s)) => Some(s),
            _ => None,
        }
    }

    pub fn sprite_mut(&mut self, id: EntityId) -> Option<&mut Sprite> {
        match self.objects.get_mut(&id) {
            Some(Entity::Sprite(s)) => Some(s),
            _ => None,
        }
    }

    pub fn tile(&self, id: EntityId) -> Option<&TileSet> {
        match self.objects.get(&id) {
            Some(Entity::TileSet(t)) => Some(t),
            _ => None,
        }
    }

    pub fn tile_mut(&mut self, id: EntityId) -> Option<&mut TileSet> {
        match self.objects.get_mut(&id) {
            Some(Entity::TileSet(t)) => Some(t),
            _ => None,
        }
    }

    /// Entities in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.objects.values()
    }

    pub fn for_each(&self, f: impl FnMut(&Entity)) {
        self.objects.values().for_each(f);
    }

    pub fn tiles(&self) -> impl Iterator<Item = &TileSet> {
        self.objects.values().filter_map(|e| match e {
            Entity::TileSet(t) => Some(t),
            _ => None,
        })
    }

    /// Create a sprite in a fresh batch slot
    pub fn spawn_sprite(
        &mut self,
        batches: &mut BatchSet,
        category: BatchCategory,
        desc: SpriteDesc,
        owner: Option<EntityId>,
    ) -> Result<EntityId, BatchError> {
        let slot = batches.acquire_slot(category)?;
        let id = self.new_id();
        self.objects
            .insert(id, Entity::Sprite(Sprite::new(id, slot, desc, owner)));
        Ok(id)
    }

    /// Register a run of glyph sprites from [`crate::atlas::layout_text`]
    ///
    /// All or nothing: if the batch fills up part way, the glyphs already
    /// created are deleted again.
    pub fn spawn_text(
        &mut self,
        batches: &mut BatchSet,
        category: BatchCategory,
        descs: impl IntoIterator<Item = SpriteDesc>,
        owner: Option<EntityId>,
    ) -> Result<Vec<EntityId>, BatchError> {
        let mut ids = Vec::new();
        for desc in descs {
            match self.spawn_sprite(batches, category, desc, owner) {
                Ok(id) => ids.push(id),
                Err(e) => {
                    for id in ids {
                        self.delete(id, batches);
                    }
                    return Err(e);
                }
            }
        }
        Ok(ids)
    }

    /// Run one fixed simulation step over every entity
    pub fn update(&mut self, dt: f64) {
        let dt = dt as f32;
        let extents: Vec<TileExtent> = self.tiles().map(TileSet::extent).collect();

        let mut moved = Vec::new();
        for entity in self.objects.values_mut() {
            match entity.update(dt, &self.rules, &extents) {
                Step::Moved(dy) => moved.push((entity.id(), dy)),
                Step::Landed(dy) => {
                    moved.push((entity.id(), dy));
                    log::debug!("Tile {} reached the floor", entity.id());
                    self.events.push(GameEvent::ReachedFloor { id: entity.id() });
                }
                Step::Idle | Step::Blocked => {}
            }
        }

        for (id, dy) in moved {
            if dy == 0.0 {
                continue;
            }
            let sprites: Vec<EntityId> = match self.tile(id) {
                Some(tile) => tile.owned_sprites().collect(),
                None => continue,
            };
            for sprite in sprites {
                if let Some(s) = self.sprite_mut(sprite) {
                    s.translate(Vec2::new(0.0, -dy));
                }
            }
        }
    }

    /// Write every changed sprite into its batch slot
    pub fn draw(&mut self, batches: &mut BatchSet) {
        for entity in self.objects.values_mut() {
            entity.draw(batches);
        }
    }

    /// Topmost tile covering a world-space point
    pub fn tile_at(&self, point: Vec2) -> Option<EntityId> {
        self.tiles()
            .filter(|t| t.contains(point))
            .max_by(|a, b| a.y().total_cmp(&b.y()).then(a.id().cmp(&b.id())))
            .map(TileSet::id)
    }

    /// Decode a tile from which "1" glyphs are currently visible
    pub fn decode_tile(&self, id: EntityId) -> Option<u8> {
        let tile = self.tile(id)?;
        let bits: [bool; SLOTS] = std::array::from_fn(|i| {
            self.sprite(tile.slots()[i].one)
                .is_some_and(|s| s.is_visible())
        });
        Some(decode_bits(bits))
    }

    /// Show the glyphs that spell `value`, one per slot
    pub fn encode_tile(&mut self, id: EntityId, value: u8) {
        let Some(tile) = self.tile(id) else {
            return;
        };
        let slots = *tile.slots();
        for (slot, set) in slots.iter().zip(encode_bits(value)) {
            self.show_bit(slot.zero, slot.one, set);
        }
    }

    fn show_bit(&mut self, zero: EntityId, one: EntityId, set: bool) {
        if let Some(s) = self.sprite_mut(zero) {
            s.set_visible(!set);
        }
        if let Some(s) = self.sprite_mut(one) {
            s.set_visible(set);
        }
    }

    /// Route a click to a tile: debounce, toggle the slot, verify
    pub fn click_tile(
        &mut self,
        id: EntityId,
        x: f32,
        now: f64,
        batches: &mut BatchSet,
    ) -> ClickOutcome {
        let Some(tile) = self.tile_mut(id) else {
            return ClickOutcome::Ignored;
        };
        let Some(slot) = tile.click(x, now) else {
            return ClickOutcome::Ignored;
        };
        let target = tile.target();
        let pair = tile.slots()[slot];

        let was_set = self.sprite(pair.one).is_some_and(|s| s.is_visible());
        self.show_bit(pair.zero, pair.one, !was_set);

        if self.verify_tile(id, batches) {
            ClickOutcome::Solved { target }
        } else {
            let value = self.decode_tile(id).unwrap_or_default();
            ClickOutcome::Toggled { slot, value }
        }
    }

    /// Remove the tile and all of its sprites if it spells its target
    pub fn verify_tile(&mut self, id: EntityId, batches: &mut BatchSet) -> bool {
        let Some(value) = self.decode_tile(id) else {
            return false;
        };
        let Some(tile) = self.tile_mut(id) else {
            return false;
        };
        if value != tile.target() {
            return false;
        }
        tile.mark_solved();
        let target = tile.target();
        self.delete(id, batches);
        log::debug!("Tile {id} solved ({target})");
        self.events.push(GameEvent::Solved { id, target });
        true
    }

    /// Whether no tile overlaps the band `[bottom, top]`
    pub fn is_band_clear(&self, bottom: f32, top: f32) -> bool {
        self.tiles().all(|t| t.top() < bottom || t.bottom() > top)
    }

    /// Follow a viewport resize
    pub fn rescale(&mut self, scale: Vec2) {
        for entity in self.objects.values_mut() {
            match entity {
                Entity::Sprite(s) => s.rescale(scale),
                Entity::TileSet(t) => t.rescale(scale),
            }
        }
        self.rules.safety_margin *= scale.y;
        self.rules.floor_y *= scale.y;
    }

    pub(crate) fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}
