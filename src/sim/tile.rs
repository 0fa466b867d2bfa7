//! TileSet entity: a falling row of four bit-slots encoding a target number
//!
//! A tile's `y` is its top edge; it occupies `[y - height, y]`. Slot `i`
//! carries bit `3 - i`, so the leftmost slot is the most significant.

use glam::{Vec2, Vec3};

use super::registry::{Entity, EntityId, ObjectRegistry};
use super::sprite::{Effect, SpriteDesc};
use crate::atlas::{TextureAtlas, layout_text};
use crate::error::GameError;
use crate::renderer::{BatchCategory, BatchSet};

/// Bit-slots per tile
pub const SLOTS: usize = 4;

/// Largest target a tile can encode
pub const MAX_TARGET: u8 = (1 << SLOTS) - 1;

/// Slot visibility pattern ("one" glyph shown) for a value, MSB first
pub fn encode_bits(value: u8) -> [bool; SLOTS] {
    std::array::from_fn(|i| value & (1 << (SLOTS - 1 - i)) != 0)
}

/// Inverse of [`encode_bits`]
pub fn decode_bits(bits: [bool; SLOTS]) -> u8 {
    bits.iter()
        .enumerate()
        .filter(|(_, set)| **set)
        .fold(0, |acc, (i, _)| acc | 1 << (SLOTS - 1 - i))
}

/// Lifecycle of a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    Falling,
    /// Lower edge touched the floor line; stays clickable, no longer moves
    Grounded,
    /// Decoded value matched the target (terminal)
    Solved,
}

/// The "0" and "1" glyph sprites of one slot; exactly one is visible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitSlot {
    pub zero: EntityId,
    pub one: EntityId,
}

/// Vertical extent of a tile, captured at the start of a step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileExtent {
    pub id: EntityId,
    pub top: f32,
    pub bottom: f32,
}

/// Spacing rules shared by every tile, in viewport pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepRules {
    pub safety_margin: f32,
    pub floor_y: f32,
}

/// Result of one simulation step for a tile
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Nothing to do (solved, grounded or not a tile)
    Idle,
    /// Another tile sits within the safety margin below
    Blocked,
    /// Descended by this many pixels
    Moved(f32),
    /// Descended by this many pixels and reached the floor
    Landed(f32),
}

/// Geometry and motion of a tile about to be spawned
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileTemplate {
    pub x: f32,
    /// Top edge
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Pixels per second
    pub speed: f32,
    pub debounce_secs: f64,
}

#[derive(Debug, Clone)]
pub struct TileSet {
    id: EntityId,
    target: u8,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    speed: f32,
    slots: [BitSlot; SLOTS],
    /// Frame and number label sprites
    decorations: Vec<EntityId>,
    state: TileState,
    last_click: Option<f64>,
    debounce_secs: f64,
}

impl TileSet {
    pub fn new(
        id: EntityId,
        target: u8,
        template: &TileTemplate,
        slots: [BitSlot; SLOTS],
        decorations: Vec<EntityId>,
    ) -> Self {
        Self {
            id,
            target: target.min(MAX_TARGET),
            x: template.x,
            y: template.y,
            width: template.width,
            height: template.height,
            speed: template.speed,
            slots,
            decorations,
            state: TileState::Falling,
            last_click: None,
            debounce_secs: template.debounce_secs,
        }
    }

    /// Create the tile and all of its sprites in the registry
    ///
    /// Nothing is left behind in the registry if a batch runs out of slots
    /// or the target does not fit in [`SLOTS`] bits.
    pub fn spawn(
        registry: &mut ObjectRegistry,
        batches: &mut BatchSet,
        atlas: &dyn TextureAtlas,
        template: &TileTemplate,
        target: u8,
    ) -> Result<EntityId, GameError> {
        if target > MAX_TARGET {
            return Err(GameError::InvalidTarget(target));
        }
        let id = registry.new_id();
        let mut created = Vec::new();
        match Self::build_sprites(registry, batches, atlas, template, target, id, &mut created) {
            Ok((slots, decorations)) => {
                registry.add([Entity::TileSet(TileSet::new(
                    id,
                    target,
                    template,
                    slots,
                    decorations,
                ))]);
                log::debug!("Spawned tile {id} with target {target}");
                Ok(id)
            }
            Err(e) => {
                for sprite in created {
                    registry.delete(sprite, batches);
                }
                Err(e)
            }
        }
    }

    fn build_sprites(
        registry: &mut ObjectRegistry,
        batches: &mut BatchSet,
        atlas: &dyn TextureAtlas,
        template: &TileTemplate,
        target: u8,
        owner: EntityId,
        created: &mut Vec<EntityId>,
    ) -> Result<([BitSlot; SLOTS], Vec<EntityId>), GameError> {
        let center_y = template.y - template.height / 2.0;
        let zone = template.width / SLOTS as f32;
        let glyph = Vec2::new(zone * 0.4, template.height * 0.7);

        let frame = SpriteDesc {
            position: Vec3::new(template.x + template.width / 2.0, center_y, 0.0),
            size: Vec2::new(template.width, template.height),
            scale: 1.0,
            uv: atlas.region("tile").unwrap_or_default(),
            effect: Effect::Plain,
            visible: true,
        };
        let frame = registry.spawn_sprite(batches, BatchCategory::Play, frame, Some(owner))?;
        created.push(frame);
        let mut decorations = vec![frame];

        let mut slots = Vec::with_capacity(SLOTS);
        for i in 0..SLOTS {
            let cx = template.x + (i as f32 + 0.5) * zone;
            let mut ids = [owner; 2];
            for (digit, id) in ['0', '1'].into_iter().zip(ids.iter_mut()) {
                let desc = SpriteDesc {
                    position: Vec3::new(cx, center_y, 0.1),
                    size: glyph,
                    scale: 1.0,
                    uv: atlas.glyph(digit).unwrap_or_default(),
                    effect: Effect::Metaballs,
                    visible: digit == '0',
                };
                *id = registry.spawn_sprite(batches, BatchCategory::Play, desc, Some(owner))?;
                created.push(*id);
            }
            slots.push(BitSlot {
                zero: ids[0],
                one: ids[1],
            });
        }

        let label = layout_text(
            atlas,
            &target.to_string(),
            template.x + template.width + glyph.x * 0.5,
            center_y,
            1.0,
            glyph.x,
            glyph.y,
            Effect::Glow,
        );
        for desc in label {
            let id = registry.spawn_sprite(batches, BatchCategory::Play, desc, Some(owner))?;
            created.push(id);
            decorations.push(id);
        }

        let slots: [BitSlot; SLOTS] = std::array::from_fn(|i| slots[i]);
        Ok((slots, decorations))
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn target(&self) -> u8 {
        self.target
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn state(&self) -> TileState {
        self.state
    }

    pub fn slots(&self) -> &[BitSlot; SLOTS] {
        &self.slots
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y - self.height
    }

    pub fn extent(&self) -> TileExtent {
        TileExtent {
            id: self.id,
            top: self.top(),
            bottom: self.bottom(),
        }
    }

    /// Every sprite this tile created: frame, label and both glyphs per slot
    pub fn owned_sprites(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.decorations
            .iter()
            .copied()
            .chain(self.slots.iter().flat_map(|s| [s.zero, s.one]))
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x
            && point.x < self.x + self.width
            && point.y >= self.bottom()
            && point.y <= self.top()
    }

    /// Whether `other` counts as below this tile (ties broken by id)
    fn is_below(&self, other: &TileExtent) -> bool {
        other.top < self.y || (other.top == self.y && other.id < self.id)
    }

    /// Fall for one step unless a tile below is inside the safety margin
    ///
    /// Decisions use `others` (a start-of-step snapshot), so the outcome does
    /// not depend on the order tiles are stepped in. The descent is clipped
    /// so the gap never drops under the margin.
    pub fn step(&mut self, dt: f32, rules: &StepRules, others: &[TileExtent]) -> Step {
        if self.state != TileState::Falling {
            return Step::Idle;
        }

        let bottom = self.bottom();
        let to_floor = bottom - rules.floor_y;
        if to_floor <= 0.0 {
            self.state = TileState::Grounded;
            return Step::Landed(0.0);
        }

        let mut room = to_floor;
        for other in others {
            if other.id == self.id || !self.is_below(other) {
                continue;
            }
            room = room.min(bottom - rules.safety_margin - other.top);
        }
        if room <= 0.0 {
            return Step::Blocked;
        }

        let dy = (self.speed * dt).min(room);
        if dy >= to_floor {
            self.y = rules.floor_y + self.height;
            self.state = TileState::Grounded;
            Step::Landed(to_floor)
        } else {
            self.y -= dy;
            Step::Moved(dy)
        }
    }

    /// Slot index under a horizontal position, if it is on the tile
    pub fn hit_zone(&self, x: f32) -> Option<usize> {
        let rel = x - self.x;
        if rel < 0.0 || rel >= self.width {
            return None;
        }
        let zone = (rel / (self.width / SLOTS as f32)) as usize;
        Some(zone.min(SLOTS - 1))
    }

    /// Accept a click and return the slot it toggles
    ///
    /// Clicks inside the debounce window of the last accepted click, and
    /// clicks beside the tile, change nothing.
    pub fn click(&mut self, x: f32, now: f64) -> Option<usize> {
        if self.state == TileState::Solved {
            return None;
        }
        if let Some(last) = self.last_click {
            if now - last < self.debounce_secs {
                return None;
            }
        }
        let zone = self.hit_zone(x)?;
        self.last_click = Some(now);
        Some(zone)
    }

    pub(crate) fn mark_solved(&mut self) {
        self.state = TileState::Solved;
    }

    /// Follow a viewport resize: X by the width ratio, Y and speed by the height ratio
    pub fn rescale(&mut self, scale: Vec2) {
        self.x *= scale.x;
        self.width *= scale.x;
        self.y *= scale.y;
        self.height *= scale.y;
        self.speed *= scale.y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const RULES: StepRules = StepRules {
        safety_margin: 4.0,
        floor_y: 9.0,
    };

    fn template(y: f32) -> TileTemplate {
        TileTemplate {
            x: 0.0,
            y,
            width: 240.0,
            height: 30.0,
            speed: 60.0,
            debounce_secs: 0.1,
        }
    }

    fn tile(id: u64, y: f32) -> TileSet {
        let slot = BitSlot {
            zero: EntityId(1000 + id * 10),
            one: EntityId(1001 + id * 10),
        };
        TileSet::new(EntityId(id), 5, &template(y), [slot; SLOTS], Vec::new())
    }

    #[test]
    fn test_encode_is_msb_first() {
        assert_eq!(encode_bits(5), [false, true, false, true]);
        assert_eq!(encode_bits(8), [true, false, false, false]);
        assert_eq!(decode_bits([false, false, false, true]), 1);
    }

    #[test]
    fn test_step_moves_by_speed() {
        let mut t = tile(1, 200.0);
        assert_eq!(t.step(0.5, &RULES, &[t.extent()]), Step::Moved(30.0));
        assert_eq!(t.y(), 170.0);
    }

    #[test]
    fn test_step_blocked_by_tile_inside_margin() {
        let mut upper = tile(1, 100.0);
        let lower = tile(2, 67.0); // gap to upper's bottom is 3 < 4
        assert_eq!(upper.step(0.1, &RULES, &[lower.extent()]), Step::Blocked);
        assert_eq!(upper.y(), 100.0);
    }

    #[test]
    fn test_step_clips_to_margin() {
        let mut upper = tile(1, 100.0);
        let lower = tile(2, 60.0); // room = 70 - 4 - 60 = 6
        assert_eq!(upper.step(1.0, &RULES, &[lower.extent()]), Step::Moved(6.0));
        assert_eq!(upper.bottom() - lower.top(), RULES.safety_margin);
    }

    #[test]
    fn test_tiles_above_do_not_block() {
        let mut lower = tile(2, 60.0);
        let upper = tile(1, 100.0);
        assert!(matches!(lower.step(0.1, &RULES, &[upper.extent()]), Step::Moved(_)));
    }

    #[test]
    fn test_lands_on_floor_once() {
        let mut t = tile(1, 45.0); // bottom 15, floor 9
        assert_eq!(t.step(1.0, &RULES, &[]), Step::Landed(6.0));
        assert_eq!(t.state(), TileState::Grounded);
        assert_eq!(t.bottom(), RULES.floor_y);
        assert_eq!(t.step(1.0, &RULES, &[]), Step::Idle);
    }

    #[test]
    fn test_hit_zone_buckets() {
        let t = tile(1, 100.0);
        assert_eq!(t.hit_zone(0.0), Some(0));
        assert_eq!(t.hit_zone(59.9), Some(0));
        assert_eq!(t.hit_zone(60.0), Some(1));
        assert_eq!(t.hit_zone(239.0), Some(3));
        assert_eq!(t.hit_zone(240.0), None);
        assert_eq!(t.hit_zone(-1.0), None);
    }

    #[test]
    fn test_click_debounce() {
        let mut t = tile(1, 100.0);
        assert_eq!(t.click(70.0, 0.0), Some(1));
        assert_eq!(t.click(70.0, 0.05), None);
        assert_eq!(t.click(70.0, 0.1), Some(1));
    }

    #[test]
    fn test_click_off_tile_is_not_recorded() {
        let mut t = tile(1, 100.0);
        assert_eq!(t.click(500.0, 0.0), None);
        assert_eq!(t.click(10.0, 0.01), Some(0));
    }

    #[test]
    fn test_rescale() {
        let mut t = tile(1, 50.0);
        t.rescale(Vec2::new(2.0, 2.0));
        assert_eq!(t.y(), 100.0);
        assert_eq!(t.speed(), 120.0);
        assert_eq!(t.height(), 60.0);
    }

    #[test]
    fn test_owned_sprites_lists_every_glyph() {
        let t = tile(1, 50.0);
        assert_eq!(t.owned_sprites().count(), SLOTS * 2);
    }

    #[test]
    fn test_spawn_rejects_targets_beyond_four_bits() {
        let mut registry = ObjectRegistry::new(RULES);
        let mut batches = BatchSet::new(4, 64);
        let atlas = crate::atlas::GridAtlas::builtin();

        let mut spawn = |target: u8| {
            TileSet::spawn(&mut registry, &mut batches, &atlas, &template(100.0), target)
        };
        assert!(matches!(spawn(16), Err(GameError::InvalidTarget(16))));
        let id = spawn(15).unwrap();

        assert_eq!(registry.tile(id).map(TileSet::target), Some(15));
        assert_eq!(registry.tiles().count(), 1);
        assert_eq!(
            batches.get(BatchCategory::Play).live(),
            registry.tile(id).unwrap().owned_sprites().count()
        );
    }

    proptest! {
        #[test]
        fn prop_bits_round_trip(v in 0u8..=MAX_TARGET) {
            prop_assert_eq!(decode_bits(encode_bits(v)), v);
        }

        #[test]
        fn prop_stepping_never_breaks_margin(
            start_gap in 4.0f32..200.0,
            dt in 0.001f32..0.5,
            speed in 1.0f32..500.0,
        ) {
            let mut lower = tile(2, 120.0);
            let mut upper = tile(1, 120.0 + 30.0 + start_gap);
            upper.speed = speed;
            for _ in 0..200 {
                let snapshot = [lower.extent(), upper.extent()];
                lower.step(dt, &RULES, &snapshot);
                upper.step(dt, &RULES, &snapshot);
                prop_assert!(upper.bottom() - lower.top() >= RULES.safety_margin - 1e-3);
            }
        }
    }
}
