//! Sprite entity: one textured quad backed by a batch slot

use glam::{Vec2, Vec3};

use super::registry::EntityId;
use crate::atlas::UvRect;
use crate::renderer::{BatchSet, SlotHandle, SpriteInstance};

/// Shader effect applied to a sprite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Effect {
    #[default]
    Plain,
    /// Blue metaball glyph shading
    Metaballs,
    /// Brightness follows `uPulse`
    Glow,
}

impl Effect {
    pub fn code(self) -> u32 {
        match self {
            Effect::Plain => 0,
            Effect::Metaballs => 1,
            Effect::Glow => 2,
        }
    }
}

/// Everything needed to create a sprite, minus identity and slot
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteDesc {
    pub position: Vec3,
    pub size: Vec2,
    pub scale: f32,
    pub uv: UvRect,
    pub effect: Effect,
    pub visible: bool,
}

#[derive(Debug, Clone)]
pub struct Sprite {
    id: EntityId,
    slot: SlotHandle,
    position: Vec3,
    size: Vec2,
    scale: f32,
    uv: UvRect,
    effect: Effect,
    visible: bool,
    /// Render attributes changed since the last batch write
    dirty: bool,
    /// Tile this sprite belongs to (not owning)
    owner: Option<EntityId>,
}

impl Sprite {
    pub fn new(id: EntityId, slot: SlotHandle, desc: SpriteDesc, owner: Option<EntityId>) -> Self {
        Self {
            id,
            slot,
            position: desc.position,
            size: desc.size,
            scale: desc.scale,
            uv: desc.uv,
            effect: desc.effect,
            visible: desc.visible,
            dirty: true,
            owner,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn slot(&self) -> SlotHandle {
        self.slot
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn owner(&self) -> Option<EntityId> {
        self.owner
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.visible != visible {
            self.visible = visible;
            self.dirty = true;
        }
    }

    pub fn translate(&mut self, delta: Vec2) {
        if delta != Vec2::ZERO {
            self.position += delta.extend(0.0);
            self.dirty = true;
        }
    }

    /// Follow a viewport resize
    pub fn rescale(&mut self, scale: Vec2) {
        self.position.x *= scale.x;
        self.position.y *= scale.y;
        self.size *= scale;
        self.dirty = true;
    }

    pub fn instance(&self) -> SpriteInstance {
        SpriteInstance {
            position: self.position.to_array(),
            scale: self.scale,
            size: self.size.to_array(),
            effect: self.effect.code(),
            visible: self.visible as u32,
            uv: self.uv.to_array(),
        }
    }

    /// Push changed attributes into the batch slot
    pub fn draw(&mut self, batches: &mut BatchSet) {
        if self.dirty {
            batches.write_slot(self.slot, self.instance());
            self.dirty = false;
        }
    }

    /// Teardown hook: give the slot back
    pub(crate) fn release(&self, batches: &mut BatchSet) {
        batches.release_slot(self.slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::BatchCategory;

    fn sprite(batches: &mut BatchSet) -> Sprite {
        let slot = batches.acquire_slot(BatchCategory::Play).unwrap();
        Sprite::new(
            EntityId(1),
            slot,
            SpriteDesc {
                position: Vec3::new(100.0, 50.0, 0.0),
                size: Vec2::new(10.0, 20.0),
                scale: 1.0,
                uv: UvRect::FULL,
                effect: Effect::Metaballs,
                visible: true,
            },
            None,
        )
    }

    #[test]
    fn test_draw_writes_only_when_dirty() {
        let mut batches = BatchSet::new(1, 4);
        let mut s = sprite(&mut batches);
        s.draw(&mut batches);
        assert!(!s.is_dirty());
        let written = *batches.instance(s.slot()).unwrap();
        assert_eq!(written.visible, 1);
        assert_eq!(written.effect, 1);

        batches.get_mut(BatchCategory::Play).plan_upload(true);
        s.draw(&mut batches);
        assert!(!batches.get(BatchCategory::Play).has_dirty());
    }

    #[test]
    fn test_set_visible_same_value_stays_clean() {
        let mut batches = BatchSet::new(1, 4);
        let mut s = sprite(&mut batches);
        s.draw(&mut batches);
        s.set_visible(true);
        assert!(!s.is_dirty());
        s.set_visible(false);
        assert!(s.is_dirty());
    }

    #[test]
    fn test_rescale_scales_position_and_size() {
        let mut batches = BatchSet::new(1, 4);
        let mut s = sprite(&mut batches);
        s.rescale(Vec2::new(2.0, 2.0));
        assert_eq!(s.position(), Vec3::new(200.0, 100.0, 0.0));
        assert_eq!(s.size(), Vec2::new(20.0, 40.0));
    }
}
