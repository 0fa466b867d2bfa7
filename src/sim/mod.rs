//! Deterministic simulation module
//!
//! All gameplay logic lives here:
//! - Fixed timestep only
//! - Seeded RNG only
//! - No decision depends on registry iteration order
//! - No rendering or platform dependencies beyond batch slots

pub mod clock;
pub mod event;
pub mod registry;
pub mod spawner;
pub mod sprite;
pub mod tile;

pub use clock::SimClock;
pub use event::GameEvent;
pub use registry::{ClickOutcome, Entity, EntityId, IdAllocator, ObjectRegistry};
pub use spawner::TileSpawner;
pub use sprite::{Effect, Sprite, SpriteDesc};
pub use tile::{
    BitSlot, MAX_TARGET, SLOTS, Step, StepRules, TileExtent, TileSet, TileState, TileTemplate,
    decode_bits, encode_bits,
};
