//! Gameplay events raised during a frame and drained by the host shell

use super::registry::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// A new tile entered at the top of the field
    Spawned { id: EntityId, target: u8 },
    /// A tile's bits matched its target; it has been removed
    Solved { id: EntityId, target: u8 },
    /// A tile's lower edge reached the floor line (raised once per tile)
    ReachedFloor { id: EntityId },
}
