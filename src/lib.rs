//! Bit Tiles - a falling-tile binary number puzzle
//!
//! Core modules:
//! - `sim`: Fixed-step simulation (clock, registry, tiles, spawner)
//! - `renderer`: Sprite batches and the WebGPU instanced pipeline
//! - `transform`: Projection, view and model matrices
//! - `game`: Host lifecycle facade (`init`, `draw`, `click`, `resize`, `stop`)
//! - `atlas`, `audio`: Texture atlas and sound collaborators
//! - `fps`: Frame-rate measurement for the debug readout

pub mod atlas;
pub mod audio;
pub mod error;
pub mod fps;
pub mod game;
pub mod renderer;
pub mod settings;
pub mod sim;
pub mod transform;

pub use error::GameError;
pub use game::{Game, GpuContext, HostState};
pub use settings::Settings;

/// Game configuration constants
pub mod consts {
    /// Pulse value a click or solve pushes toward before it falls back
    pub const PULSE_PEAK: f32 = 1.0;

    /// Menu logo size in field units
    pub const LOGO_WIDTH: f32 = 160.0;
    pub const LOGO_HEIGHT: f32 = 40.0;

    /// Frame-rate readout glyph size in field units
    pub const FPS_GLYPH_WIDTH: f32 = 8.0;
    pub const FPS_GLYPH_HEIGHT: f32 = 12.0;

    /// Sample rate declared for synthesised sounds
    pub const SAMPLE_RATE: u32 = 44_100;
}
