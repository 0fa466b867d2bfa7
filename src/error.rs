//! Error types surfaced to the host shell
//!
//! Per-frame logic does not return errors. Everything here is either a
//! startup failure or a configuration defect that must not be swallowed.

use crate::renderer::BatchCategory;

/// Sprite batch slot errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    /// No free slot left in the category's preallocated arena.
    #[error("{category:?} batch is full ({capacity} slots); raise its capacity in settings")]
    CapacityExceeded {
        category: BatchCategory,
        capacity: usize,
    },
}

/// Texture atlas loading errors
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("atlas metadata is not valid JSON: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("atlas image is {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    ImageSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("atlas grid must have at least one column and one row")]
    EmptyGrid,

    #[error("atlas is missing required region '{0}'")]
    MissingRegion(String),
}

/// GPU setup errors (fatal at startup)
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("no compatible graphics adapter: {0}")]
    Adapter(String),

    #[error("failed to create render surface: {0}")]
    Surface(String),

    #[error("failed to create graphics device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("surface does not support any texture format")]
    NoSurfaceFormat,

    /// Shader compile or pipeline link failure
    #[error("sprite program failed to build: {0}")]
    Program(String),
}

/// Invalid settings
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("fixed_step must be positive and finite, got {0}")]
    FixedStep(f64),

    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f32 },

    #[error("{name} is not a usable duration in seconds: {value}")]
    Seconds { name: &'static str, value: f64 },

    #[error("{0:?} batch capacity must be at least 1")]
    ZeroCapacity(BatchCategory),

    #[error("settings JSON is invalid: {0}")]
    Parse(String),
}

/// Everything the host lifecycle can report
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Four bit-slots cannot encode the requested target
    #[error("tile target {0} does not fit in four bits")]
    InvalidTarget(u8),
}
