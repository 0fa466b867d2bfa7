//! WebGPU rendering module
//!
//! Sprites are drawn as instanced quads, one draw call per batch category.

pub mod batch;
pub mod instance;
pub mod sprite_pipeline;
pub mod uniforms;

pub use batch::{BatchCategory, BatchSet, SlotHandle, SpriteBatch, UploadPlan};
pub use instance::{BACKGROUND, SpriteInstance};
pub use sprite_pipeline::SpriteRenderState;
pub use uniforms::{Globals, UniformBlock, UniformHandle, UniformHandles};
