//! Game settings and tuning
//!
//! Persisted in LocalStorage on the web; native builds use defaults unless the
//! host passes JSON through [`Settings::from_json`].

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::renderer::BatchCategory;

/// Simulation, layout and rendering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Simulation ===
    /// Fixed simulation step in seconds
    pub fixed_step: f64,
    /// Pulse movement per simulation step
    pub pulse_step: f32,
    /// Tile fall speed in field units per second
    pub tile_speed: f32,
    /// Minimum gap between stacked tiles, in field units
    pub safety_margin: f32,
    /// Height of the floor line tiles settle on, in field units
    pub floor_y: f32,
    /// Minimum time between two accepted clicks on one tile
    pub debounce_secs: f64,
    /// Simulated seconds between tile spawns
    pub spawn_interval_secs: f64,

    // === Layout (logical field units) ===
    /// Logical play-field width
    pub field_width: f32,
    /// Logical play-field height
    pub field_height: f32,
    /// Left edge of every tile
    pub tile_x: f32,
    /// Tile row width
    pub tile_width: f32,
    /// Tile row height
    pub tile_height: f32,

    // === Rendering ===
    /// Slots preallocated for menu sprites
    pub menu_capacity: usize,
    /// Slots preallocated for play-field sprites
    pub play_capacity: usize,
    /// Upload only dirty byte ranges instead of whole buffers
    pub partial_upload: bool,

    // === HUD ===
    /// Show the frame-rate readout in the menu overlay
    pub show_fps: bool,

    // === Audio ===
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,
    /// Sound effects volume (0.0 - 1.0)
    pub sfx_volume: f32,
    /// Mute all sound
    pub muted: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fixed_step: 1.0 / 60.0,
            pulse_step: 0.007,
            tile_speed: 24.0,
            safety_margin: 4.0,
            floor_y: 9.0,
            debounce_secs: 0.1,
            spawn_interval_secs: 6.0,

            field_width: 320.0,
            field_height: 320.0,
            tile_x: 13.0,
            tile_width: 241.0,
            tile_height: 30.0,

            menu_capacity: 256,
            play_capacity: 4096,
            partial_upload: true,

            show_fps: true,

            master_volume: 0.8,
            sfx_volume: 1.0,
            muted: false,
        }
    }
}

impl Settings {
    /// LocalStorage key
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "bit_tiles_settings";

    /// Parse settings, filling missing fields with defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Settings =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the simulation cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fixed_step > 0.0 && self.fixed_step.is_finite()) {
            return Err(ConfigError::FixedStep(self.fixed_step));
        }
        for (name, value) in [
            ("pulse_step", self.pulse_step),
            ("tile_speed", self.tile_speed),
            ("field_width", self.field_width),
            ("field_height", self.field_height),
            ("tile_width", self.tile_width),
            ("tile_height", self.tile_height),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        if !(self.debounce_secs >= 0.0 && self.debounce_secs.is_finite()) {
            return Err(ConfigError::Seconds {
                name: "debounce_secs",
                value: self.debounce_secs,
            });
        }
        if !(self.spawn_interval_secs > 0.0 && self.spawn_interval_secs.is_finite()) {
            return Err(ConfigError::Seconds {
                name: "spawn_interval_secs",
                value: self.spawn_interval_secs,
            });
        }
        if self.safety_margin < 0.0 {
            return Err(ConfigError::NonPositive {
                name: "safety_margin",
                value: self.safety_margin,
            });
        }
        if self.menu_capacity == 0 {
            return Err(ConfigError::ZeroCapacity(BatchCategory::Menu));
        }
        if self.play_capacity == 0 {
            return Err(ConfigError::ZeroCapacity(BatchCategory::Play));
        }
        Ok(())
    }

    /// Slot capacity for a batch category
    pub fn capacity(&self, category: BatchCategory) -> usize {
        match category {
            BatchCategory::Menu => self.menu_capacity,
            BatchCategory::Play => self.play_capacity,
        }
    }

    /// Effective sound volume
    pub fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            (self.master_volume * self.sfx_volume).clamp(0.0, 1.0)
        }
    }

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match Self::from_json(&json) {
                    Ok(settings) => {
                        log::info!("Loaded settings from LocalStorage");
                        return settings;
                    }
                    Err(e) => log::warn!("Ignoring stored settings: {e}"),
                }
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Native builds have no storage
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }
}
