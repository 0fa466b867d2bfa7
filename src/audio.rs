//! Audio collaborator
//!
//! The game core only fires named sounds and never waits on them. On the web
//! the sounds are synthesised with Web Audio oscillators, so `load` binds a
//! name to a tone patch instead of fetching a file.

/// Encoding of a sound asset as declared by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Ogg,
    Mp3,
    /// Generated at play time
    Synth,
}

/// Sounds the game triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundEffect {
    /// A bit-slot flipped
    Toggle,
    /// A tile matched its target
    Solve,
    /// A new tile entered the field
    Spawn,
    /// A tile hit the floor line
    Land,
}

impl SoundEffect {
    pub const ALL: [SoundEffect; 4] = [
        SoundEffect::Toggle,
        SoundEffect::Solve,
        SoundEffect::Spawn,
        SoundEffect::Land,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SoundEffect::Toggle => "toggle",
            SoundEffect::Solve => "solve",
            SoundEffect::Spawn => "spawn",
            SoundEffect::Land => "land",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }
}

/// Fire-and-forget sound output
pub trait AudioSink {
    fn load(&mut self, name: &str, path: &str, format: AudioFormat, sample_rate: u32);
    fn play(&mut self, name: &str);
    fn close(&mut self);
}

/// Sink that drops everything (native and headless builds)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn load(&mut self, _name: &str, _path: &str, _format: AudioFormat, _sample_rate: u32) {}
    fn play(&mut self, _name: &str) {}
    fn close(&mut self) {}
}

#[cfg(target_arch = "wasm32")]
pub use web::WebAudio;

#[cfg(target_arch = "wasm32")]
mod web {
    use std::collections::HashMap;

    use web_sys::{AudioContext, GainNode, OscillatorNode, OscillatorType};

    use super::{AudioFormat, AudioSink, SoundEffect};

    /// Web Audio sink with procedurally generated tones
    pub struct WebAudio {
        ctx: Option<AudioContext>,
        volume: f32,
        patches: HashMap<String, SoundEffect>,
    }

    impl WebAudio {
        pub fn new(volume: f32) -> Self {
            // May fail outside a secure context
            let ctx = AudioContext::new().ok();
            if ctx.is_none() {
                log::warn!("Failed to create AudioContext - audio disabled");
            }
            Self {
                ctx,
                volume: volume.clamp(0.0, 1.0),
                patches: HashMap::new(),
            }
        }

        /// Create an oscillator routed through a gain envelope
        fn create_osc(
            ctx: &AudioContext,
            freq: f32,
            osc_type: OscillatorType,
        ) -> Option<(OscillatorNode, GainNode)> {
            let osc = ctx.create_oscillator().ok()?;
            let gain = ctx.create_gain().ok()?;

            osc.set_type(osc_type);
            osc.frequency().set_value(freq);
            osc.connect_with_audio_node(&gain).ok()?;
            gain.connect_with_audio_node(&ctx.destination()).ok()?;

            Some((osc, gain))
        }

        /// Short decaying tone, optionally sliding to `slide_to`
        fn blip(
            ctx: &AudioContext,
            at: f64,
            freq: f32,
            slide_to: Option<f32>,
            osc_type: OscillatorType,
            level: f32,
            length: f64,
        ) {
            let Some((osc, gain)) = Self::create_osc(ctx, freq, osc_type) else {
                return;
            };
            gain.gain().set_value_at_time(level, at).ok();
            gain.gain()
                .exponential_ramp_to_value_at_time(0.01, at + length)
                .ok();
            if let Some(to) = slide_to {
                osc.frequency().set_value_at_time(freq, at).ok();
                osc.frequency()
                    .exponential_ramp_to_value_at_time(to, at + length)
                    .ok();
            }
            osc.start_with_when(at).ok();
            osc.stop_with_when(at + length + 0.05).ok();
        }

        fn play_effect(&self, ctx: &AudioContext, effect: SoundEffect) {
            let vol = self.volume;
            let t = ctx.current_time();
            match effect {
                SoundEffect::Toggle => {
                    Self::blip(ctx, t, 660.0, None, OscillatorType::Triangle, vol * 0.25, 0.06)
                }
                SoundEffect::Solve => {
                    for (i, freq) in [523.0, 659.0, 784.0].into_iter().enumerate() {
                        let at = t + i as f64 * 0.08;
                        Self::blip(ctx, at, freq, None, OscillatorType::Sine, vol * 0.3, 0.3);
                    }
                }
                SoundEffect::Spawn => Self::blip(
                    ctx,
                    t,
                    200.0,
                    Some(400.0),
                    OscillatorType::Triangle,
                    vol * 0.2,
                    0.15,
                ),
                SoundEffect::Land => Self::blip(
                    ctx,
                    t,
                    150.0,
                    Some(60.0),
                    OscillatorType::Sine,
                    vol * 0.5,
                    0.12,
                ),
            }
        }
    }

    impl AudioSink for WebAudio {
        fn load(&mut self, name: &str, path: &str, format: AudioFormat, sample_rate: u32) {
            match SoundEffect::from_name(name) {
                Some(effect) => {
                    log::debug!("Bound sound '{name}' ({path}, {format:?} @ {sample_rate} Hz)");
                    self.patches.insert(name.to_string(), effect);
                }
                None => log::warn!("No synth patch for sound '{name}'"),
            }
        }

        fn play(&mut self, name: &str) {
            if self.volume <= 0.0 {
                return;
            }
            let Some(ctx) = &self.ctx else { return };
            let Some(effect) = self.patches.get(name).copied() else {
                return;
            };

            // Browsers keep the context suspended until a user gesture
            if ctx.state() == web_sys::AudioContextState::Suspended {
                let _ = ctx.resume();
            }
            self.play_effect(ctx, effect);
        }

        fn close(&mut self) {
            if let Some(ctx) = self.ctx.take() {
                let _ = ctx.close();
            }
            self.patches.clear();
        }
    }
}
