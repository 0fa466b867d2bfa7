//! Host lifecycle facade
//!
//! The platform shell owns one [`Game`] and drives it with `init`, `draw`
//! (once per display refresh), `click`, `resize` and `stop`. Input is applied
//! between frames, never during a simulation step.

use glam::{Vec2, Vec3};

use crate::atlas::{GridAtlas, TextureAtlas, layout_text};
use crate::audio::{AudioFormat, AudioSink, SoundEffect};
use crate::consts::{
    FPS_GLYPH_HEIGHT, FPS_GLYPH_WIDTH, LOGO_HEIGHT, LOGO_WIDTH, PULSE_PEAK, SAMPLE_RATE,
};
use crate::error::{GameError, RenderError};
use crate::fps::FrameRate;
use crate::renderer::{BatchCategory, BatchSet, SpriteRenderState, UniformBlock, UniformHandles};
use crate::settings::Settings;
use crate::sim::{
    ClickOutcome, Effect, EntityId, GameEvent, ObjectRegistry, SimClock, SpriteDesc, StepRules,
    TileSet, TileSpawner, TileTemplate,
};
use crate::transform::{Field, Transform, Viewport};

/// Lifecycle of the facade as seen by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    /// Constructed; simulates headless until a renderer is attached
    Created,
    /// Renderer attached
    Running,
    /// Renderer creation failed; frames are no longer drawn
    Failed,
    /// Torn down by the host
    Stopped,
}

/// Graphics handles the host hands over at init
pub struct GpuContext {
    pub surface: wgpu::Surface<'static>,
    pub adapter: wgpu::Adapter,
}

pub struct Game {
    settings: Settings,
    viewport: Viewport,
    field: Field,
    transform: Transform,
    clock: SimClock,
    registry: ObjectRegistry,
    batches: BatchSet,
    uniforms: UniformBlock,
    handles: UniformHandles,
    spawner: TileSpawner,
    atlas: GridAtlas,
    audio: Box<dyn AudioSink>,
    renderer: Option<SpriteRenderState>,
    state: HostState,
    last_frame: Option<f64>,
    frame_rate: FrameRate,
    /// Glyph sprites of the frame-rate readout and the value they show
    fps_label: Vec<EntityId>,
    fps_shown: Option<u32>,
    touch: Vec2,
    events: Vec<GameEvent>,
}

impl Game {
    /// Validate settings and build the level (background and menu logo)
    pub fn new(
        settings: Settings,
        viewport: Viewport,
        atlas: GridAtlas,
        mut audio: Box<dyn AudioSink>,
        seed: u64,
    ) -> Result<Self, GameError> {
        settings.validate()?;

        let field = Field {
            width: settings.field_width,
            height: settings.field_height,
        };
        let rules = StepRules {
            safety_margin: field.y(&viewport, settings.safety_margin),
            floor_y: field.y(&viewport, settings.floor_y),
        };

        for effect in SoundEffect::ALL {
            audio.load(effect.name(), "", AudioFormat::Synth, SAMPLE_RATE);
        }

        let mut game = Self {
            clock: SimClock::new(settings.fixed_step, settings.pulse_step),
            registry: ObjectRegistry::new(rules),
            batches: BatchSet::new(
                settings.capacity(BatchCategory::Menu),
                settings.capacity(BatchCategory::Play),
            ),
            uniforms: UniformBlock::new(),
            handles: UniformHandles::lookup(),
            spawner: TileSpawner::new(seed, settings.spawn_interval_secs),
            transform: Transform::new(&viewport, &field),
            settings,
            viewport,
            field,
            atlas,
            audio,
            renderer: None,
            state: HostState::Created,
            last_frame: None,
            frame_rate: FrameRate::new(),
            fps_label: Vec::new(),
            fps_shown: None,
            touch: Vec2::new(0.5, 0.5),
            events: Vec::new(),
        };
        game.setup_level()?;
        game.upload_transform();
        log::info!(
            "Game created: {}x{} viewport, seed {seed}",
            viewport.width,
            viewport.height
        );
        Ok(game)
    }

    fn setup_level(&mut self) -> Result<(), GameError> {
        let (w, h) = (self.viewport.width as f32, self.viewport.height as f32);

        let background = SpriteDesc {
            position: Vec3::new(w / 2.0, h / 2.0, 0.0),
            size: Vec2::new(w, h),
            scale: 1.0,
            uv: self.atlas.region("background").unwrap_or_default(),
            effect: Effect::Plain,
            visible: true,
        };
        self.registry
            .spawn_sprite(&mut self.batches, BatchCategory::Play, background, None)?;

        let logo_size = Vec2::new(
            self.field.x(&self.viewport, LOGO_WIDTH),
            self.field.y(&self.viewport, LOGO_HEIGHT),
        );
        let logo = SpriteDesc {
            position: Vec3::new(w / 2.0, h - logo_size.y / 2.0, 0.5),
            size: logo_size,
            scale: 1.0,
            uv: self.atlas.region("logo").unwrap_or_default(),
            effect: Effect::Glow,
            visible: true,
        };
        self.registry
            .spawn_sprite(&mut self.batches, BatchCategory::Menu, logo, None)?;
        Ok(())
    }

    fn upload_transform(&mut self) {
        self.uniforms
            .set_mat4(self.handles.model, self.transform.model_cols());
        self.uniforms
            .set_mat4(self.handles.view, self.transform.view_cols());
        self.uniforms
            .set_mat4(self.handles.projection, self.transform.projection_cols());
    }

    /// Attach a renderer; on failure the game stops drawing for good
    pub async fn init(&mut self, gpu: GpuContext) -> Result<(), GameError> {
        let created = SpriteRenderState::new(
            gpu.surface,
            &gpu.adapter,
            self.viewport.width,
            self.viewport.height,
            &self.batches,
            self.atlas.image(),
        )
        .await;
        self.attach(created)
    }

    fn attach(
        &mut self,
        created: Result<SpriteRenderState, RenderError>,
    ) -> Result<(), GameError> {
        match created {
            Ok(renderer) => {
                self.renderer = Some(renderer);
                self.batches.mark_all_dirty();
                self.uniforms.mark_dirty();
                self.state = HostState::Running;
                log::info!("Renderer initialized");
                Ok(())
            }
            Err(e) => {
                log::error!("Renderer initialization failed: {e}");
                self.state = HostState::Failed;
                Err(e.into())
            }
        }
    }

    /// Mark initialization as failed from the host side (no adapter etc.)
    pub fn fail(&mut self, error: RenderError) -> GameError {
        log::error!("Graphics unavailable: {error}");
        self.state = HostState::Failed;
        error.into()
    }

    /// Release the renderer and audio
    pub fn stop(&mut self) {
        if self.state == HostState::Stopped {
            return;
        }
        self.renderer = None;
        self.audio.close();
        self.state = HostState::Stopped;
        log::info!("Game stopped");
    }

    /// Run one display frame at host time `now` (seconds)
    pub fn draw(&mut self, now: f64) -> Result<(), GameError> {
        if matches!(self.state, HostState::Failed | HostState::Stopped) {
            return Ok(());
        }
        let wall_dt = self.last_frame.map_or(0.0, |last| now - last);
        self.last_frame = Some(now);

        self.advance(wall_dt)?;
        self.update_fps_label(now);
        self.render();
        Ok(())
    }

    /// Redraw the frame-rate readout in the menu overlay when it changes
    fn update_fps_label(&mut self, now: f64) {
        let Some(fps) = self.frame_rate.record(now) else {
            return;
        };
        if !self.settings.show_fps || self.fps_shown == Some(fps) {
            return;
        }
        for id in std::mem::take(&mut self.fps_label) {
            self.registry.delete(id, &mut self.batches);
        }
        self.fps_shown = None;

        let glyph = Vec2::new(
            self.field.x(&self.viewport, FPS_GLYPH_WIDTH),
            self.field.y(&self.viewport, FPS_GLYPH_HEIGHT),
        );
        let text = fps.to_string();
        let descs = layout_text(
            &self.atlas,
            &text,
            glyph.x * (1.0 + text.len() as f32 / 2.0),
            self.viewport.height as f32 - glyph.y,
            1.0,
            glyph.x,
            glyph.y,
            Effect::Plain,
        );
        match self
            .registry
            .spawn_text(&mut self.batches, BatchCategory::Menu, descs, None)
        {
            Ok(ids) => {
                self.fps_label = ids;
                self.fps_shown = Some(fps);
            }
            Err(e) => log::warn!("Frame-rate readout skipped: {e}"),
        }
    }

    /// Simulate `wall_dt` seconds and sync sprites into their batches
    ///
    /// Returns the number of fixed steps that ran.
    pub fn advance(&mut self, wall_dt: f64) -> Result<u32, GameError> {
        let registry = &mut self.registry;
        let steps = self.clock.advance(wall_dt, |dt| registry.update(dt));

        // The pulse rises after a click and falls back once it peaks
        if self.clock.pulse_target() > 0.0 && self.clock.pulse() >= self.clock.pulse_target() {
            self.clock.set_pulse_target(0.0);
        }

        let template = self.tile_template();
        self.spawner.poll(
            self.clock.elapsed(),
            &mut self.registry,
            &mut self.batches,
            &self.atlas,
            &template,
        )?;
        self.collect_events();

        self.registry.draw(&mut self.batches);
        self.uniforms
            .set_f32(self.handles.time, self.clock.elapsed() as f32);
        self.uniforms.set_f32(self.handles.pulse, self.clock.pulse());
        Ok(steps)
    }

    fn render(&mut self) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        match renderer.render(
            &mut self.uniforms,
            &mut self.batches,
            self.settings.partial_upload,
        ) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost, reconfiguring");
                renderer.reconfigure();
            }
            Err(e) => log::warn!("Frame skipped: {e:?}"),
        }
    }

    /// Template for a tile entering at the top of the field
    pub fn tile_template(&self) -> TileTemplate {
        let s = &self.settings;
        TileTemplate {
            x: self.field.x(&self.viewport, s.tile_x),
            y: self.viewport.height as f32,
            width: self.field.x(&self.viewport, s.tile_width),
            height: self.field.y(&self.viewport, s.tile_height),
            speed: self.field.y(&self.viewport, s.tile_speed),
            debounce_secs: s.debounce_secs,
        }
    }

    /// Handle a tap at host pixel coordinates (origin top-left)
    pub fn click(&mut self, x: f32, y: f32, now: f64) -> ClickOutcome {
        if matches!(self.state, HostState::Failed | HostState::Stopped) {
            return ClickOutcome::Ignored;
        }
        self.touch = self.viewport.normalized(x, y);
        self.uniforms.set_f32(self.handles.touch_x, self.touch.x);
        self.uniforms.set_f32(self.handles.touch_y, self.touch.y);

        let world = self.viewport.to_world(x, y);
        let Some(id) = self.registry.tile_at(world) else {
            return ClickOutcome::Ignored;
        };
        let outcome = self
            .registry
            .click_tile(id, world.x, now, &mut self.batches);
        if let ClickOutcome::Toggled { .. } = outcome {
            self.audio.play(SoundEffect::Toggle.name());
            self.clock.set_pulse_target(PULSE_PEAK);
        }
        self.collect_events();
        outcome
    }

    /// Follow a host resize: entities, rules and transforms scale with it
    pub fn resize(&mut self, viewport: Viewport) {
        if viewport == self.viewport {
            return;
        }
        let scale = self.viewport.scale_to(&viewport);
        self.registry.rescale(scale);
        self.viewport = viewport;
        self.transform = Transform::new(&self.viewport, &self.field);
        self.upload_transform();
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.resize(viewport.width, viewport.height);
        }
        log::info!("Resized to {}x{}", viewport.width, viewport.height);
    }

    fn collect_events(&mut self) {
        for event in self.registry.drain_events() {
            let sound = match event {
                GameEvent::Spawned { .. } => SoundEffect::Spawn,
                GameEvent::Solved { .. } => {
                    self.clock.set_pulse_target(PULSE_PEAK);
                    SoundEffect::Solve
                }
                GameEvent::ReachedFloor { .. } => SoundEffect::Land,
            };
            self.audio.play(sound.name());
            self.events.push(event);
        }
    }

    /// Events since the last call, oldest first
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Spawn a tile with a chosen target at the top of the field
    pub fn spawn_tile(&mut self, target: u8) -> Result<EntityId, GameError> {
        let template = self.tile_template();
        self.spawn_tile_with(&template, target)
    }

    /// Spawn a tile from an explicit template
    pub fn spawn_tile_with(
        &mut self,
        template: &TileTemplate,
        target: u8,
    ) -> Result<EntityId, GameError> {
        let id = TileSet::spawn(
            &mut self.registry,
            &mut self.batches,
            &self.atlas,
            template,
            target,
        )?;
        self.registry.push_event(GameEvent::Spawned { id, target });
        // A target of 0 is spelled by the fresh tile and solves at once
        self.registry.verify_tile(id, &mut self.batches);
        self.collect_events();
        Ok(id)
    }

    pub fn state(&self) -> HostState {
        self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ObjectRegistry {
        &mut self.registry
    }

    pub fn batches(&self) -> &BatchSet {
        &self.batches
    }

    pub fn batches_mut(&mut self) -> &mut BatchSet {
        &mut self.batches
    }

    pub fn uniforms(&self) -> &UniformBlock {
        &self.uniforms
    }

    /// Last touch position, normalized with origin top-left
    pub fn touch(&self) -> Vec2 {
        self.touch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullAudio;
    use crate::error::ConfigError;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default, Clone)]
    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl AudioSink for Recorder {
        fn load(&mut self, _: &str, _: &str, _: AudioFormat, _: u32) {}
        fn play(&mut self, name: &str) {
            self.0.borrow_mut().push(name.to_string());
        }
        fn close(&mut self) {
            self.0.borrow_mut().push("<closed>".to_string());
        }
    }

    fn game() -> Game {
        Game::new(
            Settings::default(),
            Viewport::new(320, 320, 1.0),
            GridAtlas::builtin(),
            Box::new(NullAudio),
            42,
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_settings() {
        let settings = Settings {
            play_capacity: 0,
            ..Settings::default()
        };
        let result = Game::new(
            settings,
            Viewport::new(320, 320, 1.0),
            GridAtlas::builtin(),
            Box::new(NullAudio),
            1,
        );
        assert!(matches!(
            result,
            Err(GameError::Config(ConfigError::ZeroCapacity(BatchCategory::Play)))
        ));
    }

    #[test]
    fn test_level_setup_fills_both_batches() {
        let g = game();
        assert_eq!(g.batches().get(BatchCategory::Play).live(), 1);
        assert_eq!(g.batches().get(BatchCategory::Menu).live(), 1);
        assert_eq!(g.state(), HostState::Created);
        assert_eq!(g.uniforms().globals().projection, g.transform().projection_cols());
    }

    #[test]
    fn test_first_frame_spawns_a_tile() {
        let mut g = game();
        g.draw(10.0).unwrap();
        assert_eq!(g.registry().tiles().count(), 1);
        assert!(matches!(
            g.drain_events().as_slice(),
            [GameEvent::Spawned { target, .. }] if (1..=15).contains(target)
        ));
    }

    #[test]
    fn test_draw_advances_clock_by_wall_time() {
        let mut g = game();
        g.draw(1.0).unwrap();
        g.draw(1.1).unwrap();
        assert!((g.clock().elapsed() - 0.1).abs() < 1e-9);
        assert!((g.uniforms().globals().time - 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_click_toggles_plays_sound_and_kicks_pulse() {
        let recorder = Recorder::default();
        let mut g = Game::new(
            Settings::default(),
            Viewport::new(320, 320, 1.0),
            GridAtlas::builtin(),
            Box::new(recorder.clone()),
            3,
        )
        .unwrap();
        let id = g.spawn_tile(15).unwrap();

        // Host y=15 is 15 px under the top edge; x=20 is in the first slot
        let outcome = g.click(20.0, 15.0, 0.0);
        assert_eq!(outcome, ClickOutcome::Toggled { slot: 0, value: 8 });
        assert_eq!(g.registry().decode_tile(id), Some(8));
        assert_eq!(g.clock().pulse_target(), PULSE_PEAK);
        assert_eq!(g.touch(), Vec2::new(20.0 / 320.0, 15.0 / 320.0));
        assert_eq!(
            recorder.0.borrow().as_slice(),
            ["spawn".to_string(), "toggle".to_string()]
        );
    }

    #[test]
    fn test_click_off_tiles_only_records_touch() {
        let mut g = game();
        g.spawn_tile(3).unwrap();
        assert_eq!(g.click(160.0, 300.0, 0.0), ClickOutcome::Ignored);
        assert_eq!(g.uniforms().globals().touch_y, 300.0 / 320.0);
    }

    #[test]
    fn test_solving_removes_tile_and_reports() {
        let mut g = game();
        let id = g.spawn_tile(1).unwrap();
        g.drain_events();
        let outcome = g.click(250.0, 15.0, 0.0);
        assert_eq!(outcome, ClickOutcome::Solved { target: 1 });
        assert!(!g.registry().contains(id));
        assert_eq!(g.drain_events(), vec![GameEvent::Solved { id, target: 1 }]);
    }

    #[test]
    fn test_pulse_falls_back_after_peak() {
        let mut g = game();
        g.spawn_tile(15).unwrap();
        g.click(20.0, 15.0, 0.0);
        // 0.007 per step: the peak is reached well within four seconds
        g.advance(4.0).unwrap();
        assert_eq!(g.clock().pulse_target(), 0.0);
        g.advance(4.0).unwrap();
        assert_eq!(g.clock().pulse(), 0.0);
    }

    #[test]
    fn test_stop_freezes_everything() {
        let recorder = Recorder::default();
        let mut g = Game::new(
            Settings::default(),
            Viewport::new(320, 320, 1.0),
            GridAtlas::builtin(),
            Box::new(recorder.clone()),
            3,
        )
        .unwrap();
        g.stop();
        assert_eq!(g.state(), HostState::Stopped);
        g.draw(0.0).unwrap();
        g.draw(5.0).unwrap();
        assert_eq!(g.clock().elapsed(), 0.0);
        assert_eq!(g.click(20.0, 15.0, 0.0), ClickOutcome::Ignored);
        assert_eq!(recorder.0.borrow().as_slice(), ["<closed>".to_string()]);
    }

    #[test]
    fn test_failed_init_stops_drawing() {
        let mut g = game();
        let err = g.fail(RenderError::NoSurfaceFormat);
        assert!(matches!(err, GameError::Render(RenderError::NoSurfaceFormat)));
        assert_eq!(g.state(), HostState::Failed);
        g.draw(0.0).unwrap();
        g.draw(5.0).unwrap();
        assert_eq!(g.registry().tiles().count(), 0);
    }

    #[test]
    fn test_resize_updates_rules_and_projection() {
        let mut g = game();
        let before = g.transform().projection;
        g.resize(Viewport::new(640, 640, 2.0));
        assert_eq!(g.registry().rules().safety_margin, 8.0);
        assert_ne!(g.transform().projection, before);
        assert_eq!(g.tile_template().height, 60.0);
    }

    #[test]
    fn test_program_error_fails_init() {
        let mut g = game();
        let err = g
            .attach(Err(RenderError::Program("vs_main: unknown type".into())))
            .unwrap_err();
        assert!(matches!(err, GameError::Render(RenderError::Program(_))));
        assert_eq!(g.state(), HostState::Failed);
        g.draw(0.0).unwrap();
        g.draw(5.0).unwrap();
        assert_eq!(g.clock().elapsed(), 0.0);
    }

    #[test]
    fn test_spawn_rejects_out_of_range_target() {
        let mut g = game();
        let live = g.batches().get(BatchCategory::Play).live();
        assert!(matches!(g.spawn_tile(16), Err(GameError::InvalidTarget(16))));
        assert!(matches!(g.spawn_tile(255), Err(GameError::InvalidTarget(255))));
        assert_eq!(g.batches().get(BatchCategory::Play).live(), live);
        assert!(g.drain_events().is_empty());
    }

    #[test]
    fn test_zero_target_solves_on_spawn() {
        let mut g = game();
        let live = g.batches().get(BatchCategory::Play).live();
        let id = g.spawn_tile(0).unwrap();
        assert!(!g.registry().contains(id));
        assert_eq!(g.batches().get(BatchCategory::Play).live(), live);
        assert_eq!(
            g.drain_events(),
            vec![
                GameEvent::Spawned { id, target: 0 },
                GameEvent::Solved { id, target: 0 }
            ]
        );
    }

    #[test]
    fn test_fps_readout_in_menu_batch() {
        let mut g = game();
        for i in 0..60 {
            g.draw(i as f64 / 60.0).unwrap();
        }
        assert_eq!(g.batches().get(BatchCategory::Menu).live(), 1);

        g.draw(1.0).unwrap();
        // Logo plus the two digits of "60"
        assert_eq!(g.batches().get(BatchCategory::Menu).live(), 3);
        for i in 61..180 {
            g.draw(i as f64 / 60.0).unwrap();
        }
        assert_eq!(g.batches().get(BatchCategory::Menu).live(), 3);
    }

    #[test]
    fn test_fps_readout_can_be_hidden() {
        let settings = Settings {
            show_fps: false,
            ..Settings::default()
        };
        let mut g = Game::new(
            settings,
            Viewport::new(320, 320, 1.0),
            GridAtlas::builtin(),
            Box::new(NullAudio),
            5,
        )
        .unwrap();
        for i in 0..=90 {
            g.draw(i as f64 / 60.0).unwrap();
        }
        assert_eq!(g.batches().get(BatchCategory::Menu).live(), 1);
    }
}
