//! Bit Tiles entry point
//!
//! On the web this wires a canvas, WebGPU and input events to [`Game`]. The
//! native build has no window; it runs a headless self-playing session.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use web_sys::{HtmlCanvasElement, MouseEvent, TouchEvent};

    use bit_tiles::atlas::GridAtlas;
    use bit_tiles::audio::WebAudio;
    use bit_tiles::error::RenderError;
    use bit_tiles::game::{Game, GpuContext};
    use bit_tiles::settings::Settings;
    use bit_tiles::sim::GameEvent;
    use bit_tiles::transform::Viewport;

    /// Canvas size in device pixels, resized to its CSS box
    fn fit_canvas(canvas: &HtmlCanvasElement) -> Viewport {
        let dpr = web_sys::window().map_or(1.0, |w| w.device_pixel_ratio());
        let width = (canvas.client_width() as f64 * dpr) as u32;
        let height = (canvas.client_height() as f64 * dpr) as u32;
        canvas.set_width(width);
        canvas.set_height(height);
        Viewport::new(width, height, dpr as f32)
    }

    /// Pointer position in canvas device pixels, origin top-left
    fn canvas_point(canvas: &HtmlCanvasElement, client_x: i32, client_y: i32) -> (f32, f32) {
        let dpr = web_sys::window().map_or(1.0, |w| w.device_pixel_ratio()) as f32;
        let rect = canvas.get_bounding_client_rect();
        (
            (client_x as f32 - rect.left() as f32) * dpr,
            (client_y as f32 - rect.top() as f32) * dpr,
        )
    }

    fn now_secs() -> f64 {
        web_sys::window()
            .and_then(|w| w.performance())
            .map_or(0.0, |p| p.now() / 1000.0)
    }

    pub async fn run() -> Result<(), String> {
        console_error_panic_hook::set_once();
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::error_1(&format!("Failed to init logger: {e}").into());
        }

        log::info!("Bit Tiles starting...");

        let window = web_sys::window().ok_or("no window")?;
        let document = window.document().ok_or("no document")?;

        if let Some(loading) = document.get_element_by_id("loading") {
            let _ = loading.set_attribute("class", "hidden");
        }

        let canvas: HtmlCanvasElement = document
            .get_element_by_id("canvas")
            .ok_or("no canvas")?
            .dyn_into()
            .map_err(|_| "element #canvas is not a canvas")?;

        let viewport = fit_canvas(&canvas);
        let settings = Settings::load();
        let audio = WebAudio::new(settings.effective_volume());
        let seed = js_sys::Date::now() as u64;
        let mut game = Game::new(settings, viewport, GridAtlas::builtin(), Box::new(audio), seed)
            .map_err(|e| e.to_string())?;
        log::info!("Game initialized with seed: {}", seed);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::BROWSER_WEBGPU | wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = match instance.create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone())) {
            Ok(surface) => surface,
            Err(e) => return Err(game.fail(RenderError::Surface(e.to_string())).to_string()),
        };

        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
        {
            Ok(adapter) => adapter,
            Err(e) => return Err(game.fail(RenderError::Adapter(e.to_string())).to_string()),
        };
        log::info!("Using adapter: {:?}", adapter.get_info().name);

        game.init(GpuContext { surface, adapter })
            .await
            .map_err(|e| e.to_string())?;

        let game = Rc::new(RefCell::new(game));
        setup_input_handlers(&canvas, game.clone());
        setup_resize(canvas, game.clone());

        request_animation_frame(game);

        log::info!("Bit Tiles running!");
        Ok(())
    }

    fn setup_input_handlers(canvas: &HtmlCanvasElement, game: Rc<RefCell<Game>>) {
        // Mouse
        {
            let game = game.clone();
            let canvas_clone = canvas.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                let (x, y) = canvas_point(&canvas_clone, event.client_x(), event.client_y());
                game.borrow_mut().click(x, y, now_secs());
            });
            let _ = canvas
                .add_event_listener_with_callback("mousedown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Touch
        {
            let game = game.clone();
            let canvas_clone = canvas.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: TouchEvent| {
                event.prevent_default();
                let touches = event.changed_touches();
                for i in 0..touches.length() {
                    if let Some(touch) = touches.get(i) {
                        let (x, y) =
                            canvas_point(&canvas_clone, touch.client_x(), touch.client_y());
                        game.borrow_mut().click(x, y, now_secs());
                    }
                }
            });
            let _ = canvas
                .add_event_listener_with_callback("touchstart", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_resize(canvas: HtmlCanvasElement, game: Rc<RefCell<Game>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            let viewport = fit_canvas(&canvas);
            game.borrow_mut().resize(viewport);
        });
        let _ = window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn request_animation_frame(game: Rc<RefCell<Game>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |time: f64| {
            game_loop(game, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(game: Rc<RefCell<Game>>, time: f64) {
        {
            let mut g = game.borrow_mut();
            // requestAnimationFrame time is in milliseconds
            if let Err(e) = g.draw(time / 1000.0) {
                log::error!("Frame failed: {e}");
                g.stop();
                return;
            }
            for event in g.drain_events() {
                if let GameEvent::ReachedFloor { id } = event {
                    log::info!("Tile {id} reached the floor");
                }
            }
        }

        request_animation_frame(game);
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn wasm_main() {
    if let Err(e) = wasm_game::run().await {
        log::error!("Bit Tiles failed to start: {e}");
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Bit Tiles (native) starting...");
    log::info!("Native mode has no window - running a headless self-playing session");

    if let Err(e) = headless::run(120.0) {
        log::error!("Session failed: {e}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use bit_tiles::atlas::GridAtlas;
    use bit_tiles::audio::NullAudio;
    use bit_tiles::error::GameError;
    use bit_tiles::game::Game;
    use bit_tiles::settings::Settings;
    use bit_tiles::sim::{GameEvent, SLOTS, encode_bits};
    use bit_tiles::transform::Viewport;

    const FRAME: f64 = 1.0 / 60.0;

    /// Play `seconds` of game time, tapping one wrong slot per tile per frame
    pub fn run(seconds: f64) -> Result<(), GameError> {
        let viewport = Viewport::new(640, 640, 2.0);
        let mut game = Game::new(
            Settings::default(),
            viewport,
            GridAtlas::builtin(),
            Box::new(NullAudio),
            0x5eed,
        )?;

        let (mut solved, mut grounded) = (0, 0);
        let mut now = 0.0;
        while now < seconds {
            game.draw(now)?;
            for (x, y) in next_taps(&game) {
                game.click(x, y, now);
            }
            for event in game.drain_events() {
                match event {
                    GameEvent::Spawned { id, target } => {
                        log::info!("t={now:6.2} spawn {id} target {target:2} ({target:04b})")
                    }
                    GameEvent::Solved { id, target } => {
                        solved += 1;
                        log::info!("t={now:6.2} solved {id} ({target})");
                    }
                    GameEvent::ReachedFloor { id } => {
                        grounded += 1;
                        log::info!("t={now:6.2} {id} reached the floor");
                    }
                }
            }
            now += FRAME;
        }

        let batches = game.batches();
        log::info!(
            "Done: {solved} solved, {grounded} grounded, {} play slots live",
            batches.get(bit_tiles::renderer::BatchCategory::Play).live()
        );
        Ok(())
    }

    /// Host coordinates of the first wrong slot on each tile
    fn next_taps(game: &Game) -> Vec<(f32, f32)> {
        let height = game.viewport().height as f32;
        let registry = game.registry();
        registry
            .tiles()
            .filter_map(|tile| {
                let current = encode_bits(registry.decode_tile(tile.id())?);
                let wanted = encode_bits(tile.target());
                let slot = (0..SLOTS).find(|&i| current[i] != wanted[i])?;
                let zone = tile.width() / SLOTS as f32;
                let x = tile.x() + (slot as f32 + 0.5) * zone;
                let y = height - (tile.top() - tile.height() / 2.0);
                Some((x, y))
            })
            .collect()
    }
}
