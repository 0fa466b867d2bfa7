//! End-to-end gameplay scenarios through the public API

use bit_tiles::atlas::GridAtlas;
use bit_tiles::audio::NullAudio;
use bit_tiles::error::{BatchError, GameError};
use bit_tiles::renderer::{BatchCategory, BatchSet, SpriteInstance};
use bit_tiles::sim::{
    ClickOutcome, EntityId, GameEvent, ObjectRegistry, SimClock, StepRules, TileSet, TileState,
    TileTemplate,
};
use bit_tiles::transform::Viewport;
use bit_tiles::{Game, Settings};
use glam::Vec2;
use proptest::prelude::*;

fn game(width: u32, height: u32) -> Game {
    Game::new(
        Settings::default(),
        Viewport::new(width, height, 1.0),
        GridAtlas::builtin(),
        Box::new(NullAudio),
        7,
    )
    .unwrap()
}

fn template(x: f32, y: f32) -> TileTemplate {
    TileTemplate {
        x,
        y,
        width: 240.0,
        height: 30.0,
        speed: 24.0,
        debounce_secs: 0.1,
    }
}

/// Host (top-left origin) point over the middle of a tile's slot
fn slot_point(game: &Game, id: EntityId, slot: usize) -> (f32, f32) {
    let tile = game.registry().tile(id).unwrap();
    let zone = tile.width() / 4.0;
    let x = tile.x() + (slot as f32 + 0.5) * zone;
    let y = game.viewport().height as f32 - (tile.top() - tile.height() / 2.0);
    (x, y)
}

#[test]
fn test_target_five_solves_and_clears_sprites() {
    let mut g = game(320, 320);
    let id = g.spawn_tile_with(&template(10.0, 200.0), 5).unwrap();
    let sprites: Vec<EntityId> = g.registry().tile(id).unwrap().owned_sprites().collect();
    let play_live = g.batches().get(BatchCategory::Play).live();

    // 0101: weight 4 is slot 1, weight 1 is slot 3
    let (x, y) = slot_point(&g, id, 1);
    assert!(matches!(g.click(x, y, 0.0), ClickOutcome::Toggled { value: 4, .. }));
    let (x, y) = slot_point(&g, id, 3);
    assert_eq!(g.click(x, y, 0.5), ClickOutcome::Solved { target: 5 });

    assert!(g.registry().tile(id).is_none());
    assert!(sprites.iter().all(|s| !g.registry().contains(*s)));
    assert_eq!(
        g.batches().get(BatchCategory::Play).live(),
        play_live - sprites.len()
    );
    assert!(g
        .drain_events()
        .contains(&GameEvent::Solved { id, target: 5 }));
}

#[test]
fn test_stacked_tiles_keep_safety_margin() {
    let rules = StepRules {
        safety_margin: 4.0,
        floor_y: 9.0,
    };
    let mut registry = ObjectRegistry::new(rules);
    let mut batches = BatchSet::new(4, 256);
    let atlas = GridAtlas::builtin();
    let mut spawn = |y: f32, target: u8| {
        TileSet::spawn(&mut registry, &mut batches, &atlas, &template(10.0, y), target).unwrap()
    };
    let upper = spawn(300.0, 3);
    let lower = spawn(250.0, 9);

    for _ in 0..60 * 30 {
        registry.update(1.0 / 60.0);
        let gap = registry.tile(upper).unwrap().y() - registry.tile(lower).unwrap().y();
        assert!(gap >= 34.0 - 1e-3, "tiles overlap: gap {gap}");
    }

    let upper_tile = registry.tile(upper).unwrap();
    let lower_tile = registry.tile(lower).unwrap();
    assert_eq!(lower_tile.state(), TileState::Grounded);
    assert!((upper_tile.y() - lower_tile.y() - 34.0).abs() < 1e-3);
}

#[test]
fn test_double_click_within_debounce_is_ignored() {
    let mut g = game(320, 320);
    let id = g.spawn_tile_with(&template(10.0, 200.0), 15).unwrap();
    let (x, y) = slot_point(&g, id, 2);

    g.click(x, y, 0.0);
    let after_first = g.registry().decode_tile(id);
    assert_eq!(g.click(x, y, 0.05), ClickOutcome::Ignored);
    assert_eq!(g.registry().decode_tile(id), after_first);
}

#[test]
fn test_clock_runs_six_steps_in_a_tenth_of_a_second() {
    let mut clock = SimClock::new(1.0 / 60.0, 0.007);
    let mut steps = 0;
    assert_eq!(clock.advance(0.1, |_| steps += 1), 6);
    assert_eq!(steps, 6);
    assert!((clock.accumulator() - (0.1 - 6.0 / 60.0)).abs() < 1e-9);
    assert!(clock.accumulator() < clock.fixed_step());
}

#[test]
fn test_resize_doubles_positions_and_speed() {
    let mut g = game(800, 600);
    let id = g.spawn_tile_with(&template(100.0, 50.0), 6).unwrap();
    let speed = g.registry().tile(id).unwrap().speed();
    let before: Vec<(EntityId, Vec2)> = g
        .registry()
        .iter()
        .map(|e| (e.id(), e.position()))
        .collect();

    g.resize(Viewport::new(1600, 1200, 1.0));

    let tile = g.registry().tile(id).unwrap();
    assert_eq!((tile.x(), tile.y()), (200.0, 100.0));
    assert_eq!(tile.speed(), speed * 2.0);
    for (eid, p) in before {
        let q = g.registry().get(eid).unwrap().position();
        assert!((q - p * 2.0).length() < 1e-3, "{eid} moved to {q}");
    }
}

#[test]
fn test_slot_request_beyond_capacity_fails_cleanly() {
    let mut batches = BatchSet::new(1, 1);
    let slot = batches.acquire_slot(BatchCategory::Menu).unwrap();
    let marker = SpriteInstance {
        visible: 1,
        scale: 3.0,
        ..SpriteInstance::HIDDEN
    };
    batches.write_slot(slot, marker);

    assert_eq!(
        batches.acquire_slot(BatchCategory::Menu),
        Err(BatchError::CapacityExceeded {
            category: BatchCategory::Menu,
            capacity: 1
        })
    );
    assert_eq!(batches.instance(slot), Some(&marker));
}

#[test]
fn test_game_surfaces_capacity_errors() {
    let settings = Settings {
        play_capacity: 8,
        ..Settings::default()
    };
    let mut g = Game::new(
        settings,
        Viewport::new(320, 320, 1.0),
        GridAtlas::builtin(),
        Box::new(NullAudio),
        1,
    )
    .unwrap();
    let live = g.batches().get(BatchCategory::Play).live();
    let result = g.spawn_tile(4);
    assert!(matches!(
        result,
        Err(GameError::Batch(BatchError::CapacityExceeded { capacity: 8, .. }))
    ));
    assert_eq!(g.batches().get(BatchCategory::Play).live(), live);
    assert_eq!(g.registry().tiles().count(), 0);
}

proptest! {
    #[test]
    fn prop_resize_scales_every_entity(
        w0 in 100u32..2000, h0 in 100u32..2000,
        w1 in 100u32..2000, h1 in 100u32..2000,
    ) {
        let mut g = game(w0, h0);
        let y = h0 as f32 * 0.8;
        g.spawn_tile_with(&template(10.0, y), 2).unwrap();
        let before: Vec<(EntityId, Vec2)> = g
            .registry()
            .iter()
            .map(|e| (e.id(), e.position()))
            .collect();

        g.resize(Viewport::new(w1, h1, 1.0));

        let sx = w1 as f32 / w0 as f32;
        let sy = h1 as f32 / h0 as f32;
        for (id, p) in before {
            let q = g.registry().get(id).unwrap().position();
            prop_assert!((q.x - p.x * sx).abs() <= 1e-3 * p.x.abs().max(1.0));
            prop_assert!((q.y - p.y * sy).abs() <= 1e-3 * p.y.abs().max(1.0));
        }
    }
}
