//! Tile spawner: a new tile at the top of the field on a fixed cadence
//!
//! Targets come from a seeded `Pcg32`, so a run is reproducible from its
//! seed. A due spawn waits while the spawn zone is still occupied.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::event::GameEvent;
use super::registry::{EntityId, ObjectRegistry};
use super::tile::{MAX_TARGET, TileSet, TileTemplate};
use crate::atlas::TextureAtlas;
use crate::error::GameError;
use crate::renderer::BatchSet;

#[derive(Debug, Clone)]
pub struct TileSpawner {
    rng: Pcg32,
    interval: f64,
    next_at: f64,
}

impl TileSpawner {
    /// The first tile is due immediately
    pub fn new(seed: u64, interval: f64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
            interval,
            next_at: 0.0,
        }
    }

    pub fn next_at(&self) -> f64 {
        self.next_at
    }

    /// Target for the next tile; zero is never asked for
    pub fn roll_target(&mut self) -> u8 {
        self.rng.random_range(1..=MAX_TARGET)
    }

    /// Spawn a tile if one is due at simulated time `elapsed`
    pub fn poll(
        &mut self,
        elapsed: f64,
        registry: &mut ObjectRegistry,
        batches: &mut BatchSet,
        atlas: &dyn TextureAtlas,
        template: &TileTemplate,
    ) -> Result<Option<EntityId>, GameError> {
        if elapsed < self.next_at {
            return Ok(None);
        }
        let margin = registry.rules().safety_margin;
        if !registry.is_band_clear(template.y - template.height - margin, template.y) {
            return Ok(None);
        }

        let target = self.roll_target();
        let id = TileSet::spawn(registry, batches, atlas, template, target)?;
        registry.push_event(GameEvent::Spawned { id, target });
        log::info!("Spawned tile {id} (target {target}) at t={elapsed:.2}");
        self.next_at = elapsed + self.interval;
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::GridAtlas;
    use crate::sim::tile::StepRules;

    fn template() -> TileTemplate {
        TileTemplate {
            x: 13.0,
            y: 320.0,
            width: 241.0,
            height: 30.0,
            speed: 24.0,
            debounce_secs: 0.1,
        }
    }

    fn setup() -> (ObjectRegistry, BatchSet, GridAtlas) {
        let rules = StepRules {
            safety_margin: 4.0,
            floor_y: 9.0,
        };
        (ObjectRegistry::new(rules), BatchSet::new(8, 512), GridAtlas::builtin())
    }

    #[test]
    fn test_targets_in_range_and_seeded() {
        let mut a = TileSpawner::new(7, 6.0);
        let mut b = TileSpawner::new(7, 6.0);
        for _ in 0..200 {
            let t = a.roll_target();
            assert!((1..=MAX_TARGET).contains(&t));
            assert_eq!(t, b.roll_target());
        }
    }

    #[test]
    fn test_spawns_on_interval() {
        let (mut reg, mut batches, atlas) = setup();
        let mut spawner = TileSpawner::new(1, 6.0);
        let first = spawner
            .poll(0.0, &mut reg, &mut batches, &atlas, &template())
            .unwrap();
        assert!(first.is_some());
        assert!(matches!(
            reg.drain_events().as_slice(),
            [GameEvent::Spawned { .. }]
        ));

        // Clear the zone so only the interval gates the next spawn
        reg.delete(first.unwrap(), &mut batches);
        assert_eq!(
            spawner.poll(3.0, &mut reg, &mut batches, &atlas, &template()).unwrap(),
            None
        );
        assert!(spawner
            .poll(6.0, &mut reg, &mut batches, &atlas, &template())
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_waits_for_clear_spawn_zone() {
        let (mut reg, mut batches, atlas) = setup();
        let mut spawner = TileSpawner::new(1, 1.0);
        spawner.poll(0.0, &mut reg, &mut batches, &atlas, &template()).unwrap();
        assert_eq!(
            spawner.poll(5.0, &mut reg, &mut batches, &atlas, &template()).unwrap(),
            None
        );

        // 24 px/s: after 2 s the first tile's top is 48 px below the spawn line
        for _ in 0..120 {
            reg.update(1.0 / 60.0);
        }
        assert!(spawner
            .poll(5.0, &mut reg, &mut batches, &atlas, &template())
            .unwrap()
            .is_some());
    }
}
