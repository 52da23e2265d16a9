//! Full race cycle through the public API

use race_server::config::RaceConfig;
use race_server::game::physics::WorldId;
use race_server::game::track::quantize;
use race_server::game::{
    AdminEvent, BodyPool, InputEvent, InputKind, MatchPhase, PhysicsWorld, TrackGrid, Turn,
};

/// World that never moves anything, so ships stay where the test puts them
struct StillWorld {
    steps: usize,
}

impl PhysicsWorld for StillWorld {
    fn id(&self) -> WorldId {
        99
    }

    fn step(&mut self, _pool: &mut BodyPool, _dt: f64) {
        self.steps += 1;
    }
}

fn config() -> RaceConfig {
    RaceConfig {
        laps: 1,
        finish_countdown_ms: 100,
        results_screen_ms: 50,
        ..RaceConfig::default()
    }
}

/// Grid with a single checkpoint under slot 0's spawn position
fn grid_at(config: &RaceConfig, checkpoint: u32) -> TrackGrid {
    let (position, _) = config.spawn_pose(0);
    let (row, col) = quantize(position, config.cell_size);
    let mut grid = TrackGrid::new();
    grid.set_checkpoint(row, col, checkpoint);
    grid
}

#[test]
fn two_ships_race_to_results_and_back() {
    let config = config();
    let mut world = StillWorld { steps: 0 };
    let mut pool = BodyPool::new();
    let empty = TrackGrid::new();

    let mut turn = Turn::new();
    for name in ["ada", "bob"] {
        let slot = turn.reserve_free_slot();
        turn.record_admin_event(AdminEvent::Spawn {
            slot,
            username: name.to_string(),
            color: 0xffffff,
        });
    }
    let mut turn = turn.evolve(&config, &empty, &mut world, &mut pool, 0.0).turn;
    assert_eq!(turn.player_count(), 2);
    assert_eq!(pool.len(), 2);

    // Slot 0 walks the checkpoints down from 12 to 1, then wraps onto 12.
    let route: Vec<u32> = std::iter::once(12).chain((1..12).rev()).chain([12]).collect();
    let mut finishes = Vec::new();
    for checkpoint in route {
        turn.record_input_event(0, InputEvent::press(InputKind::Gas));
        let grid = grid_at(&config, checkpoint);
        let evolution = turn.evolve(&config, &grid, &mut world, &mut pool, 20.0);
        finishes.extend(evolution.finishes);
        turn = evolution.turn;
        if finishes.is_empty() {
            assert_eq!(turn.phase, MatchPhase::InProgress);
        }
    }

    assert_eq!(finishes.len(), 1);
    assert_eq!(finishes[0].username, "ada");
    let ada = turn.ship(0).unwrap();
    assert_eq!(ada.lap, 2);
    assert!(ada.has_finished_race(config.laps));
    assert_eq!(turn.phase, MatchPhase::FinishCountdown);

    // Bob never crosses; the countdown runs out.
    while turn.phase == MatchPhase::FinishCountdown {
        turn = turn.evolve(&config, &empty, &mut world, &mut pool, 20.0).turn;
    }
    assert_eq!(turn.phase, MatchPhase::ResultsScreen);
    assert_eq!(turn.countdown, config.results_screen_ms);

    while turn.phase == MatchPhase::ResultsScreen {
        turn = turn.evolve(&config, &empty, &mut world, &mut pool, 20.0).turn;
    }
    assert_eq!(turn.phase, MatchPhase::InProgress);
    for (slot, ship) in turn.vessels.iter() {
        assert_eq!(ship.position, config.spawn_pose(slot).0);
        assert_eq!(ship.lap, 0);
        assert_eq!(ship.laptimes, vec![0.0]);
    }
    assert!(world.steps > 15);
}

#[test]
fn leaving_player_frees_the_slot_for_the_next_join() {
    let config = config();
    let mut world = StillWorld { steps: 0 };
    let mut pool = BodyPool::new();
    let grid = TrackGrid::new();

    let mut turn = Turn::new();
    for slot in 0..3 {
        turn.record_admin_event(AdminEvent::Spawn {
            slot,
            username: format!("p{slot}"),
            color: 0,
        });
    }
    let mut turn = turn.evolve(&config, &grid, &mut world, &mut pool, 16.0).turn;

    turn.record_admin_event(AdminEvent::Destroy { slot: 1 });
    let mut turn = turn.evolve(&config, &grid, &mut world, &mut pool, 16.0).turn;
    assert!(turn.ship(1).is_none());
    assert_eq!(turn.reserve_free_slot(), 1);

    turn.record_admin_event(AdminEvent::Spawn {
        slot: 1,
        username: "late".to_string(),
        color: 0,
    });
    let turn = turn.evolve(&config, &grid, &mut world, &mut pool, 16.0).turn;
    let late = turn.ship(1).unwrap();
    assert_eq!(late.username, "late");
    assert_eq!(late.position, config.spawn_pose(1).0);
    assert_eq!(late.lap, 0);
}
