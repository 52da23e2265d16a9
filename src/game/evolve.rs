//! The per-tick transition.
//!
//! Pipeline order is fixed: countdown, body reset, admin events, input and
//! forces, physics step, checkpoints and laps, phase machine. Later stages
//! rely on earlier ones (a ship spawned this tick is driven this tick).

use std::f64::consts::FRAC_PI_2;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::RaceConfig;

use super::input::{InputEvent, PlayerInput};
use super::physics::{BodyPool, BodySpec, PhysicsWorld};
use super::slots::Slots;
use super::track::TrackGrid;
use super::turn::{AdminEvent, MatchPhase, Turn};
use super::vessel::Ship;

/// Emitted when a ship crosses the line for the last time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceFinish {
    pub slot: usize,
    pub username: String,
    /// Seconds from spawn to finish
    pub total_time: f64,
    pub best_lap: f64,
}

/// Result of one tick
#[derive(Debug, Clone)]
pub struct Evolution {
    pub turn: Turn,
    pub finishes: Vec<RaceFinish>,
}

/// How a checkpoint change reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Crossing {
    /// Same checkpoint or a neighbour
    None,
    /// Wrapped from the lowest number to the highest
    FinishForward,
    /// Wrapped the other way
    FinishBackward,
}

fn classify(old: u32, new: u32) -> Crossing {
    match i64::from(new) - i64::from(old) {
        delta if delta > 1 => Crossing::FinishForward,
        delta if delta < -1 => Crossing::FinishBackward,
        _ => Crossing::None,
    }
}

/// Countdown after `elapsed_millis`, rounded up and floored at zero
fn tick_countdown(countdown: i64, elapsed_millis: f64) -> i64 {
    ((countdown as f64 - elapsed_millis).ceil() as i64).max(0)
}

impl Turn {
    /// Consume this tick's events and produce the next turn.
    ///
    /// `pool` and `world` are borrowed for the call only. The returned turn
    /// has empty event queues.
    pub fn evolve<W: PhysicsWorld + ?Sized>(
        &self,
        config: &RaceConfig,
        grid: &TrackGrid,
        world: &mut W,
        pool: &mut BodyPool,
        elapsed_millis: f64,
    ) -> Evolution {
        let spec = BodySpec::ship(config);
        let dt = elapsed_millis / 1000.0;

        let mut next = Turn {
            vessels: self.vessels.clone(),
            pending_events: Slots::new(),
            admin_events: Vec::new(),
            phase: self.phase,
            countdown: tick_countdown(self.countdown, elapsed_millis),
        };

        self.prepare_bodies(&spec, world, pool);
        apply_admin_events(&mut next.vessels, &self.admin_events, config, &spec, world, pool);
        apply_inputs(&mut next.vessels, &self.pending_events, next.phase, config, pool);

        world.step(pool, dt);

        let finishes = next.track_progress(config, grid, pool, dt);
        next.advance_phase(config);

        Evolution {
            turn: next,
            finishes,
        }
    }

    /// Give every live ship a clean, attached body
    fn prepare_bodies<W: PhysicsWorld + ?Sized>(
        &self,
        spec: &BodySpec,
        world: &mut W,
        pool: &mut BodyPool,
    ) {
        for slot in self.vessels.slots() {
            let reused = pool.contains(slot);
            let body = pool.reset_or_allocate(slot, spec);
            world.attach(body);
            if !reused {
                debug!(slot, body_id = body.id, "Allocated body");
            }
        }
    }

    /// Update checkpoints, laps and lap times from the stepped bodies
    fn track_progress(
        &mut self,
        config: &RaceConfig,
        grid: &TrackGrid,
        pool: &BodyPool,
        dt: f64,
    ) -> Vec<RaceFinish> {
        let mut finishes = Vec::new();

        for (slot, ship) in self.vessels.iter_mut() {
            let Some(body) = pool.get(slot) else {
                continue;
            };

            let was_finished = ship.has_finished_race(config.laps);
            let old = ship.checkpoint;
            let new = grid
                .checkpoint_at(body.position, config.cell_size)
                .unwrap_or(old);

            if !was_finished {
                if let Some(laptime) = ship.laptimes.get_mut(ship.current_laptime) {
                    *laptime += dt;
                }
            }

            match classify(old, new) {
                Crossing::None => {}
                Crossing::FinishForward => {
                    ship.lap += 1;
                    if let Ok(lap) = usize::try_from(ship.lap) {
                        if lap > ship.current_laptime {
                            ship.current_laptime = lap;
                            ship.laptimes.push(0.0);
                        }
                    }

                    if !was_finished && ship.has_finished_race(config.laps) {
                        let total_time = ship.total_time();
                        let finish = RaceFinish {
                            slot,
                            username: ship.username.clone(),
                            total_time,
                            best_lap: ship.best_lap().unwrap_or(total_time),
                        };
                        info!(
                            slot,
                            username = %finish.username,
                            total_time = finish.total_time,
                            best_lap = finish.best_lap,
                            "Ship finished race"
                        );
                        finishes.push(finish);

                        if self.phase == MatchPhase::InProgress {
                            self.phase = MatchPhase::FinishCountdown;
                            self.countdown = config.finish_countdown_ms;
                            info!(countdown_ms = self.countdown, "Finish countdown started");
                        }
                    }
                }
                Crossing::FinishBackward => {
                    ship.lap -= 1;
                    debug!(slot, lap = ship.lap, "Crossed finish line backwards");
                }
            }

            ship.checkpoint = new;
            ship.read_kinematics(body);
        }

        finishes
    }

    fn advance_phase(&mut self, config: &RaceConfig) {
        match self.phase {
            MatchPhase::InProgress => {}
            MatchPhase::FinishCountdown => {
                let all_done = self
                    .vessels
                    .values()
                    .all(|ship| ship.has_finished_race(config.laps));
                if self.countdown <= 0 || all_done {
                    self.phase = MatchPhase::ResultsScreen;
                    self.countdown = config.results_screen_ms;
                    info!(all_done, "Showing results");
                }
            }
            MatchPhase::ResultsScreen => {
                if self.countdown <= 0 {
                    for (slot, ship) in self.vessels.iter_mut() {
                        let (position, angle) = config.spawn_pose(slot);
                        ship.reset_to(position, angle);
                    }
                    self.phase = MatchPhase::InProgress;
                    info!(players = self.vessels.len(), "New race started");
                }
            }
        }
    }
}

/// Lowest slot with no ship and no spawn still waiting in `later`
fn free_slot(vessels: &Slots<Ship>, later: &[AdminEvent]) -> usize {
    (0..)
        .find(|slot| {
            !vessels.contains(*slot)
                && !later
                    .iter()
                    .any(|event| matches!(event, AdminEvent::Spawn { slot: s, .. } if s == slot))
        })
        .unwrap_or_default()
}

fn apply_admin_events<W: PhysicsWorld + ?Sized>(
    vessels: &mut Slots<Ship>,
    events: &[AdminEvent],
    config: &RaceConfig,
    spec: &BodySpec,
    world: &mut W,
    pool: &mut BodyPool,
) {
    for (index, event) in events.iter().enumerate() {
        match event {
            AdminEvent::Spawn {
                slot,
                username,
                color,
            } => {
                let slot = if vessels.contains(*slot) {
                    let moved = free_slot(vessels, &events[index + 1..]);
                    warn!(requested = *slot, slot = moved, "Spawn slot taken, moving ship");
                    moved
                } else {
                    *slot
                };

                let (position, angle) = config.spawn_pose(slot);
                let body = pool.reset_or_allocate(slot, spec);
                body.position = position;
                body.previous_position = position;
                body.interpolated_position = position;
                body.angle = angle;
                body.previous_angle = angle;
                body.interpolated_angle = angle;
                world.attach(body);

                vessels.insert(slot, Ship::new(username.clone(), *color, position, angle));
                info!(slot, username = %username, "Ship spawned");
            }
            AdminEvent::Destroy { slot } => {
                if vessels.remove(*slot).is_some() {
                    info!(slot = *slot, "Ship destroyed");
                } else {
                    debug!(slot = *slot, "Destroy for empty slot ignored");
                }
            }
        }
    }
}

/// Fold queued input and turn it into forces on each live ship's body
fn apply_inputs(
    vessels: &mut Slots<Ship>,
    pending: &Slots<Vec<InputEvent>>,
    phase: MatchPhase,
    config: &RaceConfig,
    pool: &mut BodyPool,
) {
    for (slot, ship) in vessels.iter_mut() {
        let Some(body) = pool.get_mut(slot) else {
            continue;
        };

        ship.write_kinematics(body);
        body.force = DVec2::ZERO;
        body.torque = 0.0;
        body.wake_up();

        let queued = pending.get(slot).map(Vec::as_slice).unwrap_or_default();
        let mut input = ship.input.fold(queued);

        if ship.has_finished_race(config.laps) || !phase.is_racing() {
            input = PlayerInput::default();
        } else {
            if input.turn_left {
                body.angle += FRAC_PI_2;
            }
            if input.turn_right {
                body.angle -= FRAC_PI_2;
            }

            body.apply_force_local(DVec2::new(0.0, config.thrust_force * input.throttle()));
            if input.lean_right {
                body.apply_force_local(DVec2::new(config.lean_force, 0.0));
            }
            if input.lean_left {
                body.apply_force_local(DVec2::new(-config.lean_force, 0.0));
            }
        }

        body.velocity *= config.velocity_damping;
        ship.input = input;
    }
}
