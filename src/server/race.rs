//! Real-time race loop around the tick core

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{Config, RaceConfig};
use crate::game::{
    AdminEvent, ArenaWorld, BodyPool, InputEvent, MatchPhase, RaceFinish, TrackGrid, Turn,
};
use crate::util::time::{tick_duration, tick_millis, unix_millis, Timer};

use super::protocol::{ClientMsg, ServerMsg, TurnSnapshot};

/// Commands fed into the loop between ticks
#[derive(Debug)]
pub enum RaceCommand {
    Join {
        username: String,
        color: u32,
        reply: oneshot::Sender<usize>,
    },
    Leave {
        slot: usize,
    },
    Input {
        slot: usize,
        events: Vec<InputEvent>,
    },
    Ping {
        t: u64,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RaceError {
    #[error("Race loop has stopped")]
    LoopStopped,

    #[error("Race loop dropped the reply")]
    NoReply,
}

/// Handle to a running race
#[derive(Clone)]
pub struct RaceHandle {
    pub id: Uuid,
    command_tx: mpsc::Sender<RaceCommand>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    player_count: Arc<AtomicUsize>,
}

impl RaceHandle {
    async fn send(&self, command: RaceCommand) -> Result<(), RaceError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| RaceError::LoopStopped)
    }

    /// Reserve a slot and queue a spawn for it. Resolves on the next tick.
    pub async fn join(&self, username: impl Into<String>, color: u32) -> Result<usize, RaceError> {
        let (reply, slot) = oneshot::channel();
        self.send(RaceCommand::Join {
            username: username.into(),
            color,
            reply,
        })
        .await?;
        slot.await.map_err(|_| RaceError::NoReply)
    }

    pub async fn leave(&self, slot: usize) -> Result<(), RaceError> {
        self.send(RaceCommand::Leave { slot }).await
    }

    pub async fn send_input(&self, slot: usize, events: Vec<InputEvent>) -> Result<(), RaceError> {
        self.send(RaceCommand::Input { slot, events }).await
    }

    /// Route a decoded client message. Returns the direct reply, if any.
    pub async fn dispatch(&self, msg: ClientMsg) -> Result<Option<ServerMsg>, RaceError> {
        match msg {
            ClientMsg::Join { username, color } => {
                let slot = self.join(username, color).await?;
                Ok(Some(ServerMsg::Joined {
                    race_id: self.id,
                    slot,
                }))
            }
            ClientMsg::Input { slot, events } => {
                self.send_input(slot, events).await?;
                Ok(None)
            }
            ClientMsg::Leave { slot } => {
                self.leave(slot).await?;
                Ok(None)
            }
            ClientMsg::Ping { t } => {
                self.send(RaceCommand::Ping { t }).await?;
                Ok(None)
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.snapshot_tx.subscribe()
    }

    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }
}

/// The authoritative race
pub struct RaceLoop {
    id: Uuid,
    race: RaceConfig,
    tick_rate: u32,
    snapshot_every: u32,
    grid: TrackGrid,
    turn: Turn,
    world: ArenaWorld,
    pool: BodyPool,
    tick: u64,
    command_rx: mpsc::Receiver<RaceCommand>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    player_count: Arc<AtomicUsize>,
}

impl RaceLoop {
    /// Create a new race
    pub fn new(config: &Config, grid: TrackGrid) -> (Self, RaceHandle) {
        let id = Uuid::new_v4();
        let (command_tx, command_rx) = mpsc::channel(256);
        let (snapshot_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = RaceHandle {
            id,
            command_tx,
            snapshot_tx: snapshot_tx.clone(),
            player_count: player_count.clone(),
        };

        let race = Self {
            id,
            race: config.race.clone(),
            tick_rate: config.tick_rate,
            snapshot_every: config.snapshot_every.max(1),
            grid,
            turn: Turn::new(),
            world: ArenaWorld::new(),
            pool: BodyPool::new(),
            tick: 0,
            command_rx,
            snapshot_tx,
            player_count,
        };

        (race, handle)
    }

    pub fn turn(&self) -> &Turn {
        &self.turn
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Run the fixed-tick loop until every handle is dropped
    pub async fn run(mut self) {
        info!(race_id = %self.id, tick_rate = self.tick_rate, "Race loop started");

        let mut tick_interval = interval(tick_duration(self.tick_rate));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let budget_micros = tick_duration(self.tick_rate).as_micros() as u64;
        let mut timer = Timer::new();

        loop {
            tick_interval.tick().await;
            timer.reset();

            if !self.drain_commands() {
                break;
            }
            self.step();

            let spent = timer.elapsed_micros();
            if spent > budget_micros {
                warn!(race_id = %self.id, tick = self.tick, spent_micros = spent, "Tick overran budget");
            }
        }

        info!(race_id = %self.id, ticks = self.tick, "Race loop stopped");
    }

    /// Apply queued commands to the current turn. `false` once every handle
    /// is gone.
    fn drain_commands(&mut self) -> bool {
        loop {
            match self.command_rx.try_recv() {
                Ok(command) => self.handle_command(command),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn handle_command(&mut self, command: RaceCommand) {
        match command {
            RaceCommand::Join {
                username,
                color,
                reply,
            } => {
                let slot = self.turn.reserve_free_slot();
                info!(race_id = %self.id, slot, username = %username, "Player joining");
                self.turn.record_admin_event(AdminEvent::Spawn {
                    slot,
                    username,
                    color,
                });
                if reply.send(slot).is_err() {
                    debug!(slot, "Join reply receiver dropped");
                }
            }
            RaceCommand::Leave { slot } => {
                info!(race_id = %self.id, slot, "Player leaving");
                self.turn.record_admin_event(AdminEvent::Destroy { slot });
            }
            RaceCommand::Input { slot, events } => {
                if !self.is_known_slot(slot) {
                    warn!(race_id = %self.id, slot, "Input for empty slot dropped");
                    let _ = self.snapshot_tx.send(ServerMsg::Error {
                        code: "unknown_slot".to_string(),
                        message: format!("No ship in slot {slot}"),
                    });
                    return;
                }
                let accepted = self.turn.queue_input_events(slot, events);
                if !accepted.is_empty() {
                    let _ = self.snapshot_tx.send(ServerMsg::InputRelay {
                        slot,
                        events: accepted,
                    });
                }
            }
            RaceCommand::Ping { t } => {
                let _ = self.snapshot_tx.send(ServerMsg::Pong {
                    t,
                    server_time: unix_millis(),
                });
            }
        }
    }

    /// Live ship, or a spawn already queued for this tick
    fn is_known_slot(&self, slot: usize) -> bool {
        self.turn.vessels.contains(slot)
            || self
                .turn
                .admin_events
                .iter()
                .any(|event| matches!(event, AdminEvent::Spawn { slot: s, .. } if *s == slot))
    }

    /// Evolve one fixed tick and broadcast the results
    pub fn step(&mut self) -> Vec<RaceFinish> {
        let previous_phase = self.turn.phase;
        let evolution = self.turn.evolve(
            &self.race,
            &self.grid,
            &mut self.world,
            &mut self.pool,
            tick_millis(self.tick_rate),
        );
        self.turn = evolution.turn;
        self.tick += 1;
        self.player_count
            .store(self.turn.player_count(), Ordering::Relaxed);

        for finish in &evolution.finishes {
            let _ = self.snapshot_tx.send(ServerMsg::RaceFinished {
                finish: finish.clone(),
            });
        }

        if self.turn.phase != previous_phase {
            info!(race_id = %self.id, from = ?previous_phase, to = ?self.turn.phase, "Phase changed");
            let _ = self.snapshot_tx.send(ServerMsg::PhaseChanged {
                phase: self.turn.phase,
                countdown: self.turn.countdown,
            });
        }

        if self.tick % u64::from(self.snapshot_every) == 0 {
            let _ = self.snapshot_tx.send(ServerMsg::Snapshot {
                tick: self.tick,
                turn: TurnSnapshot::from(&self.turn),
            });
        }

        evolution.finishes
    }

    pub fn phase(&self) -> MatchPhase {
        self.turn.phase
    }
}
