//! Wire messages exchanged with race clients.
//! Transport is left to the embedding server; these are the JSON shapes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::{InputEvent, MatchPhase, RaceFinish, Ship, Turn};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Request a grid slot in the race
    Join {
        username: String,
        /// 0xRRGGBB
        color: u32,
    },

    /// Control changes since the last message
    Input {
        slot: usize,
        events: Vec<InputEvent>,
    },

    /// Leave the race
    Leave { slot: usize },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Slot assigned after a join
    Joined { race_id: Uuid, slot: usize },

    /// Input that changed queued state, relayed so peers can predict
    InputRelay {
        slot: usize,
        events: Vec<InputEvent>,
    },

    /// Race state (sent every few ticks)
    Snapshot { tick: u64, turn: TurnSnapshot },

    /// A ship completed the race
    RaceFinished {
        #[serde(flatten)]
        finish: RaceFinish,
    },

    /// Match phase changed
    PhaseChanged { phase: MatchPhase, countdown: i64 },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
        server_time: u64,
    },

    /// Error message
    Error { code: String, message: String },
}

/// Race state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnSnapshot {
    pub phase: MatchPhase,
    pub countdown: i64,
    pub ships: Vec<ShipSnapshot>,
}

impl From<&Turn> for TurnSnapshot {
    fn from(turn: &Turn) -> Self {
        Self {
            phase: turn.phase,
            countdown: turn.countdown,
            ships: turn
                .vessels
                .iter()
                .map(|(slot, ship)| ShipSnapshot::new(slot, ship))
                .collect(),
        }
    }
}

/// Ship state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipSnapshot {
    pub slot: usize,
    pub username: String,
    pub color: u32,
    pub x: f64,
    pub y: f64,
    /// Heading in radians
    pub angle: f64,
    pub vel_x: f64,
    pub vel_y: f64,
    pub checkpoint: u32,
    pub lap: i32,
    pub laptimes: Vec<f64>,
}

impl ShipSnapshot {
    pub fn new(slot: usize, ship: &Ship) -> Self {
        Self {
            slot,
            username: ship.username.clone(),
            color: ship.color,
            x: ship.position.x,
            y: ship.position.y,
            angle: ship.angle,
            vel_x: ship.velocity.x,
            vel_y: ship.velocity.y,
            checkpoint: ship.checkpoint,
            lap: ship.lap,
            laptimes: ship.laptimes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::InputKind;

    #[test]
    fn client_input_parses() {
        let msg: ClientMsg = serde_json::from_str(
            r#"{"type":"input","slot":2,"events":[{"kind":"gas","value":true}]}"#,
        )
        .unwrap();
        match msg {
            ClientMsg::Input { slot, events } => {
                assert_eq!(slot, 2);
                assert_eq!(events, vec![InputEvent::press(InputKind::Gas)]);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn finish_is_flattened() {
        let msg = ServerMsg::RaceFinished {
            finish: RaceFinish {
                slot: 1,
                username: "ada".to_string(),
                total_time: 61.5,
                best_lap: 19.25,
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "race_finished");
        assert_eq!(json["username"], "ada");
        assert_eq!(json["best_lap"], 19.25);
    }
}
