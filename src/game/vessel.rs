//! Ship state and race progress

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::input::PlayerInput;
use super::physics::Body;

/// Player ship in a race (authoritative)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ship {
    // Position and movement
    pub position: DVec2,
    pub velocity: DVec2,
    pub angle: f64,

    pub username: String,
    /// 0xRRGGBB
    pub color: u32,

    /// Input resolved on the last tick
    pub input: PlayerInput,

    // Race progress
    /// Checkpoint numbers descend along the track and wrap at the finish line
    pub checkpoint: u32,
    pub lap: i32,
    /// Index into `laptimes` of the lap being timed
    pub current_laptime: usize,
    /// Seconds per lap, one entry per lap started
    pub laptimes: Vec<f64>,
}

impl Ship {
    pub fn new(username: String, color: u32, position: DVec2, angle: f64) -> Self {
        Self {
            position,
            velocity: DVec2::ZERO,
            angle,
            username,
            color,
            input: PlayerInput::default(),
            checkpoint: 1,
            lap: 0,
            current_laptime: 0,
            laptimes: vec![0.0],
        }
    }

    /// Finish predicate. Lap 1 starts at the first line crossing after the
    /// grid, so a race of `laps` laps ends on crossing number `laps + 1`.
    pub fn has_finished_race(&self, laps: i32) -> bool {
        self.lap > laps
    }

    /// Back to the grid with fresh race progress
    pub fn reset_to(&mut self, position: DVec2, angle: f64) {
        self.position = position;
        self.velocity = DVec2::ZERO;
        self.angle = angle;
        self.input = PlayerInput::default();
        self.checkpoint = 1;
        self.lap = 0;
        self.current_laptime = 0;
        self.laptimes = vec![0.0];
    }

    /// Copy the stored kinematics into a body before the step
    pub fn write_kinematics(&self, body: &mut Body) {
        body.position = self.position;
        body.velocity = self.velocity;
        body.angle = self.angle;
    }

    /// Take kinematics back from a stepped body
    pub fn read_kinematics(&mut self, body: &Body) {
        self.position = body.position;
        self.velocity = body.velocity;
        self.angle = body.angle;
    }

    /// Sum of every timed lap (seconds)
    pub fn total_time(&self) -> f64 {
        self.laptimes.iter().sum()
    }

    /// Fastest completed lap. Entry 0 is the roll-up to the line and the
    /// entry at `current_laptime` is still running, so both are skipped.
    pub fn best_lap(&self) -> Option<f64> {
        let end = self.current_laptime.min(self.laptimes.len());
        self.laptimes
            .get(1..end)
            .unwrap_or_default()
            .iter()
            .copied()
            .reduce(f64::min)
    }
}
