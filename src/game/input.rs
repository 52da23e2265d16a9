//! Player control flags and input events.
//!
//! Events are level-set instructions ("gas := true") queued per slot during a
//! tick window and folded into the ship's flags when the tick is evolved.

use serde::{Deserialize, Serialize};

/// Which control an event targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InputKind {
    Gas,
    Boost,
    LeanLeft,
    LeanRight,
    TurnLeft,
    TurnRight,
}

impl InputKind {
    /// Turn controls latch for a single tick instead of being held
    pub const fn is_turn(self) -> bool {
        matches!(self, Self::TurnLeft | Self::TurnRight)
    }
}

/// A single queued control change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEvent {
    pub kind: InputKind,
    pub value: bool,
}

impl InputEvent {
    pub const fn new(kind: InputKind, value: bool) -> Self {
        Self { kind, value }
    }

    pub const fn press(kind: InputKind) -> Self {
        Self::new(kind, true)
    }

    pub const fn release(kind: InputKind) -> Self {
        Self::new(kind, false)
    }
}

/// Resolved control flags for one ship
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInput {
    pub gas: bool,
    pub boost: bool,
    pub lean_left: bool,
    pub lean_right: bool,
    pub turn_left: bool,
    pub turn_right: bool,
}

impl PlayerInput {
    pub const fn new() -> Self {
        Self {
            gas: false,
            boost: false,
            lean_left: false,
            lean_right: false,
            turn_left: false,
            turn_right: false,
        }
    }

    fn flag_mut(&mut self, kind: InputKind) -> &mut bool {
        match kind {
            InputKind::Gas => &mut self.gas,
            InputKind::Boost => &mut self.boost,
            InputKind::LeanLeft => &mut self.lean_left,
            InputKind::LeanRight => &mut self.lean_right,
            InputKind::TurnLeft => &mut self.turn_left,
            InputKind::TurnRight => &mut self.turn_right,
        }
    }

    /// Fold one event into the flags.
    ///
    /// Hold controls take the event's value. Turn controls only ever latch on:
    /// a press followed by a release inside the same window still turns once.
    pub fn apply(&mut self, event: &InputEvent) {
        let flag = self.flag_mut(event.kind);
        if event.kind.is_turn() {
            *flag |= event.value;
        } else {
            *flag = event.value;
        }
    }

    /// Working input for a new tick: held flags carry over, turns start clear
    pub fn for_next_tick(&self) -> Self {
        Self {
            turn_left: false,
            turn_right: false,
            ..*self
        }
    }

    /// Fold a tick's queued events on top of the previous input
    pub fn fold<'a>(&self, events: impl IntoIterator<Item = &'a InputEvent>) -> Self {
        let mut input = self.for_next_tick();
        for event in events {
            input.apply(event);
        }
        input
    }

    /// Thrust multiplier: 0 idle, 1 gas, 2 gas + boost
    pub const fn throttle(&self) -> f64 {
        match (self.gas, self.boost) {
            (true, true) => 2.0,
            (true, false) => 1.0,
            _ => 0.0,
        }
    }
}
