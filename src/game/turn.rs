//! Turn state and event accumulation.
//!
//! A [`Turn`] is one tick of the race: the ships as they stand, plus the
//! events collected since the last tick. Events are written during the
//! real-time window and consumed once by [`Turn::evolve`].

use serde::{Deserialize, Serialize};

use super::input::InputEvent;
use super::slots::Slots;
use super::vessel::Ship;

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Racing
    #[default]
    InProgress,
    /// Someone finished; the rest have until the countdown runs out
    FinishCountdown,
    /// Results are up; the grid resets when the countdown runs out
    ResultsScreen,
}

impl MatchPhase {
    /// Phases in which ships have control authority
    pub const fn is_racing(self) -> bool {
        matches!(self, Self::InProgress | Self::FinishCountdown)
    }
}

/// Spawn/destroy instructions, distinct from control input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdminEvent {
    Spawn {
        slot: usize,
        username: String,
        color: u32,
    },
    Destroy {
        slot: usize,
    },
}

impl AdminEvent {
    pub fn slot(&self) -> usize {
        match self {
            Self::Spawn { slot, .. } | Self::Destroy { slot } => *slot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub vessels: Slots<Ship>,
    /// Input events awaiting application, per slot, oldest first
    pub pending_events: Slots<Vec<InputEvent>>,
    pub admin_events: Vec<AdminEvent>,
    pub phase: MatchPhase,
    /// Remaining milliseconds; meaning depends on `phase`
    pub countdown: i64,
}

impl Turn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowest slot with no live ship and no queued spawn
    pub fn reserve_free_slot(&self) -> usize {
        let requested: Vec<usize> = self
            .admin_events
            .iter()
            .filter_map(|event| match event {
                AdminEvent::Spawn { slot, .. } => Some(*slot),
                AdminEvent::Destroy { .. } => None,
            })
            .collect();

        (0..)
            .find(|slot| !self.vessels.contains(*slot) && !requested.contains(slot))
            .unwrap_or_default()
    }

    /// Queue input events for `slot`.
    ///
    /// An event is dropped when the latest queued event of the same kind
    /// already carries its value. Returns whether anything was queued.
    pub fn record_input_events(
        &mut self,
        slot: usize,
        events: impl IntoIterator<Item = InputEvent>,
    ) -> bool {
        !self.queue_input_events(slot, events).is_empty()
    }

    /// Same as [`Turn::record_input_events`], returning the events that
    /// were actually appended
    pub fn queue_input_events(
        &mut self,
        slot: usize,
        events: impl IntoIterator<Item = InputEvent>,
    ) -> Vec<InputEvent> {
        let queue = self.pending_events.get_or_insert_with(slot, Vec::new);
        let mut accepted = Vec::new();

        for event in events {
            let latest = queue.iter().rev().find(|queued| queued.kind == event.kind);
            if latest.is_some_and(|queued| queued.value == event.value) {
                continue;
            }
            queue.push(event);
            accepted.push(event);
        }

        if queue.is_empty() {
            self.pending_events.remove(slot);
        }
        accepted
    }

    pub fn record_input_event(&mut self, slot: usize, event: InputEvent) -> bool {
        self.record_input_events(slot, [event])
    }

    pub fn record_admin_event(&mut self, event: AdminEvent) {
        self.admin_events.push(event);
    }

    pub fn record_admin_events(&mut self, events: impl IntoIterator<Item = AdminEvent>) {
        self.admin_events.extend(events);
    }

    pub fn ship(&self, slot: usize) -> Option<&Ship> {
        self.vessels.get(slot)
    }

    /// Live ship count
    pub fn player_count(&self) -> usize {
        self.vessels.len()
    }
}
