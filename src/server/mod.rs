//! Race hosting: wire messages and the fixed-tick loop

pub mod protocol;
pub mod race;

pub use protocol::{ClientMsg, ServerMsg, ShipSnapshot, TurnSnapshot};
pub use race::{RaceCommand, RaceError, RaceHandle, RaceLoop};
