//! Authoritative race simulation
//!
//! [`game`] holds the deterministic per-tick core, [`server`] drives it on a
//! fixed tick and fans results out to subscribers.

pub mod config;
pub mod game;
pub mod server;
pub mod util;
