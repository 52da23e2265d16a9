//! Race simulation modules

pub mod evolve;
pub mod input;
pub mod physics;
pub mod slots;
pub mod track;
pub mod turn;
pub mod vessel;

pub use evolve::{Evolution, RaceFinish};
pub use input::{InputEvent, InputKind, PlayerInput};
pub use physics::{ArenaWorld, Body, BodyPool, BodySpec, PhysicsWorld};
pub use slots::Slots;
pub use track::{TrackError, TrackGrid};
pub use turn::{AdminEvent, MatchPhase, Turn};
pub use vessel::Ship;
