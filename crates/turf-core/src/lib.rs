//! Club and territory control engine: persistent teams claiming, defending,
//! and contesting ownership of externally-sourced locations.
//!
//! The engine is pure and deterministic given `ArenaConfig::seed`: no I/O,
//! no wall-clock input to any decision, and every mutation funnels through
//! the `Arena` aggregate root so a persistence layer can commit each
//! operation's touched documents as a single unit.

pub mod arena;
pub mod audit;
pub mod battle;
pub mod club;
pub mod directory;
mod rng;

pub use arena::{Arena, StateDelta};
