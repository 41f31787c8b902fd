//! Pure progression logic for the station simulation.
//!
//! This crate contains all game rules that are independent of the tick loop,
//! persistence, or any front end. Functions take plain data and return
//! results, making them unit-testable and reusable by the engine, the
//! headless harness, and any future client.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`attributes`] | Derived, display-facing attribute kinds and snapshots |
//! | [`config`] | Tick rate, game speed, lifespan and other engine settings |
//! | [`content`] | JSON content definitions, name resolution and validation |
//! | [`effects`] | Effect type registry, combination algebra, modifier remapping |
//! | [`game_state`] | Game state machine and per-state capability flags |
//! | [`grid`] | Module/operation activation with grid capacity admission |
//! | [`population`] | Heat, population dynamics and work speed |
//! | [`progression`] | Leveling curve, xp multipliers, layered (battle) progress |
//! | [`requirements`] | Unlock conditions with a monotonic completion latch |

pub mod attributes;
pub mod config;
pub mod content;
pub mod effects;
pub mod game_state;
pub mod grid;
pub mod population;
pub mod progression;
pub mod requirements;
