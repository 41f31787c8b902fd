//! Station Core - idle space-station simulation engine
//!
//! Runs the mutable side of the game on top of the pure rules in
//! `station-logic`: one [`StationEngine`](engine::StationEngine) owns all
//! progress, activation and requirement latches, and advances them one tick
//! at a time.
//!
//! # Architecture
//!
//! - **state**: plain data, indexed by content ids
//! - **attributes**: pure snapshot of attribute totals rebuilt from state
//! - **engine**: tick pipeline and player commands
//! - **prestige**: rebirth / transcend resets
//! - **persistence**: name-keyed save snapshots (bincode, JSON)
//! - **scheduler**: real-time tick and save timers
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use station_core::prelude::*;
//!
//! let json = std::fs::read_to_string("data/station_content.json").unwrap();
//! let content = Arc::new(Content::from_json(&json).unwrap());
//! let config = StationConfig::default();
//!
//! let mut scheduler = Scheduler::new(&config);
//! let mut engine = StationEngine::new(content, config).unwrap();
//! let mut saves = MemorySaveSink::default();
//! engine.finish_intro().unwrap();
//!
//! loop {
//!     scheduler.advance(&mut engine, Duration::from_millis(16), &mut saves);
//!     for event in engine.drain_events() {
//!         println!("{:?}", event);
//!     }
//! }
//! ```

pub mod attributes;
pub mod engine;
pub mod events;
pub mod persistence;
pub mod prestige;
pub mod scheduler;
pub mod state;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::engine::{CommandError, MultiplierTarget, StationEngine};
    pub use crate::events::{EventSink, StationEvent};
    pub use crate::persistence::{load_or_fresh, MemorySaveSink, SaveError, SaveSink, SaveSnapshot};
    pub use crate::prestige::PrestigeTier;
    pub use crate::scheduler::Scheduler;
    pub use station_logic::config::StationConfig;
    pub use station_logic::content::Content;
    pub use station_logic::game_state::GameState;
}
