//! Engine events.
//!
//! The engine pushes events into a bounded queue; front ends drain it after
//! ticks or dispatch it to an [`EventSink`]. When the queue is full the
//! oldest event is dropped.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use station_logic::game_state::GameState;
use station_logic::progression::{LevelChange, ProgressionKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StationEvent {
    LevelChanged {
        kind: ProgressionKind,
        name: String,
        previous_level: u32,
        next_level: u32,
    },
    StateChanged {
        previous: GameState,
        next: GameState,
    },
    BossAppeared,
    BattleCompleted {
        name: String,
    },
    NewGameStarted {
        rebirth_one_count: u32,
        rebirth_two_count: u32,
    },
}

impl StationEvent {
    pub fn level_changed(kind: ProgressionKind, name: &str, change: LevelChange) -> Self {
        StationEvent::LevelChanged {
            kind,
            name: name.to_string(),
            previous_level: change.previous_level,
            next_level: change.next_level,
        }
    }
}

/// Receives events synchronously.
pub trait EventSink {
    fn handle(&mut self, event: &StationEvent);
}

impl<F: FnMut(&StationEvent)> EventSink for F {
    fn handle(&mut self, event: &StationEvent) {
        self(event)
    }
}

/// Bounded FIFO of pending events.
#[derive(Debug, Clone)]
pub struct EventQueue {
    events: VecDeque<StationEvent>,
    capacity: usize,
    dropped: u64,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    pub fn push(&mut self, event: StationEvent) {
        if self.events.len() >= self.capacity {
            if let Some(oldest) = self.events.pop_front() {
                self.dropped += 1;
                log::warn!("Event queue full, dropping {:?}", oldest);
            }
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<StationEvent> {
        self.events.drain(..).collect()
    }

    pub fn dispatch<S: EventSink + ?Sized>(&mut self, sink: &mut S) {
        for event in self.events.drain(..) {
            sink.handle(&event);
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events lost to overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
