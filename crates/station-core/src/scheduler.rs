//! Real-time driver for the engine.
//!
//! Two rates run off the same elapsed time:
//! - ticks at `ticks_per_second`
//! - saves every `save_interval_ms`
//!
//! Elapsed time is accumulated, so uneven frame times still produce the right
//! number of ticks. A long gap is capped at `max_catch_up_ticks`.

use std::time::Duration;

use station_logic::config::StationConfig;

use crate::engine::StationEngine;
use crate::persistence::SaveSink;

/// What one [`Scheduler::advance`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub ticks: u32,
    /// Ticks skipped because of the catch-up cap.
    pub skipped: u32,
    pub saved: bool,
    pub save_failed: bool,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    tick_interval: Duration,
    save_interval: Duration,
    max_catch_up_ticks: u32,
    tick_accumulator: Duration,
    save_accumulator: Duration,
}

impl Scheduler {
    pub fn new(config: &StationConfig) -> Self {
        let ticks_per_second = config.ticks_per_second.max(1);
        Self {
            tick_interval: Duration::from_secs(1) / ticks_per_second,
            save_interval: Duration::from_millis(config.save_interval_ms.max(1)),
            max_catch_up_ticks: config.max_catch_up_ticks.max(1),
            tick_accumulator: Duration::ZERO,
            save_accumulator: Duration::ZERO,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Run the ticks and saves that `elapsed` real time calls for.
    pub fn advance<S: SaveSink + ?Sized>(
        &mut self,
        engine: &mut StationEngine,
        elapsed: Duration,
        sink: &mut S,
    ) -> TickReport {
        let mut report = TickReport::default();

        self.tick_accumulator += elapsed;
        while self.tick_accumulator >= self.tick_interval {
            self.tick_accumulator -= self.tick_interval;
            if report.ticks < self.max_catch_up_ticks {
                engine.update();
                report.ticks += 1;
            } else {
                report.skipped += 1;
            }
        }
        if report.skipped > 0 {
            log::warn!(
                "Fell behind by {} ticks, skipped them",
                report.skipped
            );
        }

        self.save_accumulator += elapsed;
        if self.save_accumulator >= self.save_interval {
            self.save_accumulator = Duration::ZERO;
            report.saved = true;
            if let Err(e) = sink.persist(&engine.serialize()) {
                log::warn!("Save failed: {}", e);
                report.save_failed = true;
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{decode_binary, MemorySaveSink, SaveError, SaveSnapshot};
    use std::sync::Arc;
    use station_logic::content::Content;

    const CONTENT: &str = include_str!("../../../data/station_content.json");

    struct BrokenSink;

    impl SaveSink for BrokenSink {
        fn persist(&mut self, _: &SaveSnapshot) -> Result<(), SaveError> {
            Err(SaveError::Corrupt("disk full".into()))
        }
    }

    fn engine() -> StationEngine {
        let content = Arc::new(Content::from_json(CONTENT).unwrap());
        let mut e = StationEngine::new(content, StationConfig::default()).unwrap();
        e.finish_intro().unwrap();
        e
    }

    #[test]
    fn test_ticks_follow_elapsed_time() {
        let mut e = engine();
        let mut scheduler = Scheduler::new(e.config());
        let mut sink = MemorySaveSink::default();

        let report = scheduler.advance(&mut e, Duration::from_millis(500), &mut sink);
        assert_eq!(report.ticks, 10);
        assert!(!report.saved);
        // 10 ticks at speed 0.2
        assert!((e.state().cycles - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_intervals_accumulate() {
        let mut e = engine();
        let mut scheduler = Scheduler::new(e.config());
        let mut sink = MemorySaveSink::default();

        let mut ticks = 0;
        for _ in 0..10 {
            ticks += scheduler
                .advance(&mut e, Duration::from_millis(30), &mut sink)
                .ticks;
        }
        assert_eq!(ticks, 6);
        assert_eq!(e.tick_count(), 6);
    }

    #[test]
    fn test_save_timer() {
        let mut e = engine();
        let mut scheduler = Scheduler::new(e.config());
        let mut sink = MemorySaveSink::default();

        for _ in 0..6 {
            scheduler.advance(&mut e, Duration::from_millis(500), &mut sink);
        }
        assert_eq!(sink.saves.len(), 1);
        let saved = decode_binary(sink.latest().unwrap()).unwrap();
        assert_eq!(saved.tick_count, 60);
    }

    #[test]
    fn test_failed_save_keeps_ticking() {
        let mut e = engine();
        let mut scheduler = Scheduler::new(e.config());

        let report = scheduler.advance(&mut e, Duration::from_secs(3), &mut BrokenSink);
        assert!(report.saved);
        assert!(report.save_failed);
        assert_eq!(report.ticks, 60);

        let report = scheduler.advance(&mut e, Duration::from_secs(1), &mut BrokenSink);
        assert_eq!(report.ticks, 20);
        assert_eq!(e.tick_count(), 80);
    }

    #[test]
    fn test_catch_up_is_capped() {
        let mut e = engine();
        let config = StationConfig {
            max_catch_up_ticks: 5,
            ..StationConfig::default()
        };
        let mut scheduler = Scheduler::new(&config);
        let mut sink = MemorySaveSink::default();

        let report = scheduler.advance(&mut e, Duration::from_secs(1), &mut sink);
        assert_eq!(report.ticks, 5);
        assert_eq!(report.skipped, 15);
        assert_eq!(e.tick_count(), 5);
    }
}
