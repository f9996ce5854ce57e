use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub tps: f32,
    /// Mean wall-clock cost of one simulation tick over the last interval.
    pub tick_cost_ms: f32,
    /// Slowest single tick seen during the interval.
    pub worst_tick_ms: f32,
    pub ticks_total: u64,
}

/// Rolls tick costs into one snapshot per interval for the `loop_metrics` event.
#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    ticks: u32,
    ticks_total: u64,
    tick_cost_sum: Duration,
    worst_tick: Duration,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval_start: now,
            interval,
            ticks: 0,
            ticks_total: 0,
            tick_cost_sum: Duration::ZERO,
            worst_tick: Duration::ZERO,
        }
    }

    pub(crate) fn record_tick(&mut self, cost: Duration) {
        self.ticks = self.ticks.saturating_add(1);
        self.ticks_total = self.ticks_total.saturating_add(1);
        self.tick_cost_sum = self.tick_cost_sum.saturating_add(cost);
        self.worst_tick = self.worst_tick.max(cost);
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let tick_cost_ms = match self.ticks {
            0 => 0.0,
            ticks => self.tick_cost_sum.as_secs_f32() * 1000.0 / ticks as f32,
        };
        let snapshot = LoopMetricsSnapshot {
            tps: self.ticks as f32 / elapsed.as_secs_f32().max(f32::EPSILON),
            tick_cost_ms,
            worst_tick_ms: self.worst_tick.as_secs_f32() * 1000.0,
            ticks_total: self.ticks_total,
        };

        self.interval_start = now;
        self.ticks = 0;
        self.tick_cost_sum = Duration::ZERO;
        self.worst_tick = Duration::ZERO;
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reports_mean_and_worst_tick() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1), base);
        for millis in [2, 4, 6] {
            accumulator.record_tick(Duration::from_millis(millis));
        }

        let snapshot = accumulator
            .maybe_snapshot(base + Duration::from_secs(1))
            .expect("interval elapsed");

        assert!((snapshot.tps - 3.0).abs() < 0.05);
        assert!((snapshot.tick_cost_ms - 4.0).abs() < 0.001);
        assert!((snapshot.worst_tick_ms - 6.0).abs() < 0.001);
        assert_eq!(snapshot.ticks_total, 3);
    }

    #[test]
    fn interval_state_resets_but_total_keeps_counting() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1), base);
        accumulator.record_tick(Duration::from_millis(9));
        assert!(accumulator
            .maybe_snapshot(base + Duration::from_millis(500))
            .is_none());
        accumulator
            .maybe_snapshot(base + Duration::from_secs(1))
            .expect("first interval");

        accumulator.record_tick(Duration::from_millis(1));
        let second = accumulator
            .maybe_snapshot(base + Duration::from_secs(2))
            .expect("second interval");
        assert_eq!(second.ticks_total, 2);
        assert!((second.worst_tick_ms - 1.0).abs() < 0.001);
    }
}
