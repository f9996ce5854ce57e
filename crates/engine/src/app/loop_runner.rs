use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::metrics::MetricsAccumulator;
use super::scene::SceneRuntime;
use super::{Scene, SceneCommand};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    /// Stop after this many simulation ticks; `None` runs until the scene quits.
    pub max_ticks: Option<u64>,
    /// Pace ticks against the wall clock instead of running them back to back.
    pub realtime: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            max_ticks: None,
            realtime: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks_run: u64,
    pub restarts: u32,
    pub quit_requested: bool,
    pub dropped_backlog: Duration,
}

pub fn run_headless(config: LoopConfig, scene: Box<dyn Scene>) -> RunSummary {
    let target_tps = config.target_tps.max(1);
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let fixed_dt_seconds = fixed_dt.as_secs_f32();
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let max_frame_delta = normalize_non_zero_duration(config.max_frame_delta, fixed_dt);
    let metrics_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));

    info!(
        target_tps,
        max_ticks_per_frame,
        max_ticks = ?config.max_ticks,
        realtime = config.realtime,
        "loop_config"
    );

    let mut runtime = SceneRuntime::new(scene);
    runtime.load();
    info!(
        entity_count = runtime.world().entity_count(),
        title = runtime.debug_title().as_deref().unwrap_or("untitled"),
        "scene_loaded"
    );

    let mut summary = RunSummary::default();
    let mut metrics = MetricsAccumulator::new(metrics_interval, Instant::now());
    let mut accumulator = Duration::ZERO;
    let mut last_frame = Instant::now();

    'frames: loop {
        let ticks_this_frame = if config.realtime {
            let now = Instant::now();
            let frame_dt = clamp_frame_delta(now - last_frame, max_frame_delta);
            last_frame = now;
            let plan = plan_sim_steps(accumulator + frame_dt, fixed_dt, max_ticks_per_frame);
            accumulator = plan.remaining_accumulator;
            if !plan.dropped_backlog.is_zero() {
                summary.dropped_backlog =
                    summary.dropped_backlog.saturating_add(plan.dropped_backlog);
                warn!(
                    dropped_ms = plan.dropped_backlog.as_secs_f64() * 1000.0,
                    "sim_backlog_dropped"
                );
            }
            plan.ticks_to_run
        } else {
            max_ticks_per_frame
        };

        for _ in 0..ticks_this_frame {
            if config
                .max_ticks
                .is_some_and(|limit| summary.ticks_run >= limit)
            {
                break 'frames;
            }

            let tick_start = Instant::now();
            let command = runtime.update(fixed_dt_seconds);
            metrics.record_tick(tick_start.elapsed());
            summary.ticks_run += 1;

            match command {
                SceneCommand::None => {}
                SceneCommand::Restart => {
                    runtime.restart();
                    summary.restarts = summary.restarts.saturating_add(1);
                    info!(tick = summary.ticks_run, "scene_restarted");
                }
                SceneCommand::Quit => {
                    summary.quit_requested = true;
                    info!(tick = summary.ticks_run, "scene_quit_requested");
                    break 'frames;
                }
            }
        }

        if let Some(snapshot) = metrics.maybe_snapshot(Instant::now()) {
            info!(
                tps = snapshot.tps,
                tick_cost_ms = snapshot.tick_cost_ms,
                worst_tick_ms = snapshot.worst_tick_ms,
                ticks_total = snapshot.ticks_total,
                "loop_metrics"
            );
        }

        if config.realtime {
            thread::sleep(fixed_dt.saturating_sub(accumulator));
        }
    }

    runtime.shutdown();
    info!(
        ticks_run = summary.ticks_run,
        restarts = summary.restarts,
        quit_requested = summary.quit_requested,
        "shutdown"
    );
    summary
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::take(&mut accumulator)
    } else {
        Duration::ZERO
    };

    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
