use std::collections::VecDeque;

const STEP_EPSILON_SECONDS: f32 = 1e-6;

/// Durations for the timed look-around behaviours. Sweeps turn at `turn_rate_degrees`
/// per second; negative rates turn left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanTimings {
    pub turn_rate_degrees: f32,
    pub short_sweep_seconds: f32,
    pub long_sweep_seconds: f32,
    pub search_pause_seconds: f32,
    pub search_final_pause_seconds: f32,
    pub idle_pause_seconds: f32,
}

impl Default for ScanTimings {
    fn default() -> Self {
        Self {
            turn_rate_degrees: 45.0,
            short_sweep_seconds: 0.75,
            long_sweep_seconds: 1.5,
            search_pause_seconds: 1.0,
            search_final_pause_seconds: 3.0,
            idle_pause_seconds: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineKind {
    IdleLookAround,
    Search,
    WaypointPause,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    Rotate {
        radians_per_second: f32,
        remaining_seconds: f32,
    },
    Wait {
        remaining_seconds: f32,
    },
}

/// A finite sequence of timed steps driven by tick time. Dropping it cancels it.
#[derive(Debug, Clone, PartialEq)]
pub struct Routine {
    kind: RoutineKind,
    steps: VecDeque<Step>,
}

impl Routine {
    /// The first cycle after reaching the idle point uses the short sweep.
    pub fn idle_look_around(first_cycle: bool, timings: &ScanTimings) -> Self {
        let opening = if first_cycle {
            timings.short_sweep_seconds
        } else {
            timings.long_sweep_seconds
        };
        Self::new(
            RoutineKind::IdleLookAround,
            [
                left(timings, opening),
                wait(timings.idle_pause_seconds),
                right(timings, timings.long_sweep_seconds),
                wait(timings.idle_pause_seconds),
            ],
        )
    }

    pub fn search(timings: &ScanTimings) -> Self {
        Self::new(
            RoutineKind::Search,
            [
                left(timings, timings.short_sweep_seconds),
                wait(timings.search_pause_seconds),
                right(timings, timings.long_sweep_seconds),
                wait(timings.search_pause_seconds),
                left(timings, timings.short_sweep_seconds),
                wait(timings.search_final_pause_seconds),
            ],
        )
    }

    pub fn waypoint_pause(duration_seconds: f32) -> Self {
        Self::new(RoutineKind::WaypointPause, [wait(duration_seconds)])
    }

    fn new(kind: RoutineKind, steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            kind,
            steps: steps.into_iter().collect(),
        }
    }

    pub fn kind(&self) -> RoutineKind {
        self.kind
    }

    pub fn is_finished(&self) -> bool {
        self.steps.is_empty()
    }

    /// Spends `fixed_dt_seconds` on the remaining steps, carrying leftover time into
    /// the next step. Returns true once every step has run.
    pub fn advance(&mut self, fixed_dt_seconds: f32, yaw_radians: &mut f32) -> bool {
        let mut budget = fixed_dt_seconds.max(0.0);
        while let Some(step) = self.steps.front_mut() {
            let remaining = match step {
                Step::Rotate {
                    radians_per_second,
                    remaining_seconds,
                } => {
                    let used = budget.min(*remaining_seconds);
                    *yaw_radians += *radians_per_second * used;
                    *remaining_seconds -= used;
                    budget -= used;
                    *remaining_seconds
                }
                Step::Wait { remaining_seconds } => {
                    let used = budget.min(*remaining_seconds);
                    *remaining_seconds -= used;
                    budget -= used;
                    *remaining_seconds
                }
            };
            if remaining > STEP_EPSILON_SECONDS {
                return false;
            }
            self.steps.pop_front();
        }
        true
    }
}

fn left(timings: &ScanTimings, seconds: f32) -> Step {
    Step::Rotate {
        radians_per_second: -timings.turn_rate_degrees.to_radians(),
        remaining_seconds: seconds.max(0.0),
    }
}

fn right(timings: &ScanTimings, seconds: f32) -> Step {
    Step::Rotate {
        radians_per_second: timings.turn_rate_degrees.to_radians(),
        remaining_seconds: seconds.max(0.0),
    }
}

fn wait(seconds: f32) -> Step {
    Step::Wait {
        remaining_seconds: seconds.max(0.0),
    }
}
