use std::process::ExitCode;

use engine::run_headless;
use tracing::info;

use super::bootstrap::AppWiring;

pub fn run(app: AppWiring) -> ExitCode {
    let summary = run_headless(app.config, app.scene);
    info!(
        ticks_run = summary.ticks_run,
        restarts = summary.restarts,
        quit_requested = summary.quit_requested,
        dropped_backlog_ms = summary.dropped_backlog.as_secs_f64() * 1000.0,
        "run_finished"
    );

    ExitCode::SUCCESS
}
