use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::gameplay::ScanTimings;

pub const TUNING_FILE: &str = "tuning.json";

#[derive(Debug, Error)]
pub enum TuningError {
    #[error("failed to read tuning '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("parse tuning '{path}'{at}: {message}")]
    Parse {
        path: PathBuf,
        at: String,
        message: String,
    },
    #[error("tuning '{path}' validation failed at {field}: {message}")]
    Invalid {
        path: PathBuf,
        field: &'static str,
        message: String,
    },
}

/// Gameplay numbers. Every field is optional in the file; missing ones keep the default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GameplayTuning {
    pub stealth_threshold: f32,
    pub detection_gain_per_second: f32,
    pub detection_decay_per_second: f32,
    pub indicator_slots: usize,
    pub min_stealth_percent: f32,
    pub idle_duration_seconds: f32,
    pub turn_rate_degrees: f32,
    pub short_sweep_seconds: f32,
    pub long_sweep_seconds: f32,
    pub search_pause_seconds: f32,
    pub search_final_pause_seconds: f32,
    pub idle_pause_seconds: f32,
    pub marker_radius: f32,
    pub waypoint_radius: f32,
    pub agent_speed: f32,
    pub player_speed: f32,
    pub eye_height: f32,
    pub fov_degrees: f32,
    pub view_range: f32,
    pub white_dot_height_offset: f32,
}

impl Default for GameplayTuning {
    fn default() -> Self {
        let scan = ScanTimings::default();
        Self {
            stealth_threshold: 100.0,
            detection_gain_per_second: 40.0,
            detection_decay_per_second: 10.0,
            indicator_slots: 4,
            min_stealth_percent: 0.1,
            idle_duration_seconds: 1.0,
            turn_rate_degrees: scan.turn_rate_degrees,
            short_sweep_seconds: scan.short_sweep_seconds,
            long_sweep_seconds: scan.long_sweep_seconds,
            search_pause_seconds: scan.search_pause_seconds,
            search_final_pause_seconds: scan.search_final_pause_seconds,
            idle_pause_seconds: scan.idle_pause_seconds,
            marker_radius: 0.5,
            waypoint_radius: 0.5,
            agent_speed: 3.5,
            player_speed: 3.0,
            eye_height: 1.0,
            fov_degrees: 90.0,
            view_range: 12.0,
            white_dot_height_offset: 0.5,
        }
    }
}

impl GameplayTuning {
    pub fn scan_timings(&self) -> ScanTimings {
        ScanTimings {
            turn_rate_degrees: self.turn_rate_degrees,
            short_sweep_seconds: self.short_sweep_seconds,
            long_sweep_seconds: self.long_sweep_seconds,
            search_pause_seconds: self.search_pause_seconds,
            search_final_pause_seconds: self.search_final_pause_seconds,
            idle_pause_seconds: self.idle_pause_seconds,
        }
    }

    fn validate(&self, path: &Path) -> Result<(), TuningError> {
        let invalid = |field: &'static str, expected: &str, actual: &dyn Display| {
            Err(TuningError::Invalid {
                path: path.to_path_buf(),
                field,
                message: format!("expected {expected}, got {actual}"),
            })
        };

        if !(self.stealth_threshold.is_finite() && self.stealth_threshold > 0.0) {
            return invalid("stealth_threshold", "positive number", &self.stealth_threshold);
        }
        if self.indicator_slots == 0 {
            return invalid("indicator_slots", "at least 1", &self.indicator_slots);
        }
        if !(0.0..=1.0).contains(&self.min_stealth_percent) {
            return invalid(
                "min_stealth_percent",
                "value in 0..=1",
                &self.min_stealth_percent,
            );
        }

        let non_negative = [
            ("detection_gain_per_second", self.detection_gain_per_second),
            ("detection_decay_per_second", self.detection_decay_per_second),
            ("idle_duration_seconds", self.idle_duration_seconds),
            ("short_sweep_seconds", self.short_sweep_seconds),
            ("long_sweep_seconds", self.long_sweep_seconds),
            ("search_pause_seconds", self.search_pause_seconds),
            ("search_final_pause_seconds", self.search_final_pause_seconds),
            ("idle_pause_seconds", self.idle_pause_seconds),
            ("marker_radius", self.marker_radius),
            ("waypoint_radius", self.waypoint_radius),
            ("agent_speed", self.agent_speed),
            ("player_speed", self.player_speed),
            ("view_range", self.view_range),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return invalid(field, "finite non-negative number", &value);
            }
        }
        if !(self.fov_degrees > 0.0 && self.fov_degrees <= 360.0) {
            return invalid("fov_degrees", "value in (0, 360]", &self.fov_degrees);
        }
        Ok(())
    }
}

/// Reads `path` if it exists; a missing file yields the defaults.
pub fn load_tuning(path: &Path) -> Result<GameplayTuning, TuningError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "tuning_defaults_used");
            return Ok(GameplayTuning::default());
        }
        Err(source) => {
            return Err(TuningError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let tuning = parse_tuning(path, &raw)?;
    info!(path = %path.display(), "tuning_loaded");
    Ok(tuning)
}

pub fn parse_tuning(path: &Path, raw: &str) -> Result<GameplayTuning, TuningError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let tuning: GameplayTuning = serde_path_to_error::deserialize(&mut deserializer).map_err(
        |error| {
            let at = error.path().to_string();
            TuningError::Parse {
                path: path.to_path_buf(),
                at: if at.is_empty() || at == "." {
                    String::new()
                } else {
                    format!(" at {at}")
                },
                message: error.into_inner().to_string(),
            }
        },
    )?;
    tuning.validate(path)?;
    Ok(tuning)
}
