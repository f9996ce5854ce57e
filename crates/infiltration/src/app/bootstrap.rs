use std::env;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use engine::{resolve_app_paths, LoopConfig, Scene, StartupError};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::content::{compile_level, LevelError};
use crate::gameplay::{AssemblyError, StealthScene};
use crate::persistence::{JsonMemoryStore, MemoryStoreError, MEMORY_STORE_FILE};
use crate::tuning::{load_tuning, TuningError, TUNING_FILE};

pub const LEVEL_ENV_VAR: &str = "INFIL_LEVEL";
pub const MAX_TICKS_ENV_VAR: &str = "INFIL_MAX_TICKS";
pub const REALTIME_ENV_VAR: &str = "INFIL_REALTIME";
pub const SEED_ENV_VAR: &str = "INFIL_SEED";

const DEFAULT_LEVEL: &str = "demo.xml";
/// One minute of simulation at the default tick rate.
const DEFAULT_MAX_TICKS: u64 = 3_600;
const DEFAULT_SEED: u64 = 0x5EED;
const SAVES_DIR: &str = "saves";

pub struct AppWiring {
    pub config: LoopConfig,
    pub scene: Box<dyn Scene>,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Tuning(#[from] TuningError),
    #[error(transparent)]
    Level(#[from] LevelError),
    #[error(transparent)]
    MemoryStore(#[from] MemoryStoreError),
    #[error("level assembly failed: {0}")]
    Assembly(#[from] AssemblyError),
    #[error("invalid value for {var}: '{value}' ({reason})")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },
}

pub fn build_app() -> Result<AppWiring, AppError> {
    init_tracing();
    info!("=== Infiltration Startup ===");

    let paths = resolve_app_paths()?;
    let tuning = load_tuning(&paths.assets_dir.join(TUNING_FILE))?;

    let level_path = level_path(
        &paths.levels_dir,
        read_env(LEVEL_ENV_VAR)?.as_deref().unwrap_or(DEFAULT_LEVEL),
    );
    let compiled = compile_level(&level_path)?;
    let store = JsonMemoryStore::open(
        paths.cache_dir.join(SAVES_DIR).join(MEMORY_STORE_FILE),
        compiled.fingerprint.clone(),
    )?;

    let seed = parse_var(SEED_ENV_VAR, read_env(SEED_ENV_VAR)?, DEFAULT_SEED)?;
    let max_ticks = parse_var(
        MAX_TICKS_ENV_VAR,
        read_env(MAX_TICKS_ENV_VAR)?,
        DEFAULT_MAX_TICKS,
    )?;
    let realtime = parse_flag(REALTIME_ENV_VAR, read_env(REALTIME_ENV_VAR)?)?;

    info!(
        root = %paths.root.display(),
        level = %level_path.display(),
        fingerprint = %compiled.fingerprint,
        seed,
        "app_wired"
    );

    let scene = StealthScene::new(compiled.level, tuning, store, seed)?;
    Ok(AppWiring {
        config: LoopConfig {
            max_ticks: (max_ticks > 0).then_some(max_ticks),
            realtime,
            ..LoopConfig::default()
        },
        scene: Box::new(scene),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

/// Bare file names resolve inside the levels directory; absolute paths pass through.
fn level_path(levels_dir: &Path, raw: &str) -> PathBuf {
    levels_dir.join(raw.trim())
}

fn read_env(var: &'static str) -> Result<Option<String>, AppError> {
    match env::var(var) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(raw)) => Err(AppError::InvalidEnv {
            var,
            value: raw.to_string_lossy().into_owned(),
            reason: "not valid unicode".to_string(),
        }),
    }
}

fn parse_var<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
        return Ok(default);
    };
    raw.trim().parse().map_err(|error: T::Err| AppError::InvalidEnv {
        var,
        reason: error.to_string(),
        value: raw,
    })
}

fn parse_flag(var: &'static str, raw: Option<String>) -> Result<bool, AppError> {
    let Some(raw) = raw else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        _ => Err(AppError::InvalidEnv {
            var,
            value: raw,
            reason: "expected a boolean flag".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_vars_fall_back_to_defaults() {
        assert_eq!(parse_var(SEED_ENV_VAR, None, 9u64).expect("default"), 9);
        assert_eq!(
            parse_var(SEED_ENV_VAR, Some("  ".to_string()), 9u64).expect("blank"),
            9
        );
        assert!(!parse_flag(REALTIME_ENV_VAR, None).expect("default flag"));
    }

    #[test]
    fn numeric_vars_parse_and_report_bad_values() {
        assert_eq!(
            parse_var(MAX_TICKS_ENV_VAR, Some(" 120 ".to_string()), 0u64).expect("parse"),
            120
        );

        let error = parse_var(MAX_TICKS_ENV_VAR, Some("lots".to_string()), 0u64)
            .expect_err("non-numeric");
        let message = error.to_string();
        assert!(message.contains(MAX_TICKS_ENV_VAR));
        assert!(message.contains("'lots'"));
    }

    #[test]
    fn flags_accept_common_spellings() {
        for raw in ["1", "true", "YES", "on"] {
            assert!(parse_flag(REALTIME_ENV_VAR, Some(raw.to_string())).expect("truthy"));
        }
        for raw in ["0", "false", "No", "off", ""] {
            assert!(!parse_flag(REALTIME_ENV_VAR, Some(raw.to_string())).expect("falsy"));
        }
        assert!(matches!(
            parse_flag(REALTIME_ENV_VAR, Some("maybe".to_string())),
            Err(AppError::InvalidEnv { var: REALTIME_ENV_VAR, .. })
        ));
    }

    #[test]
    fn level_names_resolve_under_the_levels_dir() {
        let levels = Path::new("/game/assets/levels");
        assert_eq!(
            level_path(levels, "demo.xml"),
            PathBuf::from("/game/assets/levels/demo.xml")
        );
        assert_eq!(
            level_path(levels, "/tmp/custom.xml"),
            PathBuf::from("/tmp/custom.xml")
        );
    }
}
