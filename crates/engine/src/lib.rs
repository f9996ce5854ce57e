use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod atomic_io;

pub use app::{
    forward_to_yaw, run_headless, step_toward, yaw_to_forward, Collider, ColliderShape, Entity,
    EntityId, LayerMask, LoopConfig, LoopMetricsSnapshot, NavAgent, RayHit, RunSummary, Scene,
    SceneCommand, SceneRuntime, SceneWorld, Transform, Vec3,
};

pub const ROOT_ENV_VAR: &str = "INFIL_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub assets_dir: PathBuf,
    pub levels_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl AppPaths {
    /// Builds the standard layout under `root` without touching the file system.
    pub fn from_root(root: &Path) -> Self {
        let assets_dir = root.join("assets");
        let levels_dir = assets_dir.join("levels");
        let cache_dir = root.join("cache");
        Self {
            root: root.to_path_buf(),
            assets_dir,
            levels_dir,
            cache_dir,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create cache directory at {path}: {source}")]
    CreateCacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "INFIL_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/levels/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/levels/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/infiltration\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = match env::var(ROOT_ENV_VAR) {
        Ok(value) => root_from_env(Path::new(&value))?,
        Err(env::VarError::NotPresent) => root_from_exe()?,
        Err(source) => {
            return Err(StartupError::EnvVar {
                var: ROOT_ENV_VAR,
                source,
            })
        }
    };
    let paths = AppPaths::from_root(&root);

    fs::create_dir_all(&paths.cache_dir).map_err(|source| StartupError::CreateCacheDir {
        path: paths.cache_dir.clone(),
        source,
    })?;
    Ok(paths)
}

fn root_from_env(raw: &Path) -> Result<PathBuf, StartupError> {
    let root = normalize_path(raw);
    if is_project_root(&root) {
        Ok(root)
    } else {
        Err(StartupError::InvalidEnvRoot { path: root })
    }
}

fn root_from_exe() -> Result<PathBuf, StartupError> {
    let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
    let exe_dir = exe
        .parent()
        .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

    exe_dir
        .ancestors()
        .find(|candidate| is_project_root(candidate))
        .map(normalize_path)
        .ok_or_else(|| StartupError::RootNotFound {
            start_dir: normalize_path(exe_dir),
            env_var: ROOT_ENV_VAR,
        })
}

/// A project root holds `Cargo.toml` next to either the crate sources or the level assets.
fn is_project_root(path: &Path) -> bool {
    path.join("Cargo.toml").is_file()
        && (path.join("crates").is_dir() || path.join("assets").join("levels").is_dir())
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn project_root_needs_a_manifest() {
        let temp = TempDir::new().expect("temp");
        fs::create_dir_all(temp.path().join("assets").join("levels")).expect("mkdir");
        assert!(!is_project_root(temp.path()));

        fs::write(temp.path().join("Cargo.toml"), "[workspace]").expect("write");
        assert!(is_project_root(temp.path()));
    }

    #[test]
    fn bare_assets_dir_is_not_enough() {
        let temp = TempDir::new().expect("temp");
        fs::write(temp.path().join("Cargo.toml"), "[workspace]").expect("write");
        fs::create_dir_all(temp.path().join("assets")).expect("mkdir");
        assert!(!is_project_root(temp.path()));
    }

    #[test]
    fn env_root_must_look_like_a_project() {
        let temp = TempDir::new().expect("temp");
        assert!(matches!(
            root_from_env(temp.path()),
            Err(StartupError::InvalidEnvRoot { .. })
        ));

        fs::write(temp.path().join("Cargo.toml"), "[workspace]").expect("write");
        fs::create_dir_all(temp.path().join("crates")).expect("mkdir");
        let root = root_from_env(temp.path()).expect("valid root");
        assert!(root.join("Cargo.toml").is_file());
    }

    #[test]
    fn app_paths_layout_is_rooted() {
        let paths = AppPaths::from_root(Path::new("/srv/infil"));
        assert_eq!(paths.levels_dir, Path::new("/srv/infil/assets/levels"));
        assert_eq!(paths.cache_dir, Path::new("/srv/infil/cache"));
    }
}
