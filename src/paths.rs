//! XDG Base Directory compliant path resolution.
//!
//! The config directory is resolved through a three-level fallback:
//! 1. `SCOPEBOX_CONFIG_DIR`
//! 2. `XDG_CONFIG_HOME` via `etcetera`
//! 3. Platform default (`~/.config`)
//!
//! All paths are absolute. Relative paths from env vars are ignored per the XDG Base Directory rules.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "scopebox";
const CONFIG_FILE: &str = "config.toml";

/// Resolved locations, threaded through `Config`.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Config directory: config.toml lives here
    pub config_dir: PathBuf,

    config_file: PathBuf,
}

impl Paths {
    /// Resolve all paths using real environment variables.
    pub fn resolve() -> Result<Self> {
        Self::resolve_with_env(|key| std::env::var(key))
    }

    /// Resolve paths with a custom env var lookup (for testing).
    pub fn resolve_with_env<F>(env_fn: F) -> Result<Self>
    where
        F: Fn(&str) -> std::result::Result<String, std::env::VarError>,
    {
        use etcetera::BaseStrategy;

        let strategy = etcetera::choose_base_strategy()
            .map_err(|e| anyhow::anyhow!("Failed to determine base directories: {}", e))?;

        let config_dir = env_or(&env_fn, "SCOPEBOX_CONFIG_DIR", || {
            strategy.config_dir().join(APP_DIR)
        });

        Ok(Self::in_dir(config_dir))
    }

    /// Paths rooted at an explicit config file, as given by `--config`.
    ///
    /// A leading `~` is expanded.
    pub fn for_config_file(path: &str) -> Self {
        let expanded = shellexpand::tilde(path);
        let config_file = PathBuf::from(expanded.to_string());
        let config_dir = config_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            config_dir,
            config_file,
        }
    }

    fn in_dir(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join(CONFIG_FILE);
        Self {
            config_dir,
            config_file,
        }
    }

    /// Config file: config_dir/config.toml unless given explicitly
    pub fn config_file(&self) -> PathBuf {
        self.config_file.clone()
    }

    /// Create the config directory with mode 0700.
    pub fn ensure_dirs(&self) -> Result<()> {
        create_dir_with_mode(&self.config_dir)
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::resolve().unwrap_or_else(|_| {
            let home = etcetera::home_dir().unwrap_or_else(|_| PathBuf::from("."));
            Self::in_dir(home.join(".config").join(APP_DIR))
        })
    }
}

/// Resolve an env var with fallback. Ignores empty and relative paths per the XDG Base Directory rules.
fn env_or<F>(env_fn: &F, var: &str, default: impl FnOnce() -> PathBuf) -> PathBuf
where
    F: Fn(&str) -> std::result::Result<String, std::env::VarError>,
{
    env_fn(var)
        .ok()
        .filter(|v| !v.is_empty())
        .map(|v| PathBuf::from(shellexpand::tilde(&v).to_string()))
        .filter(|p| p.is_absolute())
        .unwrap_or_else(default)
}

fn create_dir_with_mode(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}
