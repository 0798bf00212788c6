use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths::Paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Resolved XDG-compliant paths (not serialized)
    #[serde(skip)]
    pub paths: Paths,

    #[serde(default)]
    pub sandbox: SandboxConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Copy ambient bindings out of a disposable realm (default: true)
    #[serde(default = "default_true")]
    pub isolated_realm: bool,

    /// Freeze the isolated realm's shared prototypes (default: true)
    #[serde(default = "default_true")]
    pub harden_realm: bool,

    /// Put a Proxy in front of the restricted context (default: true)
    ///
    /// When false the context is a plain frozen stand-in; names absent from
    /// it fall through to the real global.
    #[serde(default = "default_true")]
    pub use_proxy: bool,

    /// Ambient names denied on top of the built-in list
    #[serde(default)]
    pub extra_excluded: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            isolated_realm: default_true(),
            harden_realm: default_true(),
            use_proxy: default_true(),
            extra_excluded: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load from the resolved config path, creating a commented template on
    /// first run.
    pub fn load() -> Result<Self> {
        let paths = Paths::resolve()?;
        paths.ensure_dirs()?;
        let path = paths.config_file();

        if !path.exists() {
            let config = Config {
                paths,
                ..Config::default()
            };
            config.save_with_template()?;
            return Ok(config);
        }

        let mut config = Self::read(&path)?;
        config.paths = paths;
        Ok(config)
    }

    /// Load from an explicit file. A missing file yields defaults.
    pub fn load_from(path: &str) -> Result<Self> {
        let paths = Paths::for_config_file(path);
        let file = paths.config_file();

        let mut config = if file.exists() {
            Self::read(&file)?
        } else {
            Config::default()
        };
        config.paths = paths;
        Ok(config)
    }

    /// `--config` when given, the XDG location otherwise.
    pub fn load_or_default_path(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load(),
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = self.paths.config_file();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;

        Ok(())
    }

    /// Save config with a helpful template (for first-time setup)
    pub fn save_with_template(&self) -> Result<()> {
        let path = self.paths.config_file();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
        eprintln!("Created default config at {}", path.display());

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let paths = Paths::resolve()?;
        Ok(paths.config_file())
    }

    pub fn get_value(&self, key: &str) -> Result<String> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["sandbox", "isolated_realm"] => Ok(self.sandbox.isolated_realm.to_string()),
            ["sandbox", "harden_realm"] => Ok(self.sandbox.harden_realm.to_string()),
            ["sandbox", "use_proxy"] => Ok(self.sandbox.use_proxy.to_string()),
            ["sandbox", "extra_excluded"] => Ok(self.sandbox.extra_excluded.join(",")),
            ["logging", "level"] => Ok(self.logging.level.clone()),
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["sandbox", "isolated_realm"] => self.sandbox.isolated_realm = value.parse()?,
            ["sandbox", "harden_realm"] => self.sandbox.harden_realm = value.parse()?,
            ["sandbox", "use_proxy"] => self.sandbox.use_proxy = value.parse()?,
            ["sandbox", "extra_excluded"] => {
                self.sandbox.extra_excluded = value
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(String::from)
                    .collect()
            }
            ["logging", "level"] => self.logging.level = value.to_string(),
            _ => anyhow::bail!("Unknown config key: {}", key),
        }

        Ok(())
    }
}

/// Default config template with helpful comments (used for first-time setup)
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# scopebox configuration
# Auto-created on first run. Edit as needed.

[sandbox]
# Copy ambient bindings out of a disposable realm instead of the host global.
isolated_realm = true
# Freeze every object reachable in the isolated realm, including prototypes
# only reachable through instances such as iterators and generators.
harden_realm = true
# Put a Proxy in front of the restricted context. Without it, names missing
# from the context fall through to the host global.
use_proxy = true
# Extra ambient names to deny, on top of the built-in list.
# extra_excluded = ["Intl", "WebAssembly"]
extra_excluded = []

[logging]
# error | warn | info | debug | trace (RUST_LOG overrides)
level = "info"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_to_defaults() {
        let config: Config = toml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.sandbox, SandboxConfig::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config: Config = toml::from_str("[sandbox]\nuse_proxy = false\n").unwrap();
        assert!(!config.sandbox.use_proxy);
        assert!(config.sandbox.isolated_realm);
        assert!(config.sandbox.extra_excluded.is_empty());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn get_and_set_by_dotted_key() {
        let mut config = Config::default();
        config.set_value("sandbox.harden_realm", "false").unwrap();
        config
            .set_value("sandbox.extra_excluded", "fetch, ,setTimeout")
            .unwrap();
        config.set_value("logging.level", "debug").unwrap();

        assert_eq!(config.get_value("sandbox.harden_realm").unwrap(), "false");
        assert_eq!(
            config.get_value("sandbox.extra_excluded").unwrap(),
            "fetch,setTimeout"
        );
        assert_eq!(config.get_value("logging.level").unwrap(), "debug");
    }

    #[test]
    fn unknown_keys_and_bad_values_rejected() {
        let mut config = Config::default();
        assert!(config.get_value("sandbox.nope").is_err());
        assert!(config.set_value("agent.model", "x").is_err());
        assert!(config.set_value("sandbox.use_proxy", "maybe").is_err());
    }

    #[test]
    fn save_and_load_round_trip_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.toml");

        let mut config = Config::load_from(file.to_str().unwrap()).unwrap();
        assert_eq!(config.paths.config_dir, dir.path());
        config.sandbox.use_proxy = false;
        config.sandbox.extra_excluded = vec!["fetch".to_string()];
        config.save().unwrap();

        let loaded = Config::load_from(file.to_str().unwrap()).unwrap();
        assert!(!loaded.sandbox.use_proxy);
        assert_eq!(loaded.sandbox.extra_excluded, vec!["fetch".to_string()]);
    }

    #[test]
    fn invalid_file_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.toml");
        fs::write(&file, "[sandbox\n").unwrap();

        let err = Config::load_from(file.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }
}
