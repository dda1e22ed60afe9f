//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use pf_core::{DEFAULT_POMODORO_MINUTES, InterpretOptions, MAX_INCLUDE_DEPTH};
use serde::{Deserialize, Serialize};

use crate::commands::report::ExportKind;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Minutes per pomodoro when a file sets no usable `POMO`.
    pub default_pomodoro_minutes: u32,
    /// How deeply `#include` directives may nest.
    pub max_include_depth: usize,
    /// Report format used when `--export` is not given.
    pub default_export: Option<ExportKind>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_pomodoro_minutes: DEFAULT_POMODORO_MINUTES,
            max_include_depth: MAX_INCLUDE_DEPTH,
            default_export: None,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: built-in defaults, the user config file, the file
    /// passed with `--config`, then `POMOINTER_*` environment variables.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("POMOINTER_"));

        figment.extract()
    }

    /// Interpreter options derived from this configuration.
    pub fn interpret_options(&self) -> InterpretOptions {
        InterpretOptions {
            default_duration: self.default_pomodoro_minutes,
            max_include_depth: self.max_include_depth,
        }
    }
}

/// Returns the platform-specific config directory for pomointer.
///
/// On Linux: `~/.config/pomointer`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("pomointer"))
}
