//! Layered settings: command-line flag > environment > YAML config file > default.
//!
//! The config file lives at `$IECS_CONFIG` or `~/.config/iecs/config.yml`.
//! A missing file is fine; a malformed one is a pre-flight error naming the path.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::Deserialize;

use crate::color::{parse_color_mode, ColorMode};
use crate::errors::IecsError;
use crate::theme::{ThemeName, DEFAULT_THEME};

pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// How the selection pipeline asks its questions.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormStyle {
    /// One prompt per stage, each stage describing its pick before the next lists.
    #[default]
    Steps,
    /// One cascading form whose later fields refill from earlier answers.
    Cascade,
}

impl FormStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormStyle::Steps => "steps",
            FormStyle::Cascade => "cascade",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "steps" => Some(FormStyle::Steps),
            "cascade" => Some(FormStyle::Cascade),
            _ => None,
        }
    }
}

/// Values given on the command line; `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub theme: Option<String>,
    pub color: Option<ColorMode>,
    pub form: Option<FormStyle>,
    pub region: Option<String>,
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub theme: Option<String>,
    pub color: Option<ColorMode>,
    pub form: Option<FormStyle>,
    pub region: Option<String>,
    pub profile: Option<String>,
    pub session_manager_plugin: Option<PathBuf>,
    pub api_timeout: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub theme: ThemeName,
    pub color: ColorMode,
    pub form: FormStyle,
    pub region: Option<String>,
    pub profile: Option<String>,
    pub session_manager_plugin: Option<PathBuf>,
    pub api_timeout: Duration,
    /// The config file that was read, if any.
    pub config_path: Option<PathBuf>,
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(p) = std::env::var_os("IECS_CONFIG").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(p));
    }
    home::home_dir().map(|h| h.join(".config").join("iecs").join("config.yml"))
}

/// Read the YAML config at `path`. `Ok(None)` when the file does not exist.
pub fn read_config_file(path: &Path) -> Result<Option<FileConfig>, IecsError> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(IecsError::invalid(format!(
                "cannot read config file {}: {e}",
                path.display()
            )))
        }
    };
    if text.trim().is_empty() {
        return Ok(Some(FileConfig::default()));
    }
    serde_yaml::from_str(&text).map(Some).map_err(|e| {
        IecsError::invalid(format!("invalid config file {}: {e}", path.display()))
    })
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl Settings {
    /// Resolve from the process environment and the default config location.
    pub fn load(overrides: Overrides) -> Result<Self, IecsError> {
        let path = config_path();
        let file = match path.as_deref() {
            Some(p) => read_config_file(p)?,
            None => None,
        };
        let config_path = file.as_ref().and(path);
        let mut settings = Self::resolve(overrides, file, |k| std::env::var(k).ok())?;
        settings.config_path = config_path;
        Ok(settings)
    }

    /// Pure precedence merge; `env` looks up a variable by name.
    pub fn resolve<F>(
        overrides: Overrides,
        file: Option<FileConfig>,
        env: F,
    ) -> Result<Self, IecsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = file.unwrap_or_default();

        let theme_name = overrides
            .theme
            .or_else(|| non_empty(env("IECS_THEME")))
            .or(file.theme)
            .unwrap_or_else(|| DEFAULT_THEME.to_string());
        let theme = ThemeName::from_name(&theme_name)?;

        let color = match overrides.color {
            Some(c) => c,
            None => match non_empty(env("IECS_COLOR")) {
                Some(v) => parse_color_mode(&v).ok_or_else(|| {
                    IecsError::invalid(format!(
                        "invalid IECS_COLOR \"{v}\" expecting one of: auto always never"
                    ))
                })?,
                None => file.color.unwrap_or(ColorMode::Auto),
            },
        };

        let form = match overrides.form {
            Some(f) => f,
            None => match non_empty(env("IECS_FORM")) {
                Some(v) => FormStyle::parse(&v).ok_or_else(|| {
                    IecsError::invalid(format!(
                        "invalid IECS_FORM \"{v}\" expecting one of: steps cascade"
                    ))
                })?,
                None => file.form.unwrap_or_default(),
            },
        };

        let session_manager_plugin = non_empty(env("IECS_SESSION_MANAGER_PLUGIN"))
            .map(PathBuf::from)
            .or(file.session_manager_plugin);

        let api_timeout = match non_empty(env("IECS_API_TIMEOUT")).or(file.api_timeout) {
            Some(raw) => humantime::parse_duration(&raw).map_err(|e| {
                IecsError::invalid(format!("invalid api timeout \"{raw}\": {e}"))
            })?,
            None => DEFAULT_API_TIMEOUT,
        };

        Ok(Settings {
            theme,
            color,
            form,
            region: overrides.region.or(file.region),
            profile: overrides.profile.or(file.profile),
            session_manager_plugin,
            api_timeout,
            config_path: None,
        })
    }
}
