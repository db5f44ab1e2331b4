use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    /// Reads the terminal background hint, e.g. `15;0` or `0;default;15`.
    ///
    /// The last field is the background colour index: 7 and 9-15 are light
    /// backgrounds, everything else numeric is dark.
    pub fn from_colorfgbg(value: &str) -> Option<Self> {
        let background: u8 = value.rsplit(';').next()?.trim().parse().ok()?;
        match background {
            7 | 9..=15 => Some(Theme::Light),
            0..=6 | 8 => Some(Theme::Dark),
            _ => None,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => bail!("unknown theme '{}', expected dark or light", other),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    theme: Option<Theme>,
    // keys written by other versions survive a save
    #[serde(flatten)]
    other: toml::Table,
}

/// The `preferences.toml` file next to the user's config.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The saved theme, if one was ever written.
    pub fn saved_theme(&self) -> Result<Option<Theme>> {
        Ok(self.read()?.theme)
    }

    /// Saved theme, else the terminal hint from `COLORFGBG`, else dark.
    pub fn theme(&self) -> Result<Theme> {
        let hint = std::env::var("COLORFGBG").ok();
        self.theme_with_hint(hint.as_deref())
    }

    pub fn theme_with_hint(&self, hint: Option<&str>) -> Result<Theme> {
        if let Some(theme) = self.saved_theme()? {
            return Ok(theme);
        }
        Ok(hint.and_then(Theme::from_colorfgbg).unwrap_or_default())
    }

    pub fn save_theme(&self, theme: Theme) -> Result<()> {
        let mut prefs = self.read()?;
        prefs.theme = Some(theme);
        self.write(&prefs)
    }

    /// Flips the current theme and persists the result.
    pub fn toggle_theme(&self) -> Result<Theme> {
        let next = self.theme()?.toggled();
        self.save_theme(next)?;
        Ok(next)
    }

    fn read(&self) -> Result<Preferences> {
        if !self.path.exists() {
            return Ok(Preferences::default());
        }
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        toml::from_str(&text).with_context(|| format!("failed to parse {}", self.path.display()))
    }

    fn write(&self, prefs: &Preferences) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(prefs)?;
        std::fs::write(&self.path, text)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}
