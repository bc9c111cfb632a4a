use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// `$TASKBOARD_HOME`, or `~/.taskboard`.
pub fn taskboard_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TASKBOARD_HOME") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".taskboard"))
}

pub fn ensure_taskboard_home() -> Result<PathBuf> {
    let dir = taskboard_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn tasks_cache_path() -> Result<PathBuf> {
    Ok(taskboard_home()?.join("tasks.json"))
}

pub fn preferences_path() -> Result<PathBuf> {
    Ok(ensure_taskboard_home()?.join("preferences.json"))
}

pub fn log_path() -> Result<PathBuf> {
    Ok(ensure_taskboard_home()?.join("taskboard.log"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        })
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => anyhow::bail!("unknown theme '{other}' (expected light or dark)"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Preferences {
    #[serde(default)]
    pub theme: Theme,
}

pub fn write_preferences(prefs: &Preferences) -> Result<()> {
    write_preferences_to(&preferences_path()?, prefs)
}

pub fn read_preferences() -> Result<Preferences> {
    Ok(read_preferences_from(&preferences_path()?))
}

pub fn write_preferences_to(path: &Path, prefs: &Preferences) -> Result<()> {
    let json = serde_json::to_string_pretty(prefs)?;
    fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Missing or unreadable preferences fall back to defaults.
pub fn read_preferences_from(path: &Path) -> Preferences {
    let Ok(s) = fs::read_to_string(path) else {
        return Preferences::default();
    };
    serde_json::from_str(&s).unwrap_or_else(|e| {
        tracing::warn!("ignoring unreadable {}: {e}", path.display());
        Preferences::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferences_round_trip_and_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("preferences.json");

        assert_eq!(read_preferences_from(&p).theme, Theme::Light);

        write_preferences_to(&p, &Preferences { theme: Theme::Dark }).unwrap();
        assert_eq!(read_preferences_from(&p).theme, Theme::Dark);
        assert!(fs::read_to_string(&p).unwrap().contains("\"dark\""));

        fs::write(&p, "not json").unwrap();
        assert_eq!(read_preferences_from(&p).theme, Theme::Light);
    }

    #[test]
    fn theme_parses_and_toggles() {
        assert_eq!("Dark".parse::<Theme>().unwrap(), Theme::Dark);
        assert!("blue".parse::<Theme>().is_err());
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
    }
}
