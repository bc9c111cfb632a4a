use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use taskboard_core::SortKey;

use crate::state::ensure_taskboard_home;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteSection,
    #[serde(default)]
    pub board: BoardSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSection {
    /// Root of the REST API; resources live under it.
    pub base_url: String,
    #[serde(default = "default_tasks_path")]
    pub tasks_path: String,
    #[serde(default = "default_projects_path")]
    pub projects_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardSection {
    /// IANA timezone used to decide what "today" is for due dates.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Sort applied when the board opens (title-asc, title-desc, due-asc, due-desc).
    #[serde(default)]
    pub default_sort: Option<SortKey>,
}

fn default_tasks_path() -> String {
    "tasks".to_string()
}

fn default_projects_path() -> String {
    "projects".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            base_url: "https://68076032e81df7060eb9f118.mockapi.io/api/v1".to_string(),
            tasks_path: default_tasks_path(),
            projects_path: default_projects_path(),
        }
    }
}

impl Default for BoardSection {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            default_sort: None,
        }
    }
}

impl RemoteSection {
    pub fn tasks_url(&self) -> String {
        join_url(&self.base_url, &self.tasks_path)
    }

    pub fn projects_url(&self) -> String {
        join_url(&self.base_url, &self.projects_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_taskboard_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    let cfg = Config::default();
    save_config(&cfg)?;
    println!("Wrote {}", p.display());
    Ok(())
}
