//! Task cache backed by one JSON file (the whole list, rewritten on every change).

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use taskboard_core::{Task, TaskCache};

use crate::state::tasks_cache_path;

#[derive(Debug, Clone)]
pub struct JsonFileCache {
    path: PathBuf,
}

impl JsonFileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<home>/tasks.json`
    pub fn at_home() -> Result<Self> {
        Ok(Self::new(tasks_cache_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_load(&self) -> Result<Option<Vec<Task>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let s = fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        let tasks = serde_json::from_str(&s)
            .with_context(|| format!("parse {}", self.path.display()))?;
        Ok(Some(tasks))
    }

    fn try_save(&self, tasks: &[Task]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(tasks).context("serialize tasks")?;

        // write-then-rename so a crash never leaves half a file behind
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("rename {} -> {}", tmp.display(), self.path.display()))?;
        Ok(())
    }
}

impl TaskCache for JsonFileCache {
    fn load(&self) -> Option<Vec<Task>> {
        match self.try_load() {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::warn!("Error loading tasks from local cache: {e:#}");
                None
            }
        }
    }

    fn save(&self, tasks: &[Task]) {
        if let Err(e) = self.try_save(tasks) {
            tracing::warn!("Error saving tasks to local cache: {e:#}");
        }
    }
}
