//! Task model shared by the board engine, the cache and the REST client.
//!
//! The JSON shape matches the remote task resource:
//! `{ id, title, description?, tags, status, dueDate? }`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Column a task lives in.
///
/// `"todo"` is the canonical literal. Older records spelled it `"toDo"`,
/// which is still accepted on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "todo", alias = "toDo", alias = "TODO")]
    Todo,
    #[serde(rename = "inprogress", alias = "inProgress", alias = "in-progress")]
    InProgress,
    #[serde(rename = "done")]
    Done,
}

impl TaskStatus {
    /// Column order.
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "inprogress",
            TaskStatus::Done => "done",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Todo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
        }
    }

    pub fn column(self) -> usize {
        match self {
            TaskStatus::Todo => 0,
            TaskStatus::InProgress => 1,
            TaskStatus::Done => 2,
        }
    }

    /// Neighbouring column, clamped at the board edges.
    pub fn shifted(self, direction: isize) -> TaskStatus {
        let idx = (self.column() as isize + direction).clamp(0, 2) as usize;
        TaskStatus::ALL[idx]
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown status '{0}' (expected todo, inprogress or done)")]
pub struct StatusParseError(pub String);

impl FromStr for TaskStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "todo" | "to-do" | "to do" => Ok(TaskStatus::Todo),
            "inprogress" | "in-progress" | "in progress" | "doing" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            _ => Err(StatusParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(deserialize_with = "lenient_status")]
    pub status: TaskStatus,

    #[serde(default, with = "due_date", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            tags: Vec::new(),
            status: TaskStatus::Todo,
            due_date: None,
        }
    }

    /// Materialize a draft under a given id (used for the offline fallback).
    pub fn from_draft(id: impl Into<String>, draft: &TaskDraft) -> Self {
        Self {
            id: id.into(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            tags: draft.tags.clone(),
            status: draft.status,
            due_date: draft.due_date,
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_due_date(mut self, due: NaiveDate) -> Self {
        self.due_date = Some(due);
        self
    }

    /// Overwrite every field the patch carries. The id never changes.
    pub fn apply_patch(&mut self, patch: &TaskPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(tags) = &patch.tags {
            self.tags = tags.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(due) = patch.due_date {
            self.due_date = due;
        }
    }

    pub fn is_temporary(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }
}

/// Prefix of ids synthesized locally when the server could not assign one.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Create payload. The server answers with the stored task and its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    pub status: TaskStatus,

    #[serde(default, with = "due_date", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            tags: Vec::new(),
            status: TaskStatus::Todo,
            due_date: None,
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let d = description.into();
        self.description = if d.trim().is_empty() { None } else { Some(d) };
        self
    }

    /// Tags from a comma-separated input line.
    pub fn with_tags_input(mut self, input: &str) -> Self {
        self.tags = parse_tags(input);
        self
    }

    pub fn with_due_date(mut self, due: Option<NaiveDate>) -> Self {
        self.due_date = due;
        self
    }

    /// A draft with a blank title is never sent anywhere.
    pub fn is_submittable(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

/// Partial update. `None` leaves a field untouched; for `description` and
/// `due_date`, `Some(None)` clears it (serialized as `null`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,

    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "due_date::serialize_patch")]
    pub due_date: Option<Option<NaiveDate>>,
}

impl TaskPatch {
    pub fn status_only(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Patch that replaces every field of `task` (the edit-form "save").
    pub fn replace_with(task: &Task) -> Self {
        Self {
            title: Some(task.title.clone()),
            description: Some(task.description.clone()),
            tags: Some(task.tags.clone()),
            status: Some(task.status),
            due_date: Some(task.due_date),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.tags.is_none()
            && self.status.is_none()
            && self.due_date.is_none()
    }
}

/// Split a comma-separated tag line: trim each entry, drop empties, keep order.
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Server status strings, read with the same leniency as user input.
/// Anything unrecognised lands in To Do rather than failing the whole list.
fn lenient_status<'de, D: serde::Deserializer<'de>>(d: D) -> Result<TaskStatus, D::Error> {
    let raw = String::deserialize(d)?;
    Ok(raw.parse().unwrap_or_else(|e: StatusParseError| {
        tracing::warn!("{e}; treating as todo");
        TaskStatus::Todo
    }))
}

/// ISO calendar dates. The web form posts `""` for "no date", so an empty
/// string reads back as `None`.
mod due_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_str(&d.format(FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn serialize_patch<S: Serializer>(
        value: &Option<Option<NaiveDate>>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(inner) => serialize(inner, s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => {
                // Some backends hand back full timestamps; the date part is what counts.
                let date_part = s.get(..10).unwrap_or(s);
                match NaiveDate::parse_from_str(date_part, FORMAT) {
                    Ok(d) => Ok(Some(d)),
                    Err(e) => {
                        // one bad record must not sink the whole list
                        tracing::warn!(due_date = s, "ignoring unreadable due date: {e}");
                        Ok(None)
                    }
                }
            }
        }
    }
}
