//! Derived board view: filter -> sort -> group into the three status columns.
//!
//! Everything here is pure. The board recomputes the view from the
//! canonical list on every change instead of keeping per-column lists.

use crate::task::{Task, TaskStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    TitleAsc,
    TitleDesc,
    DueAsc,
    DueDesc,
}

impl SortKey {
    pub fn label(self) -> &'static str {
        match self {
            SortKey::TitleAsc => "title a-z",
            SortKey::TitleDesc => "title z-a",
            SortKey::DueAsc => "due soonest",
            SortKey::DueDesc => "due latest",
        }
    }

    /// Cycle used by the board's sort key: none -> title asc -> ... -> none.
    pub fn next(current: Option<SortKey>) -> Option<SortKey> {
        match current {
            None => Some(SortKey::TitleAsc),
            Some(SortKey::TitleAsc) => Some(SortKey::TitleDesc),
            Some(SortKey::TitleDesc) => Some(SortKey::DueAsc),
            Some(SortKey::DueAsc) => Some(SortKey::DueDesc),
            Some(SortKey::DueDesc) => None,
        }
    }

    fn compare(self, a: &Task, b: &Task) -> Ordering {
        match self {
            SortKey::TitleAsc => compare_titles(&a.title, &b.title),
            SortKey::TitleDesc => compare_titles(&b.title, &a.title),
            // Undated tasks go last in both directions.
            SortKey::DueAsc => due_or(a, NaiveDate::MAX).cmp(&due_or(b, NaiveDate::MAX)),
            SortKey::DueDesc => due_or(b, NaiveDate::MIN).cmp(&due_or(a, NaiveDate::MIN)),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SortKey::TitleAsc => "title-asc",
            SortKey::TitleDesc => "title-desc",
            SortKey::DueAsc => "due-asc",
            SortKey::DueDesc => "due-desc",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sort '{0}' (expected title-asc, title-desc, due-asc, due-desc)")]
pub struct SortParseError(pub String);

impl FromStr for SortKey {
    type Err = SortParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "title-asc" | "title" => Ok(SortKey::TitleAsc),
            "title-desc" => Ok(SortKey::TitleDesc),
            "due-asc" | "due" => Ok(SortKey::DueAsc),
            "due-desc" => Ok(SortKey::DueDesc),
            _ => Err(SortParseError(s.to_string())),
        }
    }
}

fn due_or(t: &Task, fallback: NaiveDate) -> NaiveDate {
    t.due_date.unwrap_or(fallback)
}

/// Case-folded comparison, raw string as tie-break so the order is total.
fn compare_titles(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Active filter/search/sort selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewCriteria {
    pub status: Option<TaskStatus>,
    pub search: Option<String>,
    pub tag: Option<String>,
    pub sort: Option<SortKey>,
}

impl ViewCriteria {
    pub fn is_filtered(&self) -> bool {
        self.status.is_some() || active(&self.search).is_some() || active(&self.tag).is_some()
    }

    /// True when `task` passes every active predicate.
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }

        if let Some(tag) = active(&self.tag) {
            let needle = tag.to_lowercase();
            if !task.tags.iter().any(|t| t.to_lowercase().contains(&needle)) {
                return false;
            }
        }

        if let Some(search) = active(&self.search) {
            let needle = search.to_lowercase();
            let hit = task.title.to_lowercase().contains(&needle)
                || task
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
                || task.tags.iter().any(|t| t.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        true
    }
}

fn active(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// One column per status, each in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buckets {
    pub todo: Vec<Task>,
    pub in_progress: Vec<Task>,
    pub done: Vec<Task>,
}

impl Buckets {
    pub fn get(&self, status: TaskStatus) -> &[Task] {
        match status {
            TaskStatus::Todo => &self.todo,
            TaskStatus::InProgress => &self.in_progress,
            TaskStatus::Done => &self.done,
        }
    }

    fn get_mut(&mut self, status: TaskStatus) -> &mut Vec<Task> {
        match status {
            TaskStatus::Todo => &mut self.todo,
            TaskStatus::InProgress => &mut self.in_progress,
            TaskStatus::Done => &mut self.done,
        }
    }

    pub fn len(&self) -> usize {
        self.todo.len() + self.in_progress.len() + self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Filtered and sorted tasks, before grouping.
pub fn filter_and_sort(tasks: &[Task], criteria: &ViewCriteria) -> Vec<Task> {
    let mut out: Vec<Task> = tasks.iter().filter(|t| criteria.matches(t)).cloned().collect();
    if let Some(key) = criteria.sort {
        // stable: equal keys keep canonical order
        out.sort_by(|a, b| key.compare(a, b));
    }
    out
}

pub fn derive_view(tasks: &[Task], criteria: &ViewCriteria) -> Buckets {
    let mut buckets = Buckets::default();
    for task in filter_and_sort(tasks, criteria) {
        buckets.get_mut(task.status).push(task);
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> Vec<Task> {
        vec![
            Task::new("1", "write docs").with_tags(["Docs", "q3"]),
            Task::new("2", "Fix login")
                .with_status(TaskStatus::Done)
                .with_description("OAuth redirect loop")
                .with_due_date(date(2025, 3, 1)),
            Task::new("3", "add metrics")
                .with_status(TaskStatus::InProgress)
                .with_due_date(date(2025, 1, 15)),
        ]
    }

    #[test]
    fn status_filter_keeps_only_that_column() {
        let tasks = vec![
            Task::new("1", "a"),
            Task::new("2", "b").with_status(TaskStatus::Done),
        ];
        let crit = ViewCriteria {
            status: Some(TaskStatus::Done),
            ..ViewCriteria::default()
        };
        let view = derive_view(&tasks, &crit);
        assert!(view.todo.is_empty());
        assert!(view.in_progress.is_empty());
        assert_eq!(view.done.len(), 1);
        assert_eq!(view.done[0].id, "2");
    }

    #[test]
    fn search_hits_title_description_and_tags() {
        let tasks = sample();
        let by = |q: &str| {
            let crit = ViewCriteria {
                search: Some(q.to_string()),
                ..ViewCriteria::default()
            };
            let mut ids: Vec<String> = filter_and_sort(&tasks, &crit).into_iter().map(|t| t.id).collect();
            ids.sort();
            ids
        };
        assert_eq!(by("oauth"), vec!["2"]);
        assert_eq!(by("DOCS"), vec!["1"]);
        assert_eq!(by("q3"), vec!["1"]);
        assert!(by("nothing").is_empty());
        // blank search is inactive
        assert_eq!(by("  ").len(), 3);
    }

    #[test]
    fn tag_filter_is_substring_and_case_insensitive() {
        let crit = ViewCriteria {
            tag: Some("doc".to_string()),
            ..ViewCriteria::default()
        };
        let out = filter_and_sort(&sample(), &crit);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "1");
    }

    #[test]
    fn title_sort_folds_case() {
        let crit = ViewCriteria {
            sort: Some(SortKey::TitleAsc),
            ..ViewCriteria::default()
        };
        let titles: Vec<String> = filter_and_sort(&sample(), &crit)
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["add metrics", "Fix login", "write docs"]);
    }

    #[test]
    fn undated_tasks_sort_last_both_ways() {
        let tasks = sample();
        for key in [SortKey::DueAsc, SortKey::DueDesc] {
            let crit = ViewCriteria {
                sort: Some(key),
                ..ViewCriteria::default()
            };
            let out = filter_and_sort(&tasks, &crit);
            assert_eq!(out.last().unwrap().id, "1", "{key}");
        }

        let asc = filter_and_sort(
            &tasks,
            &ViewCriteria {
                sort: Some(SortKey::DueAsc),
                ..ViewCriteria::default()
            },
        );
        assert_eq!(asc[0].id, "3");
    }

    #[test]
    fn sort_cycle_wraps_to_none() {
        let mut k = None;
        for _ in 0..5 {
            k = SortKey::next(k);
        }
        assert_eq!(k, None);
    }

    #[test]
    fn sort_key_parses_user_text() {
        assert_eq!("Due-Desc".parse::<SortKey>(), Ok(SortKey::DueDesc));
        assert_eq!("title".parse::<SortKey>(), Ok(SortKey::TitleAsc));
        let err = "newest".parse::<SortKey>().unwrap_err();
        assert_eq!(err, SortParseError("newest".into()));
        assert!(err.to_string().starts_with("unknown sort 'newest'"));
    }
}
