//! One-shot subcommands: sync with the server, apply one intent, print, exit.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use std::fmt::Write as _;
use std::sync::Arc;
use taskboard_core::{
    Board, DropTarget, Task, TaskCache, TaskDraft, TaskPatch, TaskRemote, TaskStatus, Urgency,
    ViewCriteria, parse_tags, today_in, urgency,
};

use crate::cache::JsonFileCache;
use crate::client::HttpTaskStore;
use crate::config::Config;
use crate::runner::Runner;

pub type HttpRunner = Runner<HttpTaskStore, JsonFileCache>;

/// Board seeded from the local cache, wired to the configured server.
/// Nothing has been fetched yet.
pub fn open_runner(cfg: &Config) -> Result<HttpRunner> {
    let board = Board::new(JsonFileCache::at_home()?);
    let remote = Arc::new(HttpTaskStore::from_config(&cfg.remote));
    let mut runner = Runner::new(board, remote);
    runner.board_mut().set_sort(cfg.board.default_sort);
    Ok(runner)
}

/// Today in the configured timezone, falling back to UTC on a bad zone.
pub fn today(cfg: &Config) -> NaiveDate {
    today_in(&cfg.board.timezone).unwrap_or_else(|e| {
        tracing::warn!("{e}; using UTC");
        chrono::Utc::now().date_naive()
    })
}

async fn synced(cfg: &Config) -> Result<HttpRunner> {
    let mut runner = open_runner(cfg)?;
    runner.start();
    runner.settle().await;
    report_error(&runner);
    Ok(runner)
}

fn report_error<R: TaskRemote, C: TaskCache>(runner: &Runner<R, C>) {
    if let Some(err) = runner.board().last_error() {
        eprintln!("warning: {err}");
    }
}

async fn run_intent<F>(cfg: &Config, intent: F) -> Result<HttpRunner>
where
    F: FnOnce(&mut Board<JsonFileCache>) -> Result<Option<taskboard_core::Request>>,
{
    let mut runner = synced(cfg).await?;
    runner.board_mut().dismiss_error();
    let req = intent(runner.board_mut())?;
    if runner.submit(req) {
        runner.settle().await;
        report_error(&runner);
    }
    Ok(runner)
}

pub async fn list(cfg: &Config, criteria: ViewCriteria) -> Result<()> {
    let mut runner = synced(cfg).await?;
    let sort = criteria.sort.or(cfg.board.default_sort);
    runner.board_mut().set_criteria(ViewCriteria { sort, ..criteria });
    print!("{}", render_board_text(runner.board(), today(cfg)));
    Ok(())
}

pub async fn refresh(cfg: &Config) -> Result<()> {
    let runner = synced(cfg).await?;
    let board = runner.board();
    if board.last_error().is_some() {
        println!("Showing {} cached tasks", board.tasks().len());
    } else {
        println!("Loaded {} tasks from server", board.tasks().len());
    }
    Ok(())
}

pub struct AddArgs {
    pub title: String,
    pub description: Option<String>,
    pub tags: Option<String>,
    pub status: TaskStatus,
    pub due: Option<NaiveDate>,
}

impl AddArgs {
    /// `None` for a blank title; such a submission is dropped, not an error.
    pub fn into_draft(self) -> Option<TaskDraft> {
        let mut draft = TaskDraft::new(self.title)
            .with_status(self.status)
            .with_tags_input(self.tags.as_deref().unwrap_or(""))
            .with_due_date(self.due);
        if let Some(d) = self.description {
            draft = draft.with_description(d);
        }
        draft.is_submittable().then_some(draft)
    }
}

pub async fn add(cfg: &Config, args: AddArgs) -> Result<()> {
    let Some(draft) = args.into_draft() else {
        eprintln!("Nothing added: title is empty");
        return Ok(());
    };

    let title = draft.title.trim().to_string();
    let runner = run_intent(cfg, |board| Ok(board.add(draft))).await?;
    // created tasks are always appended
    if let Some(t) = runner.board().tasks().last().filter(|t| t.title == title) {
        println!("{}", task_line(t, today(cfg)));
    }
    Ok(())
}

#[derive(Default)]
pub struct EditArgs {
    pub title: Option<String>,
    pub description: Option<String>,
    pub clear_description: bool,
    pub tags: Option<String>,
    pub status: Option<TaskStatus>,
    pub due: Option<NaiveDate>,
    pub clear_due: bool,
}

impl EditArgs {
    pub fn into_patch(self) -> TaskPatch {
        TaskPatch {
            title: self.title,
            description: if self.clear_description {
                Some(None)
            } else {
                self.description.map(Some)
            },
            tags: self.tags.as_deref().map(parse_tags),
            status: self.status,
            due_date: if self.clear_due {
                Some(None)
            } else {
                self.due.map(Some)
            },
        }
    }
}

pub async fn edit(cfg: &Config, id: &str, args: EditArgs) -> Result<()> {
    let patch = args.into_patch();
    if patch.is_empty() {
        bail!("nothing to change (pass --title, --tags, --status, ...)");
    }
    if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        bail!("title must not be empty");
    }
    let runner = run_intent(cfg, |board| {
        let id = resolve_id(board, id)?;
        Ok(board.edit(&id, patch))
    })
    .await?;
    print_by_prefix(&runner, id, cfg);
    Ok(())
}

pub async fn delete(cfg: &Config, id: &str) -> Result<()> {
    let mut removed = None;
    run_intent(cfg, |board| {
        let id = resolve_id(board, id)?;
        removed = board.get(&id).cloned();
        Ok(board.delete(&id))
    })
    .await?;
    if let Some(t) = removed {
        println!("Deleted [{}] {}", t.id, t.title);
    }
    Ok(())
}

pub async fn move_task(cfg: &Config, id: &str, status: TaskStatus, index: Option<usize>) -> Result<()> {
    let runner = run_intent(cfg, |board| {
        let id = resolve_id(board, id)?;
        let target = match index {
            Some(i) => DropTarget::new(status, i),
            None => DropTarget::end_of(status),
        };
        Ok(board.move_status(&id, target))
    })
    .await?;
    print_by_prefix(&runner, id, cfg);
    Ok(())
}

pub async fn projects(cfg: &Config) -> Result<()> {
    let store = HttpTaskStore::from_config(&cfg.remote);
    let projects = store
        .list_projects()
        .await
        .map_err(|e| anyhow::anyhow!("Error loading projects: {e}"))?;
    if projects.is_empty() {
        println!("No projects available.");
    }
    for p in projects {
        println!("[{}] {}", p.id, p.name);
    }
    Ok(())
}

fn print_by_prefix(runner: &HttpRunner, needle: &str, cfg: &Config) {
    if let Ok(id) = resolve_id(runner.board(), needle) {
        if let Some(t) = runner.board().get(&id) {
            println!("{}", task_line(t, today(cfg)));
        }
    }
}

/// Exact id, or an unambiguous prefix of one.
pub fn resolve_id<C: TaskCache>(board: &Board<C>, needle: &str) -> Result<String> {
    if board.get(needle).is_some() {
        return Ok(needle.to_string());
    }
    let hits: Vec<&Task> = board
        .tasks()
        .iter()
        .filter(|t| t.id.starts_with(needle))
        .collect();
    match hits.as_slice() {
        [one] => Ok(one.id.clone()),
        [] => bail!("no task with id '{needle}'"),
        _ => bail!("id '{needle}' is ambiguous ({} matches)", hits.len()),
    }
}

pub fn urgency_label(u: Urgency) -> &'static str {
    match u {
        Urgency::Overdue => "overdue",
        Urgency::DueToday => "due today",
        Urgency::DueSoon => "due soon",
        Urgency::Later => "",
    }
}

pub fn task_line(t: &Task, today: NaiveDate) -> String {
    let mut s = format!("[{}] {}", t.id, t.title);
    if !t.tags.is_empty() {
        let tags: Vec<String> = t.tags.iter().map(|tag| format!("#{tag}")).collect();
        let _ = write!(s, "  {}", tags.join(" "));
    }
    if let Some(due) = t.due_date {
        let label = urgency_label(urgency(due, today));
        if label.is_empty() {
            let _ = write!(s, "  due {due}");
        } else {
            let _ = write!(s, "  due {due} ({label})");
        }
    }
    if t.is_temporary() {
        s.push_str("  (unsynced)");
    }
    s
}

/// Plain-text board: one section per status column.
pub fn render_board_text<C: TaskCache>(board: &Board<C>, today: NaiveDate) -> String {
    let view = board.view();
    let mut out = String::new();
    for status in TaskStatus::ALL {
        let tasks = view.get(status);
        let _ = writeln!(out, "## {} ({})", status.label(), tasks.len());
        for t in tasks {
            let _ = writeln!(out, "- {}", task_line(t, today));
            if let Some(d) = t.description.as_deref().filter(|d| !d.trim().is_empty()) {
                let _ = writeln!(out, "    {}", d.trim());
            }
        }
        out.push('\n');
    }
    out
}
