//! Board: the task reconciliation engine.
//!
//! Owns the canonical task list and is the only writer of it and of the
//! local cache.
//!
//! Every user intent is a method that applies its local effect (if any)
//! right away and hands back the `Request` the caller has to send to the
//! remote store. When the round trip finishes, the caller feeds the
//! `Outcome` back through `Board::apply`. Outcomes may arrive in any order;
//! each one is folded in on its own, there is no sequencing between them.
//!
//! Failure policy:
//! - add: server task on success, temp-id task on failure (never lost)
//! - edit: server copy wins on success, caller's patch applied on failure
//! - delete / move: applied immediately, never rolled back
//! - every failure overwrites the single `last_error` slot

use crate::cache::TaskCache;
use crate::remote::{RemoteError, TaskRemote};
use crate::task::{Task, TaskDraft, TaskPatch, TaskStatus, TEMP_ID_PREFIX};
use crate::view::{derive_view, Buckets, SortKey, ViewCriteria};
use chrono::Utc;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Load,
    Add,
    Edit,
    Delete,
    Move,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Load => "loading tasks",
            Operation::Add => "adding task",
            Operation::Edit => "updating task",
            Operation::Delete => "deleting task",
            Operation::Move => "updating task status",
        };
        f.write_str(s)
    }
}

/// The one error presentation shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardError {
    pub operation: Operation,
    pub error: RemoteError,
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error {}: {}", self.operation, self.error)
    }
}

/// A remote call the board wants made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ListTasks,
    Create { draft: TaskDraft },
    Update { id: String, patch: TaskPatch },
    UpdateStatus { id: String, status: TaskStatus },
    Delete { id: String },
}

impl Request {
    /// Perform the round trip and package the result for `Board::apply`.
    pub async fn execute<R: TaskRemote>(self, remote: &R) -> Outcome {
        match self {
            Request::ListTasks => Outcome::Listed(remote.list_tasks().await),
            Request::Create { draft } => {
                let result = remote.create_task(&draft).await;
                Outcome::Created { draft, result }
            }
            Request::Update { id, patch } => {
                let result = remote.update_task(&id, &patch).await;
                Outcome::Updated { id, patch, result }
            }
            Request::UpdateStatus { id, status } => {
                let result = remote
                    .update_task(&id, &TaskPatch::status_only(status))
                    .await
                    .map(|_| ());
                Outcome::StatusUpdated { id, status, result }
            }
            Request::Delete { id } => {
                let result = remote.delete_task(&id).await;
                Outcome::Deleted { id, result }
            }
        }
    }
}

/// Result of a finished `Request`, carrying what the board needs to reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Listed(Result<Vec<Task>, RemoteError>),
    Created {
        draft: TaskDraft,
        result: Result<Task, RemoteError>,
    },
    Updated {
        id: String,
        patch: TaskPatch,
        result: Result<Task, RemoteError>,
    },
    StatusUpdated {
        id: String,
        status: TaskStatus,
        result: Result<(), RemoteError>,
    },
    Deleted {
        id: String,
        result: Result<(), RemoteError>,
    },
}

/// Where a dragged task lands: a status column and a position inside that
/// column (counting only tasks with that status, in canonical order).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropTarget {
    pub status: TaskStatus,
    pub index: usize,
}

impl DropTarget {
    pub fn new(status: TaskStatus, index: usize) -> Self {
        Self { status, index }
    }

    /// Bottom of the column.
    pub fn end_of(status: TaskStatus) -> Self {
        Self {
            status,
            index: usize::MAX,
        }
    }
}

pub struct Board<C: TaskCache> {
    tasks: Vec<Task>,
    last_error: Option<BoardError>,
    loading: bool,
    criteria: ViewCriteria,
    cache: C,
}

impl<C: TaskCache> Board<C> {
    /// Seed the canonical list from the cache (empty if nothing usable).
    /// Missing or unreadable cache data is overwritten straight away so the
    /// cache always mirrors the list.
    pub fn new(cache: C) -> Self {
        let loaded = cache.load();
        let board = Self {
            tasks: loaded.clone().unwrap_or_default(),
            last_error: None,
            loading: false,
            criteria: ViewCriteria::default(),
            cache,
        };
        tracing::debug!(count = board.tasks.len(), "board seeded from cache");
        if loaded.is_none() {
            board.commit();
        }
        board
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn last_error(&self) -> Option<&BoardError> {
        self.last_error.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    /// Startup: the cached list is already showing, now ask the server.
    pub fn initialize(&mut self) -> Request {
        self.refresh()
    }

    /// Full refetch; the only way remote and local state re-converge.
    pub fn refresh(&mut self) -> Request {
        self.loading = true;
        self.last_error = None;
        Request::ListTasks
    }

    /// `None` when the title is blank (silently rejected, no error).
    pub fn add(&mut self, mut draft: TaskDraft) -> Option<Request> {
        if !draft.is_submittable() {
            tracing::debug!("rejecting draft with blank title");
            return None;
        }
        draft.title = draft.title.trim().to_string();
        Some(Request::Create { draft })
    }

    /// `None` when no task has `id`.
    pub fn edit(&mut self, id: &str, patch: TaskPatch) -> Option<Request> {
        if self.get(id).is_none() {
            tracing::debug!(id, "edit for unknown task ignored");
            return None;
        }
        Some(Request::Update {
            id: id.to_string(),
            patch,
        })
    }

    /// Edit-form save: replace every field with the caller's copy.
    pub fn save_task(&mut self, task: &Task) -> Option<Request> {
        self.edit(&task.id, TaskPatch::replace_with(task))
    }

    /// Removes the task immediately; the remote delete is best-effort.
    pub fn delete(&mut self, id: &str) -> Option<Request> {
        let pos = self.tasks.iter().position(|t| t.id == id)?;
        self.tasks.remove(pos);
        self.commit();
        Some(Request::Delete { id: id.to_string() })
    }

    /// Drag-and-drop: reposition and restatus right away, then tell the server.
    /// `None` for an unknown id or a drop onto the task's own slot.
    pub fn move_status(&mut self, id: &str, target: DropTarget) -> Option<Request> {
        let from = self.tasks.iter().position(|t| t.id == id)?;
        let source_status = self.tasks[from].status;
        let source_index = self.tasks[..from]
            .iter()
            .filter(|t| t.status == source_status)
            .count();
        if source_status == target.status {
            // past-the-end drops land on the last slot of the column
            let last = self.tasks.iter().filter(|t| t.status == source_status).count() - 1;
            if source_index == target.index.min(last) {
                return None;
            }
        }

        let mut task = self.tasks.remove(from);
        task.status = target.status;
        let at = self.insertion_point(target);
        self.tasks.insert(at, task);
        self.commit();

        Some(Request::UpdateStatus {
            id: id.to_string(),
            status: target.status,
        })
    }

    /// Position of `id` inside its own status column.
    pub fn bucket_index(&self, id: &str) -> Option<usize> {
        let from = self.tasks.iter().position(|t| t.id == id)?;
        let status = self.tasks[from].status;
        Some(self.tasks[..from].iter().filter(|t| t.status == status).count())
    }

    fn insertion_point(&self, target: DropTarget) -> usize {
        let mut last = None;
        for (seen, (pos, _)) in self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.status == target.status)
            .enumerate()
        {
            if seen == target.index {
                return pos;
            }
            last = Some(pos);
        }
        match last {
            Some(pos) => pos + 1,
            None => self.tasks.len(),
        }
    }

    /// Fold a finished round trip into the canonical list.
    pub fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Listed(Ok(tasks)) => {
                tracing::info!(count = tasks.len(), "loaded tasks from server");
                self.loading = false;
                self.tasks = dedup_by_id(tasks);
                self.commit();
            }
            Outcome::Listed(Err(error)) => {
                self.loading = false;
                self.fail(Operation::Load, error);
            }

            Outcome::Created {
                result: Ok(task), ..
            } => {
                tracing::debug!(id = %task.id, "task created");
                match self.tasks.iter_mut().find(|t| t.id == task.id) {
                    Some(existing) => {
                        tracing::warn!(id = %task.id, "server returned an id already on the board");
                        *existing = task;
                    }
                    None => self.tasks.push(task),
                }
                self.commit();
            }
            Outcome::Created {
                draft,
                result: Err(error),
            } => {
                let id = self.temp_id();
                tracing::debug!(%id, "keeping unconfirmed task under temporary id");
                self.tasks.push(Task::from_draft(id, &draft));
                self.commit();
                self.fail(Operation::Add, error);
            }

            Outcome::Updated {
                id, result: Ok(server), ..
            } => {
                if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == id) {
                    *slot = server;
                    self.commit();
                } else {
                    tracing::debug!(%id, "update confirmed for a task no longer on the board");
                }
            }
            Outcome::Updated {
                id,
                patch,
                result: Err(error),
            } => {
                if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == id) {
                    slot.apply_patch(&patch);
                    self.commit();
                }
                self.fail(Operation::Edit, error);
            }

            Outcome::StatusUpdated {
                id,
                status,
                result: Ok(()),
            } => {
                tracing::debug!(%id, %status, "status change confirmed");
            }
            Outcome::StatusUpdated {
                result: Err(error), ..
            } => self.fail(Operation::Move, error),

            Outcome::Deleted { id, result: Ok(()) } => {
                tracing::debug!(%id, "delete confirmed");
            }
            Outcome::Deleted {
                result: Err(error), ..
            } => self.fail(Operation::Delete, error),
        }
    }

    pub fn criteria(&self) -> &ViewCriteria {
        &self.criteria
    }

    pub fn set_criteria(&mut self, criteria: ViewCriteria) {
        self.criteria = criteria;
    }

    pub fn set_status_filter(&mut self, status: Option<TaskStatus>) {
        self.criteria.status = status;
    }

    pub fn set_search(&mut self, search: Option<String>) {
        self.criteria.search = search;
    }

    pub fn set_tag_filter(&mut self, tag: Option<String>) {
        self.criteria.tag = tag;
    }

    pub fn set_sort(&mut self, sort: Option<SortKey>) {
        self.criteria.sort = sort;
    }

    pub fn clear_filters(&mut self) {
        self.criteria = ViewCriteria {
            sort: self.criteria.sort,
            ..ViewCriteria::default()
        };
    }

    /// The three columns as presentation should show them.
    pub fn view(&self) -> Buckets {
        derive_view(&self.tasks, &self.criteria)
    }

    fn fail(&mut self, operation: Operation, error: RemoteError) {
        tracing::warn!(%operation, %error, "remote call failed");
        self.last_error = Some(BoardError { operation, error });
    }

    fn commit(&self) {
        self.cache.save(&self.tasks);
    }

    fn temp_id(&self) -> String {
        let mut stamp = Utc::now().timestamp_millis();
        loop {
            let id = format!("{TEMP_ID_PREFIX}{stamp}");
            if self.get(&id).is_none() {
                return id;
            }
            stamp += 1;
        }
    }
}

/// Keep the first task for each id; the list must never hold duplicates.
fn dedup_by_id(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = std::collections::HashSet::new();
    let before = tasks.len();
    let out: Vec<Task> = tasks.into_iter().filter(|t| seen.insert(t.id.clone())).collect();
    if out.len() != before {
        tracing::warn!(dropped = before - out.len(), "server list contained duplicate ids");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn board_with(tasks: &[Task]) -> Board<MemoryCache> {
        Board::new(MemoryCache::with_tasks(tasks))
    }

    fn ids(b: &Board<impl TaskCache>) -> Vec<&str> {
        b.tasks().iter().map(|t| t.id.as_str()).collect()
    }

    fn boom() -> RemoteError {
        RemoteError::http(500, "")
    }

    #[test]
    fn starts_from_cache_and_survives_failed_fetch() {
        let mut b = board_with(&[Task::new("1", "cached")]);
        assert_eq!(b.initialize(), Request::ListTasks);
        assert!(b.is_loading());

        b.apply(Outcome::Listed(Err(RemoteError::transport("offline"))));
        assert!(!b.is_loading());
        assert_eq!(ids(&b), vec!["1"]);
        assert_eq!(b.last_error().unwrap().operation, Operation::Load);
    }

    #[test]
    fn server_list_replaces_cache() {
        let mut b = board_with(&[Task::new("1", "cached")]);
        b.initialize();
        b.apply(Outcome::Listed(Ok(vec![Task::new("9", "server")])));
        assert_eq!(ids(&b), vec!["9"]);
        assert_eq!(b.cache().load().unwrap(), b.tasks().to_vec());
    }

    #[test]
    fn refresh_clears_previous_error() {
        let mut b = board_with(&[]);
        b.apply(Outcome::Deleted {
            id: "x".into(),
            result: Err(boom()),
        });
        assert!(b.last_error().is_some());
        b.refresh();
        assert!(b.last_error().is_none());
    }

    #[test]
    fn blank_draft_is_rejected_without_error() {
        let mut b = board_with(&[]);
        assert!(b.add(TaskDraft::new("  \t")).is_none());
        assert!(b.tasks().is_empty());
        assert!(b.last_error().is_none());
    }

    #[test]
    fn add_failure_keeps_task_under_temp_id() {
        let mut b = board_with(&[]);
        let draft = TaskDraft::new("Write docs").with_tags_input("a, b");
        let Some(Request::Create { draft }) = b.add(draft) else {
            panic!("expected create request");
        };
        b.apply(Outcome::Created {
            draft,
            result: Err(RemoteError::transport("offline")),
        });

        assert_eq!(b.tasks().len(), 1);
        let t = &b.tasks()[0];
        assert!(t.id.starts_with("temp-"));
        assert!(t.is_temporary());
        assert_eq!(t.tags, vec!["a", "b"]);
        assert_eq!(t.status, TaskStatus::Todo);
        assert_eq!(b.last_error().unwrap().operation, Operation::Add);
        assert_eq!(b.cache().load().unwrap(), b.tasks().to_vec());
    }

    #[test]
    fn temp_ids_stay_unique() {
        let mut b = board_with(&[]);
        for _ in 0..3 {
            b.apply(Outcome::Created {
                draft: TaskDraft::new("x"),
                result: Err(boom()),
            });
        }
        let mut seen = ids(&b);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn add_success_appends_server_task() {
        let mut b = board_with(&[Task::new("1", "a")]);
        let req = b.add(TaskDraft::new("  b  ")).unwrap();
        assert_eq!(
            req,
            Request::Create {
                draft: TaskDraft::new("b")
            }
        );
        b.apply(Outcome::Created {
            draft: TaskDraft::new("b"),
            result: Ok(Task::new("42", "b")),
        });
        assert_eq!(ids(&b), vec!["1", "42"]);
        assert!(b.last_error().is_none());
    }

    #[test]
    fn edit_unknown_id_is_a_noop() {
        let mut b = board_with(&[Task::new("1", "a")]);
        let before = b.tasks().to_vec();
        assert!(b.edit("nope", TaskPatch::status_only(TaskStatus::Done)).is_none());
        assert_eq!(b.tasks(), before.as_slice());
        assert!(b.last_error().is_none());
    }

    #[test]
    fn edit_success_takes_server_copy() {
        let mut b = board_with(&[Task::new("1", "a"), Task::new("2", "b")]);
        let patch = TaskPatch {
            title: Some("mine".into()),
            ..TaskPatch::default()
        };
        let req = b.edit("1", patch.clone()).unwrap();
        assert!(matches!(req, Request::Update { ref id, .. } if id == "1"));
        // nothing changes until the server answers
        assert_eq!(b.get("1").unwrap().title, "a");

        b.apply(Outcome::Updated {
            id: "1".into(),
            patch,
            result: Ok(Task::new("1", "theirs").with_tags(["srv"])),
        });
        assert_eq!(ids(&b), vec!["1", "2"]);
        assert_eq!(b.get("1").unwrap().title, "theirs");
        assert_eq!(b.get("1").unwrap().tags, vec!["srv"]);
        assert_eq!(b.cache().load().unwrap(), b.tasks().to_vec());
    }

    #[test]
    fn edit_failure_applies_patch_locally() {
        let mut b = board_with(&[Task::new("1", "a")]);
        let patch = TaskPatch {
            tags: Some(vec!["x".into()]),
            ..TaskPatch::default()
        };
        b.edit("1", patch.clone()).unwrap();
        b.apply(Outcome::Updated {
            id: "1".into(),
            patch,
            result: Err(boom()),
        });
        assert_eq!(b.get("1").unwrap().tags, vec!["x"]);
        assert_eq!(b.last_error().unwrap().operation, Operation::Edit);
        assert_eq!(b.cache().load().unwrap(), b.tasks().to_vec());
    }

    #[test]
    fn delete_is_not_rolled_back() {
        let mut b = board_with(&[Task::new("1", "a"), Task::new("2", "b")]);
        let req = b.delete("1").unwrap();
        assert_eq!(req, Request::Delete { id: "1".into() });
        assert_eq!(ids(&b), vec!["2"]);
        assert_eq!(b.cache().load().unwrap().len(), 1);

        b.apply(Outcome::Deleted {
            id: "1".into(),
            result: Err(boom()),
        });
        assert_eq!(ids(&b), vec!["2"]);
        assert_eq!(b.last_error().unwrap().operation, Operation::Delete);
    }

    #[test]
    fn delete_unknown_is_a_noop() {
        let mut b = board_with(&[Task::new("1", "a")]);
        assert!(b.delete("zzz").is_none());
        assert_eq!(ids(&b), vec!["1"]);
    }

    #[test]
    fn move_to_same_slot_is_a_noop() {
        let mut b = board_with(&[Task::new("1", "a"), Task::new("2", "b")]);
        let before = b.tasks().to_vec();
        assert!(b.move_status("2", DropTarget::new(TaskStatus::Todo, 1)).is_none());
        assert_eq!(b.tasks(), before.as_slice());
    }

    #[test]
    fn drop_past_the_end_of_own_column_is_a_noop() {
        let mut b = board_with(&[
            Task::new("1", "a"),
            Task::new("2", "b"),
            Task::new("3", "c").with_status(TaskStatus::Done),
        ]);
        let before = b.tasks().to_vec();
        assert!(b.move_status("2", DropTarget::end_of(TaskStatus::Todo)).is_none());
        assert!(b.move_status("3", DropTarget::new(TaskStatus::Done, 7)).is_none());
        assert_eq!(b.tasks(), before.as_slice());

        // not last yet, so it still moves
        let req = b.move_status("1", DropTarget::end_of(TaskStatus::Todo));
        assert!(req.is_some());
        assert_eq!(ids(&b), vec!["2", "1", "3"]);
    }

    #[test]
    fn unreadable_cache_is_replaced_on_startup() {
        let mut b = Board::new(MemoryCache::with_raw("{garbage"));
        assert!(b.tasks().is_empty());
        assert_eq!(b.cache().load(), Some(Vec::new()));

        b.initialize();
        b.apply(Outcome::Listed(Err(RemoteError::transport("offline"))));
        assert_eq!(b.cache().load().unwrap(), b.tasks().to_vec());
    }

    #[test]
    fn move_restatuses_and_repositions_immediately() {
        let mut b = board_with(&[
            Task::new("1", "a"),
            Task::new("2", "b").with_status(TaskStatus::Done),
            Task::new("3", "c"),
            Task::new("4", "d").with_status(TaskStatus::Done),
        ]);

        let req = b.move_status("3", DropTarget::new(TaskStatus::Done, 1)).unwrap();
        assert_eq!(
            req,
            Request::UpdateStatus {
                id: "3".into(),
                status: TaskStatus::Done
            }
        );
        assert_eq!(b.get("3").unwrap().status, TaskStatus::Done);
        let done: Vec<String> = b.view().done.into_iter().map(|t| t.id).collect();
        assert_eq!(done, vec!["2", "3", "4"]);
        assert_eq!(b.cache().load().unwrap(), b.tasks().to_vec());

        // failure leaves the move in place
        b.apply(Outcome::StatusUpdated {
            id: "3".into(),
            status: TaskStatus::Done,
            result: Err(boom()),
        });
        assert_eq!(b.get("3").unwrap().status, TaskStatus::Done);
        assert_eq!(b.last_error().unwrap().operation, Operation::Move);
    }

    #[test]
    fn move_to_end_of_empty_column() {
        let mut b = board_with(&[Task::new("1", "a"), Task::new("2", "b")]);
        b.move_status("1", DropTarget::end_of(TaskStatus::InProgress)).unwrap();
        assert_eq!(ids(&b), vec!["2", "1"]);
        assert_eq!(b.view().in_progress.len(), 1);
    }

    #[test]
    fn reorder_within_column() {
        let mut b = board_with(&[Task::new("1", "a"), Task::new("2", "b"), Task::new("3", "c")]);
        b.move_status("3", DropTarget::new(TaskStatus::Todo, 0)).unwrap();
        assert_eq!(ids(&b), vec!["3", "1", "2"]);
        assert_eq!(b.bucket_index("2"), Some(2));
    }

    #[test]
    fn later_failure_overwrites_error_slot() {
        let mut b = board_with(&[Task::new("1", "a")]);
        b.apply(Outcome::Deleted {
            id: "x".into(),
            result: Err(boom()),
        });
        b.apply(Outcome::Listed(Err(RemoteError::transport("down"))));
        let err = b.last_error().unwrap();
        assert_eq!(err.operation, Operation::Load);
        assert_eq!(err.to_string(), "Error loading tasks: down");
        b.dismiss_error();
        assert!(b.last_error().is_none());
    }

    #[test]
    fn duplicate_ids_from_server_are_collapsed() {
        let mut b = board_with(&[]);
        b.apply(Outcome::Listed(Ok(vec![
            Task::new("1", "a"),
            Task::new("1", "again"),
        ])));
        assert_eq!(ids(&b), vec!["1"]);
        assert_eq!(b.get("1").unwrap().title, "a");
    }

    #[test]
    fn clear_filters_keeps_sort() {
        let mut b = board_with(&[]);
        b.set_search(Some("x".into()));
        b.set_status_filter(Some(TaskStatus::Done));
        b.set_sort(Some(SortKey::DueAsc));
        b.clear_filters();
        assert!(!b.criteria().is_filtered());
        assert_eq!(b.criteria().sort, Some(SortKey::DueAsc));
    }
}
