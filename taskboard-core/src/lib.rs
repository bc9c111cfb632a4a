//! taskboard-core: task model, board reconciliation engine and view derivation.

pub mod board;
pub mod cache;
pub mod remote;
pub mod task;
pub mod time;
pub mod view;

pub use board::{Board, BoardError, DropTarget, Operation, Outcome, Request};
pub use cache::{MemoryCache, TaskCache};
pub use remote::{Project, RemoteError, TaskRemote};
pub use task::{parse_tags, StatusParseError, Task, TaskDraft, TaskPatch, TaskStatus, TEMP_ID_PREFIX};
pub use time::{today_in, urgency, Urgency};
pub use view::{derive_view, filter_and_sort, Buckets, SortKey, SortParseError, ViewCriteria};
