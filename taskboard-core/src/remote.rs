//! Contract for the remote task store.
//!
//! The board never talks HTTP itself; it emits `Request`s and consumes
//! `Outcome`s. Whatever executes those requests implements `TaskRemote`.

use crate::task::{Task, TaskDraft, TaskPatch};
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

/// A failed round trip. `status` is present when the server answered with a
/// non-2xx code and absent for transport or decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe(.status, .message))]
pub struct RemoteError {
    pub status: Option<u16>,
    pub message: String,
}

fn describe(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) if message.is_empty() => format!("HTTP error! status: {code}"),
        Some(code) => format!("HTTP error! status: {code}: {message}"),
        None => message.to_string(),
    }
}

impl RemoteError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// One network round trip per method; no retries.
pub trait TaskRemote: Send + Sync + 'static {
    fn list_tasks(&self) -> impl Future<Output = Result<Vec<Task>, RemoteError>> + Send;

    fn create_task(
        &self,
        draft: &TaskDraft,
    ) -> impl Future<Output = Result<Task, RemoteError>> + Send;

    fn update_task(
        &self,
        id: &str,
        patch: &TaskPatch,
    ) -> impl Future<Output = Result<Task, RemoteError>> + Send;

    fn delete_task(&self, id: &str) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn list_projects(&self) -> impl Future<Output = Result<Vec<Project>, RemoteError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_status_when_present() {
        assert_eq!(RemoteError::http(404, "").to_string(), "HTTP error! status: 404");
        assert_eq!(
            RemoteError::http(500, "boom").to_string(),
            "HTTP error! status: 500: boom"
        );
        assert_eq!(RemoteError::transport("connection refused").to_string(), "connection refused");
    }
}
