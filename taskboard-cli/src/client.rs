use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use taskboard_core::{Project, RemoteError, Task, TaskDraft, TaskPatch, TaskRemote};

use crate::config::RemoteSection;

/// REST client for the task and project collections.
#[derive(Debug, Clone)]
pub struct HttpTaskStore {
    client: reqwest::Client,
    tasks_url: String,
    projects_url: String,
}

impl HttpTaskStore {
    pub fn new(tasks_url: impl Into<String>, projects_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            tasks_url: tasks_url.into(),
            projects_url: projects_url.into(),
        }
    }

    /// Use a preconfigured client (proxy, TLS, headers).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn from_config(remote: &RemoteSection) -> Self {
        Self::new(remote.tasks_url(), remote.projects_url())
    }

    fn task_url(&self, id: &str) -> String {
        format!("{}/{}", self.tasks_url, id)
    }
}

fn transport(what: &str, e: reqwest::Error) -> RemoteError {
    tracing::warn!("Error {what}: {e}");
    RemoteError::transport(format!("{what}: {e}"))
}

/// Non-2xx responses become `RemoteError` with the status and body text.
async fn check_status(what: &str, resp: Response) -> Result<Response, RemoteError> {
    let status: StatusCode = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let txt = resp.text().await.unwrap_or_default();
    tracing::warn!("Error {what}: HTTP {status}");
    Err(RemoteError::http(status.as_u16(), txt.trim()))
}

async fn read_json<T: DeserializeOwned>(what: &str, resp: Response) -> Result<T, RemoteError> {
    let resp = check_status(what, resp).await?;
    resp.json::<T>().await.map_err(|e| transport(what, e))
}

impl TaskRemote for HttpTaskStore {
    async fn list_tasks(&self) -> Result<Vec<Task>, RemoteError> {
        let what = "fetching tasks";
        let resp = self
            .client
            .get(&self.tasks_url)
            .send()
            .await
            .map_err(|e| transport(what, e))?;
        read_json(what, resp).await
    }

    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, RemoteError> {
        let what = "adding task";
        let resp = self
            .client
            .post(&self.tasks_url)
            .json(draft)
            .send()
            .await
            .map_err(|e| transport(what, e))?;
        read_json(what, resp).await
    }

    async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task, RemoteError> {
        let what = "updating task";
        let resp = self
            .client
            .put(self.task_url(id))
            .json(patch)
            .send()
            .await
            .map_err(|e| transport(what, e))?;
        read_json(what, resp).await
    }

    async fn delete_task(&self, id: &str) -> Result<(), RemoteError> {
        let what = "deleting task";
        let resp = self
            .client
            .delete(self.task_url(id))
            .send()
            .await
            .map_err(|e| transport(what, e))?;
        check_status(what, resp).await.map(|_| ())
    }

    async fn list_projects(&self) -> Result<Vec<Project>, RemoteError> {
        let what = "fetching projects";
        let resp = self
            .client
            .get(&self.projects_url)
            .send()
            .await
            .map_err(|e| transport(what, e))?;
        read_json(what, resp).await
    }
}
