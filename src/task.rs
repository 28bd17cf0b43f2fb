//! Replay task bookkeeping.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Identifier of a launched replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an id previously handed out.
    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| Error::TaskNotFound(s.to_string()))
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Current state of a task, as reported to status pollers.
#[derive(Debug, Clone, Serialize)]
pub struct TaskEntry {
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Shared record of task id -> status.
///
/// Cloning yields another handle to the same map. Each task's terminal state is
/// written by the replay that owns it; entries are never evicted.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    tasks: Arc<RwLock<HashMap<TaskId, TaskEntry>>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pending entry for `id`.
    pub async fn create_pending(&self, id: TaskId) {
        let entry = TaskEntry {
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        };
        self.tasks.write().await.insert(id, entry);
    }

    /// Mark `id` completed with `result`.
    pub async fn set_completed(&self, id: TaskId, result: Value) {
        self.finish(id, TaskStatus::Completed, Some(result), None)
            .await;
    }

    /// Mark `id` failed with `error`.
    pub async fn set_failed(&self, id: TaskId, error: impl Into<String>) {
        self.finish(id, TaskStatus::Failed, None, Some(error.into()))
            .await;
    }

    async fn finish(
        &self,
        id: TaskId,
        status: TaskStatus,
        result: Option<Value>,
        error: Option<String>,
    ) {
        let mut tasks = self.tasks.write().await;
        let now = Utc::now();
        let created_at = tasks.get(&id).map(|e| e.created_at).unwrap_or(now);
        tasks.insert(
            id,
            TaskEntry {
                status,
                result,
                error,
                created_at,
                finished_at: Some(now),
            },
        );
    }

    /// Current entry for `id`, if any.
    pub async fn get(&self, id: TaskId) -> Option<TaskEntry> {
        self.tasks.read().await.get(&id).cloned()
    }

    /// Current entry for `id`, failing when the id is unknown.
    pub async fn status(&self, id: TaskId) -> Result<TaskEntry> {
        self.get(id)
            .await
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}
