mod assertions;
mod executor;
mod resolver;

pub use executor::{StepAction, StepContext};

use crate::flow::{Action, Flow, Inputs, Step};
use crate::page::PageDriver;
use crate::settings::Settings;
use crate::task::{TaskEntry, TaskId, TaskStore};
use crate::{Error, Result};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Handle to a launched replay.
///
/// The replay runs on its own tokio task; its outcome is only observable through
/// the [`TaskStore`], either by polling or via [`ReplayHandle::wait`].
pub struct ReplayHandle {
    task_id: TaskId,
    store: TaskStore,
    join: JoinHandle<bool>,
}

impl ReplayHandle {
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Whether the replay task has exited.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the replay to finish and return its final entry.
    pub async fn wait(self) -> Result<TaskEntry> {
        self.join
            .await
            .map_err(|e| Error::ActionFailed(format!("replay task aborted: {}", e)))?;
        self.store.status(self.task_id).await
    }
}

/// Replays recorded flows and records their outcome.
///
/// A replay owns its page for the duration of the run. Replays on different pages
/// may run concurrently; two replays on the same page may not.
#[derive(Clone)]
pub struct Replayer {
    flows_dir: PathBuf,
    store: TaskStore,
}

impl Replayer {
    /// Create a replayer reading flows from `flows_dir`.
    pub fn new(flows_dir: impl Into<PathBuf>, store: TaskStore) -> Self {
        Self {
            flows_dir: flows_dir.into(),
            store,
        }
    }

    pub fn from_settings(settings: &Settings, store: TaskStore) -> Self {
        Self::new(&settings.flows_dir, store)
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Resolve a flow reference against the flows directory.
    pub fn resolve_path(&self, flow_ref: &str) -> PathBuf {
        let path = Path::new(flow_ref);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.flows_dir.join(path)
        }
    }

    /// Start replaying `flow_ref` on `page` and return immediately.
    ///
    /// A pending task is created before this returns; the spawned replay is the only
    /// writer of its terminal state.
    pub async fn launch(
        &self,
        flow_ref: impl Into<String>,
        inputs: Inputs,
        page: Arc<dyn PageDriver>,
    ) -> ReplayHandle {
        let task_id = TaskId::new();
        self.store.create_pending(task_id).await;

        let replayer = self.clone();
        let flow_ref = flow_ref.into();
        let join = tokio::spawn(async move {
            replayer
                .replay(&flow_ref, &inputs, page.as_ref(), task_id)
                .await
        });

        ReplayHandle {
            task_id,
            store: self.store.clone(),
            join,
        }
    }

    /// Replay `flow_ref` to completion and write the task's terminal state.
    ///
    /// Returns whether the replay succeeded. Errors never escape: they become the
    /// task's `failed` status.
    pub async fn replay(
        &self,
        flow_ref: &str,
        inputs: &Inputs,
        page: &dyn PageDriver,
        task_id: TaskId,
    ) -> bool {
        info!("Replaying {} (task {})", flow_ref, task_id);
        let start = Instant::now();

        match self.load_and_run(flow_ref, inputs, page).await {
            Ok(()) => {
                info!(
                    "Replay completed in {}ms (task {})",
                    start.elapsed().as_millis(),
                    task_id
                );
                self.store
                    .set_completed(task_id, json!({ "successReplay": true }))
                    .await;
                true
            }
            Err(e) => {
                error!("Replay failed (task {}): {}", task_id, e);
                self.store.set_failed(task_id, e.to_string()).await;
                false
            }
        }
    }

    async fn load_and_run(
        &self,
        flow_ref: &str,
        inputs: &Inputs,
        page: &dyn PageDriver,
    ) -> Result<()> {
        let path = self.resolve_path(flow_ref);
        let content = tokio::fs::read_to_string(&path).await?;
        let flow = Flow::parse_with_inputs(&content, inputs)?;
        Self::run_flow(&flow, page).await
    }

    /// Run every step of an already-parsed flow, stopping at the first error.
    pub async fn run_flow(flow: &Flow, page: &dyn PageDriver) -> Result<()> {
        debug!("Flow has {} steps", flow.steps.len());
        for (index, step) in flow.steps.iter().enumerate() {
            debug!("Executing step<{}>: {}", index, step.action.name());
            if let Err(e) = run_step(page, step, index).await {
                error!(
                    "step<{}>: error executing action {}: {}",
                    index,
                    step.action.name(),
                    e
                );
                return Err(e);
            }
        }
        Ok(())
    }

    /// The `input_schema` of a flow file, or `null` when it declares none.
    pub async fn input_schema(&self, flow_ref: &str) -> Result<Value> {
        let path = self.resolve_path(flow_ref);
        let content = tokio::fs::read_to_string(&path).await?;
        let mut doc: Value = serde_json::from_str(&content)?;
        Ok(doc
            .get_mut("input_schema")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }
}

async fn run_step(page: &dyn PageDriver, step: &Step, index: usize) -> Result<()> {
    // A step that failed to decode never touches the page.
    if let Action::Invalid(invalid) = &step.action {
        return Err(executor::invalid_step(index, invalid));
    }
    let element = resolver::resolve(page, step, index).await?;
    executor::execute(page, step, index, element.as_ref()).await?;
    assertions::check(page, step, index).await
}
