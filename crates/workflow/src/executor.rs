use crate::runtime::{ExecutionReport, WorkflowError, WorkflowRuntime};
use async_trait::async_trait;
use lambda_runtime::tracing;
use model::WorkflowInput;
use service::{ExecutionId, StartError, WorkflowStarter};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

type Completion = oneshot::Receiver<Result<ExecutionReport, WorkflowError>>;

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("no pending execution `{0}`")]
    Unknown(ExecutionId),
    #[error("execution `{0}` ended without reporting")]
    Dropped(ExecutionId),
    #[error(transparent)]
    Rejected(#[from] WorkflowError),
}

/// Runs executions on the current Tokio runtime instead of handing them to a queue.
///
/// Each started execution is tracked until it is awaited once through
/// [`LocalExecutor::wait`] or released with [`LocalExecutor::detach`].
pub struct LocalExecutor {
    runtime: Arc<WorkflowRuntime>,
    pending: Mutex<HashMap<ExecutionId, Completion>>,
    counter: AtomicU64,
}

impl LocalExecutor {
    pub fn new(runtime: Arc<WorkflowRuntime>) -> Self {
        LocalExecutor {
            runtime,
            pending: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<ExecutionId, Completion>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn wait(&self, execution_id: &ExecutionId) -> Result<ExecutionReport, WaitError> {
        let completion: Completion = self
            .pending()
            .remove(execution_id)
            .ok_or_else(|| WaitError::Unknown(execution_id.clone()))?;

        let result: Result<ExecutionReport, WorkflowError> = completion
            .await
            .map_err(|_| WaitError::Dropped(execution_id.clone()))?;

        Ok(result?)
    }

    /// Stop tracking an execution nobody will wait for. It keeps running.
    pub fn detach(&self, execution_id: &ExecutionId) -> bool {
        self.pending().remove(execution_id).is_some()
    }
}

#[async_trait]
impl WorkflowStarter for LocalExecutor {
    fn name(&self) -> &'static str {
        "LocalExecutor"
    }

    async fn start_execution(&self, input: &WorkflowInput) -> Result<ExecutionId, StartError> {
        let sequence: u64 = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let execution_id: ExecutionId = ExecutionId(format!("local-{sequence}"));

        let (sender, receiver) = oneshot::channel();
        self.pending().insert(execution_id.clone(), receiver);

        let runtime: Arc<WorkflowRuntime> = self.runtime.clone();
        let input: WorkflowInput = input.clone();

        tokio::spawn(async move {
            let result = runtime.execute(input).await;

            // The waiter may have gone away, the result is dropped with it
            if sender.send(result).is_err() {
                tracing::debug!("Nobody waited for the execution");
            }
        });

        tracing::debug!(%execution_id, "Spawned local execution");

        Ok(execution_id)
    }
}
