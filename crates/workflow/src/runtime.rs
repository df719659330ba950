use crate::context::ExecutionState;
use crate::graph::{START, StateName, UNSUPPORTED_REQUEST_TYPE};
use crate::mutation::{MutationOutcome, MutationTask, TaskError};
use crate::response::{DeliveryReport, ResponseDelivery};
use lambda_runtime::tracing::{self, Instrument, Span};
use model::env::BridgeConfig;
use model::{ErrorInfo, InvocationId, LastOperation, ParseError, ResponseEnvelope, WorkflowInput};
use retry::RetryConfig;
use serde::{Deserialize, Serialize};
use service::CallbackSender;
use state::RecordStore;
use std::sync::Arc;

/// An execution rejected before any state ran.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("execution `{invocation_id}` has no usable callback url: {source}")]
    MissingCallbackUrl {
        invocation_id: String,
        #[source]
        source: ParseError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Ended in `Done`, whatever the callback said.
    Succeeded,
    /// Ended in a Fail state.
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub invocation_id: String,
    pub status: ExecutionStatus,
    /// States visited, in order.
    pub trace: Vec<StateName>,
    pub state: ExecutionState,
}

impl ExecutionReport {
    pub fn delivery(&self) -> Option<&DeliveryReport> {
        self.state.cfn_response.as_ref()
    }
}

/// Runs lifecycle executions through the state graph.
pub struct WorkflowRuntime {
    create: MutationTask,
    update: MutationTask,
    delete: MutationTask,
    delivery: ResponseDelivery,
}

impl WorkflowRuntime {
    pub fn new(
        store: Arc<dyn RecordStore>,
        callback: Arc<dyn CallbackSender>,
        config: &BridgeConfig,
    ) -> Self {
        let retry: RetryConfig = RetryConfig::mutation(config);
        let task = |operation: LastOperation| {
            MutationTask::new(
                operation,
                store.clone(),
                retry,
                config.target_table_name.clone(),
            )
        };

        WorkflowRuntime {
            create: task(LastOperation::Create),
            update: task(LastOperation::Update),
            delete: task(LastOperation::Delete),
            delivery: ResponseDelivery::new(callback),
        }
    }

    fn task(&self, operation: LastOperation) -> &MutationTask {
        match operation {
            LastOperation::Create => &self.create,
            LastOperation::Update => &self.update,
            LastOperation::Delete => &self.delete,
        }
    }

    /// Run one execution from `ProcessByEventType` to a terminal state.
    pub async fn execute(&self, input: WorkflowInput) -> Result<ExecutionReport, WorkflowError> {
        let invocation_id: String = input.invocation_id().to_string();

        let callback_url: String = input
            .event
            .callback_url()
            .map_err(|source| WorkflowError::MissingCallbackUrl {
                invocation_id: invocation_id.clone(),
                source,
            })?
            .to_string();

        let execution_span: Span =
            tracing::span!(tracing::Level::INFO, "Workflow", invocation_id);

        self.run_states(invocation_id, callback_url, ExecutionState::new(input))
            .instrument(execution_span)
            .await
    }

    async fn run_states(
        &self,
        invocation_id: String,
        callback_url: String,
        mut state: ExecutionState,
    ) -> Result<ExecutionReport, WorkflowError> {
        let mut trace: Vec<StateName> = Vec::new();
        let mut current: StateName = START;

        loop {
            tracing::debug!(state = %current, "Entering state");
            trace.push(current);

            match current {
                StateName::ProcessByEventType => {
                    if StateName::choose(&state.event().request_type).is_none() {
                        let request_type: String = state.event().request_type.to_string();
                        tracing::warn!(request_type, "Request type not supported");

                        state.error_info = Some(ErrorInfo::new(
                            UNSUPPORTED_REQUEST_TYPE,
                            format!("Request type `{request_type}` is not supported"),
                        ));
                    }
                }
                StateName::CreateResourceTask
                | StateName::UpdateResourceTask
                | StateName::DeleteResourceTask => {
                    if let Some(operation) = current.mutation() {
                        let result: Result<MutationOutcome, TaskError> =
                            self.task(operation).run(&state.input).await;

                        match result {
                            Ok(outcome) => state.output = Some(outcome),
                            Err(err) => {
                                tracing::error!(task = %current, "Task failed: {err}");
                                state.error_info = Some(err.error_info());
                            }
                        }
                    }
                }
                StateName::SendResponseTask => {
                    let envelope: ResponseEnvelope = ResponseDelivery::compose(&state);
                    let report: DeliveryReport =
                        self.delivery.deliver(&callback_url, envelope).await;

                    state.cfn_response = Some(report);
                }
                StateName::Done | StateName::RequestTypeNotSupported => {}
            }

            match current.next(&state) {
                Some(next) => current = next,
                None => break,
            }
        }

        let status: ExecutionStatus = match current {
            StateName::RequestTypeNotSupported => ExecutionStatus::Failed,
            _ => ExecutionStatus::Succeeded,
        };

        tracing::info!(?status, final_state = %current, "Execution finished");

        Ok(ExecutionReport {
            invocation_id,
            status,
            trace,
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{RecordKey, RequestType, ResponseStatus};
    use serde_json::{Value, json};
    use state_in_memory::InMemoryRecordStore;
    use std::time::Duration;
    use test_utils::{
        FlakyRecordStore, RecordingCallbackSender, TEST_TABLE, create_workflow_input,
    };

    fn fast_config() -> BridgeConfig {
        BridgeConfig {
            mutation_base_delay: Duration::from_millis(10),
            ..Default::default()
        }
    }

    fn record_key() -> RecordKey {
        RecordKey {
            pk: "p1".to_string(),
            sk: "s1".to_string(),
        }
    }

    #[tokio::test]
    async fn create_runs_task_then_responds() {
        let store: InMemoryRecordStore = InMemoryRecordStore::default();
        let sender: RecordingCallbackSender = RecordingCallbackSender::default();
        let runtime = WorkflowRuntime::new(
            Arc::new(store.clone()),
            Arc::new(sender.clone()),
            &fast_config(),
        );

        let report: ExecutionReport = runtime
            .execute(create_workflow_input(RequestType::Create))
            .await
            .expect("Execution should run");

        assert_eq!(
            vec![
                StateName::ProcessByEventType,
                StateName::CreateResourceTask,
                StateName::SendResponseTask,
                StateName::Done
            ],
            report.trace
        );
        assert_eq!(ExecutionStatus::Succeeded, report.status);
        assert_eq!(1, store.records(TEST_TABLE).len());

        let calls = sender.calls();
        assert_eq!(1, calls.len());
        assert_eq!(json!("SUCCESS"), calls[0].json()["Status"]);
    }

    #[tokio::test]
    async fn unsupported_request_type_reaches_fail_without_writing() {
        let store: Arc<FlakyRecordStore> = Arc::new(FlakyRecordStore::always_failing(false));
        let sender: RecordingCallbackSender = RecordingCallbackSender::default();
        let runtime = WorkflowRuntime::new(store.clone(), Arc::new(sender.clone()), &fast_config());

        let report: ExecutionReport = runtime
            .execute(create_workflow_input(RequestType::Other("Bogus".to_string())))
            .await
            .expect("Execution should run");

        assert_eq!(
            vec![
                StateName::ProcessByEventType,
                StateName::SendResponseTask,
                StateName::RequestTypeNotSupported
            ],
            report.trace
        );
        assert_eq!(ExecutionStatus::Failed, report.status);
        assert_eq!(0, store.calls());

        let calls = sender.calls();
        assert_eq!(1, calls.len());
        assert_eq!(json!("FAILED"), calls[0].json()["Status"]);
    }

    #[tokio::test]
    async fn store_failure_still_sends_exactly_one_failed_callback() {
        let store: Arc<FlakyRecordStore> = Arc::new(FlakyRecordStore::always_failing(false));
        let sender: RecordingCallbackSender = RecordingCallbackSender::default();
        let runtime = WorkflowRuntime::new(store.clone(), Arc::new(sender.clone()), &fast_config());

        let report: ExecutionReport = runtime
            .execute(create_workflow_input(RequestType::Update))
            .await
            .expect("Execution should run");

        let delivery: &DeliveryReport = report.delivery().expect("Response should be recorded");

        assert_eq!(1, store.calls());
        assert_eq!(Some(StateName::Done), report.trace.last().copied());
        assert_eq!(ResponseStatus::Failed, delivery.envelope.status);
        assert_eq!(
            Some("StoreError"),
            report.state.error_info.as_ref().map(|info| info.error.as_str())
        );
        assert!(report.state.output.is_none());
        assert_eq!(1, sender.calls().len());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_are_caught() {
        let store: Arc<FlakyRecordStore> = Arc::new(FlakyRecordStore::always_failing(true));
        let sender: RecordingCallbackSender = RecordingCallbackSender::default();
        let runtime = WorkflowRuntime::new(store.clone(), Arc::new(sender.clone()), &fast_config());

        let report: ExecutionReport = runtime
            .execute(create_workflow_input(RequestType::Delete))
            .await
            .expect("Execution should run");

        assert_eq!(4, store.calls());
        assert_eq!(ExecutionStatus::Succeeded, report.status);
        assert_eq!(json!("FAILED"), sender.calls()[0].json()["Status"]);
    }

    #[tokio::test]
    async fn unreachable_callback_is_attempted_once() {
        let store: InMemoryRecordStore = InMemoryRecordStore::default();
        let sender: RecordingCallbackSender = RecordingCallbackSender::unreachable();
        let runtime = WorkflowRuntime::new(
            Arc::new(store.clone()),
            Arc::new(sender.clone()),
            &fast_config(),
        );

        let report: ExecutionReport = runtime
            .execute(create_workflow_input(RequestType::Create))
            .await
            .expect("Execution should run");

        assert_eq!(1, sender.calls().len());
        assert!(store.get_record(TEST_TABLE, &record_key()).is_some());
        assert!(!report.delivery().is_some_and(DeliveryReport::is_delivered));
    }

    #[tokio::test]
    async fn missing_callback_url_is_rejected_before_running() {
        let store: Arc<FlakyRecordStore> = Arc::new(FlakyRecordStore::always_failing(false));
        let sender: RecordingCallbackSender = RecordingCallbackSender::default();
        let runtime = WorkflowRuntime::new(store.clone(), Arc::new(sender.clone()), &fast_config());

        let mut input: WorkflowInput = create_workflow_input(RequestType::Create);
        input.event.resource_properties.callback_url = None;

        let result = runtime.execute(input).await;

        assert!(matches!(
            result,
            Err(WorkflowError::MissingCallbackUrl { .. })
        ));
        assert_eq!(0, store.calls());
        assert!(sender.calls().is_empty());
    }

    #[tokio::test]
    async fn execution_state_serializes_result_paths() {
        let runtime = WorkflowRuntime::new(
            Arc::new(InMemoryRecordStore::default()),
            Arc::new(RecordingCallbackSender::default()),
            &fast_config(),
        );

        let report: ExecutionReport = runtime
            .execute(create_workflow_input(RequestType::Create))
            .await
            .expect("Execution should run");

        let document: Value = serde_json::to_value(&report.state).expect("State should encode");

        assert!(document.get("cfnEvent").is_some());
        assert!(document.get("cfnContext").is_some());
        assert!(document.get("output").is_some());
        assert!(document.get("cfnResponse").is_some());
        assert!(document.get("errorInfo").is_none());
    }
}
