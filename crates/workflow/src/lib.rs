use crate::batch_handler::handle_sqs_batch;
use crate::runtime::WorkflowRuntime;
use aws_lambda_events::sqs::{SqsBatchResponse, SqsEventObj};
use lambda_runtime::LambdaEvent;
use model::{Error, WorkflowInput};

mod batch_handler;
pub mod context;
pub mod executor;
pub mod graph;
pub mod mutation;
pub mod response;
pub mod runtime;

pub type WorkflowLambdaEvent = LambdaEvent<SqsEventObj<WorkflowInput>>;

/// Handler for the queue feeding workflow executions, for use with `lambda_runtime::run()`.
///
/// Expects the function to receive an `SqsEvent` and returns an `SqsBatchResponse`.
/// Therefore, the function *must* have `ReportBatchItemFailures` set to true.
/// Only executions rejected before running are reported as failures, every
/// execution that ran has already delivered its callback and must not run again.
///
/// ```ignore
/// use lambda_runtime::service_fn;
/// use workflow::runtime::WorkflowRuntime;
/// use workflow::{WorkflowLambdaEvent, workflow_fn};
///
/// let runtime = WorkflowRuntime::new(store, callback, &config);
///
/// lambda_runtime::run(service_fn(async |event: WorkflowLambdaEvent| {
///     workflow_fn(&runtime, event).await
/// }))
/// .await?;
/// ```
pub async fn workflow_fn(
    runtime: &WorkflowRuntime,
    event: WorkflowLambdaEvent,
) -> Result<SqsBatchResponse, Error> {
    handle_sqs_batch(|input: WorkflowInput| runtime.execute(input), event).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_runtime::Context;
    use model::RequestType;
    use model::env::BridgeConfig;
    use state_in_memory::InMemoryRecordStore;
    use std::sync::Arc;
    use test_utils::{RecordingCallbackSender, TEST_TABLE, create_workflow_input, sqs_message_with_body};

    #[tokio::test]
    async fn batch_reports_only_undeliverable_inputs() {
        let store: InMemoryRecordStore = InMemoryRecordStore::default();
        let sender: RecordingCallbackSender = RecordingCallbackSender::default();
        let runtime = WorkflowRuntime::new(
            Arc::new(store.clone()),
            Arc::new(sender.clone()),
            &BridgeConfig::default(),
        );

        let mut undeliverable: WorkflowInput = create_workflow_input(RequestType::Update);
        undeliverable.event.resource_properties.callback_url = None;

        let records = vec![
            sqs_message_with_body(create_workflow_input(RequestType::Create)),
            sqs_message_with_body(undeliverable),
        ]
        .into_iter()
        .zip(["message-1", "message-2"])
        .map(|(message, id)| aws_lambda_events::sqs::SqsMessageObj {
            message_id: Some(id.to_string()),
            ..message
        })
        .collect();

        let event: WorkflowLambdaEvent = LambdaEvent::new(SqsEventObj { records }, Context::default());

        let response: SqsBatchResponse = workflow_fn(&runtime, event)
            .await
            .expect("Batch should be handled");

        assert_eq!(1, response.batch_item_failures.len());
        assert_eq!("message-2", response.batch_item_failures[0].item_identifier);
        assert_eq!(1, store.records(TEST_TABLE).len());
        assert_eq!(1, sender.calls().len());
    }
}
