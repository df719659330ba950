use async_trait::async_trait;
use aws_sdk_sqs::config::http::HttpResponse;
use aws_sdk_sqs::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_sqs::operation::send_message::{SendMessageError, SendMessageOutput};
use model::{InvocationId, WorkflowInput};
use service::{ExecutionId, StartError, WorkflowStarter};

const THROTTLING_CODES: &[&str] = &["ThrottlingException", "RequestThrottled"];

/// Starts workflows by enqueueing their input on the queue the workflow consumes.
pub struct SqsWorkflowStarter {
    pub sqs: aws_sdk_sqs::Client,
    pub queue_url: String,
}

impl SqsWorkflowStarter {
    pub fn new(sqs: aws_sdk_sqs::Client, queue_url: String) -> Self {
        Self { sqs, queue_url }
    }
}

#[async_trait]
impl WorkflowStarter for SqsWorkflowStarter {
    fn name(&self) -> &'static str {
        "SqsWorkflowStarter"
    }

    async fn start_execution(&self, input: &WorkflowInput) -> Result<ExecutionId, StartError> {
        let body: String =
            serde_json::to_string(input).map_err(|err| StartError::BadRequest(err.to_string()))?;

        let output: SendMessageOutput = self
            .sqs
            .send_message()
            .queue_url(self.queue_url.as_str())
            .message_body(body)
            .send()
            .await
            .map_err(|err| {
                let retryable: bool = is_retryable(&err);

                StartError::Backend {
                    source: err.into(),
                    retryable,
                }
            })?;

        tracing::debug!(
            invocation_id = input.invocation_id(),
            message_id = output.message_id(),
            "Enqueued workflow input"
        );

        Ok(ExecutionId(
            output
                .message_id()
                .map(str::to_string)
                .unwrap_or_else(|| input.invocation_id().to_string()),
        ))
    }
}

fn is_retryable(err: &SdkError<SendMessageError, HttpResponse>) -> bool {
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(context) => {
            let service_err: &SendMessageError = context.err();

            service_err.is_request_throttled()
                || service_err.is_kms_throttled()
                || service_err
                    .code()
                    .is_some_and(|code| THROTTLING_CODES.contains(&code))
                || context.raw().status().is_server_error()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_sqs::types::error::QueueDoesNotExist;
    use aws_smithy_mocks::{mock, mock_client};
    use model::{RequestType, Retryable};
    use test_utils::{TEST_WORKFLOW_QUEUE, create_workflow_input};

    #[tokio::test]
    async fn start_execution_enqueues_input() {
        let send_message_rule = mock!(aws_sdk_sqs::Client::send_message)
            .match_requests(|input| {
                let body: WorkflowInput = input
                    .message_body()
                    .and_then(|body| serde_json::from_str(body).ok())
                    .expect("Body should be a workflow input");

                input.queue_url() == Some(TEST_WORKFLOW_QUEUE)
                    && body.event.request_type == RequestType::Create
            })
            .then_output(|| SendMessageOutput::builder().message_id("message-1").build());

        let sqs: aws_sdk_sqs::Client = mock_client!(aws_sdk_sqs, [&send_message_rule]);
        let starter: SqsWorkflowStarter =
            SqsWorkflowStarter::new(sqs, TEST_WORKFLOW_QUEUE.to_string());

        let execution_id: ExecutionId = starter
            .start_execution(&create_workflow_input(RequestType::Create))
            .await
            .expect("Start should succeed");

        assert_eq!(ExecutionId("message-1".to_string()), execution_id);
        assert_eq!(1, send_message_rule.num_calls());
    }

    #[tokio::test]
    async fn missing_queue_is_not_retryable() {
        let send_message_rule = mock!(aws_sdk_sqs::Client::send_message).then_error(|| {
            SendMessageError::QueueDoesNotExist(QueueDoesNotExist::builder().build())
        });

        let sqs: aws_sdk_sqs::Client = mock_client!(aws_sdk_sqs, [&send_message_rule]);
        let starter: SqsWorkflowStarter =
            SqsWorkflowStarter::new(sqs, TEST_WORKFLOW_QUEUE.to_string());

        let err: StartError = starter
            .start_execution(&create_workflow_input(RequestType::Create))
            .await
            .expect_err("Start should fail");

        assert!(!err.is_retryable());
    }

    #[test]
    fn timeouts_are_retryable() {
        let timeout: SdkError<SendMessageError, HttpResponse> = SdkError::timeout_error("timed out");

        assert!(is_retryable(&timeout));
    }
}
