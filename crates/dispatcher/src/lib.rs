//! Entry point receiving lifecycle events from the provisioning platform.
//!
//! The dispatcher only hands the event to a workflow and answers straight
//! away. The real outcome reaches the caller later through the callback the
//! workflow sends.

use lambda_runtime::{Context, LambdaEvent, tracing};
use model::{
    Error, ErrorInfo, EventIdentity, InvocationContext, LifecycleEvent, ParseError,
    ProviderAcknowledgment, ResponseEnvelope, Retryable, WorkflowInput,
};
use retry::{RetryConfig, RetryingClient};
use serde_json::{Map, Value};
use service::{CallbackSender, ExecutionId, StartError, WorkflowStarter};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("request type `{0}` is not supported")]
    UnsupportedRequestType(String),
    #[error(transparent)]
    Parse(ParseError),
    #[error(transparent)]
    Start(#[from] StartError),
}

impl From<ParseError> for DispatchError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::UnsupportedRequestType(request_type) => {
                DispatchError::UnsupportedRequestType(request_type)
            }
            err => DispatchError::Parse(err),
        }
    }
}

impl DispatchError {
    pub fn name(&self) -> &'static str {
        match self {
            DispatchError::UnsupportedRequestType(_) => "UnsupportedRequestType",
            DispatchError::Parse(_) => "ParseError",
            DispatchError::Start(_) => "StartError",
        }
    }
}

impl Retryable for DispatchError {
    fn is_retryable(&self) -> bool {
        match self {
            DispatchError::Start(err) => err.is_retryable(),
            _ => false,
        }
    }
}

/// A workflow accepted for an event.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub physical_resource_id: Option<String>,
    pub execution_id: ExecutionId,
}

pub struct LifecycleDispatcher {
    starter: Arc<dyn WorkflowStarter>,
    retry: RetryingClient,
}

impl LifecycleDispatcher {
    pub fn new(starter: Arc<dyn WorkflowStarter>, retry: RetryConfig) -> Self {
        LifecycleDispatcher {
            starter,
            retry: RetryingClient::new("start_execution", retry),
        }
    }

    /// Validate the event and start its workflow, without waiting for it to run.
    pub async fn try_dispatch(
        &self,
        event: LifecycleEvent,
        context: InvocationContext,
    ) -> Result<Dispatched, DispatchError> {
        event.validate()?;

        let physical_resource_id: Option<String> = event.physical_resource_id();
        let input: WorkflowInput = WorkflowInput::new(event, context);

        let execution_id: ExecutionId = self
            .retry
            .execute(|| self.starter.start_execution(&input))
            .await?;

        tracing::info!(
            starter = self.starter.name(),
            %execution_id,
            physical_resource_id = physical_resource_id.as_deref(),
            "Workflow started"
        );

        Ok(Dispatched {
            physical_resource_id,
            execution_id,
        })
    }

    /// The immediate answer to a lifecycle event.
    pub async fn dispatch(
        &self,
        event: LifecycleEvent,
        context: InvocationContext,
    ) -> ResponseEnvelope {
        // Failures only echo an id the caller supplied
        let physical_resource_id: Option<String> = event.physical_resource_id.clone();

        match self.try_dispatch(event, context).await {
            Ok(dispatched) => {
                ResponseEnvelope::success(dispatched.physical_resource_id, Map::new())
            }
            Err(err) => {
                tracing::error!(error = err.name(), "Dispatch failed: {err}");

                ResponseEnvelope::failed(
                    physical_resource_id,
                    ErrorInfo::new(err.name(), err.to_string()),
                )
            }
        }
    }
}

fn invocation_context(context: &Context) -> InvocationContext {
    InvocationContext {
        aws_request_id: context.request_id.clone(),
        invoked_function_arn: Some(context.invoked_function_arn.clone()),
        deadline_ms: Some(context.deadline),
    }
}

fn failed_to_parse(identity: &EventIdentity, err: ParseError) -> ResponseEnvelope {
    let err: DispatchError = DispatchError::from(err);

    tracing::error!(error = err.name(), "Rejecting lifecycle event: {err}");

    ResponseEnvelope::failed(
        identity.physical_resource_id.clone(),
        ErrorInfo::new(err.name(), err.to_string()),
    )
}

/// Lambda handler for lifecycle events.
///
/// The payload is taken raw so that an event which doesn't parse is still
/// answered. When it carries a `ResponseURL` the envelope is also acknowledged
/// there, once, through `acknowledger`.
pub async fn dispatch_fn(
    dispatcher: &LifecycleDispatcher,
    acknowledger: &dyn CallbackSender,
    event: LambdaEvent<Value>,
) -> Result<ResponseEnvelope, Error> {
    let LambdaEvent { payload, context } = event;
    let identity: EventIdentity = EventIdentity::from_value(&payload);

    let envelope: ResponseEnvelope = match LifecycleEvent::parse(payload) {
        Ok(event) => {
            tracing::info!(
                request_type = %event.request_type,
                request_id = event.request_id.as_deref(),
                "Dispatching lifecycle event"
            );

            dispatcher.dispatch(event, invocation_context(&context)).await
        }
        Err(err) => failed_to_parse(&identity, err),
    };

    if let Some(url) = &identity.response_url {
        let acknowledgment: ProviderAcknowledgment = ProviderAcknowledgment::new(
            &identity,
            &envelope,
            &context.env_config.log_stream,
        );

        match acknowledger.put(url, serde_json::to_string(&acknowledgment)?).await {
            Ok(receipt) => tracing::info!(status_code = receipt.status_code, "Acknowledged"),
            Err(err) => tracing::error!("Acknowledgment failed: {err}"),
        }
    }

    Ok(envelope)
}
