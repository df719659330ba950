use dispatcher::{LifecycleDispatcher, dispatch_fn};
use lambda_runtime::{LambdaEvent, service_fn, tracing};
use model::env::{BRIDGE_HANDLER, BridgeConfig, ConfigError};
use model::Error;
use retry::RetryConfig;
use serde_json::Value;
use service_http::HttpCallbackSender;
use service_sqs::SqsWorkflowStarter;
use state_dynamodb::DynamoDbRecordStore;
use std::sync::Arc;
use std::time::Duration;
use workflow::runtime::WorkflowRuntime;
use workflow::{WorkflowLambdaEvent, workflow_fn};

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Which of the two entry points this function serves.
enum Handler {
    Dispatch,
    Workflow,
}

impl Handler {
    fn from_env() -> Result<Self, ConfigError> {
        let value: String =
            std::env::var(BRIDGE_HANDLER).map_err(|_| ConfigError::Missing(BRIDGE_HANDLER))?;

        match value.trim() {
            "dispatch" => Ok(Handler::Dispatch),
            "workflow" => Ok(Handler::Workflow),
            _ => Err(ConfigError::Invalid {
                name: BRIDGE_HANDLER,
                value,
            }),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let handler: Handler = Handler::from_env()?;
    let config: BridgeConfig = BridgeConfig::from_env()?;
    let aws_config = aws_config::load_from_env().await;
    let callback: HttpCallbackSender = HttpCallbackSender::new(CALLBACK_TIMEOUT)?;

    match handler {
        Handler::Dispatch => {
            let starter: SqsWorkflowStarter = SqsWorkflowStarter::new(
                aws_sdk_sqs::Client::new(&aws_config),
                config.require_workflow_queue_url()?.to_string(),
            );
            let dispatcher: LifecycleDispatcher =
                LifecycleDispatcher::new(Arc::new(starter), RetryConfig::dispatch(&config));

            let dispatcher: &LifecycleDispatcher = &dispatcher;
            let callback: &HttpCallbackSender = &callback;

            lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
                dispatch_fn(dispatcher, callback, event).await
            }))
            .await
        }
        Handler::Workflow => {
            let store: DynamoDbRecordStore =
                DynamoDbRecordStore::new(aws_sdk_dynamodb::Client::new(&aws_config));
            let runtime: WorkflowRuntime =
                WorkflowRuntime::new(Arc::new(store), Arc::new(callback), &config);

            let runtime: &WorkflowRuntime = &runtime;

            lambda_runtime::run(service_fn(move |event: WorkflowLambdaEvent| async move {
                workflow_fn(runtime, event).await
            }))
            .await
        }
    }
}
