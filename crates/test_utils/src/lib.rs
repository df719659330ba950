use async_trait::async_trait;
use aws_lambda_events::sqs::SqsMessageObj;
use model::{
    InvocationContext, LifecycleEvent, MutationRecord, RequestType, ResourceProperties,
    WorkflowInput,
};
use serde::Serialize;
use serde_json::{Value, json};
use service::{
    CallbackError, CallbackReceipt, CallbackSender, ExecutionId, StartError, WorkflowStarter,
};
use state::{RecordStore, StoreError};
use state_in_memory::InMemoryRecordStore;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Test resource values
pub const TEST_TABLE: &str = "T";
pub const TEST_CALLBACK_URL: &str = "https://callback.test/wait-condition/handle";
pub const TEST_RESPONSE_URL: &str = "https://provider.test/ack";
pub const TEST_WORKFLOW_QUEUE: &str = "workflow_queue";
pub const TEST_REQUEST_ID: &str = "request-1";

/// Create a dummy SQS message with a set body
pub fn sqs_message_with_body<T>(body: T) -> SqsMessageObj<T>
where
    T: Serialize + Clone,
{
    SqsMessageObj {
        message_id: None,
        receipt_handle: None,
        body,
        md5_of_body: None,
        md5_of_message_attributes: None,
        attributes: Default::default(),
        message_attributes: Default::default(),
        event_source_arn: None,
        event_source: None,
        aws_region: None,
    }
}

/// A lifecycle event for table `T` carrying `{pk: p1, sk: s1, ts: 100}`.
pub fn create_event(request_type: RequestType) -> LifecycleEvent {
    LifecycleEvent {
        request_type,
        resource_properties: ResourceProperties {
            ddb_table: Some(TEST_TABLE.to_string()),
            data: Some(json!("{\"pk\":\"p1\",\"sk\":\"s1\",\"ts\":\"100\"}")),
            callback_url: Some(TEST_CALLBACK_URL.to_string()),
            tags: None,
            other: Default::default(),
        },
        old_resource_properties: None,
        physical_resource_id: None,
        response_url: None,
        stack_id: Some("stack-1".to_string()),
        request_id: Some(TEST_REQUEST_ID.to_string()),
        logical_resource_id: Some("Loader".to_string()),
        resource_type: Some("Custom::Loader".to_string()),
        service_token: None,
    }
}

pub fn create_workflow_input(request_type: RequestType) -> WorkflowInput {
    WorkflowInput::new(
        create_event(request_type),
        InvocationContext {
            aws_request_id: "lambda-request-1".to_string(),
            invoked_function_arn: None,
            deadline_ms: None,
        },
    )
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCallback {
    pub url: String,
    pub body: String,
}

impl RecordedCallback {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

/// Callback sender remembering every call, optionally failing each of them.
#[derive(Clone, Default)]
pub struct RecordingCallbackSender {
    calls: Arc<Mutex<Vec<RecordedCallback>>>,
    unreachable: bool,
}

impl RecordingCallbackSender {
    /// Every call fails as if the endpoint couldn't be reached.
    pub fn unreachable() -> Self {
        RecordingCallbackSender {
            unreachable: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<RecordedCallback> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl CallbackSender for RecordingCallbackSender {
    async fn put(&self, url: &str, body: String) -> Result<CallbackReceipt, CallbackError> {
        lock(&self.calls).push(RecordedCallback {
            url: url.to_string(),
            body,
        });

        if self.unreachable {
            return Err(CallbackError::Transport("connection refused".into()));
        }

        Ok(CallbackReceipt { status_code: 200 })
    }
}

/// Record store failing the first `failures` writes before delegating to memory.
pub struct FlakyRecordStore {
    inner: InMemoryRecordStore,
    failures: u32,
    retryable: bool,
    calls: AtomicU32,
}

impl FlakyRecordStore {
    pub fn new(inner: InMemoryRecordStore, failures: u32, retryable: bool) -> Self {
        FlakyRecordStore {
            inner,
            failures,
            retryable,
            calls: AtomicU32::new(0),
        }
    }

    pub fn always_failing(retryable: bool) -> Self {
        Self::new(InMemoryRecordStore::default(), u32::MAX, retryable)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &InMemoryRecordStore {
        &self.inner
    }
}

#[async_trait]
impl RecordStore for FlakyRecordStore {
    async fn put_record(&self, table: &str, record: &MutationRecord) -> Result<(), StoreError> {
        let call: u32 = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if call <= self.failures {
            let state_key: String = record.key().to_string();

            return Err(if self.retryable {
                StoreError::transient(state_key, "injected throttling")
            } else {
                StoreError::permanent(state_key, "injected access denied")
            });
        }

        self.inner.put_record(table, record).await
    }
}

/// Workflow starter failing the first `failures` starts and recording the rest.
#[derive(Default)]
pub struct ScriptedStarter {
    failures: u32,
    retryable: bool,
    calls: AtomicU32,
    started: Mutex<Vec<WorkflowInput>>,
}

impl ScriptedStarter {
    pub fn new(failures: u32, retryable: bool) -> Self {
        ScriptedStarter {
            failures,
            retryable,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> Vec<WorkflowInput> {
        lock(&self.started).clone()
    }
}

#[async_trait]
impl WorkflowStarter for ScriptedStarter {
    fn name(&self) -> &'static str {
        "ScriptedStarter"
    }

    async fn start_execution(&self, input: &WorkflowInput) -> Result<ExecutionId, StartError> {
        let call: u32 = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if call <= self.failures {
            return Err(StartError::Backend {
                source: "injected start failure".into(),
                retryable: self.retryable,
            });
        }

        lock(&self.started).push(input.clone());

        Ok(ExecutionId(format!("execution-{call}")))
    }
}
