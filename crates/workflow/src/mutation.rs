use lambda_runtime::tracing;
use model::{
    ErrorInfo, LastOperation, MutationData, MutationRecord, ParseError, Retryable, TagDelta,
    WorkflowInput,
};
use retry::{RetryConfig, RetryingClient};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use state::{RecordStore, StoreError};
use std::sync::Arc;

/// Failure of a mutation task, caught by the graph and turned into `errorInfo`.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TaskError {
    pub fn name(&self) -> &'static str {
        match self {
            TaskError::Parse(_) => "ParseError",
            TaskError::Store(_) => "StoreError",
        }
    }

    pub fn error_info(&self) -> ErrorInfo {
        ErrorInfo::new(self.name(), self.to_string())
    }
}

impl Retryable for TaskError {
    fn is_retryable(&self) -> bool {
        match self {
            TaskError::Parse(err) => err.is_retryable(),
            TaskError::Store(err) => err.is_retryable(),
        }
    }
}

/// What a successful mutation wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationOutcome {
    pub table: String,
    pub record: MutationRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagDelta>,
}

impl MutationOutcome {
    /// `Data` returned through the callback.
    pub fn response_data(&self) -> Map<String, Value> {
        let mut data: Map<String, Value> = Map::new();
        data.insert(
            "LastOperation".to_string(),
            json!(self.record.last_operation.as_str()),
        );
        data.insert("pk".to_string(), json!(self.record.pk));
        data.insert("sk".to_string(), json!(self.record.sk));

        if let Some(tags) = &self.tags {
            data.insert("TagsAdded".to_string(), json!(tags.tags_to_be_added.len()));
            data.insert(
                "TagsRemoved".to_string(),
                json!(tags.tags_to_be_removed.len()),
            );
        }

        data
    }
}

/// Writes the resource's `{pk, sk, ts}` row stamped with one `LastOperation`.
pub struct MutationTask {
    operation: LastOperation,
    store: Arc<dyn RecordStore>,
    retry: RetryingClient,
    table_override: Option<String>,
}

impl MutationTask {
    pub fn new(
        operation: LastOperation,
        store: Arc<dyn RecordStore>,
        retry: RetryConfig,
        table_override: Option<String>,
    ) -> Self {
        MutationTask {
            operation,
            store,
            retry: RetryingClient::new("put_record", retry),
            table_override,
        }
    }

    pub async fn run(&self, input: &WorkflowInput) -> Result<MutationOutcome, TaskError> {
        let data: MutationData = input.event.mutation_data()?;

        let table: String = match &self.table_override {
            Some(table) => table.clone(),
            None => input.event.target_table()?.to_string(),
        };

        let tags: Option<TagDelta> = input.event.tag_delta()?;
        let record: MutationRecord = MutationRecord::new(data, self.operation);

        tracing::info!(
            table = table.as_str(),
            state_key = %record.key(),
            operation = %self.operation,
            "Writing mutation record"
        );

        self.retry
            .execute(|| self.store.put_record(&table, &record))
            .await?;

        Ok(MutationOutcome {
            table,
            record,
            tags,
        })
    }
}
