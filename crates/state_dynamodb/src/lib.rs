use async_trait::async_trait;
use aws_sdk_dynamodb::config::http::HttpResponse;
use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::put_item::{PutItemError, PutItemOutput};
use aws_sdk_dynamodb::types::AttributeValue;
use model::MutationRecord;
use state::StoreErrorReason::{BackendFailure, BadRecord};
use state::StoreOperation::PutRecord;
use state::{RecordStore, StoreError};
use std::collections::HashMap;

/// Error codes DynamoDB returns when a request was rejected for rate.
const THROTTLING_CODES: &[&str] = &["ThrottlingException", "ThrottledException"];

/// Store writing each record as one DynamoDB item.
pub struct DynamoDbRecordStore {
    dynamodb_client: aws_sdk_dynamodb::Client,
}

impl DynamoDbRecordStore {
    pub fn new(dynamodb_client: aws_sdk_dynamodb::Client) -> Self {
        DynamoDbRecordStore { dynamodb_client }
    }

    async fn put_item(
        &self,
        table: &str,
        item: HashMap<String, AttributeValue>,
    ) -> Result<PutItemOutput, SdkError<PutItemError, HttpResponse>> {
        self.dynamodb_client
            .put_item()
            .table_name(table)
            .set_item(Some(item))
            .send()
            .await
    }
}

#[async_trait]
impl RecordStore for DynamoDbRecordStore {
    async fn put_record(&self, table: &str, record: &MutationRecord) -> Result<(), StoreError> {
        let state_key: String = record.key().to_string();

        let item: HashMap<String, AttributeValue> =
            serde_dynamo::to_item(record).map_err(|err| {
                StoreError::new(state_key.clone(), PutRecord, BadRecord(err.to_string()), false)
            })?;

        tracing::debug!(table, state_key, "Putting item");

        self.put_item(table, item).await.map_err(|err| {
            let retryable: bool = is_retryable(&err);

            StoreError::new(state_key.clone(), PutRecord, BackendFailure(err.into()), retryable)
        })?;

        Ok(())
    }
}

/// Transport failures and capacity rejections are worth another attempt,
/// anything the service refused on its merits is not.
fn is_retryable(err: &SdkError<PutItemError, HttpResponse>) -> bool {
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(context) => {
            let service_err: &PutItemError = context.err();

            service_err.is_provisioned_throughput_exceeded_exception()
                || service_err.is_request_limit_exceeded()
                || service_err.is_internal_server_error()
                || service_err.is_transaction_conflict_exception()
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
    use aws_sdk_dynamodb::types::error::{
        ConditionalCheckFailedException, ProvisionedThroughputExceededException,
        ResourceNotFoundException,
    };
    use aws_smithy_mocks::{mock, mock_client};
    use aws_smithy_runtime_api::http::StatusCode;
    use aws_smithy_types::body::SdkBody;
    use model::{LastOperation, Retryable};

    fn create_record() -> MutationRecord {
        MutationRecord {
            pk: "p1".to_string(),
            sk: "s1".to_string(),
            ts: "100".to_string(),
            last_operation: LastOperation::Create,
        }
    }

    fn service_error(err: PutItemError) -> SdkError<PutItemError, HttpResponse> {
        let status: StatusCode = StatusCode::try_from(400).expect("Valid status code");

        SdkError::service_error(err, HttpResponse::new(status, SdkBody::empty()))
    }

    #[tokio::test]
    async fn put_record_writes_item_attributes() {
        let put_item_rule = mock!(aws_sdk_dynamodb::Client::put_item)
            .match_requests(|input| {
                let item = input.item().expect("Item should be set");

                input.table_name() == Some("T")
                    && item.get("pk") == Some(&AttributeValue::S("p1".to_string()))
                    && item.get("sk") == Some(&AttributeValue::S("s1".to_string()))
                    && item.get("ts") == Some(&AttributeValue::S("100".to_string()))
                    && item.get("lastOperation") == Some(&AttributeValue::S("create".to_string()))
            })
            .then_output(|| PutItemOutput::builder().build());

        let dynamodb_client: aws_sdk_dynamodb::Client =
            mock_client!(aws_sdk_dynamodb, [&put_item_rule]);
        let store: DynamoDbRecordStore = DynamoDbRecordStore::new(dynamodb_client);

        store
            .put_record("T", &create_record())
            .await
            .expect("Put should succeed");

        assert_eq!(1, put_item_rule.num_calls());
    }

    #[tokio::test]
    async fn missing_table_is_not_retryable() {
        let put_item_rule = mock!(aws_sdk_dynamodb::Client::put_item).then_error(|| {
            PutItemError::ResourceNotFoundException(
                ResourceNotFoundException::builder()
                    .message("Requested resource not found")
                    .build(),
            )
        });

        let dynamodb_client: aws_sdk_dynamodb::Client =
            mock_client!(aws_sdk_dynamodb, [&put_item_rule]);
        let store: DynamoDbRecordStore = DynamoDbRecordStore::new(dynamodb_client);

        let err: StoreError = store
            .put_record("T", &create_record())
            .await
            .expect_err("Put should fail");

        assert!(!err.is_retryable());
        assert_eq!("p1#s1", err.state_key);
    }

    #[test]
    fn throughput_exceeded_is_retryable() {
        let err = service_error(PutItemError::ProvisionedThroughputExceededException(
            ProvisionedThroughputExceededException::builder().build(),
        ));

        assert!(is_retryable(&err));
    }

    #[test]
    fn failed_condition_is_not_retryable() {
        let err = service_error(PutItemError::ConditionalCheckFailedException(
            ConditionalCheckFailedException::builder().build(),
        ));

        assert!(!is_retryable(&err));
    }

    #[test]
    fn timeouts_are_retryable_but_construction_failures_are_not() {
        let timeout: SdkError<PutItemError, HttpResponse> = SdkError::timeout_error("timed out");
        let construction: SdkError<PutItemError, HttpResponse> =
            SdkError::construction_failure("missing table name");

        assert!(is_retryable(&timeout));
        assert!(!is_retryable(&construction));
    }
}
