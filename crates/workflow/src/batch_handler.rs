use aws_lambda_events::sqs::{BatchItemFailure, SqsBatchResponse, SqsEventObj, SqsMessageObj};
use lambda_runtime::tracing::instrument::Instrumented;
use lambda_runtime::tracing::{Instrument, Span};
use lambda_runtime::{Error, LambdaEvent, tracing};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::future::Future;

/// Run `handler` over every message of the batch concurrently, reporting the
/// ids of the messages it failed so that only those are redelivered.
pub(crate) async fn handle_sqs_batch<Handler, Body, Output, Fut, E>(
    handler: Handler,
    event: LambdaEvent<SqsEventObj<Body>>,
) -> Result<SqsBatchResponse, Error>
where
    Handler: Fn(Body) -> Fut,
    Fut: Future<Output = Result<Output, E>>,
    Body: DeserializeOwned + Serialize + Clone,
    E: Display,
{
    let records: Vec<SqsMessageObj<Body>> = event.payload.records;

    tracing::info!("Handling batch of [{}] from SQS", records.len());

    let (ids, tasks): (Vec<String>, Vec<Instrumented<Fut>>) = records
        .into_iter()
        .map(|message: SqsMessageObj<Body>| {
            // Needed to report the failure back to SQS
            let message_id: String = message.message_id.unwrap_or_default();

            let message_span: Span =
                tracing::span!(tracing::Level::INFO, "SQS Handler", message_id);

            let task: Instrumented<Fut> = handler(message.body).instrument(message_span);

            (message_id, task)
        })
        .unzip();

    let results: Vec<Result<Output, E>> = futures::future::join_all(tasks).await;

    Ok(SqsBatchResponse {
        batch_item_failures: collect_batch_failures(ids.into_iter().zip(results)),
    })
}

fn collect_batch_failures<Output, E: Display>(
    results: impl Iterator<Item = (String, Result<Output, E>)>,
) -> Vec<BatchItemFailure> {
    results
        .filter_map(|(message_id, result)| match result {
            Ok(_) => None,
            Err(err) => {
                tracing::error!("Failed to process msg {message_id}, {err}");

                Some(message_id)
            }
        })
        .map(|item_identifier| BatchItemFailure { item_identifier })
        .collect()
}
