pub mod env;
pub mod event;
pub mod invocation;
pub mod record;
pub mod response;
pub mod tags;

pub use event::{EventIdentity, LifecycleEvent, MutationData, RequestType, ResourceProperties};
pub use invocation::{InvocationContext, InvocationId, WorkflowInput};
pub use record::{LastOperation, MutationRecord, RecordKey};
pub use response::{CallbackBody, ErrorInfo, ProviderAcknowledgment, ResponseEnvelope, ResponseStatus};
pub use tags::TagDelta;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// Whether a failed remote call may be attempted again.
///
/// The classification always comes from the failing call's own client,
/// callers never reclassify an error they did not produce.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Errors raised while validating an inbound lifecycle event.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("missing required resource property `{0}`")]
    MissingProperty(&'static str),
    #[error("resource property `{property}` is not valid JSON: {source}")]
    InvalidJson {
        property: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("lifecycle event is malformed: {0}")]
    InvalidEvent(#[source] serde_json::Error),
    #[error("request type `{0}` is not supported")]
    UnsupportedRequestType(String),
}

impl Retryable for ParseError {
    fn is_retryable(&self) -> bool {
        false
    }
}
