use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, Url};
use service::{CallbackError, CallbackReceipt, CallbackSender};
use std::time::Duration;

/// Delivers callbacks with a single unauthenticated `PUT`.
#[derive(Clone)]
pub struct HttpCallbackSender {
    client: Client,
}

impl HttpCallbackSender {
    pub fn new(timeout: Duration) -> Result<Self, CallbackError> {
        let client: Client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CallbackError::Transport(err.into()))?;

        Ok(Self::from_client(client))
    }

    pub fn from_client(client: Client) -> Self {
        HttpCallbackSender { client }
    }
}

#[async_trait]
impl CallbackSender for HttpCallbackSender {
    async fn put(&self, url: &str, body: String) -> Result<CallbackReceipt, CallbackError> {
        let target: Url = Url::parse(url).map_err(|err| CallbackError::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        })?;

        // Pre-signed endpoints reject any content type they weren't signed with
        let content_length: usize = body.len();
        let response = self
            .client
            .put(target)
            .header(CONTENT_TYPE, "")
            .header(CONTENT_LENGTH, content_length)
            .body(body)
            .send()
            .await
            .map_err(|err| CallbackError::Transport(err.into()))?;

        let receipt: CallbackReceipt = CallbackReceipt {
            status_code: response.status().as_u16(),
        };

        tracing::debug!(
            status_code = receipt.status_code,
            status = response.status().canonical_reason(),
            "Callback answered"
        );

        Ok(receipt)
    }
}
