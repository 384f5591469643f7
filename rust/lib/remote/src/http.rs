use std::sync::Arc;

use tracing::debug;

use crate::{Envelope, OperationRequest, RemoteError, RemoteService, TokenSource};

/// Operation service reached over HTTP.
///
/// Every operation is a POST of `{operationName, variables}` to a single
/// endpoint; the response is an [`Envelope`]. No request is retried.
pub struct HttpRemote {
    http: reqwest::Client,
    endpoint: String,
    token_source: Arc<dyn TokenSource>,
}

impl HttpRemote {
    pub fn new(endpoint: impl Into<String>, token_source: Arc<dyn TokenSource>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token_source,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build a request with auth header.
    async fn authed(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, RemoteError> {
        match self.token_source.token().await? {
            Some(token) => Ok(builder.bearer_auth(token)),
            None => Ok(builder),
        }
    }
}

#[async_trait::async_trait]
impl RemoteService for HttpRemote {
    async fn execute_raw(
        &self,
        name: &str,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value, RemoteError> {
        let body = OperationRequest {
            operation_name: name.to_string(),
            variables,
        };
        let req = self.authed(self.http.post(&self.endpoint).json(&body)).await?;
        let resp = req.send().await?;

        let status = resp.status();
        debug!(operation = name, status = status.as_u16(), "remote response");
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope = resp
            .json()
            .await
            .map_err(|e| RemoteError::Decode(format!("{}: {}", name, e)))?;
        envelope.into_result()
    }
}
