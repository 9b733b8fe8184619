use async_trait::async_trait;
use sidecar_core::{Event, TraceContext, TRACEPARENT};

use super::{AppClient, RelayError};

/// Posts the event as JSON to `http://<host>:<port><path>`. Any 2xx is success.
pub struct HttpAppClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAppClient {
    #[must_use]
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("http://{host}:{port}"),
        }
    }
}

#[async_trait]
impl AppClient for HttpAppClient {
    async fn call(
        &self,
        target: &str,
        event: &Event,
        trace: &TraceContext,
    ) -> Result<(), RelayError> {
        let body = serde_json::to_vec(event).map_err(|e| RelayError::Encode(e.to_string()))?;
        let response = self
            .client
            .post(format!("{}{target}", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(TRACEPARENT, trace.to_traceparent())
            .body(body)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let detail = response.text().await.unwrap_or_default();
        Err(RelayError::Rejected {
            status: status.as_u16().to_string(),
            detail,
        })
    }
}
