//! CozeWorkflowClient -- concrete [`WorkflowGateway`] for Coze workflows.
//!
//! Endpoints:
//! - `POST /v1/conversation/create` (no retry)
//! - `POST /v1/workflow/execute` (retried per [`RetryPolicy`])
//! - `POST /v1/workflow/stream_execute` (line-delimited `data:` frames)
//!
//! Every response is a `{code, msg, data}` envelope; a non-zero `code` is an
//! error even on HTTP 200. The API key is a [`SecretString`] and only leaves
//! it when building the `Authorization` header.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;

use kfbridge_core::workflow::gateway::{ConversationCreator, WorkflowGateway, WorkflowStream};
use kfbridge_core::workflow::retry::{RetryPolicy, run_with_retry};
use kfbridge_types::config::CozeConfig;
use kfbridge_types::error::WorkflowError;
use kfbridge_types::workflow::{
    ConversationCreated, WorkflowEnvelope, WorkflowInvocation, WorkflowRequest, WorkflowResult,
};

use super::streaming::{LineBuffer, parse_data_line};

const CREATE_CONVERSATION_PATH: &str = "/v1/conversation/create";
const EXECUTE_PATH: &str = "/v1/workflow/execute";
const STREAM_EXECUTE_PATH: &str = "/v1/workflow/stream_execute";

pub struct CozeWorkflowClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    workflow_id: String,
    retry: RetryPolicy,
}

// No Debug: keeps the client (and its key) out of log output entirely.

impl CozeWorkflowClient {
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        workflow_id: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, WorkflowError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WorkflowError::Network {
                message: format!("failed to build HTTP client: {e}"),
                timeout: false,
            })?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            workflow_id: workflow_id.into(),
            retry,
        })
    }

    pub fn from_config(config: &CozeConfig) -> Result<Self, WorkflowError> {
        Self::new(
            SecretString::from(config.api_key.expose_secret().to_string()),
            config.api_base_url.clone(),
            config.workflow_id.clone(),
            Duration::from_millis(config.timeout_ms),
            RetryPolicy::new(config.max_retries, Duration::from_millis(config.retry_delay_ms)),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key.expose_secret())
    }

    /// One POST, mapped into the workflow error taxonomy.
    async fn post_envelope<B, T>(&self, path: &str, body: &B) -> Result<T, WorkflowError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path))
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .json(body)
            .send()
            .await
            .map_err(network_error)?;

        let response = check_status(response).await?;
        // The deadline can fire mid-body; that is a network failure, not bad JSON.
        let bytes = response.bytes().await.map_err(network_error)?;
        let envelope: WorkflowEnvelope<T> = serde_json::from_slice(&bytes)
            .map_err(|e| WorkflowError::Deserialization(e.to_string()))?;

        if envelope.code != 0 {
            return Err(WorkflowError::Api {
                code: envelope.code,
                msg: envelope.msg,
            });
        }
        envelope
            .data
            .ok_or_else(|| WorkflowError::Deserialization("response has no data".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Response mapping helpers
// ---------------------------------------------------------------------------

fn network_error(e: reqwest::Error) -> WorkflowError {
    WorkflowError::Network {
        message: e.to_string(),
        timeout: e.is_timeout(),
    }
}

/// `Retry-After` in whole or fractional seconds, converted to milliseconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    let seconds: f64 = raw.parse().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then(|| (seconds * 1000.0) as u64)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, WorkflowError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after_ms = parse_retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();
    Err(WorkflowError::Http {
        status: status.as_u16(),
        body,
        retry_after_ms,
    })
}

// ---------------------------------------------------------------------------
// Port implementations
// ---------------------------------------------------------------------------

impl ConversationCreator for CozeWorkflowClient {
    async fn create_conversation(&self) -> Result<String, WorkflowError> {
        let created: ConversationCreated = self
            .post_envelope(CREATE_CONVERSATION_PATH, &serde_json::json!({}))
            .await?;
        tracing::debug!(conversation_id = %created.id, "conversation created");
        Ok(created.id)
    }
}

impl WorkflowGateway for CozeWorkflowClient {
    async fn execute_workflow(
        &self,
        input: &str,
        context_id: &str,
    ) -> Result<WorkflowResult, WorkflowError> {
        let invocation = WorkflowInvocation {
            input: input.to_string(),
            context_id: context_id.to_string(),
            stream: false,
        };
        let request = WorkflowRequest::new(&self.workflow_id, &invocation);

        let result: WorkflowResult = run_with_retry(&self.retry, "execute_workflow", |attempt| {
            let request = &request;
            async move {
                tracing::debug!(attempt, context_id = %request.context_id, "executing workflow");
                self.post_envelope(EXECUTE_PATH, request).await
            }
        })
        .await?;

        tracing::info!(status = %result.status, context_id, "workflow finished");
        Ok(result)
    }

    fn execute_workflow_stream(&self, input: &str, context_id: &str) -> WorkflowStream {
        let invocation = WorkflowInvocation {
            input: input.to_string(),
            context_id: context_id.to_string(),
            stream: true,
        };
        let request = WorkflowRequest::new(&self.workflow_id, &invocation);
        let client = self.client.clone();
        let url = self.url(STREAM_EXECUTE_PATH);
        let bearer = self.bearer();

        Box::pin(async_stream::try_stream! {
            let response = client
                .post(&url)
                .header(reqwest::header::AUTHORIZATION, bearer)
                .json(&request)
                .send()
                .await
                .map_err(network_error)?;
            let response = check_status(response).await?;

            let mut body = response.bytes_stream();
            let mut lines = LineBuffer::new();
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|e| WorkflowError::Stream(e.to_string()))?;
                for line in lines.push(&chunk) {
                    if let Some(content) = parse_data_line(&line) {
                        yield content;
                    }
                }
            }
            if let Some(content) = lines.finish().as_deref().and_then(parse_data_line) {
                yield content;
            }
        })
    }
}
