//! HTTP client for workflow-style generation endpoints.
//!
//! Each capability is served by its own workflow. A call posts the
//! character, act, question and rendered memory as workflow inputs in
//! blocking mode and reads the text output from `data.outputs`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GenerationError;
use crate::request::{Capability, GenerationRequest};
use crate::service::GenerationService;

/// Output keys checked, in order, for the generated text.
const TEXT_OUTPUT_KEYS: [&str; 3] = ["text", "answer", "result"];

/// Connection settings for [`HttpGenerationService`].
#[derive(Debug, Clone)]
pub struct HttpGenerationConfig {
    /// Workflow URL for [`Capability::Monologue`].
    pub monologue_url: String,
    /// Workflow URL for [`Capability::AnswerQuestion`].
    pub qna_url: String,
    /// Bearer token sent with every request.
    pub api_key: String,
    /// End-user identifier reported to the service.
    pub user: String,
}

#[derive(Debug, Serialize)]
struct WorkflowInputs<'a> {
    char_id: &'a str,
    act_num: u32,
    query: &'a str,
    context: String,
}

#[derive(Debug, Serialize)]
struct WorkflowRunRequest<'a> {
    inputs: WorkflowInputs<'a>,
    response_mode: &'static str,
    user: &'a str,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunResponse {
    data: WorkflowRunData,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunData {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    outputs: serde_json::Map<String, serde_json::Value>,
}

/// [`GenerationService`] backed by HTTP workflow endpoints.
#[derive(Debug, Clone)]
pub struct HttpGenerationService {
    client: Client,
    config: HttpGenerationConfig,
}

impl HttpGenerationService {
    /// Creates a service with a fresh connection pool.
    #[must_use]
    pub fn new(config: HttpGenerationConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url_for(&self, capability: Capability) -> &str {
        match capability {
            Capability::Monologue => &self.config.monologue_url,
            Capability::AnswerQuestion => &self.config.qna_url,
        }
    }
}

/// Pulls the generated text out of a workflow response body.
fn extract_text(response: WorkflowRunResponse) -> Result<String, GenerationError> {
    let data = response.data;
    if let Some(status) = data.status.as_deref() {
        if status != "succeeded" {
            let reason = data.error.unwrap_or_else(|| status.to_owned());
            return Err(GenerationError::Malformed(format!(
                "workflow did not succeed: {reason}"
            )));
        }
    }
    TEXT_OUTPUT_KEYS
        .iter()
        .find_map(|key| data.outputs.get(*key).and_then(serde_json::Value::as_str))
        .map(str::to_owned)
        .ok_or_else(|| GenerationError::Malformed("no text output in workflow response".to_owned()))
}

#[async_trait]
impl GenerationService for HttpGenerationService {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let url = self.url_for(request.capability);
        let body = WorkflowRunRequest {
            inputs: WorkflowInputs {
                char_id: &request.character_id,
                act_num: request.act_number,
                query: request.question_text.as_deref().unwrap_or_default(),
                context: request.context.join("\n"),
            },
            response_mode: "blocking",
            user: &self.config.user,
        };

        debug!(capability = request.capability.as_str(), url, "calling generation workflow");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GenerationError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: WorkflowRunResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        extract_text(parsed)
    }
}
