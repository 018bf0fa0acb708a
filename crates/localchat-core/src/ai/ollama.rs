use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::check_status;
use super::lines::LineBuffer;
use crate::engine::{
    Completion, CompletionRequest, CreateOptions, Engine, EngineHandle, EngineLoader,
};
use crate::error::EngineError;
use crate::state::Message;

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Message,
    #[allow(dead_code)]
    done: bool,
}

#[derive(Serialize)]
struct OllamaPullRequest<'a> {
    model: &'a str,
    stream: bool,
}

/// One line of the streamed `/api/pull` body.
#[derive(Deserialize, Debug, Default)]
struct PullStatus {
    #[serde(default)]
    status: String,
    digest: Option<String>,
    total: Option<u64>,
    completed: Option<u64>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaModelsResponse {
    models: Vec<OllamaModel>,
}

/// Byte counts per layer, folded into one overall fraction.
#[derive(Debug, Default)]
struct PullProgress {
    layers: HashMap<String, (u64, u64)>,
}

impl PullProgress {
    fn update(&mut self, status: &PullStatus) -> Option<f64> {
        let (Some(digest), Some(total)) = (&status.digest, status.total) else {
            return None;
        };
        let completed = status.completed.unwrap_or(0).min(total);
        self.layers.insert(digest.clone(), (completed, total));

        let (done, all) = self
            .layers
            .values()
            .fold((0u64, 0u64), |(d, a), (c, t)| (d + c, a + t));
        if all == 0 {
            return None;
        }
        Some(done as f64 / all as f64)
    }
}

/// Ollama tags carry an explicit `:latest` that users usually leave off.
fn model_matches(listed: &str, wanted: &str) -> bool {
    if listed == wanted {
        return true;
    }
    !wanted.contains(':') && listed.strip_suffix(":latest") == Some(wanted)
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn chat(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<Completion, EngineError> {
        let url = format!("{}/api/chat", self.base_url);

        let body = OllamaChatRequest {
            model,
            messages: &request.messages,
            stream: request.stream,
            options: Some(OllamaOptions {
                num_predict: request.max_tokens,
            }),
        };

        let response = self.client.post(&url).json(&body).send().await?;
        let response = check_status(response).await?;

        let chat: OllamaChatResponse = response.json().await?;
        Ok(Completion::from_content(chat.message.content))
    }

    /// Load a model into memory without generating anything.
    pub async fn load(&self, model: &str) -> Result<(), EngineError> {
        let url = format!("{}/api/chat", self.base_url);

        let body = OllamaChatRequest {
            model,
            messages: &[],
            stream: false,
            options: None,
        };

        let response = self.client.post(&url).json(&body).send().await?;
        check_status(response).await?;
        Ok(())
    }

    /// Download a model, reporting overall byte progress.
    pub async fn pull(&self, model: &str, options: &CreateOptions) -> Result<(), EngineError> {
        let url = format!("{}/api/pull", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&OllamaPullRequest {
                model,
                stream: true,
            })
            .send()
            .await?;
        let response = check_status(response).await?;

        let mut progress = PullProgress::default();
        let mut lines = LineBuffer::new();
        let mut byte_stream = response.bytes_stream();

        while let Some(chunk) = byte_stream.next().await {
            for line in lines.push(&chunk?) {
                Self::apply_pull_line(&line, &mut progress, options)?;
            }
        }
        if let Some(line) = lines.finish() {
            Self::apply_pull_line(&line, &mut progress, options)?;
        }
        Ok(())
    }

    fn apply_pull_line(
        line: &str,
        progress: &mut PullProgress,
        options: &CreateOptions,
    ) -> Result<(), EngineError> {
        let status: PullStatus = serde_json::from_str(line)?;
        if let Some(error) = &status.error {
            return Err(EngineError::Server(error.clone()));
        }
        tracing::debug!(status = %status.status, "pull");
        if let Some(fraction) = progress.update(&status) {
            options.report(fraction);
        }
        Ok(())
    }

    pub async fn list_models(&self) -> Result<Vec<String>, EngineError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await?;
        let response = check_status(response).await?;

        let models_response: OllamaModelsResponse = response.json().await?;
        let model_names: Vec<String> = models_response
            .models
            .into_iter()
            .map(|model| model.name)
            .collect();

        Ok(model_names)
    }

    pub async fn has_model(&self, name: &str) -> Result<bool, EngineError> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| model_matches(m, name)))
    }
}

pub struct OllamaEngine {
    client: OllamaClient,
    model: String,
}

#[async_trait]
impl Engine for OllamaEngine {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, EngineError> {
        self.client.chat(&self.model, request).await
    }
}

/// Creates engines backed by a running Ollama server, pulling the model
/// first when it is not installed.
pub struct OllamaLoader {
    client: OllamaClient,
}

impl OllamaLoader {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EngineLoader for OllamaLoader {
    async fn create(
        &self,
        model: &str,
        options: CreateOptions,
    ) -> Result<EngineHandle, EngineError> {
        options.report(0.0);

        if !self.client.has_model(model).await? {
            tracing::info!(%model, url = %self.client.base_url(), "model not installed, pulling");
            self.client.pull(model, &options).await?;
        }
        self.client.load(model).await?;
        options.report(1.0);

        Ok(Arc::new(OllamaEngine {
            client: self.client.clone(),
            model: model.to_string(),
        }))
    }
}
