use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

use super::check_status;
use crate::engine::{
    Choice, Completion, CompletionRequest, CreateOptions, Engine, EngineHandle, EngineLoader,
};
use crate::error::EngineError;
use crate::state::{Message, Role};

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIModel {
    id: String,
}

#[derive(Deserialize)]
struct OpenAIModelsResponse {
    data: Vec<OpenAIModel>,
}

/// Client for any server speaking the OpenAI chat completions API
/// (llama.cpp server, vLLM, LM Studio, ...).
#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAIClient {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {}", key)),
            None => builder,
        }
    }

    pub async fn chat(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<Completion, EngineError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = OpenAIRequest {
            model,
            messages: &request.messages,
            stream: request.stream,
            max_tokens: request.max_tokens,
        };

        let response = self.authorize(self.client.post(&url)).json(&body).send().await?;
        let response = check_status(response).await?;

        let openai_response: OpenAIResponse = response.json().await?;
        let choices = openai_response
            .choices
            .into_iter()
            .map(|c| Choice {
                message: Message {
                    role: Role::Assistant,
                    content: c.message.content.unwrap_or_default(),
                },
            })
            .collect();
        Ok(Completion { choices })
    }

    pub async fn list_models(&self) -> Result<Vec<String>, EngineError> {
        let url = format!("{}/models", self.base_url);

        let response = self.authorize(self.client.get(&url)).send().await?;
        let response = check_status(response).await?;

        let models: OpenAIModelsResponse = response.json().await?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }
}

pub struct OpenAIEngine {
    client: OpenAIClient,
    model: String,
}

#[async_trait]
impl Engine for OpenAIEngine {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, EngineError> {
        self.client.chat(&self.model, request).await
    }
}

/// Single-model servers answer whatever name is sent, so a lone listed
/// model is accepted as a match.
fn is_served(listed: &[String], model: &str) -> bool {
    listed.len() == 1 || listed.iter().any(|m| m == model)
}

pub struct OpenAILoader {
    client: OpenAIClient,
}

impl OpenAILoader {
    pub fn new(client: OpenAIClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EngineLoader for OpenAILoader {
    async fn create(
        &self,
        model: &str,
        options: CreateOptions,
    ) -> Result<EngineHandle, EngineError> {
        options.report(0.0);

        let listed = self.client.list_models().await?;
        if !is_served(&listed, model) {
            tracing::warn!(%model, available = ?listed, "model not served");
            return Err(EngineError::ModelNotFound(model.to_string()));
        }
        options.report(1.0);

        Ok(Arc::new(OpenAIEngine {
            client: self.client.clone(),
            model: model.to_string(),
        }))
    }
}
