pub mod lines;
pub mod ollama;
pub mod openai;

pub use ollama::{OllamaClient, OllamaEngine, OllamaLoader};
pub use openai::{OpenAIClient, OpenAIEngine, OpenAILoader};

use std::sync::Arc;

use reqwest::Response;

use crate::config::Config;
use crate::engine::EngineLoader;
use crate::error::EngineError;
use crate::provider::Provider;

/// Build the loader for the provider selected in `config`.
pub fn loader_for(config: &Config) -> Arc<dyn EngineLoader> {
    match config.provider() {
        Provider::Ollama => Arc::new(OllamaLoader::new(OllamaClient::new(config.ollama_url()))),
        Provider::OpenAI => Arc::new(OpenAILoader::new(OpenAIClient::new(
            config.openai_base_url(),
            config.openai_api_key.as_deref(),
        ))),
    }
}

/// Turn a non-2xx response into [`EngineError::Status`].
pub(crate) async fn check_status(response: Response) -> Result<Response, EngineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(EngineError::Status {
        status: status.as_u16(),
        body,
    })
}
