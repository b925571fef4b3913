//! Text-generation providers used to refine raw user prompts into
//! agent-ready instructions.

use crate::config::validation::parse_selection;
use crate::config::{AiConfig, ApiType, ProviderConfig};
use crate::error::{Result, VoxpilotError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Asks the model to compress a free-form prompt into a task instruction for
/// the automation agent.
const REFINE_SYSTEM_PROMPT: &str = "Generate a detailed, well-constructed instruction of strictly \
1-2 sentences based on the user's prompt, for another model to perform the user's task.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Generation provider trait
#[async_trait]
pub trait GenerationProvider: Send + Sync + std::fmt::Debug {
    /// Send a completion request and return the generated text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Provider id
    fn name(&self) -> &str;

    /// Model name
    fn model(&self) -> &str;
}

/// OpenAI-compatible chat completions (hosted or self-hosted endpoints).
#[derive(Debug)]
pub struct OpenAiProvider {
    client: Client,
    config: ProviderConfig,
    model: String,
    provider_id: String,
}

impl OpenAiProvider {
    pub fn new(provider_id: String, config: ProviderConfig, model: String) -> Self {
        Self {
            client: Client::new(),
            config,
            model,
            provider_id,
        }
    }
}

#[async_trait]
impl GenerationProvider for OpenAiProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": 900,
            "temperature": 0.1
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(VoxpilotError::Generator(format!(
                "OpenAI API error: {}",
                error_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VoxpilotError::Generator(format!("Failed to parse response: {}", e)))?;

        extract_text(&json["choices"][0]["message"]["content"])
    }

    fn name(&self) -> &str {
        &self.provider_id
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Google-style `generateContent` provider.
#[derive(Debug)]
pub struct GeminiProvider {
    client: Client,
    config: ProviderConfig,
    model: String,
    provider_id: String,
}

impl GeminiProvider {
    pub fn new(provider_id: String, config: ProviderConfig, model: String) -> Self {
        Self {
            client: Client::new(),
            config,
            model,
            provider_id,
        }
    }

    fn build_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        // generateContent has no system role; fold system text into the
        // systemInstruction field and map the rest to user/model turns.
        let mut system_text = String::new();
        let mut contents = Vec::new();
        for msg in messages {
            if msg.role == "system" {
                system_text = msg.content.clone();
            } else {
                let role = if msg.role == "assistant" { "model" } else { "user" };
                contents.push(serde_json::json!({
                    "role": role,
                    "parts": [{"text": msg.content}]
                }));
            }
        }

        let mut body = serde_json::json!({ "contents": contents });
        if !system_text.is_empty() {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{"text": system_text}]
            });
        }
        body
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| VoxpilotError::Generator("Gemini API key required".to_string()))?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            self.model,
            api_key
        );

        let response = self
            .client
            .post(&url)
            .json(&self.build_body(messages))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(VoxpilotError::Generator(format!(
                "Gemini API error: {}",
                error_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VoxpilotError::Generator(format!("Failed to parse response: {}", e)))?;

        extract_text(&json["candidates"][0]["content"]["parts"][0]["text"])
    }

    fn name(&self) -> &str {
        &self.provider_id
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// watsonx-style text generation endpoint.
#[derive(Debug)]
pub struct WatsonxProvider {
    client: Client,
    config: ProviderConfig,
    model: String,
    provider_id: String,
}

impl WatsonxProvider {
    pub fn new(provider_id: String, config: ProviderConfig, model: String) -> Self {
        Self {
            client: Client::new(),
            config,
            model,
            provider_id,
        }
    }

    fn build_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        // Single-input endpoint: flatten the chat into one prompt string.
        let input = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let mut body = serde_json::json!({
            "input": input,
            "parameters": {
                "decoding_method": "greedy",
                "max_new_tokens": 900,
                "min_new_tokens": 0,
                "repetition_penalty": 1
            },
            "model_id": self.model,
        });
        if let Some(project_id) = &self.config.project_id {
            body["project_id"] = serde_json::Value::String(project_id.clone());
        }
        body
    }
}

#[async_trait]
impl GenerationProvider for WatsonxProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!(
            "{}/ml/v1/text/generation?version=2023-05-29",
            self.config.base_url.trim_end_matches('/')
        );

        let mut request = self.client.post(&url).json(&self.build_body(messages));
        if let Some(api_key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(VoxpilotError::Generator(format!(
                "Text generation API error: {}",
                error_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VoxpilotError::Generator(format!("Failed to parse response: {}", e)))?;

        extract_text(&json["results"][0]["generated_text"])
    }

    fn name(&self) -> &str {
        &self.provider_id
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn extract_text(value: &serde_json::Value) -> Result<String> {
    let text = value
        .as_str()
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(VoxpilotError::Generator(
            "Failed to parse response: empty generated text".to_string(),
        ));
    }
    Ok(text)
}

/// Provider factory resolving `provider_id:model_name` selections.
pub struct GeneratorClient {
    config: AiConfig,
}

impl GeneratorClient {
    pub fn new(config: AiConfig) -> Self {
        Self { config }
    }

    fn create_provider(
        &self,
        provider_id: &str,
        model: &str,
    ) -> Result<Box<dyn GenerationProvider>> {
        let provider_config = self.config.providers.get(provider_id).ok_or_else(|| {
            VoxpilotError::Generator(format!("Provider '{}' not configured", provider_id))
        })?;

        let provider: Box<dyn GenerationProvider> = match provider_config.api_type {
            ApiType::Openai => Box::new(OpenAiProvider::new(
                provider_id.to_string(),
                provider_config.clone(),
                model.to_string(),
            )),
            ApiType::Gemini => Box::new(GeminiProvider::new(
                provider_id.to_string(),
                provider_config.clone(),
                model.to_string(),
            )),
            ApiType::Watsonx => Box::new(WatsonxProvider::new(
                provider_id.to_string(),
                provider_config.clone(),
                model.to_string(),
            )),
        };

        Ok(provider)
    }

    /// Get the configured default generator.
    pub fn default_generator(&self) -> Result<Box<dyn GenerationProvider>> {
        let selection = self.config.default_generator.as_ref().ok_or_else(|| {
            VoxpilotError::Generator(
                "No default generator configured. Set [ai] default_generator in the config file."
                    .to_string(),
            )
        })?;

        let (provider_id, model) = parse_selection(selection)
            .map_err(|e| VoxpilotError::Generator(e.to_string()))?;
        self.create_provider(provider_id, model)
    }

    /// Refine a raw user prompt into a short agent instruction.
    pub async fn refine_instruction(&self, prompt: &str) -> Result<String> {
        let provider = self.default_generator()?;
        let messages = vec![
            ChatMessage::system(REFINE_SYSTEM_PROMPT),
            ChatMessage::user(format!("Prompt: {}", prompt)),
        ];
        let instruction = provider.complete(&messages).await?;
        tracing::info!(
            provider = provider.name(),
            model = provider.model(),
            "Generated instruction: {}",
            instruction
        );
        Ok(instruction)
    }
}
