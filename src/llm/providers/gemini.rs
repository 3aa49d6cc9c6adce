use async_trait::async_trait;

use crate::errors::{PilotError, PilotResult};
use crate::llm::provider::LlmProvider;
use crate::llm::types::{CallConfig, ChatMessage, LlmResponse};

/// Google `models/{model}:generateContent`. Always non-streaming.
pub struct GeminiProvider {
    id: String,
    api_base: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(id: String, api_base: String, api_key: String) -> Self {
        Self {
            id,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.api_base, model)
    }
}

/// System messages become `systemInstruction`; assistant turns use the `model` role.
pub(crate) fn request_body(messages: &[ChatMessage], cfg: &CallConfig) -> serde_json::Value {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == "system")
        .map(|m| m.content.as_str())
        .collect();

    let contents: Vec<serde_json::Value> = messages
        .iter()
        .filter(|m| m.role != "system")
        .map(|m| {
            let role = if m.role == "assistant" { "model" } else { "user" };
            serde_json::json!({ "role": role, "parts": [{ "text": m.content }] })
        })
        .collect();

    let mut body = serde_json::json!({
        "contents": contents,
        "generationConfig": { "temperature": cfg.temperature },
    });
    if !system.is_empty() {
        body["systemInstruction"] = serde_json::json!({ "parts": [{ "text": system.join("\n\n") }] });
    }
    body
}

pub(crate) fn text_from_json(json: &serde_json::Value) -> PilotResult<String> {
    if let Some(err) = json.get("error") {
        return Err(PilotError::LlmProvider(err["message"].as_str().unwrap_or("unknown error").to_string()));
    }
    let parts = json["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| PilotError::LlmProvider("response has no candidates".into()))?;
    Ok(parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join(""))
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn chat(&self, messages: Vec<ChatMessage>, cfg: &CallConfig) -> PilotResult<LlmResponse> {
        if cfg.stream {
            tracing::debug!(provider = %self.id, "streaming not supported by gemini adapter; using JSON");
        }
        let body = request_body(&messages, cfg);
        tracing::debug!(provider = %self.id, model = %cfg.model, "sending Gemini request");

        let response = self
            .client
            .post(self.endpoint(&cfg.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(PilotError::LlmProvider(format!("{}: {}", status, err_body)));
        }

        let json: serde_json::Value = response.json().await?;
        let content = text_from_json(&json)?;
        tracing::info!(provider = %self.id, content_len = content.len(), "Gemini response received");
        Ok(LlmResponse {
            content,
            reasoning: String::new(),
        })
    }
}
