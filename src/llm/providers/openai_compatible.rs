use async_trait::async_trait;
use futures_util::StreamExt;

use crate::errors::{PilotError, PilotResult};
use crate::llm::provider::LlmProvider;
use crate::llm::sse_parser::SseAccumulator;
use crate::llm::types::{CallConfig, ChatMessage, LlmResponse};

/// Any `/chat/completions` endpoint speaking the OpenAI wire format.
pub struct OpenAiCompatibleProvider {
    id: String,
    api_base: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(id: String, api_base: String, api_key: String) -> Self {
        Self {
            id,
            api_base,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

pub(crate) fn request_body(messages: &[ChatMessage], cfg: &CallConfig) -> serde_json::Value {
    serde_json::json!({
        "model": cfg.model,
        "messages": messages,
        "stream": cfg.stream,
        "temperature": cfg.temperature,
    })
}

pub(crate) fn content_from_json(json: &serde_json::Value) -> LlmResponse {
    let message = &json["choices"][0]["message"];
    LlmResponse {
        content: message["content"].as_str().unwrap_or("").to_string(),
        reasoning: message["reasoning_content"].as_str().unwrap_or("").to_string(),
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn chat(&self, messages: Vec<ChatMessage>, cfg: &CallConfig) -> PilotResult<LlmResponse> {
        let body = request_body(&messages, cfg);

        tracing::debug!(
            provider = %self.id,
            model = %cfg.model,
            stream = cfg.stream,
            prompt_chars = messages.iter().map(|m| m.content.len()).sum::<usize>(),
            "sending LLM request"
        );

        let response = self
            .client
            .post(&self.api_base)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(PilotError::LlmProvider(format!("{}: {}", status, err_body)));
        }

        if cfg.stream {
            self.handle_stream(response).await
        } else {
            self.handle_json(response).await
        }
    }
}

impl OpenAiCompatibleProvider {
    /// Accumulates an SSE response into the full completion text.
    async fn handle_stream(&self, response: reqwest::Response) -> PilotResult<LlmResponse> {
        let mut byte_stream = response.bytes_stream();
        let mut acc = SseAccumulator::default();

        while let Some(result) = byte_stream.next().await {
            let bytes = result?;
            if acc.push(&String::from_utf8_lossy(&bytes)) {
                break;
            }
        }

        let resp = acc.finish();
        tracing::info!(
            provider = %self.id,
            content_len = resp.content.len(),
            reasoning_len = resp.reasoning.len(),
            "LLM stream complete"
        );
        Ok(resp)
    }

    async fn handle_json(&self, response: reqwest::Response) -> PilotResult<LlmResponse> {
        let json: serde_json::Value = response.json().await?;
        if let Some(err) = json.get("error") {
            return Err(PilotError::LlmProvider(err.to_string()));
        }
        let resp = content_from_json(&json);
        tracing::info!(
            provider = %self.id,
            content_len = resp.content.len(),
            "LLM JSON response received"
        );
        Ok(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_carries_model_settings() {
        let cfg = CallConfig {
            model: "gpt-4o-mini".into(),
            stream: false,
            temperature: 0.1,
        };
        let body = request_body(&[ChatMessage::user("go back")], &cfg);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "go back");
    }

    #[test]
    fn reads_first_choice() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "input keyevent 4"}}]
        });
        assert_eq!(content_from_json(&json).content, "input keyevent 4");
        assert_eq!(content_from_json(&serde_json::json!({})).content, "");
    }
}
