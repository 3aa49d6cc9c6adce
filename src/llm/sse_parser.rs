use crate::errors::{PilotError, PilotResult};
use crate::llm::types::{LlmResponse, StreamChunk, StreamChunkKind};

/// Parses a raw SSE line (OpenAI-compatible format) into a StreamChunk.
/// Returns None if the line is a keep-alive or non-data line.
pub fn parse_sse_line(line: &str) -> PilotResult<Option<StreamChunk>> {
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }

    let Some(data) = line.strip_prefix("data:").map(str::trim) else {
        return Ok(None);
    };

    if data == "[DONE]" {
        return Ok(Some(StreamChunk {
            kind: StreamChunkKind::Done,
            content: String::new(),
        }));
    }

    let json: serde_json::Value =
        serde_json::from_str(data).map_err(|e| PilotError::SseParsing(e.to_string()))?;

    let Some(first) = json["choices"].as_array().and_then(|c| c.first()) else {
        return Ok(None);
    };
    let delta = &first["delta"];

    // Some models (DeepSeek, QwQ) expose their reasoning separately.
    if let Some(reasoning) = delta["reasoning_content"].as_str().filter(|s| !s.is_empty()) {
        return Ok(Some(StreamChunk {
            kind: StreamChunkKind::Reasoning,
            content: reasoning.to_string(),
        }));
    }

    if let Some(content) = delta["content"].as_str().filter(|s| !s.is_empty()) {
        return Ok(Some(StreamChunk {
            kind: StreamChunkKind::Content,
            content: content.to_string(),
        }));
    }

    if first["finish_reason"].as_str().is_some() {
        return Ok(Some(StreamChunk {
            kind: StreamChunkKind::Done,
            content: String::new(),
        }));
    }

    Ok(None)
}

/// Line-buffers arbitrary byte-stream fragments and accumulates the completion.
#[derive(Debug, Default)]
pub struct SseAccumulator {
    line_buf: String,
    response: LlmResponse,
    done: bool,
}

impl SseAccumulator {
    /// Feeds one network fragment. Returns true once the stream has signalled completion.
    pub fn push(&mut self, fragment: &str) -> bool {
        for ch in fragment.chars() {
            if self.done {
                break;
            }
            if ch != '\n' {
                self.line_buf.push(ch);
                continue;
            }
            let line = std::mem::take(&mut self.line_buf);
            self.handle_line(line.trim());
        }
        self.done
    }

    fn handle_line(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        match parse_sse_line(line) {
            Ok(Some(chunk)) => match chunk.kind {
                StreamChunkKind::Reasoning => self.response.reasoning.push_str(&chunk.content),
                StreamChunkKind::Content => self.response.content.push_str(&chunk.content),
                StreamChunkKind::Done => self.done = true,
            },
            Ok(None) => {}
            Err(e) => tracing::debug!("SSE parse skipped: {e}"),
        }
    }

    /// Flushes any unterminated final line and returns what was accumulated.
    pub fn finish(mut self) -> LlmResponse {
        if !self.done && !self.line_buf.is_empty() {
            let line = std::mem::take(&mut self.line_buf);
            self.handle_line(line.trim());
        }
        self.response
    }
}
