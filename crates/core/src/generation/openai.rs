use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    error::GenerationError,
    generation::{FragmentStream, Prompt, PromptPurpose, TextGenerator},
    provider::Provider,
};

const STREAM_CHANNEL_CAPACITY: usize = 64;

/// Client for OpenAI-compatible `/chat/completions` endpoints.
#[derive(Clone)]
pub struct OpenAiCompatibleGenerator {
    client: reqwest::Client,
    provider: Provider,
    api_key: String,
    model_override: Option<String>,
}

impl OpenAiCompatibleGenerator {
    /// Builds a generator, reading the provider's API key from the
    /// environment.
    pub fn new(provider: Provider, model_override: Option<String>) -> Result<Self, GenerationError> {
        let api_key = provider.validate_api_key()?;
        Ok(Self::with_api_key(provider, api_key, model_override))
    }

    pub fn with_api_key(
        provider: Provider,
        api_key: impl Into<String>,
        model_override: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider,
            api_key: api_key.into(),
            model_override,
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    fn request_body(&self, prompt: &Prompt, stream: bool) -> serde_json::Value {
        let mut messages = Vec::with_capacity(prompt.messages.len() + 1);
        messages.push(serde_json::json!({
            "role": "system",
            "content": &prompt.system,
        }));
        for message in &prompt.messages {
            messages.push(serde_json::json!(message));
        }

        serde_json::json!({
            "model": self.model(prompt.purpose),
            "messages": messages,
            "temperature": prompt.temperature,
            "stream": stream,
        })
    }

    async fn send(&self, prompt: &Prompt, stream: bool) -> Result<reqwest::Response, GenerationError> {
        let config = self.provider.config();
        let response = self
            .client
            .post(config.api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.request_body(prompt, stream))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::InvalidResponse {
                reason: format!("{} returned {status}: {body}", self.provider.name()),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatibleGenerator {
    fn model(&self, purpose: PromptPurpose) -> String {
        if let Some(model) = &self.model_override {
            return model.clone();
        }
        let config = self.provider.config();
        match purpose {
            PromptPurpose::Analysis => config.model.to_string(),
            PromptPurpose::Chat | PromptPurpose::Translation => config.chat_model.to_string(),
        }
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let response = self
            .send(prompt, false)
            .await?
            .json::<serde_json::Value>()
            .await?;

        response["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GenerationError::InvalidResponse {
                reason: format!("Invalid API response: {:?}", response),
            })
    }

    async fn stream(&self, prompt: &Prompt) -> Result<FragmentStream, GenerationError> {
        let mut response = self.send(prompt, true).await?;
        let (tx, stream) = FragmentStream::channel(STREAM_CHANNEL_CAPACITY);
        let provider = self.provider.name();

        tokio::spawn(async move {
            let mut decoder = SseDecoder::default();
            loop {
                let chunk = tokio::select! {
                    _ = tx.closed() => {
                        debug!(provider, "fragment receiver dropped, closing generation stream");
                        return;
                    }
                    chunk = response.chunk() => chunk,
                };

                let bytes = match chunk {
                    Ok(Some(bytes)) => bytes,
                    Ok(None) => return,
                    Err(err) => {
                        warn!(provider, error = %err, "generation stream failed");
                        let _ = tx.send(Err(GenerationError::Http(err))).await;
                        return;
                    }
                };

                for event in decoder.push(&bytes) {
                    let item = match event {
                        SseEvent::Delta(text) => Ok(text),
                        SseEvent::Done => return,
                        SseEvent::Error(reason) => Err(GenerationError::Stream { reason }),
                    };
                    let failed = item.is_err();
                    if tx.send(item).await.is_err() || failed {
                        return;
                    }
                }
            }
        });

        Ok(stream)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SseEvent {
    Delta(String),
    Done,
    Error(String),
}

/// Splits a server-sent-events byte stream into decoded events. Bytes are
/// buffered until a full line is available, so chunk boundaries may fall
/// anywhere, including inside a multi-byte character.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(newline) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = parse_sse_line(&line) {
                events.push(event);
            }
        }
        events
    }
}

pub(crate) fn parse_sse_line(line: &str) -> Option<SseEvent> {
    let data = line.trim_end_matches(['\r', '\n']).strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }

    let value: serde_json::Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(err) => {
            debug!(error = %err, "skipping malformed SSE payload");
            return None;
        }
    };

    if let Some(error) = value.get("error") {
        let reason = error["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Some(SseEvent::Error(reason));
    }

    value["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|text| !text.is_empty())
        .map(|text| SseEvent::Delta(text.to_string()))
}
