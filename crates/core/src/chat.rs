use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::ChatError,
    generation::TextGenerator,
    memory::{SessionKey, SessionMemoryStore},
    prompts::build_chat_prompt,
};

const DEFAULT_VIDEO_ID: &str = "default";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_context: Option<serde_json::Value>,
    /// Identifies the user; absent means an anonymous, memory-less turn.
    #[serde(default, alias = "userId", skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
}

impl ChatRequest {
    /// The video the conversation is about, from `videoContext.videoId`.
    pub fn video_id(&self) -> &str {
        self.video_context
            .as_ref()
            .and_then(|context| context.get("videoId"))
            .and_then(serde_json::Value::as_str)
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(DEFAULT_VIDEO_ID)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

pub struct ChatService<G: ?Sized> {
    generator: Arc<G>,
    memory: Arc<SessionMemoryStore>,
    temperature: f32,
}

impl<G: TextGenerator + ?Sized> ChatService<G> {
    pub fn new(generator: Arc<G>, memory: Arc<SessionMemoryStore>, temperature: f32) -> Self {
        Self {
            generator,
            memory,
            temperature,
        }
    }

    pub fn memory(&self) -> &SessionMemoryStore {
        &self.memory
    }

    /// Answers one message. With a session key, prior turns for that
    /// (user, video) pair are replayed and the new pair is remembered only
    /// once the answer succeeds.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let key = SessionKey::for_user(request.session_key.as_deref(), request.video_id());
        let history = key
            .as_ref()
            .map(|key| self.memory.read(key))
            .unwrap_or_default();
        debug!(
            video_id = request.video_id(),
            anonymous = key.is_none(),
            history_turns = history.len(),
            "answering chat message"
        );

        let prompt = build_chat_prompt(
            &history,
            request.video_context.as_ref(),
            message,
            self.temperature,
        );
        let answer = self.generator.complete(&prompt).await?;

        if let Some(key) = &key {
            self.memory.append(key, message, answer.as_str());
        }
        info!(video_id = request.video_id(), chars = answer.len(), "chat answered");

        Ok(ChatResponse {
            success: true,
            response: answer,
            timestamp: Utc::now(),
        })
    }

    /// Forgets one user's conversation about one video.
    pub fn clear_session(&self, session_key: &str, video_id: &str) -> bool {
        match SessionKey::for_user(Some(session_key), video_id) {
            Some(key) => self.memory.clear(&key),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn video_id_defaults_when_context_is_missing() {
        let mut request = ChatRequest {
            message: "hi".to_string(),
            ..ChatRequest::default()
        };
        assert_eq!(request.video_id(), "default");
        request.video_context = Some(json!({"title": "no id"}));
        assert_eq!(request.video_id(), "default");
        request.video_context = Some(json!({"videoId": "abc"}));
        assert_eq!(request.video_id(), "abc");
    }

    #[test]
    fn request_accepts_camel_case_wire_names() {
        let request: ChatRequest = serde_json::from_value(json!({
            "message": "hi",
            "videoContext": {"videoId": "v1"},
            "sessionKey": "u1"
        }))
        .unwrap();
        assert_eq!(request.session_key.as_deref(), Some("u1"));
        assert_eq!(request.video_id(), "v1");
    }
}
