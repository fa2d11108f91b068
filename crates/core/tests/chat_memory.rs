use std::sync::Arc;

use async_trait::async_trait;
use pageon_core::generation::{MessageRole, PromptPurpose};
use pageon_core::{
    ChatError, ChatRequest, ChatService, FragmentStream, GenerationError, MemoryConfig, Prompt,
    SessionKey, SessionMemoryStore, TextGenerator,
};
use serde_json::json;
use tokio::sync::Mutex;

#[derive(Default)]
struct RecordingGenerator {
    prompts: Mutex<Vec<Prompt>>,
}

impl RecordingGenerator {
    async fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl TextGenerator for RecordingGenerator {
    fn model(&self, _purpose: PromptPurpose) -> String {
        "stub-chat".to_string()
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let mut prompts = self.prompts.lock().await;
        prompts.push(prompt.clone());
        let question = prompt
            .messages
            .last()
            .map(|message| message.content.clone())
            .unwrap_or_default();
        if question.ends_with("fail") {
            return Err(GenerationError::Stream {
                reason: "upstream closed".to_string(),
            });
        }
        Ok(format!("answer {}", prompts.len()))
    }

    async fn stream(&self, _prompt: &Prompt) -> Result<FragmentStream, GenerationError> {
        Ok(FragmentStream::from_fragments(Vec::<String>::new()))
    }
}

fn service(capacity: usize) -> (Arc<RecordingGenerator>, ChatService<RecordingGenerator>) {
    let generator = Arc::new(RecordingGenerator::default());
    let memory = Arc::new(SessionMemoryStore::new(MemoryConfig {
        capacity_pairs: capacity,
        idle_ttl_seconds: None,
    }));
    let service = ChatService::new(generator.clone(), memory, 0.7);
    (generator, service)
}

fn request(message: &str, session: Option<&str>, video_id: &str) -> ChatRequest {
    ChatRequest {
        message: message.to_string(),
        video_context: Some(json!({"videoId": video_id, "title": "Rust"})),
        session_key: session.map(str::to_string),
    }
}

#[tokio::test]
async fn remembers_only_the_last_k_exchanges() {
    let (generator, service) = service(5);

    for i in 1..=7 {
        let response = service
            .chat(&request(&format!("q{i}"), Some("u1"), "v1"))
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.response, format!("answer {i}"));
    }

    let prompts = generator.prompts().await;
    let last = prompts.last().unwrap();
    // Five remembered pairs, then the new question.
    assert_eq!(last.messages.len(), 11);
    assert_eq!(last.messages[0].role, MessageRole::User);
    assert_eq!(last.messages[0].content, "q2");
    assert_eq!(last.messages[1].content, "answer 2");
    assert!(last.messages[10].content.ends_with("User Question: q7"));

    let key = SessionKey::new("u1", "v1");
    assert_eq!(service.memory().read(&key).len(), 10);
}

#[tokio::test]
async fn sessions_are_isolated_by_user_and_video() {
    let (generator, service) = service(5);

    service.chat(&request("hello", Some("u1"), "v1")).await.unwrap();
    service.chat(&request("hi", Some("u2"), "v1")).await.unwrap();
    service.chat(&request("hey", Some("u1"), "v2")).await.unwrap();

    for prompt in generator.prompts().await {
        assert_eq!(prompt.messages.len(), 1);
    }
    assert_eq!(service.memory().len(), 3);
}

#[tokio::test]
async fn anonymous_turns_are_never_remembered() {
    let (generator, service) = service(5);

    service.chat(&request("one", None, "v1")).await.unwrap();
    service.chat(&request("two", None, "v1")).await.unwrap();

    let prompts = generator.prompts().await;
    assert_eq!(prompts[1].messages.len(), 1);
    assert!(service.memory().is_empty());
}

#[tokio::test]
async fn failed_answers_leave_memory_untouched() {
    let (_generator, service) = service(5);
    let key = SessionKey::new("u1", "v1");

    service.chat(&request("first", Some("u1"), "v1")).await.unwrap();
    let err = service
        .chat(&request("please fail", Some("u1"), "v1"))
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::Generation(_)));
    assert_eq!(service.memory().read(&key).len(), 2);
}

#[tokio::test]
async fn empty_messages_and_cleared_sessions() {
    let (_generator, service) = service(5);

    let err = service
        .chat(&request("   ", Some("u1"), "v1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::EmptyMessage));

    service.chat(&request("q", Some("u1"), "v1")).await.unwrap();
    assert!(service.clear_session("u1", "v1"));
    assert!(!service.clear_session("u1", "v1"));
    assert!(service.memory().is_empty());
}

#[tokio::test]
async fn concurrent_chats_keep_pairs_aligned() {
    let (_generator, service) = service(3);
    let service = Arc::new(service);

    let mut handles = Vec::new();
    for i in 0..12 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .chat(&request(&format!("q{i}"), Some("u1"), "v1"))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let turns = service.memory().read(&SessionKey::new("u1", "v1"));
    assert_eq!(turns.len(), 6);
    for pair in turns.chunks(2) {
        assert!(pair[0].text.starts_with('q'));
        assert!(pair[1].text.starts_with("answer "));
    }
}
