//! Boundary to the text-generation provider.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::GenerationError;

pub mod openai;

pub use openai::OpenAiCompatibleGenerator;

pub type FragmentSender = mpsc::Sender<Result<String, GenerationError>>;

/// Ordered text fragments from one generation call. The stream ends when
/// the producer drops its sender; dropping the stream tells the producer
/// to stop.
#[derive(Debug)]
pub struct FragmentStream {
    rx: mpsc::Receiver<Result<String, GenerationError>>,
}

impl FragmentStream {
    pub fn new(rx: mpsc::Receiver<Result<String, GenerationError>>) -> Self {
        Self { rx }
    }

    pub fn channel(buffer: usize) -> (FragmentSender, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self::new(rx))
    }

    /// A stream that yields the given fragments and then ends.
    pub fn from_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fragments: Vec<String> = fragments.into_iter().map(Into::into).collect();
        let (tx, stream) = Self::channel(fragments.len());
        for fragment in fragments {
            // Capacity covers every fragment, so this cannot be full.
            let _ = tx.try_send(Ok(fragment));
        }
        stream
    }

    pub async fn next(&mut self) -> Option<Result<String, GenerationError>> {
        self.rx.recv().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptMessage {
    pub role: MessageRole,
    pub content: String,
}

impl PromptMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptPurpose {
    Analysis,
    Chat,
    Translation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub purpose: PromptPurpose,
    pub system: String,
    pub messages: Vec<PromptMessage>,
    pub temperature: f32,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model name used for the given purpose. Part of cache keys.
    fn model(&self, purpose: PromptPurpose) -> String;

    async fn complete(&self, prompt: &Prompt) -> Result<String, GenerationError>;

    async fn stream(&self, prompt: &Prompt) -> Result<FragmentStream, GenerationError>;
}
