use serde::Serialize;

use crate::types::{Section, VideoAnalysisDocument, VideoSummary};

/// One event of the analysis stream, serialized as
/// `{"type": "...", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum AnalysisEvent {
    Summary(VideoSummary),
    Section(Section),
    Done(VideoAnalysisDocument),
    Cached(VideoAnalysisDocument),
    Error { message: String },
}

impl AnalysisEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Summary(_) => "summary",
            Self::Section(_) => "section",
            Self::Done(_) => "done",
            Self::Cached(_) => "cached",
            Self::Error { .. } => "error",
        }
    }

    /// `done`, `cached`, and `error` end a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Cached(_) | Self::Error { .. })
    }
}
