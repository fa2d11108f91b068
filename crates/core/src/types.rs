use serde::{Deserialize, Serialize};

/// One timestamped line of a transcript, as produced by the transcriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptLine {
    #[serde(alias = "startOffsetSeconds")]
    pub start: f64,
    pub text: String,
}

impl TranscriptLine {
    pub fn new(start: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub video_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "thumbnail")]
    pub thumbnail_url: String,
    #[serde(default, alias = "summary")]
    pub synopsis: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    #[serde(alias = "content")]
    pub text: String,
    #[serde(default, alias = "timestampStart")]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: Vec<KeyPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoAnalysisDocument {
    #[serde(default, alias = "videoInfo")]
    pub summary: VideoSummary,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl VideoAnalysisDocument {
    pub fn section_ids(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.id.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_legacy_field_names() {
        let raw = r#"{
            "videoInfo": {"title": "T", "videoId": "abc", "thumbnail": "u", "summary": "s"},
            "sections": [{"id": "section1", "title": "Intro",
                          "content": [{"content": "hello", "timestampStart": "00:00:05"}]}]
        }"#;
        let doc: VideoAnalysisDocument = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.summary.thumbnail_url, "u");
        assert_eq!(doc.summary.synopsis, "s");
        assert_eq!(doc.sections[0].content[0].text, "hello");
        assert_eq!(doc.sections[0].content[0].timestamp, "00:00:05");
    }

    #[test]
    fn partial_summary_parses_with_defaults() {
        let summary: VideoSummary = serde_json::from_str(r#"{"title":"X"}"#).unwrap();
        assert_eq!(summary.title, "X");
        assert!(summary.video_id.is_empty());
    }
}
