use std::collections::HashSet;

use crate::{
    aggregator::STREAM_END_SENTINEL,
    extract::{
        incremental::{Extracted, IncrementalExtractor},
        scan::matching_brace,
    },
    types::{VideoAnalysisDocument, VideoSummary},
};

/// Result of reconciling a finished generation buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub document: VideoAnalysisDocument,
    /// Set when the buffer could not be parsed and a fallback was built.
    pub warning: Option<String>,
}

impl Reconciled {
    pub fn is_fallback(&self) -> bool {
        self.warning.is_some()
    }
}

/// Removes the stream sentinel and any surrounding markdown code fence.
pub fn strip_code_fences(text: &str) -> String {
    let cleaned = text.replace(STREAM_END_SENTINEL, "");
    let mut body = cleaned.trim();

    if let Some(rest) = body.strip_prefix("```") {
        // Drop the info string (`json`, `JSON`, ...) on the fence line.
        body = rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest);
    }
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
    }
    body.trim().to_string()
}

/// Parses the complete generation text into a canonical document.
///
/// Never fails: when the text holds no parseable document, the fallback
/// keeps whatever summary fields and sections can still be recovered, and
/// uses `fallback_title` when no title survived.
pub fn reconcile(text: &str, fallback_title: &str) -> Reconciled {
    let body = strip_code_fences(text);

    let warning = match parse_document(&body) {
        Ok(mut document) => {
            dedupe_sections(&mut document);
            if document.summary.title.trim().is_empty() {
                document.summary.title = fallback_title.to_string();
            }
            return Reconciled {
                document,
                warning: None,
            };
        }
        Err(reason) => reason,
    };

    Reconciled {
        document: salvage(&body, fallback_title),
        warning: Some(warning),
    }
}

/// Strictly parses the first JSON object in `text` as a document, without
/// any fallback. Duplicate section ids are dropped.
pub fn parse_document_text(text: &str) -> Result<VideoAnalysisDocument, String> {
    let mut document = parse_document(&strip_code_fences(text))?;
    dedupe_sections(&mut document);
    Ok(document)
}

fn parse_document(body: &str) -> Result<VideoAnalysisDocument, String> {
    let start = body
        .find('{')
        .ok_or_else(|| "no JSON object found in generated text".to_string())?;
    let end = matching_brace(body, start)
        .ok_or_else(|| "generated JSON object is not terminated".to_string())?;
    serde_json::from_str(&body[start..end]).map_err(|err| format!("invalid document JSON: {err}"))
}

fn dedupe_sections(document: &mut VideoAnalysisDocument) {
    let mut seen = HashSet::new();
    document.sections.retain(|section| seen.insert(section.id.clone()));
}

fn salvage(body: &str, fallback_title: &str) -> VideoAnalysisDocument {
    let mut summary = VideoSummary::default();
    let mut sections = Vec::new();
    for item in IncrementalExtractor::new().feed(body) {
        match item {
            Extracted::Summary(found) => summary = found,
            Extracted::Section(section) => sections.push(section),
        }
    }
    if summary.title.trim().is_empty() {
        summary.title = fallback_title.to_string();
    }
    VideoAnalysisDocument { summary, sections }
}
