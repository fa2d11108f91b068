use std::collections::HashSet;

use tracing::debug;

use crate::{
    extract::scan::{ArrayItem, find_member_value, matching_brace, next_array_object},
    types::{Section, VideoSummary},
};

pub const SUMMARY_KEY: &str = "summary";
pub const SECTIONS_KEY: &str = "sections";

#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    Summary(VideoSummary),
    Section(Section),
}

/// Pulls completed objects out of a growing generation buffer.
///
/// Each call to [`IncrementalExtractor::feed`] is given the whole buffer
/// so far. The summary is emitted once, and each section id at most once,
/// in the order their objects first become parseable. The buffer must only
/// ever grow by appending; the section scan resumes from the end of the
/// last run of settled objects instead of restarting at the array head.
#[derive(Debug)]
pub struct IncrementalExtractor {
    summary_key: &'static str,
    sections_key: &'static str,
    summary_emitted: bool,
    emitted_section_ids: HashSet<String>,
    /// Offset just past the sections array `[`, once it has been seen.
    sections_start: Option<usize>,
    /// Offset past which every array element has been parsed.
    resume_at: usize,
    seen_len: usize,
}

impl Default for IncrementalExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl IncrementalExtractor {
    pub fn new() -> Self {
        Self::with_keys(SUMMARY_KEY, SECTIONS_KEY)
    }

    pub fn with_keys(summary_key: &'static str, sections_key: &'static str) -> Self {
        Self {
            summary_key,
            sections_key,
            summary_emitted: false,
            emitted_section_ids: HashSet::new(),
            sections_start: None,
            resume_at: 0,
            seen_len: 0,
        }
    }

    pub fn summary_emitted(&self) -> bool {
        self.summary_emitted
    }

    pub fn emitted_section_ids(&self) -> &HashSet<String> {
        &self.emitted_section_ids
    }

    pub fn feed(&mut self, buffer: &str) -> Vec<Extracted> {
        if buffer.len() < self.seen_len {
            // Not an append of the previous buffer; positions are stale.
            self.sections_start = None;
            self.resume_at = 0;
        }
        self.seen_len = buffer.len();

        let mut out = Vec::new();
        if !self.summary_emitted {
            if let Some(summary) = self.try_summary(buffer) {
                self.summary_emitted = true;
                out.push(Extracted::Summary(summary));
            }
        }
        self.scan_sections(buffer, &mut out);
        out
    }

    fn try_summary(&self, buffer: &str) -> Option<VideoSummary> {
        let start = find_member_value(buffer, self.summary_key)?;
        let end = matching_brace(buffer, start)?;
        match serde_json::from_str::<VideoSummary>(&buffer[start..end]) {
            Ok(summary) => Some(summary),
            Err(err) => {
                debug!(error = %err, "summary object closed but not parseable yet");
                None
            }
        }
    }

    fn scan_sections(&mut self, buffer: &str, out: &mut Vec<Extracted>) {
        let start = match self.sections_start {
            Some(start) => start,
            None => {
                let Some(value) = find_member_value(buffer, self.sections_key) else {
                    return;
                };
                if buffer.as_bytes()[value] != b'[' {
                    return;
                }
                self.sections_start = Some(value + 1);
                self.resume_at = value + 1;
                value + 1
            }
        };

        let mut pos = self.resume_at.max(start);
        let mut settled = true;
        while let ArrayItem::Object { start, end } = next_array_object(buffer, pos) {
            match serde_json::from_str::<Section>(&buffer[start..end]) {
                Ok(section) => {
                    if self.emitted_section_ids.insert(section.id.clone()) {
                        out.push(Extracted::Section(section));
                    } else {
                        debug!(id = %section.id, "dropping duplicate section");
                    }
                    if settled {
                        self.resume_at = end;
                    }
                }
                Err(err) => {
                    debug!(error = %err, offset = start, "section object not parseable yet");
                    settled = false;
                }
            }
            pos = end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(fragments: &[&str]) -> Vec<Extracted> {
        let mut extractor = IncrementalExtractor::new();
        let mut buffer = String::new();
        let mut out = Vec::new();
        for fragment in fragments {
            buffer.push_str(fragment);
            out.extend(extractor.feed(&buffer));
        }
        out
    }

    fn section_ids(items: &[Extracted]) -> Vec<&str> {
        items
            .iter()
            .filter_map(|item| match item {
                Extracted::Section(s) => Some(s.id.as_str()),
                Extracted::Summary(_) => None,
            })
            .collect()
    }

    #[test]
    fn emits_summary_once_it_closes() {
        let mut extractor = IncrementalExtractor::new();
        assert!(extractor.feed(r#"{"summary":{"ti"#).is_empty());
        let items = extractor.feed(r#"{"summary":{"title":"X"}}"#);
        assert_eq!(items.len(), 1);
        let Extracted::Summary(summary) = &items[0] else {
            panic!("expected summary");
        };
        assert_eq!(summary.title, "X");
        assert!(extractor.feed(r#"{"summary":{"title":"X"}}"#).is_empty());
    }

    #[test]
    fn emits_sections_as_they_close() {
        let mut extractor = IncrementalExtractor::new();
        let mut buffer = String::from(r#"{"summary": {"title": "T"}, "sections": [{"id": "s1", "title": "One", "content": []}, {"id": "s2", "#);
        let first = extractor.feed(&buffer);
        assert_eq!(first.len(), 2);
        assert_eq!(section_ids(&first), vec!["s1"]);

        buffer.push_str(r#""title": "Two", "content": [{"text": "hi", "timestamp": "00:00:01"}]}]}"#);
        let second = extractor.feed(&buffer);
        assert_eq!(section_ids(&second), vec!["s2"]);
        assert!(extractor.feed(&buffer).is_empty());
    }

    #[test]
    fn braces_in_text_do_not_close_early() {
        let items = feed_all(&[
            r#"{"summary": {"title": "a { b"}, "sections": [{"id": "s1", "title": "t", "content": [{"text": "use a { here"#,
            r#" and } there", "timestamp": "00:00:00"}]}]}"#,
        ]);
        assert_eq!(section_ids(&items), vec!["s1"]);
        let Extracted::Section(section) = &items[1] else {
            panic!("expected section");
        };
        assert_eq!(section.content[0].text, "use a { here and } there");
    }

    #[test]
    fn duplicate_section_ids_are_dropped() {
        let items = feed_all(&[
            r#"{"sections": [{"id": "s1", "title": "first"}"#,
            r#", {"id": "s1", "title": "second"}]}"#,
        ]);
        assert_eq!(items.len(), 1);
        let Extracted::Section(section) = &items[0] else {
            panic!("expected section");
        };
        assert_eq!(section.title, "first");
    }

    #[test]
    fn unparseable_section_is_retried_later() {
        let mut extractor = IncrementalExtractor::new();
        // Balanced, but the id field is missing so it cannot be a section.
        let bad = r#"{"sections": [{"title": "no id"}, {"id": "s2", "title": "ok"}"#;
        let items = extractor.feed(bad);
        assert_eq!(section_ids(&items), vec!["s2"]);
        assert!(!extractor.emitted_section_ids().contains("no id"));
    }

    #[test]
    fn fragments_splitting_every_byte_emit_each_once() {
        let text = r#"```json
{"summary": {"title": "T", "videoId": "v"}, "sections": [
  {"id": "s1", "title": "A \"quoted\" {x}", "content": [{"text": "a", "timestamp": "00:00:01"}]},
  {"id": "s2", "title": "B", "content": []},
  {"id": "s3", "title": "C", "content": []}
]}
```"#;
        let fragments: Vec<String> = text.chars().map(String::from).collect();
        let refs: Vec<&str> = fragments.iter().map(String::as_str).collect();
        let items = feed_all(&refs);
        assert!(matches!(items[0], Extracted::Summary(_)));
        assert_eq!(section_ids(&items), vec!["s1", "s2", "s3"]);
    }

    #[test]
    fn sections_before_summary_still_emit() {
        let items = feed_all(&[
            r#"{"sections": [{"id": "s1", "title": "A"}], "summary": {"title": "late"}}"#,
        ]);
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Extracted::Summary(_)));
    }
}
