use crate::types::{TranscriptLine, VideoAnalysisDocument};

/// Separator placed between sampled transcript segments.
pub const GAP_MARKER: &str = "\n\n[...]\n\n";

/// Format seconds as HH:MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Format one transcript line as `[HH:MM:SS] text`
pub fn format_transcript_line(line: &TranscriptLine) -> String {
    format!("[{}] {}", format_timestamp(line.start), line.text.trim())
}

/// Format transcript lines with timestamps, one per row
pub fn format_transcript_with_timestamps(lines: &[TranscriptLine]) -> String {
    lines
        .iter()
        .map(format_transcript_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format an analysis document as human-readable markdown
pub fn format_document_readable(doc: &VideoAnalysisDocument) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", doc.summary.title));

    if !doc.summary.description.is_empty() {
        output.push_str(&format!("*{}*\n\n", doc.summary.description));
    }

    if !doc.summary.synopsis.is_empty() {
        output.push_str("## Summary\n\n");
        output.push_str(&doc.summary.synopsis);
        output.push_str("\n\n");
    }

    output.push_str("## Sections\n\n");
    for section in &doc.sections {
        output.push_str(&format!("### {}\n\n", section.title));
        for point in &section.content {
            output.push_str(&format!("• [{}] {}\n", point.timestamp, point.text));
        }
        output.push('\n');
    }

    output
}
