//! Shrinks long transcripts into a bounded preview for prompting.
//!
//! The preview is made of contiguous runs of whole lines spread evenly
//! across the transcript, joined by [`GAP_MARKER`]. Lines are never split,
//! and the same input always yields the same preview, so the rendered text
//! is safe to feed into cache keys.

use std::fmt;

use crate::{
    config::SamplingConfig,
    format::{GAP_MARKER, format_transcript_line},
    types::TranscriptLine,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SampledSegment {
    /// Index of the first line of this run in the original transcript.
    pub first_line: usize,
    pub lines: Vec<TranscriptLine>,
}

impl SampledSegment {
    fn render(&self) -> String {
        self.lines
            .iter()
            .map(format_transcript_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampledTranscript {
    pub segments: Vec<SampledSegment>,
    /// True when the whole transcript fit the budget and was kept as is.
    pub verbatim: bool,
}

impl SampledTranscript {
    pub fn render(&self) -> String {
        self.segments
            .iter()
            .map(SampledSegment::render)
            .collect::<Vec<_>>()
            .join(GAP_MARKER)
    }

    pub fn line_count(&self) -> usize {
        self.segments.iter().map(|s| s.lines.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn has_line_longer_than(&self, lengths: &[usize], limit: usize) -> bool {
        self.segments.iter().any(|segment| {
            let end = segment.first_line + segment.lines.len();
            lengths[segment.first_line..end].iter().any(|&len| len > limit)
        })
    }
}

impl fmt::Display for SampledTranscript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

pub fn sample_transcript(lines: &[TranscriptLine], config: &SamplingConfig) -> SampledTranscript {
    if lines.is_empty() {
        return SampledTranscript::default();
    }

    let lengths: Vec<usize> = lines
        .iter()
        .map(|line| format_transcript_line(line).chars().count())
        .collect();
    let total = lengths.iter().sum::<usize>() + lengths.len() - 1;

    if total <= config.max_chars {
        return SampledTranscript {
            segments: vec![SampledSegment {
                first_line: 0,
                lines: lines.to_vec(),
            }],
            verbatim: true,
        };
    }

    // A preview may overrun the budget only when it carries a line longer
    // than the per-segment share of the requested segment count.
    let per_segment = config.max_chars / config.segments.max(1);
    let mut segment_count = config.segments.max(1).min(lines.len());
    loop {
        let sampled = sample_segments(lines, &lengths, segment_count, config);
        if segment_count == 1
            || sampled.render().chars().count() <= config.max_chars
            || sampled.has_line_longer_than(&lengths, per_segment)
        {
            return sampled;
        }
        segment_count -= 1;
    }
}

fn sample_segments(
    lines: &[TranscriptLine],
    lengths: &[usize],
    segment_count: usize,
    config: &SamplingConfig,
) -> SampledTranscript {
    let gap_len = GAP_MARKER.chars().count();
    let share = config
        .max_chars
        .saturating_sub(gap_len * (segment_count - 1))
        / segment_count;
    let max_lines = config.max_lines_per_segment.unwrap_or(usize::MAX).max(1);

    let starts = segment_starts(lengths, segment_count, share, max_lines);

    let segments = starts
        .iter()
        .enumerate()
        .map(|(k, &start)| {
            let limit = starts.get(k + 1).copied().unwrap_or(lines.len());
            let end = take_lines(lengths, start, limit, share, max_lines);
            SampledSegment {
                first_line: start,
                lines: lines[start..end].to_vec(),
            }
        })
        .collect();

    SampledTranscript {
        segments,
        verbatim: false,
    }
}

/// Evenly spaced run starts, with the last one placed so that its run
/// reaches the final line.
fn segment_starts(lengths: &[usize], count: usize, share: usize, max_lines: usize) -> Vec<usize> {
    let last = lengths.len() - 1;
    let mut last_start = last;
    let mut cost = lengths[last];
    let mut taken = 1;
    while last_start > 0 && taken < max_lines && cost + 1 + lengths[last_start - 1] <= share {
        last_start -= 1;
        cost += 1 + lengths[last_start];
        taken += 1;
    }

    if count == 1 {
        return vec![0];
    }

    let mut starts: Vec<usize> = Vec::with_capacity(count);
    for i in 0..count {
        let start = i * last_start / (count - 1);
        if starts.last().is_none_or(|&prev| start > prev) {
            starts.push(start);
        }
    }
    starts
}

/// Greedily takes whole lines from `start`, stopping before `limit`. The
/// first line is always taken, even when it alone exceeds `share`.
fn take_lines(lengths: &[usize], start: usize, limit: usize, share: usize, max_lines: usize) -> usize {
    let mut end = start + 1;
    let mut cost = lengths[start];
    while end < limit && end - start < max_lines && cost + 1 + lengths[end] <= share {
        cost += 1 + lengths[end];
        end += 1;
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript(count: usize) -> Vec<TranscriptLine> {
        (0..count)
            .map(|i| TranscriptLine::new(i as f64 * 5.0, format!("line number {i} says something")))
            .collect()
    }

    fn config(max_chars: usize, segments: usize) -> SamplingConfig {
        SamplingConfig {
            max_chars,
            segments,
            max_lines_per_segment: None,
        }
    }

    fn assert_boundaries(input: &[TranscriptLine], sampled: &SampledTranscript) {
        let mut previous_end = 0;
        for segment in &sampled.segments {
            assert!(segment.first_line >= previous_end);
            let end = segment.first_line + segment.lines.len();
            assert_eq!(&input[segment.first_line..end], segment.lines.as_slice());
            previous_end = end;
        }
    }

    #[test]
    fn short_transcript_is_returned_verbatim() {
        let lines = vec![
            TranscriptLine::new(0.0, "a"),
            TranscriptLine::new(5.0, "b"),
            TranscriptLine::new(10.0, "c"),
        ];
        let sampled = sample_transcript(&lines, &config(1000, 10));
        assert!(sampled.verbatim);
        assert_eq!(sampled.segments.len(), 1);
        assert_eq!(sampled.segments[0].lines, lines);
        assert_eq!(sampled.render(), "[00:00:00] a\n[00:00:05] b\n[00:00:10] c");
    }

    #[test]
    fn long_transcript_respects_budget() {
        let lines = transcript(2_000);
        for (max_chars, segments) in [(15_000, 10), (3_000, 7), (800, 10), (1_000, 3)] {
            let sampled = sample_transcript(&lines, &config(max_chars, segments));
            assert!(!sampled.verbatim);
            assert!(
                sampled.render().chars().count() <= max_chars,
                "budget {max_chars} exceeded"
            );
            assert!(sampled.segments.len() <= segments);
            assert_boundaries(&lines, &sampled);
        }
    }

    #[test]
    fn lines_near_segment_share_stay_within_budget() {
        // Each line renders to 95 chars, just under 1000 / 10.
        let lines: Vec<TranscriptLine> = (0..100)
            .map(|i| TranscriptLine::new(i as f64, "y".repeat(84)))
            .collect();
        assert_eq!(format_transcript_line(&lines[0]).chars().count(), 95);

        let sampled = sample_transcript(&lines, &config(1_000, 10));
        assert!(!sampled.verbatim);
        assert!(sampled.render().chars().count() <= 1_000);
        assert!(sampled.segments.len() > 1);
        assert_eq!(sampled.segments[0].first_line, 0);
        let last = sampled.segments.last().unwrap();
        assert_eq!(last.first_line + last.lines.len(), lines.len());
        assert_boundaries(&lines, &sampled);
    }

    #[test]
    fn covers_beginning_and_end() {
        let lines = transcript(500);
        let sampled = sample_transcript(&lines, &config(2_000, 5));
        assert_eq!(sampled.segments[0].first_line, 0);
        let last = sampled.segments.last().unwrap();
        assert_eq!(last.first_line + last.lines.len(), lines.len());
    }

    #[test]
    fn output_is_deterministic() {
        let lines = transcript(777);
        let cfg = config(4_000, 9);
        assert_eq!(
            sample_transcript(&lines, &cfg).render(),
            sample_transcript(&lines, &cfg).render()
        );
    }

    #[test]
    fn oversized_line_is_kept_whole() {
        let huge = "x".repeat(5_000);
        let lines = vec![
            TranscriptLine::new(0.0, huge.clone()),
            TranscriptLine::new(1.0, "tail"),
        ];
        let sampled = sample_transcript(&lines, &config(100, 10));
        assert_eq!(sampled.segments.len(), 2);
        assert_eq!(sampled.segments[0].lines[0].text, huge);
        assert_boundaries(&lines, &sampled);
    }

    #[test]
    fn more_segments_than_lines_gives_one_per_line() {
        let lines = vec![
            TranscriptLine::new(0.0, "a".repeat(100)),
            TranscriptLine::new(1.0, "b".repeat(100)),
            TranscriptLine::new(2.0, "c".repeat(100)),
        ];
        let sampled = sample_transcript(&lines, &config(50, 10));
        assert_eq!(sampled.segments.len(), 3);
        assert!(sampled.segments.iter().all(|s| s.lines.len() == 1));
    }

    #[test]
    fn honors_max_lines_per_segment() {
        let lines = transcript(1_000);
        let cfg = SamplingConfig {
            max_chars: 10_000,
            segments: 4,
            max_lines_per_segment: Some(3),
        };
        let sampled = sample_transcript(&lines, &cfg);
        assert!(sampled.segments.iter().all(|s| s.lines.len() <= 3));
        assert_boundaries(&lines, &sampled);
    }

    #[test]
    fn empty_input_gives_empty_preview() {
        let sampled = sample_transcript(&[], &SamplingConfig::default());
        assert!(sampled.is_empty());
        assert_eq!(sampled.render(), "");
    }
}
