use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{error::GenerationError, generation::FragmentStream};

/// Marker some providers append once generation is complete.
pub const STREAM_END_SENTINEL: &str = "[STREAM_END]";

#[derive(Debug)]
pub enum Step {
    /// A fragment was appended; the buffer may hold new complete objects.
    Appended,
    /// The stream ended normally.
    Finished,
    /// The transport failed mid-stream. The buffer keeps what arrived.
    Failed(GenerationError),
    /// The caller cancelled before the stream ended.
    Cancelled,
}

/// Owns the growing text of one generation request.
#[derive(Debug, Default)]
pub struct FragmentAggregator {
    buffer: String,
    fragments: usize,
}

impl FragmentAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fragment, dropping the end sentinel if it is present.
    pub fn push(&mut self, fragment: &str) -> &str {
        self.fragments += 1;
        if fragment.contains(STREAM_END_SENTINEL) {
            self.buffer
                .push_str(&fragment.replace(STREAM_END_SENTINEL, ""));
        } else {
            self.buffer.push_str(fragment);
        }
        &self.buffer
    }

    /// Waits for the next fragment, or for cancellation, whichever comes
    /// first.
    pub async fn next(&mut self, stream: &mut FragmentStream, cancel: &CancellationToken) -> Step {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Step::Cancelled,
            item = stream.next() => item,
        };

        match item {
            Some(Ok(fragment)) => {
                self.push(&fragment);
                if self.fragments % 50 == 0 {
                    debug!(
                        fragments = self.fragments,
                        chars = self.buffer.len(),
                        "generation buffer growing"
                    );
                }
                Step::Appended
            }
            Some(Err(err)) => Step::Failed(err),
            None => Step::Finished,
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments
    }
}
