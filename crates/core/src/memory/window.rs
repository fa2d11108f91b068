use std::collections::VecDeque;

use tokio::time::Instant;

use crate::types::ConversationTurn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnPair {
    pub user: String,
    pub assistant: String,
}

/// Fixed-capacity FIFO of turn pairs; pushing past capacity drops the
/// oldest pair.
#[derive(Debug)]
pub struct TurnWindow {
    buf: VecDeque<TurnPair>,
    capacity: usize,
    last_touched: Instant,
}

impl TurnWindow {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);

        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
            last_touched: Instant::now(),
        }
    }

    /// Pushes a pair and returns the evicted one, if any.
    pub fn push_overwrite(&mut self, pair: TurnPair) -> Option<TurnPair> {
        let evicted = if self.buf.len() >= self.capacity {
            self.buf.pop_front()
        } else {
            None
        };
        self.buf.push_back(pair);
        self.touch();
        evicted
    }

    pub fn pairs(&self) -> impl Iterator<Item = &TurnPair> {
        self.buf.iter()
    }

    /// Oldest-first turns, alternating user and assistant.
    pub fn turns(&self) -> Vec<ConversationTurn> {
        self.buf
            .iter()
            .flat_map(|pair| {
                [
                    ConversationTurn::user(pair.user.clone()),
                    ConversationTurn::assistant(pair.assistant.clone()),
                ]
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub(crate) fn touch(&mut self) {
        self.last_touched = Instant::now();
    }

    pub(crate) fn idle_since(&self) -> Instant {
        self.last_touched
    }
}
