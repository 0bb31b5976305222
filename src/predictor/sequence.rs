use std::collections::VecDeque;

use crate::model::Label;

pub const SEQUENCE_CAPACITY: usize = 200;

/// Bounded chronological label history; the oldest label is evicted on overflow.
#[derive(Debug, Clone)]
pub struct SequenceStore {
    labels: VecDeque<Label>,
    capacity: usize,
}

impl Default for SequenceStore {
    fn default() -> Self {
        Self::with_capacity(SEQUENCE_CAPACITY)
    }
}

impl SequenceStore {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            labels: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, label: Label) {
        self.labels.push_back(label);
        while self.labels.len() > self.capacity {
            let _ = self.labels.pop_front();
        }
    }

    /// Contiguous view in arrival order, oldest first.
    pub fn as_slice(&mut self) -> &[Label] {
        self.labels.make_contiguous()
    }

    pub fn to_vec(&self) -> Vec<Label> {
        self.labels.iter().copied().collect()
    }

    pub fn last(&self) -> Option<Label> {
        self.labels.back().copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
