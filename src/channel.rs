use std::collections::VecDeque;

use chrono::Utc;

use crate::model::{Channel, RoundEvent, RoundRecord};
use crate::predictor::{EnsemblePredictor, Prediction};

pub const ROUND_HISTORY_CAPACITY: usize = 100;
pub const PATTERN_SNAPSHOT_LEN: usize = 10;
pub const SNAPSHOT_HISTORY_LEN: usize = 20;

/// Newest-first bounded list of applied rounds.
#[derive(Debug, Clone)]
pub struct RoundHistory {
    records: VecDeque<RoundRecord>,
    capacity: usize,
}

impl Default for RoundHistory {
    fn default() -> Self {
        Self::with_capacity(ROUND_HISTORY_CAPACITY)
    }
}

impl RoundHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn insert(&mut self, record: RoundRecord) {
        self.records.push_front(record);
        while self.records.len() > self.capacity {
            let _ = self.records.pop_back();
        }
    }

    pub fn latest(&self) -> Option<&RoundRecord> {
        self.records.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoundRecord> {
        self.records.iter()
    }

    pub fn newest(&self, n: usize) -> Vec<RoundRecord> {
        self.records.iter().take(n).cloned().collect()
    }

    pub fn contains(&self, round_id: u64) -> bool {
        self.records.iter().any(|r| r.round_id == round_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Read-only view published to the HTTP layer after every applied round.
#[derive(Debug, Clone, Default)]
pub struct ChannelSnapshot {
    pub latest: Option<RoundRecord>,
    pub recent: Vec<RoundRecord>,
}

/// Everything one channel owns: predictor, round history and dedup cursor.
#[derive(Debug)]
pub struct ChannelState {
    channel: Channel,
    predictor: EnsemblePredictor,
    history: RoundHistory,
    last_round_id: Option<u64>,
}

impl ChannelState {
    pub fn new(channel: Channel, predictor: EnsemblePredictor) -> Self {
        Self {
            channel,
            predictor,
            history: RoundHistory::default(),
            last_round_id: None,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn predictor(&self) -> &EnsemblePredictor {
        &self.predictor
    }

    pub fn history(&self) -> &RoundHistory {
        &self.history
    }

    pub fn last_round_id(&self) -> Option<u64> {
        self.last_round_id
    }

    /// Apply a confirmed round. Returns `None` when the round was already applied.
    pub fn apply(&mut self, event: RoundEvent) -> Option<&RoundRecord> {
        if self.last_round_id == Some(event.round_id) || self.history.contains(event.round_id) {
            tracing::trace!(channel = %self.channel, round_id = event.round_id, "Duplicate round ignored");
            return None;
        }
        self.last_round_id = Some(event.round_id);

        let label = event.label();
        self.predictor.add_result(label);
        let prediction = self.predictor.predict();

        let pattern: String = std::iter::once(label.code())
            .chain(
                self.history
                    .iter()
                    .take(PATTERN_SNAPSHOT_LEN - 1)
                    .map(|r| r.label.code()),
            )
            .collect();

        log_round(self.channel, &event, &prediction);

        self.history.insert(RoundRecord {
            round_id: event.round_id,
            dice: event.dice,
            total: event.total(),
            label,
            pattern,
            prediction: Some(prediction),
            observed_at: Utc::now(),
        });
        self.history.latest()
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            latest: self.history.latest().cloned(),
            recent: self.history.newest(SNAPSHOT_HISTORY_LEN),
        }
    }
}

fn log_round(channel: Channel, event: &RoundEvent, prediction: &Prediction) {
    tracing::info!(
        channel = %channel,
        round_id = event.round_id,
        total = event.total(),
        label = %event.label(),
        next = %prediction.label,
        confidence = prediction.confidence,
        method = %prediction.method,
        "Round applied"
    );
}
