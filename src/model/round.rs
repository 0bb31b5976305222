use std::fmt;

use chrono::{DateTime, Utc};

use super::label::Label;
use crate::predictor::Prediction;

/// Upstream game channels; each one runs its own predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Classic,
    Md5,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Classic, Channel::Md5];

    pub fn as_tag(&self) -> &'static str {
        match self {
            Channel::Classic => "TX",
            Channel::Md5 => "MD5",
        }
    }

    /// Key used for this channel in the `/api/history` payload.
    pub fn api_key(&self) -> &'static str {
        match self {
            Channel::Classic => "taixiu",
            Channel::Md5 => "taixiumd5",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// A confirmed round decoded from the feed, before it is applied to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundEvent {
    pub round_id: u64,
    pub dice: [u8; 3],
}

impl RoundEvent {
    pub fn new(round_id: u64, d1: u8, d2: u8, d3: u8) -> Self {
        Self {
            round_id,
            dice: [d1, d2, d3],
        }
    }

    pub fn total(&self) -> u32 {
        self.dice.iter().map(|d| u32::from(*d)).sum()
    }

    pub fn label(&self) -> Label {
        Label::from_total(self.total())
    }
}

/// Immutable record of an applied round, kept newest-first in the channel history.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundRecord {
    pub round_id: u64,
    pub dice: [u8; 3],
    pub total: u32,
    pub label: Label,
    /// Up to ten newest labels (newest first) as `T`/`X` codes, this round included.
    pub pattern: String,
    /// Prediction for the following round, made right after this one was applied.
    pub prediction: Option<Prediction>,
    pub observed_at: DateTime<Utc>,
}
