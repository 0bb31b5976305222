use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::model::Label;

use super::estimators::{change_rate, count_high};

pub const VOLATILITY_WINDOW: usize = 10;
pub const MARKET_WINDOW: usize = 15;
const TREND_STRENGTH_THRESHOLD: f64 = 0.6;
const VOLATILITY_THRESHOLD: f64 = 0.7;
const TRENDING_THRESHOLD: f64 = 0.7;
const RANDOM_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Normal,
    Trending,
    Volatile,
    Random,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Normal => "normal",
            Regime::Trending => "trending",
            Regime::Volatile => "volatile",
            Regime::Random => "random",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-label streaks and transition counts accumulated over the whole session.
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub transitions: HashMap<(Label, Label), u32>,
    pub streak_high: u32,
    pub streak_low: u32,
    pub max_streak_high: u32,
    pub max_streak_low: u32,
    /// Change rate over the last [`VOLATILITY_WINDOW`] labels.
    pub volatility: f64,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self {
            transitions: HashMap::new(),
            streak_high: 0,
            streak_low: 0,
            max_streak_high: 0,
            max_streak_low: 0,
            volatility: 0.5,
        }
    }
}

impl SessionStats {
    /// Account for `label` arriving after `prev`.
    pub fn observe(&mut self, prev: Option<Label>, label: Label) {
        match prev {
            Some(prev) => {
                *self.transitions.entry((prev, label)).or_insert(0) += 1;
                if prev == label {
                    *self.streak_mut(label) += 1;
                } else {
                    *self.streak_mut(label) = 1;
                    *self.streak_mut(prev) = 0;
                }
            }
            None => *self.streak_mut(label) = 1,
        }
        self.max_streak_high = self.max_streak_high.max(self.streak_high);
        self.max_streak_low = self.max_streak_low.max(self.streak_low);
    }

    /// Recompute volatility; left untouched until the window is full.
    pub fn update_volatility(&mut self, history: &[Label]) {
        if history.len() < VOLATILITY_WINDOW {
            return;
        }
        self.volatility = change_rate(&history[history.len() - VOLATILITY_WINDOW..]);
    }

    pub fn streak(&self, label: Label) -> u32 {
        match label {
            Label::High => self.streak_high,
            Label::Low => self.streak_low,
        }
    }

    pub fn max_streak(&self, label: Label) -> u32 {
        match label {
            Label::High => self.max_streak_high,
            Label::Low => self.max_streak_low,
        }
    }

    pub fn transition_count(&self, from: Label, to: Label) -> u32 {
        self.transitions.get(&(from, to)).copied().unwrap_or(0)
    }

    fn streak_mut(&mut self, label: Label) -> &mut u32 {
        match label {
            Label::High => &mut self.streak_high,
            Label::Low => &mut self.streak_low,
        }
    }
}

/// Coarse description of the last [`MARKET_WINDOW`] rounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketState {
    pub trend: Trend,
    pub momentum: f64,
    pub stability: f64,
    pub regime: Regime,
}

impl Default for MarketState {
    fn default() -> Self {
        Self {
            trend: Trend::Neutral,
            momentum: 0.0,
            stability: 0.5,
            regime: Regime::Normal,
        }
    }
}

impl MarketState {
    /// Recompute every field from scratch; untouched until the window is full.
    pub fn update(&mut self, history: &[Label], volatility: f64) {
        if history.len() < MARKET_WINDOW {
            return;
        }
        let recent = &history[history.len() - MARKET_WINDOW..];
        let highs = count_high(recent);
        let lows = recent.len() - highs;
        let trend_strength = highs.abs_diff(lows) as f64 / recent.len() as f64;

        self.trend = if trend_strength > TREND_STRENGTH_THRESHOLD {
            if highs > lows {
                Trend::Up
            } else {
                Trend::Down
            }
        } else {
            Trend::Neutral
        };

        let raw: f64 = recent
            .windows(2)
            .filter(|w| w[0] == w[1])
            .map(|w| match w[1] {
                Label::High => 0.1,
                Label::Low => -0.1,
            })
            .sum();
        self.momentum = raw.tanh();
        self.stability = 1.0 - volatility;

        self.regime = if volatility > VOLATILITY_THRESHOLD {
            Regime::Volatile
        } else if trend_strength > TRENDING_THRESHOLD {
            Regime::Trending
        } else if trend_strength < RANDOM_THRESHOLD {
            Regime::Random
        } else {
            Regime::Normal
        };
    }
}
