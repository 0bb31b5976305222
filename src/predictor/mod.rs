//! Next-round prediction for a single channel's label stream.
//!
//! Order of evaluation in [`EnsemblePredictor::predict`]: adaptive rules, then
//! the fixed pattern catalog, then a weighted vote over every estimator slot
//! with a market-regime adjustment on top.

pub mod estimators;
pub mod market_state;
pub mod patterns;
pub mod performance;
pub mod sequence;

use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::model::Label;

pub use estimators::{
    Estimate, EstimatorBehavior, EstimatorFault, EstimatorSlot, ESTIMATOR_COUNT, ESTIMATOR_SLOTS,
};
pub use market_state::{MarketState, Regime, SessionStats, Trend};
pub use patterns::{match_adaptive, match_catalog, ADAPTIVE_RULES, PATTERN_CATALOG};
pub use performance::EstimatorStats;
pub use sequence::{SequenceStore, SEQUENCE_CAPACITY};

pub const MIN_HISTORY_FOR_PREDICTION: usize = 3;
pub const CONFIDENCE_FLOOR: f64 = 0.5;
pub const CONFIDENCE_CEIL: f64 = 0.95;
const TRENDING_CONFIDENCE_CAP: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionMethod {
    Default,
    Adaptive(&'static str),
    Pattern(&'static str),
    Ensemble,
}

impl fmt::Display for PredictionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionMethod::Default => write!(f, "default"),
            PredictionMethod::Adaptive(id) => write!(f, "adaptive:{}", id),
            PredictionMethod::Pattern(key) => write!(f, "pattern:{}", key),
            PredictionMethod::Ensemble => write!(f, "ensemble_{}_models", ESTIMATOR_COUNT),
        }
    }
}

/// Diagnostics from the weighted vote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoteSummary {
    #[serde(rename = "tScore")]
    pub high_score: f64,
    #[serde(rename = "xScore")]
    pub low_score: f64,
    #[serde(rename = "totalModels")]
    pub total_models: usize,
    #[serde(rename = "marketRegime")]
    pub market_regime: Regime,
    pub volatility: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictionDetails {
    Note(String),
    Vote(VoteSummary),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: Label,
    pub confidence: f64,
    pub method: PredictionMethod,
    pub details: PredictionDetails,
}

impl Prediction {
    fn new(label: Label, confidence: f64, method: PredictionMethod, details: PredictionDetails) -> Self {
        Self {
            label,
            confidence: round2(confidence.clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEIL)),
            method,
            details,
        }
    }

    fn insufficient_history() -> Self {
        Self::new(
            Label::High,
            0.5,
            PredictionMethod::Default,
            PredictionDetails::Note("insufficient history".to_string()),
        )
    }

    /// Confidence as a whole percentage, e.g. `0.72` -> `72`.
    pub fn confidence_percent(&self) -> u32 {
        (self.confidence * 100.0).round() as u32
    }
}

/// Outcome of the weighted vote, before any regime adjustment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedVote {
    pub label: Label,
    pub confidence: f64,
    pub high_score: f64,
    pub low_score: f64,
}

/// Combine `(estimate, weight)` ballots.
///
/// Confidence is the weight-scaled average confidence times the winner's share
/// of the weighted confidence mass; it is not a normalized probability. Ties go
/// to Low. Returns `None` when there is no confidence mass to split.
pub fn weighted_vote<I>(ballots: I) -> Option<WeightedVote>
where
    I: IntoIterator<Item = (Estimate, f64)>,
{
    let mut vote_high = 0.0;
    let mut vote_low = 0.0;
    let mut total_confidence = 0.0;
    let mut total_weight = 0.0;

    for (est, weight) in ballots {
        let weighted = est.confidence * weight;
        match est.label {
            Label::High => vote_high += weighted,
            Label::Low => vote_low += weighted,
        }
        total_confidence += weighted;
        total_weight += weight;
    }

    if total_confidence <= 0.0 || total_weight <= 0.0 {
        return None;
    }

    let avg_confidence = total_confidence / total_weight;
    let high_score = vote_high / total_confidence;
    let low_score = vote_low / total_confidence;
    let (label, confidence) = if high_score > low_score {
        (Label::High, avg_confidence * high_score)
    } else {
        (Label::Low, avg_confidence * low_score)
    };

    Some(WeightedVote {
        label,
        confidence,
        high_score,
        low_score,
    })
}

/// Trending markets follow the trend; volatile ones shave confidence.
pub fn adjust_for_regime(label: Label, confidence: f64, market: &MarketState) -> (Label, f64) {
    match (market.regime, market.trend) {
        (Regime::Trending, Trend::Up) => (
            Label::High,
            (confidence * 1.1).min(TRENDING_CONFIDENCE_CAP),
        ),
        (Regime::Trending, Trend::Down) => (
            Label::Low,
            (confidence * 1.1).min(TRENDING_CONFIDENCE_CAP),
        ),
        (Regime::Volatile, _) => (label, (confidence * 0.9).max(CONFIDENCE_FLOOR)),
        _ => (label, confidence),
    }
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Heuristic ensemble over one channel's label stream.
///
/// Every slot in [`ESTIMATOR_SLOTS`] is scored against each new label, and its
/// recent accuracy sets its weight in the vote.
#[derive(Debug, Clone)]
pub struct EnsemblePredictor {
    sequence: SequenceStore,
    stats: [EstimatorStats; ESTIMATOR_COUNT],
    session: SessionStats,
    market: MarketState,
    rng: StdRng,
}

impl Default for EnsemblePredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl EnsemblePredictor {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic predictor: the noise slot draws from a seeded generator.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            sequence: SequenceStore::default(),
            stats: [EstimatorStats::default(); ESTIMATOR_COUNT],
            session: SessionStats::default(),
            market: MarketState::default(),
            rng,
        }
    }

    /// Score every slot against `label`, then append it and refresh derived state.
    pub fn add_result(&mut self, label: Label) {
        let prev = self.sequence.last();

        let history = self.sequence.as_slice();
        if !history.is_empty() {
            for (slot, stats) in ESTIMATOR_SLOTS.iter().zip(self.stats.iter_mut()) {
                match slot.behavior.estimate(history, &mut self.rng) {
                    Ok(est) => stats.record(est.label, label),
                    Err(fault) => {
                        tracing::debug!(
                            slot = slot.id,
                            error = %fault,
                            "Scoring faulted estimator on its tie-break"
                        );
                        stats.record(fault.tie_break_label(), label);
                    }
                }
            }
        }

        self.session.observe(prev, label);
        self.sequence.push(label);

        let history = self.sequence.as_slice();
        self.session.update_volatility(history);
        self.market.update(history, self.session.volatility);
    }

    pub fn predict(&mut self) -> Prediction {
        let history = self.sequence.as_slice();
        if history.len() < MIN_HISTORY_FOR_PREDICTION {
            return Prediction::insufficient_history();
        }

        if let Some(m) = match_adaptive(history) {
            return Prediction::new(
                m.label,
                m.confidence,
                PredictionMethod::Adaptive(m.id),
                PredictionDetails::Note(m.description.to_string()),
            );
        }

        if let Some(m) = match_catalog(history) {
            return Prediction::new(
                m.label,
                m.confidence,
                PredictionMethod::Pattern(m.key),
                PredictionDetails::Note(format!("matched pattern {}", m.key)),
            );
        }

        let mut ballots = Vec::with_capacity(ESTIMATOR_COUNT);
        for (slot, stats) in ESTIMATOR_SLOTS.iter().zip(self.stats.iter()) {
            match slot.behavior.estimate(history, &mut self.rng) {
                Ok(est) if est.confidence.is_finite() && est.confidence > 0.0 => {
                    ballots.push((est, stats.weight));
                }
                Ok(est) => {
                    tracing::debug!(slot = slot.id, confidence = est.confidence, "Estimator abstained");
                }
                Err(fault) => {
                    tracing::debug!(slot = slot.id, error = %fault, "Estimator abstained");
                }
            }
        }

        let Some(vote) = weighted_vote(ballots) else {
            tracing::warn!("Every estimator abstained, returning neutral call");
            return Prediction::new(
                Label::High,
                0.5,
                PredictionMethod::Ensemble,
                PredictionDetails::Vote(self.vote_summary(0.0, 0.0)),
            );
        };

        let (label, confidence) = adjust_for_regime(vote.label, vote.confidence, &self.market);
        Prediction::new(
            label,
            confidence,
            PredictionMethod::Ensemble,
            PredictionDetails::Vote(self.vote_summary(vote.high_score, vote.low_score)),
        )
    }

    fn vote_summary(&self, high_score: f64, low_score: f64) -> VoteSummary {
        VoteSummary {
            high_score: round2(high_score),
            low_score: round2(low_score),
            total_models: ESTIMATOR_COUNT,
            market_regime: self.market.regime,
            volatility: round2(self.session.volatility),
        }
    }

    pub fn history(&self) -> Vec<Label> {
        self.sequence.to_vec()
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn session(&self) -> &SessionStats {
        &self.session
    }

    pub fn market(&self) -> &MarketState {
        &self.market
    }

    /// Per-slot performance in slot order.
    pub fn slot_stats(&self) -> impl Iterator<Item = (&'static str, &EstimatorStats)> + '_ {
        ESTIMATOR_SLOTS
            .iter()
            .map(|slot| slot.id)
            .zip(self.stats.iter())
    }

    pub fn stats_for(&self, slot_id: &str) -> Option<&EstimatorStats> {
        self.slot_stats()
            .find(|(id, _)| *id == slot_id)
            .map(|(_, stats)| stats)
    }
}
