use rand::Rng;
use thiserror::Error;

use crate::model::Label;

/// A single estimator's call for the next round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub label: Label,
    pub confidence: f64,
}

impl Estimate {
    pub fn new(label: Label, confidence: f64) -> Self {
        Self { label, confidence }
    }

    /// Fallback returned whenever the history is shorter than an estimator needs.
    pub fn fallback() -> Self {
        Self::new(Label::High, 0.5)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimatorFault {
    #[error("no transitions observed out of {0}")]
    NoTransitions(Label),
}

impl EstimatorFault {
    /// Label the faulted call still counts as when scored: zero successors
    /// on each side is a tie, and ties go to Low.
    pub fn tie_break_label(&self) -> Label {
        match self {
            EstimatorFault::NoTransitions(_) => Label::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorBehavior {
    RecentMajority,
    Reversal,
    RunBreak,
    TripleLookup,
    GlobalBias,
    VolatilityConditioned,
    TransitionFrequency,
    Momentum,
    ShortCycle,
    BalanceCorrection,
    Noise,
}

#[derive(Debug, Clone, Copy)]
pub struct EstimatorSlot {
    pub id: &'static str,
    pub behavior: EstimatorBehavior,
}

const fn slot(id: &'static str, behavior: EstimatorBehavior) -> EstimatorSlot {
    EstimatorSlot { id, behavior }
}

pub const ESTIMATOR_COUNT: usize = 21;

/// Every slot votes and is scored separately.
///
/// Slots 11..=20 repeat the behaviors of 1..=10. This looks like an accident of
/// the scoring model this ensemble was tuned against, but removing the
/// duplicates halves those behaviors' share of the vote, so they stay.
pub static ESTIMATOR_SLOTS: [EstimatorSlot; ESTIMATOR_COUNT] = [
    slot("recent-majority", EstimatorBehavior::RecentMajority),
    slot("reversal", EstimatorBehavior::Reversal),
    slot("run-break", EstimatorBehavior::RunBreak),
    slot("triple-lookup", EstimatorBehavior::TripleLookup),
    slot("global-bias", EstimatorBehavior::GlobalBias),
    slot("volatility-conditioned", EstimatorBehavior::VolatilityConditioned),
    slot("transition-frequency", EstimatorBehavior::TransitionFrequency),
    slot("momentum", EstimatorBehavior::Momentum),
    slot("short-cycle", EstimatorBehavior::ShortCycle),
    slot("balance-correction", EstimatorBehavior::BalanceCorrection),
    slot("recent-majority-alias", EstimatorBehavior::RecentMajority),
    slot("reversal-alias", EstimatorBehavior::Reversal),
    slot("run-break-alias", EstimatorBehavior::RunBreak),
    slot("triple-lookup-alias", EstimatorBehavior::TripleLookup),
    slot("global-bias-alias", EstimatorBehavior::GlobalBias),
    slot("volatility-conditioned-alias", EstimatorBehavior::VolatilityConditioned),
    slot("transition-frequency-alias", EstimatorBehavior::TransitionFrequency),
    slot("momentum-alias", EstimatorBehavior::Momentum),
    slot("short-cycle-alias", EstimatorBehavior::ShortCycle),
    slot("balance-correction-alias", EstimatorBehavior::BalanceCorrection),
    slot("noise", EstimatorBehavior::Noise),
];

impl EstimatorBehavior {
    /// Shortest history for which the behavior computes anything but the fallback.
    pub fn min_history(&self) -> usize {
        match self {
            EstimatorBehavior::RecentMajority => 5,
            EstimatorBehavior::Reversal => 3,
            EstimatorBehavior::RunBreak => 4,
            EstimatorBehavior::TripleLookup => 6,
            EstimatorBehavior::GlobalBias => 10,
            EstimatorBehavior::VolatilityConditioned => 8,
            EstimatorBehavior::TransitionFrequency => 12,
            EstimatorBehavior::Momentum => 7,
            EstimatorBehavior::ShortCycle => 10,
            EstimatorBehavior::BalanceCorrection => 15,
            EstimatorBehavior::Noise => 0,
        }
    }

    pub fn estimate<R: Rng>(
        &self,
        history: &[Label],
        rng: &mut R,
    ) -> Result<Estimate, EstimatorFault> {
        if history.len() < self.min_history() {
            return Ok(Estimate::fallback());
        }
        let estimate = match self {
            EstimatorBehavior::RecentMajority => recent_majority(history),
            EstimatorBehavior::Reversal => reversal(history),
            EstimatorBehavior::RunBreak => run_break(history),
            EstimatorBehavior::TripleLookup => triple_lookup(history),
            EstimatorBehavior::GlobalBias => global_bias(history),
            EstimatorBehavior::VolatilityConditioned => volatility_conditioned(history),
            EstimatorBehavior::TransitionFrequency => transition_frequency(history)?,
            EstimatorBehavior::Momentum => momentum(history),
            EstimatorBehavior::ShortCycle => short_cycle(history),
            EstimatorBehavior::BalanceCorrection => balance_correction(history),
            EstimatorBehavior::Noise => noise(history, rng),
        };
        Ok(estimate)
    }
}

/// Fraction of adjacent pairs whose labels differ.
pub fn change_rate(labels: &[Label]) -> f64 {
    if labels.len() < 2 {
        return 0.0;
    }
    let changes = labels.windows(2).filter(|w| w[0] != w[1]).count();
    changes as f64 / (labels.len() - 1) as f64
}

/// Length of the run of identical labels at the end of `labels`.
pub fn trailing_run(labels: &[Label]) -> usize {
    let Some(last) = labels.last() else {
        return 0;
    };
    labels.iter().rev().take_while(|l| *l == last).count()
}

pub fn count_high(labels: &[Label]) -> usize {
    labels.iter().filter(|l| **l == Label::High).count()
}

fn tail(labels: &[Label], n: usize) -> &[Label] {
    &labels[labels.len().saturating_sub(n)..]
}

fn last_or_high(history: &[Label]) -> Label {
    history.last().copied().unwrap_or(Label::High)
}

pub fn recent_majority(history: &[Label]) -> Estimate {
    if history.len() < 5 {
        return Estimate::fallback();
    }
    let recent = tail(history, 5);
    let highs = count_high(recent) as f64;
    let lows = recent.len() as f64 - highs;
    if highs > lows {
        Estimate::new(Label::High, 0.55 + (highs - lows) * 0.05)
    } else {
        Estimate::new(Label::Low, 0.55 + (lows - highs) * 0.05)
    }
}

pub fn reversal(history: &[Label]) -> Estimate {
    if history.len() < 3 {
        return Estimate::fallback();
    }
    let last = history[history.len() - 1];
    let second_last = history[history.len() - 2];
    if last == second_last {
        Estimate::new(last.opposite(), 0.60)
    } else {
        Estimate::new(last, 0.55)
    }
}

pub fn run_break(history: &[Label]) -> Estimate {
    if history.len() < 4 {
        return Estimate::fallback();
    }
    let last_three = tail(history, 3);
    if last_three.iter().all(|l| *l == last_three[0]) {
        let run = trailing_run(history) as f64;
        return Estimate::new(last_three[0].opposite(), 0.65 + run * 0.05);
    }
    Estimate::fallback()
}

const TRIPLE_TABLE: [([Label; 3], Label); 8] = {
    use Label::{High as T, Low as X};
    [
        ([T, T, T], X),
        ([X, X, X], T),
        ([T, X, T], X),
        ([X, T, X], T),
        ([T, T, X], T),
        ([X, X, T], X),
        ([T, X, X], T),
        ([X, T, T], X),
    ]
};

pub fn triple_lookup(history: &[Label]) -> Estimate {
    if history.len() < 6 {
        return Estimate::fallback();
    }
    let key = tail(history, 3);
    TRIPLE_TABLE
        .iter()
        .find(|(seq, _)| seq.as_slice() == key)
        .map(|(_, next)| Estimate::new(*next, 0.62))
        .unwrap_or_else(|| recent_majority(history))
}

pub fn global_bias(history: &[Label]) -> Estimate {
    if history.len() < 10 {
        return Estimate::fallback();
    }
    let p_high = count_high(history) as f64 / history.len() as f64;
    if p_high > 0.55 {
        Estimate::new(Label::Low, p_high)
    } else if p_high < 0.45 {
        Estimate::new(Label::High, 1.0 - p_high)
    } else {
        Estimate::new(last_or_high(history).opposite(), 0.52)
    }
}

pub fn volatility_conditioned(history: &[Label]) -> Estimate {
    if history.len() < 8 {
        return Estimate::fallback();
    }
    let last = last_or_high(history);
    if change_rate(tail(history, 8)) > 0.7 {
        Estimate::new(last.opposite(), 0.58)
    } else {
        Estimate::new(last, 0.61)
    }
}

pub fn transition_frequency(history: &[Label]) -> Result<Estimate, EstimatorFault> {
    if history.len() < 12 {
        return Ok(Estimate::fallback());
    }
    let last = last_or_high(history);
    let (mut to_high, mut to_low) = (0usize, 0usize);
    for pair in history.windows(2) {
        if pair[0] != last {
            continue;
        }
        match pair[1] {
            Label::High => to_high += 1,
            Label::Low => to_low += 1,
        }
    }
    let seen = to_high + to_low;
    if seen == 0 {
        return Err(EstimatorFault::NoTransitions(last));
    }
    if to_high > to_low {
        Ok(Estimate::new(Label::High, to_high as f64 / seen as f64))
    } else {
        Ok(Estimate::new(Label::Low, to_low as f64 / seen as f64))
    }
}

pub fn momentum(history: &[Label]) -> Estimate {
    if history.len() < 7 {
        return Estimate::fallback();
    }
    let score: i32 = tail(history, 7)
        .windows(2)
        .filter(|w| w[0] == w[1])
        .map(|w| match w[1] {
            Label::High => 1,
            Label::Low => -1,
        })
        .sum();
    if score > 1 {
        Estimate::new(Label::High, 0.63)
    } else if score < -1 {
        Estimate::new(Label::Low, 0.63)
    } else {
        Estimate::new(last_or_high(history), 0.55)
    }
}

pub fn short_cycle(history: &[Label]) -> Estimate {
    if history.len() < 10 {
        return Estimate::fallback();
    }
    let n = history.len();
    for cycle in 2..=5 {
        if n < cycle * 2 {
            break;
        }
        let earlier = &history[n - cycle * 2..n - cycle];
        let latest = &history[n - cycle..];
        if earlier == latest {
            return Estimate::new(earlier[0], 0.68);
        }
    }
    Estimate::new(last_or_high(history), 0.52)
}

pub fn balance_correction(history: &[Label]) -> Estimate {
    if history.len() < 15 {
        return Estimate::fallback();
    }
    let highs = count_high(history);
    let lows = history.len() - highs;
    if highs.abs_diff(lows) as f64 > history.len() as f64 * 0.2 {
        let minority = if highs > lows { Label::Low } else { Label::High };
        Estimate::new(minority, 0.60)
    } else {
        Estimate::new(last_or_high(history), 0.53)
    }
}

/// Low-signal control arm: repeat or flip the last label with equal odds.
pub fn noise<R: Rng>(history: &[Label], rng: &mut R) -> Estimate {
    let last = last_or_high(history);
    if rng.gen_bool(0.5) {
        Estimate::new(last, 0.51)
    } else {
        Estimate::new(last.opposite(), 0.51)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::label::parse_codes;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn short_histories_fall_back_to_high() {
        let mut rng = StdRng::seed_from_u64(1);
        let h = parse_codes("XX");
        for slot in ESTIMATOR_SLOTS.iter().filter(|s| s.behavior != EstimatorBehavior::Noise) {
            let est = slot.behavior.estimate(&h, &mut rng).unwrap();
            assert_eq!(est, Estimate::fallback(), "slot {}", slot.id);
        }
    }

    #[test]
    fn recent_majority_scales_with_margin() {
        let est = recent_majority(&parse_codes("XXTTTTT"));
        assert_eq!(est.label, Label::High);
        assert!(approx(est.confidence, 0.80));
        let est = recent_majority(&parse_codes("TXXXT"));
        assert_eq!(est.label, Label::Low);
        assert!(approx(est.confidence, 0.60));
    }

    #[test]
    fn reversal_flips_after_pair() {
        assert_eq!(reversal(&parse_codes("XTT")), Estimate::new(Label::Low, 0.60));
        assert_eq!(reversal(&parse_codes("TTX")), Estimate::new(Label::Low, 0.55));
    }

    #[test]
    fn run_break_uses_trailing_run_length() {
        let est = run_break(&parse_codes("TXXXX"));
        assert_eq!(est.label, Label::High);
        assert!(approx(est.confidence, 0.85));
        assert_eq!(run_break(&parse_codes("TTXT")), Estimate::fallback());
        assert!(approx(run_break(&parse_codes("XXXXXXXXXXXX")).confidence, 1.25));
    }

    #[test]
    fn triple_lookup_table() {
        assert_eq!(
            triple_lookup(&parse_codes("XTXTTT")),
            Estimate::new(Label::Low, 0.62)
        );
        assert_eq!(
            triple_lookup(&parse_codes("TTTTXX")),
            Estimate::new(Label::High, 0.62)
        );
    }

    #[test]
    fn global_bias_leans_against_majority() {
        let est = global_bias(&parse_codes("TTTTTTTXXX"));
        assert_eq!(est.label, Label::Low);
        assert!(approx(est.confidence, 0.7));
        let est = global_bias(&parse_codes("XXXXXXXXTT"));
        assert_eq!(est.label, Label::High);
        assert!(approx(est.confidence, 0.8));
        assert_eq!(
            global_bias(&parse_codes("TTTTTXXXXX")),
            Estimate::new(Label::High, 0.52)
        );
    }

    #[test]
    fn volatility_conditioned_switches_on_change_rate() {
        assert_eq!(
            volatility_conditioned(&parse_codes("TXTXTXTX")),
            Estimate::new(Label::High, 0.58)
        );
        assert_eq!(
            volatility_conditioned(&parse_codes("TTTTXXXX")),
            Estimate::new(Label::Low, 0.61)
        );
    }

    #[test]
    fn transition_frequency_prefers_common_successor() {
        // After T: T->T three times, T->X twice.
        let est = transition_frequency(&parse_codes("XXXXTTTTXXTXT")).unwrap();
        assert_eq!(est.label, Label::High);
        assert!(approx(est.confidence, 0.6));
    }

    #[test]
    fn transition_frequency_faults_without_successors() {
        let fault = transition_frequency(&parse_codes("XXXXXXXXXXXT")).unwrap_err();
        assert_eq!(fault, EstimatorFault::NoTransitions(Label::High));
    }

    #[test]
    fn momentum_follows_repeated_pairs() {
        assert_eq!(momentum(&parse_codes("TTTTXTX")), Estimate::new(Label::High, 0.63));
        assert_eq!(momentum(&parse_codes("XXXTXTX")), Estimate::new(Label::Low, 0.63));
        assert_eq!(momentum(&parse_codes("TXTXTXT")), Estimate::new(Label::High, 0.55));
    }

    #[test]
    fn short_cycle_detects_repeat() {
        let est = short_cycle(&parse_codes("XXXXXXTXTX"));
        assert_eq!(est, Estimate::new(Label::High, 0.68));
        assert_eq!(
            short_cycle(&parse_codes("TTTTTTTTXT")),
            Estimate::new(Label::High, 0.52)
        );
    }

    #[test]
    fn balance_correction_predicts_minority() {
        assert_eq!(
            balance_correction(&parse_codes("TTTTTTTTTTXXXXX")),
            Estimate::new(Label::Low, 0.60)
        );
        assert_eq!(
            balance_correction(&parse_codes("TTTTTTTTXXXXXXX")),
            Estimate::new(Label::Low, 0.53)
        );
    }

    #[test]
    fn noise_is_reproducible_with_seed() {
        let h = parse_codes("TTX");
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        for _ in 0..16 {
            let ea = noise(&h, &mut a);
            assert_eq!(ea, noise(&h, &mut b));
            assert!(approx(ea.confidence, 0.51));
        }
    }

    #[test]
    fn aliases_share_behavior() {
        for i in 0..10 {
            assert_eq!(ESTIMATOR_SLOTS[i].behavior, ESTIMATOR_SLOTS[i + 10].behavior);
            assert_ne!(ESTIMATOR_SLOTS[i].id, ESTIMATOR_SLOTS[i + 10].id);
        }
        assert_eq!(ESTIMATOR_SLOTS[20].behavior, EstimatorBehavior::Noise);
    }
}
