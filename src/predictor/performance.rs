use serde::Serialize;

use crate::model::Label;

pub const RECENT_CAP: u32 = 20;
pub const MIN_RECENT_FOR_WEIGHT: u32 = 5;
pub const WEIGHT_MIN: f64 = 0.1;
pub const WEIGHT_MAX: f64 = 2.0;

/// Running accuracy bookkeeping for one estimator slot.
///
/// The `recent_*` counters saturate at [`RECENT_CAP`] rather than sliding, so
/// once both reach the cap they no longer change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EstimatorStats {
    pub correct: u32,
    pub total: u32,
    pub recent_correct: u32,
    pub recent_total: u32,
    pub streak: u32,
    pub max_streak: u32,
    pub weight: f64,
}

impl Default for EstimatorStats {
    fn default() -> Self {
        Self {
            correct: 0,
            total: 0,
            recent_correct: 0,
            recent_total: 0,
            streak: 0,
            max_streak: 0,
            weight: 1.0,
        }
    }
}

impl EstimatorStats {
    pub fn record(&mut self, predicted: Label, actual: Label) {
        self.total = self.total.saturating_add(1);
        self.recent_total = self.recent_total.saturating_add(1).min(RECENT_CAP);

        if predicted == actual {
            self.correct = self.correct.saturating_add(1);
            self.recent_correct = self.recent_correct.saturating_add(1).min(RECENT_CAP);
            self.streak = self.streak.saturating_add(1);
            self.max_streak = self.max_streak.max(self.streak);
        } else {
            self.streak = 0;
        }

        if self.recent_total > MIN_RECENT_FOR_WEIGHT {
            let recent_accuracy = self.recent_correct as f64 / self.recent_total as f64;
            self.weight = (recent_accuracy * 1.5).clamp(WEIGHT_MIN, WEIGHT_MAX);
        }
    }

    pub fn accuracy(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.correct as f64 / self.total as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_stays_default_until_six_samples() {
        let mut s = EstimatorStats::default();
        for _ in 0..5 {
            s.record(Label::High, Label::Low);
        }
        assert_eq!(s.recent_total, 5);
        assert!((s.weight - 1.0).abs() < f64::EPSILON);

        s.record(Label::High, Label::Low);
        assert!((s.weight - WEIGHT_MIN).abs() < f64::EPSILON);
    }

    #[test]
    fn recent_counters_saturate_and_streak_resets() {
        let mut s = EstimatorStats::default();
        for _ in 0..30 {
            s.record(Label::Low, Label::Low);
        }
        assert_eq!(s.total, 30);
        assert_eq!(s.recent_total, RECENT_CAP);
        assert_eq!(s.recent_correct, RECENT_CAP);
        assert_eq!(s.max_streak, 30);
        assert!((s.weight - 1.5).abs() < 1e-9);

        s.record(Label::Low, Label::High);
        assert_eq!(s.streak, 0);
        assert_eq!(s.max_streak, 30);
        assert_eq!(s.recent_total, RECENT_CAP);
        assert_eq!(s.accuracy(), Some(30.0 / 31.0));
    }
}
