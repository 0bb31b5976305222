//! Static pattern tables consulted before the estimator vote.

use crate::model::Label;

use super::estimators::count_high;

/// Known short sequence whose final label is the predicted continuation.
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub key: &'static str,
    pub sequence: &'static [Label],
    pub probability: f64,
    pub strength: f64,
}

impl CatalogEntry {
    pub fn prefix(&self) -> &'static [Label] {
        let seq: &'static [Label] = self.sequence;
        &seq[..seq.len() - 1]
    }

    pub fn continuation(&self) -> Label {
        self.sequence[self.sequence.len() - 1]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogMatch {
    pub key: &'static str,
    pub label: Label,
    pub confidence: f64,
}

const CATALOG_WINDOW: usize = 5;

macro_rules! entry {
    (@label T) => { Label::High };
    (@label X) => { Label::Low };
    ($key:literal, [$($l:ident),+], $p:literal, $s:literal) => {
        CatalogEntry {
            key: $key,
            sequence: &[$(entry!(@label $l)),+],
            probability: $p,
            strength: $s,
        }
    };
}

/// Scanned in order; the first matching entry wins.
pub static PATTERN_CATALOG: [CatalogEntry; 12] = [
    entry!("T-X-T-X", [T, X, T, X], 0.70, 0.80),
    entry!("T-X-X-T", [T, X, X, T], 0.65, 0.75),
    entry!("T-T-X-T-T", [T, T, X, T, T], 0.68, 0.78),
    entry!("T-T-T-X", [T, T, T, X], 0.72, 0.82),
    entry!("T-X-X-X", [T, X, X, X], 0.72, 0.82),
    entry!("T-T-X-X", [T, T, X, X], 0.66, 0.76),
    entry!("T-T-X-X-X", [T, T, X, X, X], 0.71, 0.81),
    entry!("T-T-T-X-X", [T, T, T, X, X], 0.73, 0.83),
    entry!("T-T-T-T-X", [T, T, T, T, X], 0.76, 0.86),
    entry!("T-X-X-X-X", [T, X, X, X, X], 0.76, 0.86),
    entry!("X-T-X-T", [X, T, X, T], 0.70, 0.80),
    entry!("X-X-T-T", [X, X, T, T], 0.66, 0.76),
];

/// Match the last five labels against the prefix (all but the final label) of each entry.
pub fn match_catalog(history: &[Label]) -> Option<CatalogMatch> {
    let recent = &history[history.len().saturating_sub(CATALOG_WINDOW)..];
    PATTERN_CATALOG
        .iter()
        .find(|e| recent.ends_with(e.prefix()))
        .map(|e| CatalogMatch {
            key: e.key,
            label: e.continuation(),
            confidence: e.strength * 0.9,
        })
}

/// Detector plus deterministic prediction, checked ahead of everything else.
#[derive(Clone, Copy)]
pub struct AdaptiveRule {
    pub id: &'static str,
    pub detect: fn(&[Label]) -> bool,
    pub predict: fn(&[Label]) -> Label,
    pub confidence: f64,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveMatch {
    pub id: &'static str,
    pub label: Label,
    pub confidence: f64,
    pub description: &'static str,
}

pub static ADAPTIVE_RULES: [AdaptiveRule; 3] = [
    AdaptiveRule {
        id: "high-concentration-6",
        detect: high_concentration_6,
        predict: predict_low,
        confidence: 0.72,
        description: "4 High in the last 6 rounds ending on High, expect Low",
    },
    AdaptiveRule {
        id: "high-concentration-8",
        detect: high_concentration_8,
        predict: predict_low,
        confidence: 0.78,
        description: "6+ High in the last 8 rounds ending on High, expect Low strongly",
    },
    AdaptiveRule {
        id: "perfect-alternation-5",
        detect: perfect_alternation_5,
        predict: predict_flip,
        confidence: 0.68,
        description: "last 5 rounds alternate perfectly, expect a flip",
    },
];

pub fn match_adaptive(history: &[Label]) -> Option<AdaptiveMatch> {
    ADAPTIVE_RULES
        .iter()
        .find(|rule| (rule.detect)(history))
        .map(|rule| AdaptiveMatch {
            id: rule.id,
            label: (rule.predict)(history),
            confidence: rule.confidence,
            description: rule.description,
        })
}

fn high_concentration_6(history: &[Label]) -> bool {
    if history.len() < 6 {
        return false;
    }
    let last6 = &history[history.len() - 6..];
    count_high(last6) == 4 && last6[5] == Label::High
}

fn high_concentration_8(history: &[Label]) -> bool {
    if history.len() < 8 {
        return false;
    }
    let last8 = &history[history.len() - 8..];
    count_high(last8) >= 6 && last8[7] == Label::High
}

fn perfect_alternation_5(history: &[Label]) -> bool {
    if history.len() < 5 {
        return false;
    }
    history[history.len() - 5..]
        .windows(2)
        .all(|w| w[0] != w[1])
}

fn predict_low(_history: &[Label]) -> Label {
    Label::Low
}

fn predict_flip(history: &[Label]) -> Label {
    history.last().copied().unwrap_or(Label::High).opposite()
}
