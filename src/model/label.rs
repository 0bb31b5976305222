use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a single dice round: three dice summing above 10 is `High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    High,
    Low,
}

impl Label {
    pub fn from_dice(d1: u8, d2: u8, d3: u8) -> Self {
        Self::from_total(u32::from(d1) + u32::from(d2) + u32::from(d3))
    }

    pub fn from_total(total: u32) -> Self {
        if total > 10 {
            Label::High
        } else {
            Label::Low
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Label::High => Label::Low,
            Label::Low => Label::High,
        }
    }

    /// Single-letter code used in pattern strings (`T` = Tài, `X` = Xỉu).
    pub fn code(self) -> char {
        match self {
            Label::High => 'T',
            Label::Low => 'X',
        }
    }

    pub fn from_code(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'T' => Some(Label::High),
            'X' => Some(Label::Low),
            _ => None,
        }
    }

    /// Display name used by the public JSON API.
    pub fn as_vietnamese(self) -> &'static str {
        match self {
            Label::High => "Tài",
            Label::Low => "Xỉu",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::High => write!(f, "HIGH"),
            Label::Low => write!(f, "LOW"),
        }
    }
}

/// Parse a compact `T`/`X` string such as `"TTXT"` into labels, skipping separators.
pub fn parse_codes(s: &str) -> Vec<Label> {
    s.chars().filter_map(Label::from_code).collect()
}

/// Join labels into their compact code string.
pub fn to_codes(labels: &[Label]) -> String {
    labels.iter().map(|l| l.code()).collect()
}
