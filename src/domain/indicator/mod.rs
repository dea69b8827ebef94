//! Technical indicators over a daily price series.
//!
//! - `IndicatorPoint`: one value aligned with an input price point
//! - `IndicatorType`: indicator identity + parameters
//! - `IndicatorSeries`: the full aligned output, warmup points marked invalid

pub mod rsi;
pub mod sma;

use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub date: DateTime<Utc>,
    pub valid: bool,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Rsi(usize),
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(n) => write!(f, "SMA({n})"),
            IndicatorType::Rsi(n) => write!(f, "RSI({n})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Valid values only, oldest first.
    pub fn valid_values(&self) -> Vec<f64> {
        self.values
            .iter()
            .filter(|p| p.valid)
            .map(|p| p.value)
            .collect()
    }

    pub fn last_valid(&self) -> Option<f64> {
        self.values.iter().rev().find(|p| p.valid).map(|p| p.value)
    }
}

pub(crate) fn invalid_point(date: DateTime<Utc>) -> IndicatorPoint {
    IndicatorPoint {
        date,
        valid: false,
        value: 0.0,
    }
}
