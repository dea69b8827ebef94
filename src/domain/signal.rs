//! Buy/sell signal derived from RSI(14) and the SMA(50)/SMA(200) trend.

use serde::{Deserialize, Serialize};

use super::indicator::rsi::calculate_rsi;
use super::indicator::sma::calculate_sma;
use super::market::PricePoint;

pub const RSI_PERIOD: usize = 14;
pub const SHORT_SMA: usize = 50;
pub const LONG_SMA: usize = 200;
/// Fewer points than this produce no signal.
pub const MIN_POINTS: usize = LONG_SMA;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsiSentiment {
    Overbought,
    Oversold,
    Neutral,
}

impl RsiSentiment {
    pub fn from_rsi(rsi: f64) -> Self {
        if rsi > 70.0 {
            RsiSentiment::Overbought
        } else if rsi < 30.0 {
            RsiSentiment::Oversold
        } else {
            RsiSentiment::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RsiSentiment::Overbought => "Overbought",
            RsiSentiment::Oversold => "Oversold",
            RsiSentiment::Neutral => "Neutral",
        }
    }

    fn score(self) -> i32 {
        match self {
            RsiSentiment::Oversold => 2,
            RsiSentiment::Overbought => -2,
            RsiSentiment::Neutral => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaSentiment {
    #[serde(rename = "Golden Cross")]
    GoldenCross,
    #[serde(rename = "Death Cross")]
    DeathCross,
    Bullish,
    Bearish,
    Neutral,
}

impl MaSentiment {
    /// Classify the trend from the last two SMA50/SMA200 pairs. Without a
    /// previous pair no crossover can be detected.
    pub fn classify(prev: Option<(f64, f64)>, last: (f64, f64)) -> Self {
        let (short, long) = last;
        if let Some((prev_short, prev_long)) = prev {
            if prev_short <= prev_long && short > long {
                return MaSentiment::GoldenCross;
            }
            if prev_short >= prev_long && short < long {
                return MaSentiment::DeathCross;
            }
        }
        if short > long {
            MaSentiment::Bullish
        } else if short < long {
            MaSentiment::Bearish
        } else {
            MaSentiment::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MaSentiment::GoldenCross => "Golden Cross",
            MaSentiment::DeathCross => "Death Cross",
            MaSentiment::Bullish => "Bullish",
            MaSentiment::Bearish => "Bearish",
            MaSentiment::Neutral => "Neutral",
        }
    }

    fn score(self) -> i32 {
        match self {
            MaSentiment::GoldenCross => 2,
            MaSentiment::DeathCross => -2,
            MaSentiment::Bullish => 1,
            MaSentiment::Bearish => -1,
            MaSentiment::Neutral => 0,
        }
    }

    fn short_above(self) -> bool {
        matches!(self, MaSentiment::GoldenCross | MaSentiment::Bullish)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "Strong Buy")]
    StrongBuy,
    Buy,
    Hold,
    Sell,
    #[serde(rename = "Strong Sell")]
    StrongSell,
}

impl Recommendation {
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s >= 3 => Recommendation::StrongBuy,
            2 => Recommendation::Buy,
            -2 => Recommendation::Sell,
            s if s <= -3 => Recommendation::StrongSell,
            _ => Recommendation::Hold,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::StrongBuy => "Strong Buy",
            Recommendation::Buy => "Buy",
            Recommendation::Hold => "Hold",
            Recommendation::Sell => "Sell",
            Recommendation::StrongSell => "Strong Sell",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsiReading {
    pub value: f64,
    pub sentiment: RsiSentiment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingAverages {
    pub sma50: f64,
    pub sma200: f64,
    pub sentiment: MaSentiment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSummary {
    pub recommendation: Recommendation,
    pub confidence: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalSignal {
    pub rsi: RsiReading,
    pub moving_averages: MovingAverages,
    pub summary: SignalSummary,
}

/// Compute the signal for a daily series, oldest first. Returns `None` when
/// the series is too short for SMA(200).
pub fn generate_signal(points: &[PricePoint]) -> Option<TechnicalSignal> {
    if points.len() < MIN_POINTS {
        return None;
    }

    let rsi = calculate_rsi(points, RSI_PERIOD).last_valid()?;
    let rsi_sentiment = RsiSentiment::from_rsi(rsi);

    let short = calculate_sma(points, SHORT_SMA).valid_values();
    let long = calculate_sma(points, LONG_SMA).valid_values();
    let last = (*short.last()?, *long.last()?);
    let prev = match (short.len(), long.len()) {
        (s, l) if s >= 2 && l >= 2 => Some((short[s - 2], long[l - 2])),
        _ => None,
    };
    let ma_sentiment = MaSentiment::classify(prev, last);

    let score = rsi_sentiment.score() + ma_sentiment.score();
    let recommendation = Recommendation::from_score(score);
    let confidence = (score.abs() as f64 / 4.0).min(1.0);

    let text = format!(
        "Based on technical indicators, the current outlook is {}. \
         The RSI is at {:.2}, indicating a {} condition. \
         The 50-day moving average is currently {} the 200-day moving average, \
         suggesting a {} trend.",
        recommendation.as_str(),
        rsi,
        rsi_sentiment.as_str().to_lowercase(),
        if ma_sentiment.short_above() { "above" } else { "below" },
        ma_sentiment.as_str().to_lowercase(),
    );

    Some(TechnicalSignal {
        rsi: RsiReading {
            value: rsi,
            sentiment: rsi_sentiment,
        },
        moving_averages: MovingAverages {
            sma50: last.0,
            sma200: last.1,
            sentiment: ma_sentiment,
        },
        summary: SignalSummary {
            recommendation,
            confidence,
            text,
        },
    })
}
