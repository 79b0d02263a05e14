//! Signals, pattern kinds and detected matches
//!
//! Everything here serializes with the wire names of the market-data service
//! (`BUY`, `STRONG`, `THREE_BLACK_CROWS`, ...).

use std::{cmp::Ordering, collections::BTreeMap, fmt};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{numeric, OHLCVExt, OHLCV};

// ============================================================
// SIGNALS
// ============================================================

/// Trading signal attached to indicator points and pattern matches
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Buy,
    Sell,
    #[default]
    Hold,
    HighVolatility,
    LowVolatility,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
            Signal::HighVolatility => "HIGH_VOLATILITY",
            Signal::LowVolatility => "LOW_VOLATILITY",
        }
    }

    /// True for BUY and SELL
    #[inline]
    pub fn is_directional(self) -> bool {
        matches!(self, Signal::Buy | Signal::Sell)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordinal bucket of a confidence score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strength {
    Weak,
    Medium,
    Strong,
}

/// Risk level of a combined per-bar signal (inverse of average confidence)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

// ============================================================
// PATTERN KINDS
// ============================================================

/// Family a pattern belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternFamily {
    Candlestick,
    Chart,
    VolumePrice,
}

impl PatternFamily {
    pub const ALL: [PatternFamily; 3] = [
        PatternFamily::Candlestick,
        PatternFamily::Chart,
        PatternFamily::VolumePrice,
    ];
}

/// Closed set of recognised patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternKind {
    // Single bar
    Doji,
    Hammer,
    ShootingStar,
    InvertedHammer,
    SpinningTop,
    // Two bar
    Engulfing,
    Harami,
    DarkCloudCover,
    DoubleCannon,
    // Three bar
    ThreeBlackCrows,
    RedThreeSoldiers,
    MorningStar,
    EveningStar,
    // Chart formations
    TriangleBreakout,
    HeadAndShoulders,
    // Volume-price
    LowVolumePrice,
    HighVolumePrice,
    VolumeDecreasePriceIncrease,
    VolumeIncreasePriceDecrease,
    VolumePriceRise,
    VolumePriceDivergence,
    VolumeBreakout,
}

impl PatternKind {
    /// Stable identifier, identical to the serialized form
    pub fn as_str(self) -> &'static str {
        match self {
            PatternKind::Doji => "DOJI",
            PatternKind::Hammer => "HAMMER",
            PatternKind::ShootingStar => "SHOOTING_STAR",
            PatternKind::InvertedHammer => "INVERTED_HAMMER",
            PatternKind::SpinningTop => "SPINNING_TOP",
            PatternKind::Engulfing => "ENGULFING",
            PatternKind::Harami => "HARAMI",
            PatternKind::DarkCloudCover => "DARK_CLOUD_COVER",
            PatternKind::DoubleCannon => "DOUBLE_CANNON",
            PatternKind::ThreeBlackCrows => "THREE_BLACK_CROWS",
            PatternKind::RedThreeSoldiers => "RED_THREE_SOLDIERS",
            PatternKind::MorningStar => "MORNING_STAR",
            PatternKind::EveningStar => "EVENING_STAR",
            PatternKind::TriangleBreakout => "TRIANGLE_BREAKOUT",
            PatternKind::HeadAndShoulders => "HEAD_AND_SHOULDERS",
            PatternKind::LowVolumePrice => "LOW_VOLUME_PRICE",
            PatternKind::HighVolumePrice => "HIGH_VOLUME_PRICE",
            PatternKind::VolumeDecreasePriceIncrease => "VOLUME_DECREASE_PRICE_INCREASE",
            PatternKind::VolumeIncreasePriceDecrease => "VOLUME_INCREASE_PRICE_DECREASE",
            PatternKind::VolumePriceRise => "VOLUME_PRICE_RISE",
            PatternKind::VolumePriceDivergence => "VOLUME_PRICE_DIVERGENCE",
            PatternKind::VolumeBreakout => "VOLUME_BREAKOUT",
        }
    }

    pub fn family(self) -> PatternFamily {
        match self {
            PatternKind::TriangleBreakout | PatternKind::HeadAndShoulders => PatternFamily::Chart,
            PatternKind::LowVolumePrice
            | PatternKind::HighVolumePrice
            | PatternKind::VolumeDecreasePriceIncrease
            | PatternKind::VolumeIncreasePriceDecrease
            | PatternKind::VolumePriceRise
            | PatternKind::VolumePriceDivergence
            | PatternKind::VolumeBreakout => PatternFamily::VolumePrice,
            _ => PatternFamily::Candlestick,
        }
    }

    /// Returns the signal this pattern always emits.
    ///
    /// `None` means the pattern is bidirectional and the signal depends on which
    /// side of the formation completed.
    pub fn typical_signal(self) -> Option<Signal> {
        match self {
            PatternKind::Hammer
            | PatternKind::InvertedHammer
            | PatternKind::DoubleCannon
            | PatternKind::RedThreeSoldiers
            | PatternKind::MorningStar
            | PatternKind::LowVolumePrice
            | PatternKind::VolumeIncreasePriceDecrease
            | PatternKind::VolumePriceRise
            | PatternKind::VolumeBreakout => Some(Signal::Buy),
            PatternKind::ShootingStar
            | PatternKind::DarkCloudCover
            | PatternKind::ThreeBlackCrows
            | PatternKind::EveningStar
            | PatternKind::HeadAndShoulders
            | PatternKind::HighVolumePrice
            | PatternKind::VolumeDecreasePriceIncrease => Some(Signal::Sell),
            PatternKind::Doji | PatternKind::SpinningTop => Some(Signal::Hold),
            PatternKind::Engulfing
            | PatternKind::Harami
            | PatternKind::TriangleBreakout
            | PatternKind::VolumePriceDivergence => None,
        }
    }

    /// Returns true if this pattern can emit both BUY and SELL
    pub fn is_bidirectional(self) -> bool {
        self.typical_signal().is_none()
    }

    /// Human-readable description for a completed formation
    pub fn describe(self, signal: Signal) -> &'static str {
        match (self, signal) {
            (PatternKind::Doji, _) => "Open and close nearly equal, market indecision",
            (PatternKind::Hammer, _) => "Long lower shadow under a small body, possible bottom",
            (PatternKind::ShootingStar, _) => "Long upper shadow over a small body, possible top",
            (PatternKind::InvertedHammer, _) => {
                "Long upper shadow over a small body after a decline, possible bottom"
            }
            (PatternKind::SpinningTop, _) => "Small body with shadows on both sides, indecision",
            (PatternKind::Engulfing, Signal::Buy) => "White body engulfs the prior black body",
            (PatternKind::Engulfing, _) => "Black body engulfs the prior white body",
            (PatternKind::Harami, Signal::Buy) => "Small white body inside the prior black body",
            (PatternKind::Harami, _) => "Small black body inside the prior white body",
            (PatternKind::DarkCloudCover, _) => {
                "Large black candle opens above the prior high and closes into its body"
            }
            (PatternKind::DoubleCannon, _) => "Two strong white candles on expanding volume",
            (PatternKind::ThreeBlackCrows, _) => "Three consecutive declining black candles",
            (PatternKind::RedThreeSoldiers, _) => "Three consecutive advancing white candles",
            (PatternKind::MorningStar, _) => "Reversal star after a downtrend",
            (PatternKind::EveningStar, _) => "Reversal star after an uptrend",
            (PatternKind::TriangleBreakout, Signal::Buy) => {
                "Wide-range close above the recent high"
            }
            (PatternKind::TriangleBreakout, _) => "Wide-range close below the recent low",
            (PatternKind::HeadAndShoulders, _) => "Close below the shoulder neckline",
            (PatternKind::LowVolumePrice, _) => "Volume and price both near their lows",
            (PatternKind::HighVolumePrice, _) => "Volume and price both near their highs",
            (PatternKind::VolumeDecreasePriceIncrease, _) => "Price rising on shrinking volume",
            (PatternKind::VolumeIncreasePriceDecrease, _) => "Price falling on expanding volume",
            (PatternKind::VolumePriceRise, _) => "Price and volume rising together",
            (PatternKind::VolumePriceDivergence, Signal::Buy) => {
                "Price falling while volume rises, possible bottom"
            }
            (PatternKind::VolumePriceDivergence, _) => {
                "Price rising while volume falls, possible top"
            }
            (PatternKind::VolumeBreakout, _) => "Close breaks above the 20-day average on heavy volume",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================
// PATTERN MATCH
// ============================================================

/// One detected pattern, completed at `end_index`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternMatch {
    pub ts_code: String,
    pub trade_date: String,
    pub pattern: PatternKind,
    pub signal: Signal,
    /// Confidence score, always within `[0, 100]`
    pub confidence: Decimal,
    pub strength: Strength,
    pub price_change: Decimal,
    pub volume: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_ratio: Option<Decimal>,
    pub description: &'static str,
    #[serde(skip)]
    pub start_index: usize,
    #[serde(skip)]
    pub end_index: usize,
}

impl PatternMatch {
    /// Build a match completed by `bar` at `index`.
    ///
    /// The confidence is clamped into `[0, 100]` and the strength derived from it.
    /// Price change defaults to the bar's intraday change.
    pub fn new<T: OHLCV>(
        pattern: PatternKind,
        signal: Signal,
        bar: &T,
        index: usize,
        confidence: Decimal,
    ) -> Self {
        let confidence = numeric::clamp_confidence(confidence);
        Self {
            ts_code: bar.ts_code().to_string(),
            trade_date: bar.trade_date().to_string(),
            pattern,
            signal,
            confidence,
            strength: numeric::classify_strength(confidence),
            price_change: bar.change(),
            volume: bar.volume(),
            volume_ratio: None,
            description: pattern.describe(signal),
            start_index: index,
            end_index: index,
        }
    }

    pub fn starting_at(mut self, start_index: usize) -> Self {
        self.start_index = start_index;
        self
    }

    pub fn with_price_change(mut self, price_change: Decimal) -> Self {
        self.price_change = price_change;
        self
    }

    pub fn with_volume_ratio(mut self, volume_ratio: Decimal) -> Self {
        self.volume_ratio = Some(volume_ratio);
        self
    }
}

// ============================================================
// SIGNAL AGGREGATION
// ============================================================

/// Majority signal of the patterns completed on one bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CombinedSignal {
    pub signal: Signal,
    /// Mean confidence of the contributing patterns
    pub confidence: Decimal,
    pub risk_level: RiskLevel,
}

/// Combine pattern matches into one signal.
///
/// BUY wins when buy matches outnumber sell matches and vice versa; a tie is HOLD.
/// Risk is LOW when the mean confidence reaches 80, MEDIUM from 60, HIGH below.
pub fn combine_signals(matches: &[PatternMatch]) -> CombinedSignal {
    if matches.is_empty() {
        return CombinedSignal {
            signal: Signal::Hold,
            confidence: Decimal::ZERO,
            risk_level: RiskLevel::Low,
        };
    }

    let (total, votes) = matches
        .iter()
        .fold((Decimal::ZERO, 0i64), |(total, votes), m| {
            let vote = match m.signal {
                Signal::Buy => 1,
                Signal::Sell => -1,
                _ => 0,
            };
            (total + m.confidence, votes + vote)
        });
    let confidence = total / Decimal::from(matches.len());

    let signal = match votes.cmp(&0) {
        Ordering::Greater => Signal::Buy,
        Ordering::Less => Signal::Sell,
        Ordering::Equal => Signal::Hold,
    };

    let risk_level = match numeric::classify_strength(confidence) {
        Strength::Strong => RiskLevel::Low,
        Strength::Medium => RiskLevel::Medium,
        Strength::Weak => RiskLevel::High,
    };

    CombinedSignal {
        signal,
        confidence,
        risk_level,
    }
}

/// Occurrence counts over a set of matches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatternSummary {
    pub total: usize,
    pub patterns: BTreeMap<PatternKind, usize>,
    pub signals: BTreeMap<Signal, usize>,
}

/// Count matches per pattern and per signal
pub fn summarize(matches: &[PatternMatch]) -> PatternSummary {
    matches
        .iter()
        .fold(PatternSummary::default(), |mut summary, m| {
            summary.total += 1;
            *summary.patterns.entry(m.pattern).or_default() += 1;
            *summary.signals.entry(m.signal).or_default() += 1;
            summary
        })
}
