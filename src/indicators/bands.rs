use chrono::{DateTime, Utc};

use super::{ema_series, sma_series};
use crate::models::{Candle, MarketCondition};

pub const SMA_PERIOD: usize = 21;
pub const EMA_PERIOD: usize = 34;

/// Band envelope values for one candle
///
/// The envelope is the spread between SMA(21) and EMA(34): whichever is
/// higher is the upper band, the other is the lower band.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub sma: f64,
    pub ema: f64,
    pub upper: f64,
    pub lower: f64,
}

impl Band {
    pub fn distance(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Compute the band envelope for a candle series
///
/// Only candles with a full SMA window get a band, so the output starts at
/// candle index `SMA_PERIOD - 1` and is shorter than the input.
pub fn compute_bands(candles: &[Candle]) -> Vec<Band> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    let (Some(sma), Some(ema)) = (
        sma_series(&closes, SMA_PERIOD),
        ema_series(&closes, EMA_PERIOD),
    ) else {
        return Vec::new();
    };

    candles
        .iter()
        .zip(sma.iter().zip(ema.iter()))
        .filter_map(|(candle, (sma, ema))| {
            let sma = (*sma)?;
            let ema = *ema;
            Some(Band {
                timestamp: candle.timestamp,
                close: candle.close,
                sma,
                ema,
                upper: sma.max(ema),
                lower: sma.min(ema),
            })
        })
        .collect()
}

/// Snapshot of price position relative to the envelope
#[derive(Debug, Clone)]
pub struct BandAnalysis {
    pub current_price: f64,
    pub upper_band: f64,
    pub lower_band: f64,
    pub condition: MarketCondition,
    pub crossover: Option<Crossover>,
    pub band_distance: f64,
    pub price_to_upper: f64,
    pub price_to_lower: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossover {
    Bullish,
    Bearish,
}

impl std::fmt::Display for Crossover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Crossover::Bullish => f.write_str("BULLISH_CROSSOVER"),
            Crossover::Bearish => f.write_str("BEARISH_CROSSOVER"),
        }
    }
}

/// Analyze the latest candle against the envelope
///
/// Needs at least two band points to detect a crossover (previous close
/// inside the envelope, current close outside it).
pub fn analyze_market_conditions(bands: &[Band]) -> Option<BandAnalysis> {
    let latest = bands.last()?;
    let prev = bands.get(bands.len().checked_sub(2)?)?;

    let condition = if latest.close > latest.upper {
        MarketCondition::AboveBands
    } else if latest.close < latest.lower {
        MarketCondition::BelowBands
    } else {
        MarketCondition::BetweenBands
    };

    let crossover = if prev.close <= prev.upper && latest.close > latest.upper {
        Some(Crossover::Bullish)
    } else if prev.close >= prev.lower && latest.close < latest.lower {
        Some(Crossover::Bearish)
    } else {
        None
    };

    Some(BandAnalysis {
        current_price: latest.close,
        upper_band: latest.upper,
        lower_band: latest.lower,
        condition,
        crossover,
        band_distance: latest.distance(),
        price_to_upper: latest.upper - latest.close,
        price_to_lower: latest.close - latest.lower,
    })
}
