use chrono::{DateTime, Utc};

use super::{validate_candle_uniformity, Strategy};
use crate::indicators::bands::{EMA_PERIOD, SMA_PERIOD};
use crate::indicators::{compute_bands, Band};
use crate::models::{Bar, Candle, OpenPosition, Signal};
use crate::Result;

/// Take-profit / stop-loss prices for a new entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryLevels {
    pub take_profit: f64,
    pub stop_loss: f64,
}

/// SMA21/EMA34 band breakout strategy
///
/// A candle closing outside the envelope arms a pending signal; the signal
/// fires on exactly the next candle and is discarded if that window is
/// missed. Exits are handled by exchange-side TP/SL triggers sized from the
/// band width, plus a manual band-cross close.
#[derive(Debug, Clone)]
pub struct BandBreakoutStrategy {
    bar: Bar,
    tp_multiplier: f64,
    sl_multiplier: f64,
    pending_signal: Option<Signal>,
    signal_candle: Option<DateTime<Utc>>,
}

impl BandBreakoutStrategy {
    pub fn new(bar: Bar, tp_multiplier: f64, sl_multiplier: f64) -> Self {
        Self {
            bar,
            tp_multiplier,
            sl_multiplier,
            pending_signal: None,
            signal_candle: None,
        }
    }

    pub fn bar(&self) -> Bar {
        self.bar
    }

    pub fn has_pending_signal(&self) -> bool {
        self.pending_signal.is_some()
    }

    /// Timestamp of the candle that armed the current pending signal
    pub fn signal_candle(&self) -> Option<DateTime<Utc>> {
        self.signal_candle
    }

    fn clear_pending(&mut self) {
        self.pending_signal = None;
        self.signal_candle = None;
    }

    /// Core signal logic over the computed band series
    fn evaluate_bands(&mut self, bands: &[Band]) -> Option<Signal> {
        if bands.len() < 2 {
            return None;
        }

        let current = &bands[bands.len() - 1];
        let prev = &bands[bands.len() - 2];

        tracing::debug!(
            prev_close = prev.close,
            prev_upper = prev.upper,
            prev_lower = prev.lower,
            current_time = %current.timestamp,
            pending = self.pending_signal.is_some(),
            "Signal analysis"
        );

        // A pending signal fires only on the exact next candle
        if let (Some(signal), Some(armed_at)) = (self.pending_signal, self.signal_candle) {
            let expected_next = armed_at + self.bar.duration();

            if current.timestamp == expected_next {
                tracing::info!("Executing pending {} signal", signal);
                self.clear_pending();
                return Some(signal);
            } else if current.timestamp > expected_next {
                tracing::info!("Missed execution window, discarding {} signal", signal);
                self.clear_pending();
            }
            return None;
        }

        // Arm a new signal when the previous candle closed outside the bands
        let new_signal = if prev.close > prev.upper {
            Some(Signal::Long)
        } else if prev.close < prev.lower {
            Some(Signal::Short)
        } else {
            None
        };

        if let Some(signal) = new_signal {
            self.pending_signal = Some(signal);
            self.signal_candle = Some(prev.timestamp);
            tracing::info!(
                "New {} signal armed at {} (close {:.4}, band {:.4}..{:.4})",
                signal,
                prev.timestamp,
                prev.close,
                prev.lower,
                prev.upper
            );
        }

        None
    }

    /// TP/SL prices from the band width at the entry candle
    ///
    /// Both distances scale with the envelope width, so a quiet market gets
    /// tight exits and a volatile one gets room. Rounded to 4 decimals.
    pub fn entry_levels(&self, entry_price: f64, band: &Band, signal: Signal) -> EntryLevels {
        let band_distance = band.distance();
        let tp_distance = band_distance * self.tp_multiplier;
        let sl_distance = band_distance * self.sl_multiplier;

        let (take_profit, stop_loss) = match signal {
            Signal::Long => (entry_price + tp_distance, entry_price - sl_distance),
            Signal::Short => (entry_price - tp_distance, entry_price + sl_distance),
        };

        EntryLevels {
            take_profit: round4(take_profit),
            stop_loss: round4(stop_loss),
        }
    }

    /// Manual exit: close when the latest close crosses back through the far band
    pub fn should_close(&self, band: &Band, position: &OpenPosition) -> bool {
        if position.side.is_long() {
            band.close < band.lower
        } else {
            band.close > band.upper
        }
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

impl Strategy for BandBreakoutStrategy {
    fn evaluate(&mut self, candles: &[Candle]) -> Result<Option<Signal>> {
        if candles.len() < self.min_candles_required() {
            return Err(format!(
                "Insufficient data: {} candles, need {}",
                candles.len(),
                self.min_candles_required()
            )
            .into());
        }

        validate_candle_uniformity(candles, self.bar)?;

        let bands = compute_bands(candles);
        Ok(self.evaluate_bands(&bands))
    }

    fn name(&self) -> &str {
        "BandBreakoutStrategy"
    }

    fn min_candles_required(&self) -> usize {
        // Two band points past the longest warm-up window
        SMA_PERIOD.max(EMA_PERIOD) + 2
    }
}
