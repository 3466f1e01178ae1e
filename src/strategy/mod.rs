// Trading strategy module
pub mod band_breakout;
pub mod signals;

use crate::models::{Candle, Signal};
use crate::Result;

pub use band_breakout::{BandBreakoutStrategy, EntryLevels};
pub use signals::validate_candle_uniformity;

/// Base trait for trading strategies
///
/// Takes `&mut self` because strategies may carry state between candles
/// (the band strategy arms a pending signal one candle before it fires).
pub trait Strategy: Send + Sync {
    /// Evaluate the latest market data, possibly emitting an entry signal
    fn evaluate(&mut self, candles: &[Candle]) -> Result<Option<Signal>>;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Minimum candles required for this strategy
    fn min_candles_required(&self) -> usize;
}
