use chrono::{DateTime, Utc};

use crate::execution::ExitReason;
use crate::indicators::{compute_bands, Band};
use crate::models::{Candle, Side};

/// Parameters for a historical replay
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub position_size_usd: f64,
    pub leverage: u32,
    pub tp_multiplier: f64,
    pub sl_multiplier: f64,
}

/// One simulated round trip
#[derive(Debug, Clone)]
pub struct SimulatedTrade {
    pub side: Side,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub reason: ExitReason,
    /// PnL in USD on the leveraged notional
    pub pnl: f64,
}

/// Summary of a replay
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub trades: Vec<SimulatedTrade>,
    pub wins: usize,
    pub losses: usize,
    pub total_pnl: f64,
}

impl BacktestReport {
    pub fn win_rate(&self) -> f64 {
        if self.trades.is_empty() {
            0.0
        } else {
            self.wins as f64 / self.trades.len() as f64
        }
    }

    pub fn avg_pnl(&self) -> f64 {
        if self.trades.is_empty() {
            0.0
        } else {
            self.total_pnl / self.trades.len() as f64
        }
    }
}

/// Replay the band-breakout rules over candle history
///
/// Entries fill at the close of the candle after the breakout (where the
/// live loop fires), with TP/SL distances from the band width at entry.
/// Exits fill at the trigger price when a later candle trades through it;
/// the band-cross manual exit fills at that candle's close. One position at
/// a time, matching the live executor.
pub fn run(candles: &[Candle], config: &BacktestConfig) -> BacktestReport {
    let bands = compute_bands(candles);
    let mut trades = Vec::new();

    // Offset of the first banded candle within the candle slice
    let offset = candles.len() - bands.len();

    let mut i = 0;
    while i + 1 < bands.len() {
        let breakout = &bands[i];

        let side = if breakout.close > breakout.upper {
            Some(Side::Long)
        } else if breakout.close < breakout.lower {
            Some(Side::Short)
        } else {
            None
        };

        let Some(side) = side else {
            i += 1;
            continue;
        };

        // Entry on the next candle
        let entry_band = &bands[i + 1];
        let entry_price = entry_band.close;
        let distance = entry_band.distance();

        let (take_profit, stop_loss) = match side {
            Side::Long => (
                entry_price + distance * config.tp_multiplier,
                entry_price - distance * config.sl_multiplier,
            ),
            Side::Short => (
                entry_price - distance * config.tp_multiplier,
                entry_price + distance * config.sl_multiplier,
            ),
        };

        let exit = find_exit(
            &candles[offset..],
            &bands,
            i + 2,
            side,
            take_profit,
            stop_loss,
        );

        let Some((exit_index, exit_price, reason)) = exit else {
            // Position still open at end of history; ignore the tail
            break;
        };

        let direction = if side.is_long() { 1.0 } else { -1.0 };
        let notional = config.position_size_usd * config.leverage as f64;
        let pnl = direction * (exit_price - entry_price) / entry_price * notional;

        trades.push(SimulatedTrade {
            side,
            entry_time: entry_band.timestamp,
            entry_price,
            exit_time: bands[exit_index].timestamp,
            exit_price,
            reason,
            pnl,
        });

        // No new entries while the position was open
        i = exit_index + 1;
    }

    let wins = trades.iter().filter(|t| t.pnl > 0.0).count();
    let losses = trades.iter().filter(|t| t.pnl <= 0.0).count();
    let total_pnl = trades.iter().map(|t| t.pnl).sum();

    BacktestReport {
        trades,
        wins,
        losses,
        total_pnl,
    }
}

/// Scan forward for the first TP/SL trade-through or band-cross exit
fn find_exit(
    banded_candles: &[Candle],
    bands: &[Band],
    start: usize,
    side: Side,
    take_profit: f64,
    stop_loss: f64,
) -> Option<(usize, f64, ExitReason)> {
    for (idx, (candle, band)) in banded_candles
        .iter()
        .zip(bands.iter())
        .enumerate()
        .skip(start)
    {
        if side.is_long() {
            if candle.low <= stop_loss {
                return Some((idx, stop_loss, ExitReason::StopLoss));
            }
            if candle.high >= take_profit {
                return Some((idx, take_profit, ExitReason::TakeProfit));
            }
            if band.close < band.lower {
                return Some((idx, band.close, ExitReason::BandCross));
            }
        } else {
            if candle.high >= stop_loss {
                return Some((idx, stop_loss, ExitReason::StopLoss));
            }
            if candle.low <= take_profit {
                return Some((idx, take_profit, ExitReason::TakeProfit));
            }
            if band.close > band.upper {
                return Some((idx, band.close, ExitReason::BandCross));
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        let start = Utc::now() - Duration::minutes(5 * closes.len() as i64);
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: start + Duration::minutes(5 * i as i64),
                open: close,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 100.0,
                confirm: true,
            })
            .collect()
    }

    fn config() -> BacktestConfig {
        BacktestConfig {
            position_size_usd: 100.0,
            leverage: 3,
            tp_multiplier: 2.0,
            sl_multiplier: 1.0,
        }
    }

    #[test]
    fn test_flat_series_produces_no_trades() {
        let candles = candles_from_closes(&vec![100.0; 80]);
        let report = run(&candles, &config());

        assert!(report.trades.is_empty());
        assert_eq!(report.total_pnl, 0.0);
        assert_eq!(report.win_rate(), 0.0);
    }

    #[test]
    fn test_breakout_generates_a_trade() {
        // Flat warm-up, breakout, continuation, then collapse back down
        let mut closes = vec![100.0; 50];
        closes.extend([104.0, 104.5, 105.0, 106.0, 107.0, 108.0]);
        closes.extend([95.0, 94.0, 93.0, 92.0]);
        let candles = candles_from_closes(&closes);

        let report = run(&candles, &config());

        assert!(!report.trades.is_empty());
        let first = &report.trades[0];
        assert_eq!(first.side, Side::Long);
        assert!(first.entry_price > 100.0);
    }

    #[test]
    fn test_breakout_on_first_band_point_is_traded() {
        // The very first banded candle already closes above the envelope
        let mut closes = vec![100.0; 20];
        closes.extend([105.0, 106.0, 95.0, 94.0]);
        let candles = candles_from_closes(&closes);

        let report = run(&candles, &config());

        assert_eq!(report.trades.len(), 1);
        let trade = &report.trades[0];
        assert_eq!(trade.side, Side::Long);
        assert_eq!(trade.entry_time, candles[21].timestamp);
        assert_eq!(trade.reason, ExitReason::StopLoss);
    }

    #[test]
    fn test_single_position_at_a_time() {
        let mut closes = vec![100.0; 50];
        // Persistent breakout with every candle above the envelope
        closes.extend((0..20).map(|i| 105.0 + i as f64));
        let candles = candles_from_closes(&closes);

        let report = run(&candles, &config());

        // Overlapping entries would exceed the number of exits available
        for pair in report.trades.windows(2) {
            assert!(pair[1].entry_time > pair[0].exit_time);
        }
    }

    #[test]
    fn test_report_counts_agree() {
        let mut closes = vec![100.0; 50];
        closes.extend([104.0, 105.0, 107.0, 110.0, 95.0, 90.0, 104.0, 110.0, 85.0]);
        let candles = candles_from_closes(&closes);

        let report = run(&candles, &config());
        assert_eq!(report.wins + report.losses, report.trades.len());

        let sum: f64 = report.trades.iter().map(|t| t.pnl).sum();
        assert!((sum - report.total_pnl).abs() < 1e-9);
    }

    #[test]
    fn test_empty_history() {
        let report = run(&[], &config());
        assert!(report.trades.is_empty());
        assert_eq!(report.avg_pnl(), 0.0);
    }
}
