use crate::models::Side;

/// Exchange minimum order sizes in base currency
const MIN_SIZES: &[(&str, f64)] = &[("BTC-USDT", 0.1), ("ETH-USDT", 1.0)];
const DEFAULT_MIN_SIZE: f64 = 1.0;

/// Minimum order size for a trading pair
pub fn minimum_size(symbol: &str) -> f64 {
    MIN_SIZES
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, min)| *min)
        .unwrap_or(DEFAULT_MIN_SIZE)
}

/// Position size in base currency from a USD margin amount and leverage
///
/// `(usd * leverage) / price`, compared against the exchange minimum at
/// 4 decimal places and clamped up to it when too small. Final value is
/// rounded to 8 decimal places for the wire.
pub fn position_size(price: f64, usd_size: f64, leverage: u32, symbol: &str) -> f64 {
    let raw = (usd_size * leverage as f64) / price;
    let min = minimum_size(symbol);

    let rounded = round_dp(raw, 4);
    let size = if rounded < min {
        tracing::warn!(
            "Adjusted position size {:.4} up to exchange minimum {} for {}",
            rounded,
            min,
            symbol
        );
        min
    } else {
        rounded
    };

    round_dp(size, 8)
}

/// Percentage-based take-profit and stop-loss prices
///
/// Returns `(take_profit, stop_loss)` rounded to 8 decimal places.
pub fn tp_sl_from_percent(
    entry_price: f64,
    side: Side,
    tp_percentage: f64,
    sl_percentage: f64,
) -> (f64, f64) {
    let (tp, sl) = if side.is_long() {
        (
            entry_price * (1.0 + tp_percentage / 100.0),
            entry_price * (1.0 - sl_percentage / 100.0),
        )
    } else {
        (
            entry_price * (1.0 - tp_percentage / 100.0),
            entry_price * (1.0 + sl_percentage / 100.0),
        )
    };

    (round_dp(tp, 8), round_dp(sl, 8))
}

fn round_dp(x: f64, dp: u32) -> f64 {
    let factor = 10f64.powi(dp as i32);
    (x * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimum_sizes() {
        assert_eq!(minimum_size("BTC-USDT"), 0.1);
        assert_eq!(minimum_size("ETH-USDT"), 1.0);
        assert_eq!(minimum_size("XRP-USDT"), 1.0);
    }

    #[test]
    fn test_position_size_basic() {
        // $100 margin at 3x on a $300 asset = 1.0
        assert_eq!(position_size(300.0, 100.0, 3, "XRP-USDT"), 1.0);
    }

    #[test]
    fn test_position_size_clamped_to_minimum() {
        // $100 at 1x on BTC at $50k = 0.002, below the 0.1 minimum
        assert_eq!(position_size(50_000.0, 100.0, 1, "BTC-USDT"), 0.1);
    }

    #[test]
    fn test_position_size_above_minimum_not_clamped() {
        // $10000 at 3x on BTC at $50k = 0.6
        assert_eq!(position_size(50_000.0, 10_000.0, 3, "BTC-USDT"), 0.6);
    }

    #[test]
    fn test_position_size_rounding() {
        // 100 * 3 / 0.5123 = 585.5944... -> 585.5944 at 4dp
        let size = position_size(0.5123, 100.0, 3, "XRP-USDT");
        assert!((size - 585.5944).abs() < 1e-9);
    }

    #[test]
    fn test_tp_sl_long() {
        let (tp, sl) = tp_sl_from_percent(100.0, Side::Long, 2.0, 1.0);
        assert_eq!(tp, 102.0);
        assert_eq!(sl, 99.0);
    }

    #[test]
    fn test_tp_sl_short() {
        let (tp, sl) = tp_sl_from_percent(100.0, Side::Short, 2.0, 1.0);
        assert_eq!(tp, 98.0);
        assert_eq!(sl, 101.0);
    }
}
