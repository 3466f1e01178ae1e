/// Calculate Simple Moving Average (SMA) over the most recent `period` prices
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Calculate Exponential Moving Average (EMA) over the full price history
///
/// Uses the recursive form seeded with the first price and a smoothing
/// multiplier of `2 / (period + 1)`, so a longer history converges to the
/// same value regardless of where the seed falls.
pub fn calculate_ema(prices: &[f64], period: usize) -> Option<f64> {
    ema_series(prices, period).and_then(|series| series.last().copied())
}

/// Rolling SMA for every index where a full window is available
///
/// Returns one value per input price; the first `period - 1` entries are None.
pub fn sma_series(prices: &[f64], period: usize) -> Option<Vec<Option<f64>>> {
    if period == 0 || prices.is_empty() {
        return None;
    }

    let mut out = Vec::with_capacity(prices.len());
    let mut window_sum = 0.0;

    for (i, price) in prices.iter().enumerate() {
        window_sum += price;
        if i >= period {
            window_sum -= prices[i - period];
        }

        if i + 1 >= period {
            out.push(Some(window_sum / period as f64));
        } else {
            out.push(None);
        }
    }

    Some(out)
}

/// Recursive EMA for every index, seeded with the first price
pub fn ema_series(prices: &[f64], period: usize) -> Option<Vec<f64>> {
    if period == 0 || prices.is_empty() {
        return None;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(prices.len());
    let mut ema = prices[0];
    out.push(ema);

    for price in &prices[1..] {
        ema = (price - ema) * multiplier + ema;
        out.push(ema);
    }

    Some(out)
}
