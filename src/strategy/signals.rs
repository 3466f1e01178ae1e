use crate::models::{Bar, Candle};

/// Validate that candles are uniformly spaced in time
///
/// The exchange occasionally returns gapped history after maintenance
/// windows; trading on such a series shifts every band value, so the tick
/// is skipped instead.
///
/// Allows up to 1.5x the bar interval between consecutive candles.
pub fn validate_candle_uniformity(candles: &[Candle], bar: Bar) -> anyhow::Result<()> {
    if candles.len() < 2 {
        return Ok(());
    }

    let expected_secs = bar.minutes() * 60;
    let max_gap_secs = expected_secs + (expected_secs / 2);

    for window in candles.windows(2) {
        let time_diff = (window[1].timestamp - window[0].timestamp).num_seconds();

        if time_diff < 0 {
            anyhow::bail!("Candles are not sorted by timestamp");
        }

        if time_diff as u64 > max_gap_secs {
            anyhow::bail!(
                "Data gap detected: {}s between candles (expected ~{}s, max allowed {}s). \
                 Gap from {} to {}.",
                time_diff,
                expected_secs,
                max_gap_secs,
                window[0].timestamp.format("%H:%M:%S"),
                window[1].timestamp.format("%H:%M:%S")
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn candle_at(offset_minutes: i64) -> Candle {
        Candle {
            timestamp: Utc::now() + Duration::minutes(offset_minutes),
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.0,
            volume: 1000.0,
            confirm: true,
        }
    }

    #[test]
    fn test_uniform_candles_pass() {
        let candles = vec![candle_at(0), candle_at(5), candle_at(10)];
        assert!(validate_candle_uniformity(&candles, Bar::M5).is_ok());
    }

    #[test]
    fn test_gap_detected() {
        let candles = vec![candle_at(0), candle_at(5), candle_at(20)];
        let err = validate_candle_uniformity(&candles, Bar::M5).unwrap_err();
        assert!(err.to_string().contains("Data gap"));
    }

    #[test]
    fn test_unsorted_rejected() {
        let candles = vec![candle_at(5), candle_at(0)];
        let err = validate_candle_uniformity(&candles, Bar::M5).unwrap_err();
        assert!(err.to_string().contains("not sorted"));
    }

    #[test]
    fn test_small_jitter_tolerated() {
        let candles = vec![candle_at(0), candle_at(7)]; // 7min < 1.5 * 5min
        assert!(validate_candle_uniformity(&candles, Bar::M5).is_ok());
    }

    #[test]
    fn test_single_candle_passes() {
        let candles = vec![candle_at(0)];
        assert!(validate_candle_uniformity(&candles, Bar::M5).is_ok());
    }
}
