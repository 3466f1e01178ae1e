use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Hard limits checked before every new entry
///
/// These protect the demo account from a runaway loop or a strategy that
/// fires on every candle, not from market risk (the exchange-side stop-loss
/// does that).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Maximum entries per UTC day
    pub max_daily_trades: u32,
    /// Abort entries after this many consecutive failed orders
    pub max_consecutive_failures: u32,
    /// Maximum margin committed at once, in USD
    pub max_margin_usd: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_daily_trades: 10,
            max_consecutive_failures: 3,
            max_margin_usd: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskTrip {
    DailyTradeLimit,
    ConsecutiveFailures,
    MarginLimit,
}

impl std::fmt::Display for RiskTrip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskTrip::DailyTradeLimit => f.write_str("daily trade limit reached"),
            RiskTrip::ConsecutiveFailures => f.write_str("too many consecutive order failures"),
            RiskTrip::MarginLimit => f.write_str("margin limit reached"),
        }
    }
}

/// Mutable counters behind the risk checks
#[derive(Debug, Clone)]
pub struct TradingState {
    pub daily_trades: u32,
    pub consecutive_failures: u32,
    pub margin_in_use: f64,
    last_reset: DateTime<Utc>,
}

impl TradingState {
    pub fn new() -> Self {
        Self {
            daily_trades: 0,
            consecutive_failures: 0,
            margin_in_use: 0.0,
            last_reset: Utc::now(),
        }
    }

    /// Reset the daily counter when the UTC day rolls over
    pub fn roll_day(&mut self, now: DateTime<Utc>) {
        if now.ordinal() != self.last_reset.ordinal() || now.year() != self.last_reset.year() {
            tracing::info!(
                "New UTC day, resetting daily trade counter ({} trades yesterday)",
                self.daily_trades
            );
            self.daily_trades = 0;
            self.last_reset = now;
        }
    }

    pub fn record_entry(&mut self, margin_usd: f64) {
        self.daily_trades += 1;
        self.margin_in_use += margin_usd;
        self.consecutive_failures = 0;
    }

    pub fn record_exit(&mut self, margin_usd: f64) {
        self.margin_in_use = (self.margin_in_use - margin_usd).max(0.0);
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
    }
}

impl Default for TradingState {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskLimits {
    /// Check whether a new entry with the given margin is allowed
    pub fn check(&self, state: &TradingState, margin_usd: f64) -> Result<(), RiskTrip> {
        if state.daily_trades >= self.max_daily_trades {
            return Err(RiskTrip::DailyTradeLimit);
        }

        if state.consecutive_failures >= self.max_consecutive_failures {
            return Err(RiskTrip::ConsecutiveFailures);
        }

        if state.margin_in_use + margin_usd > self.max_margin_usd {
            return Err(RiskTrip::MarginLimit);
        }

        Ok(())
    }
}
