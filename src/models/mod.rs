use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV candlestick as returned by the exchange
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Whether the exchange has finalized this candle
    pub confirm: bool,
}

/// Candle timeframe supported by the exchange
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Bar {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Bar {
    /// Wire string for the candles endpoint (`bar` parameter)
    pub fn as_str(&self) -> &'static str {
        match self {
            Bar::M1 => "1m",
            Bar::M5 => "5m",
            Bar::M15 => "15m",
            Bar::M30 => "30m",
            Bar::H1 => "1H",
            Bar::H4 => "4H",
            Bar::D1 => "1D",
        }
    }

    pub fn minutes(&self) -> u64 {
        match self {
            Bar::M1 => 1,
            Bar::M5 => 5,
            Bar::M15 => 15,
            Bar::M30 => 30,
            Bar::H1 => 60,
            Bar::H4 => 240,
            Bar::D1 => 1440,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes() as i64)
    }
}

impl std::str::FromStr for Bar {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Bar::M1),
            "5m" => Ok(Bar::M5),
            "15m" => Ok(Bar::M15),
            "30m" => Ok(Bar::M30),
            "1H" | "1h" => Ok(Bar::H1),
            "4H" | "4h" => Ok(Bar::H4),
            "1D" | "1d" => Ok(Bar::D1),
            other => Err(format!("Unsupported bar: {}", other)),
        }
    }
}

impl std::fmt::Display for Bar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a trade
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn is_long(&self) -> bool {
        matches!(self, Side::Long)
    }

    /// Order side string for the exchange ("buy"/"sell")
    pub fn order_side(&self) -> &'static str {
        match self {
            Side::Long => "buy",
            Side::Short => "sell",
        }
    }

    /// Side of the order that closes this position
    pub fn closing_side(&self) -> &'static str {
        match self {
            Side::Long => "sell",
            Side::Short => "buy",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => f.write_str("LONG"),
            Side::Short => f.write_str("SHORT"),
        }
    }
}

/// Entry signal emitted by the strategy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Signal {
    Long,
    Short,
}

impl Signal {
    pub fn side(&self) -> Side {
        match self {
            Signal::Long => Side::Long,
            Signal::Short => Side::Short,
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Long => f.write_str("long"),
            Signal::Short => f.write_str("short"),
        }
    }
}

/// Locally tracked open position (the exchange holds the TP/SL orders)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenPosition {
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub entry_time: DateTime<Utc>,
}

impl OpenPosition {
    /// Unrealized PnL in quote currency at the given mark price
    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        match self.side {
            Side::Long => (current_price - self.entry_price) * self.size,
            Side::Short => (self.entry_price - current_price) * self.size,
        }
    }
}

/// Where price sits relative to the band envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketCondition {
    AboveBands,
    BelowBands,
    BetweenBands,
}

impl std::fmt::Display for MarketCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketCondition::AboveBands => f.write_str("ABOVE_BANDS"),
            MarketCondition::BelowBands => f.write_str("BELOW_BANDS"),
            MarketCondition::BetweenBands => f.write_str("BETWEEN_BANDS"),
        }
    }
}
