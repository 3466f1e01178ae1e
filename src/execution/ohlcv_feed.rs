use crate::api::BlofinClient;
use crate::indicators::{compute_bands, Band};
use crate::models::{Bar, Candle};
use crate::Result;

/// Candle history with its computed band envelope
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub candles: Vec<Candle>,
    pub bands: Vec<Band>,
}

impl MarketSnapshot {
    pub fn latest_close(&self) -> Option<f64> {
        self.candles.last().map(|c| c.close)
    }

    pub fn latest_band(&self) -> Option<&Band> {
        self.bands.last()
    }
}

/// Fetches OHLCV history for one instrument and computes its bands
pub struct OhlcvFeed {
    client: BlofinClient,
    symbol: String,
    bar: Bar,
    limit: u32,
}

impl OhlcvFeed {
    pub fn new(client: BlofinClient, symbol: impl Into<String>, bar: Bar, limit: u32) -> Self {
        Self {
            client,
            symbol: symbol.into(),
            bar,
            limit,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Last traded price for the instrument
    pub async fn ticker_price(&self) -> Result<f64> {
        Ok(self.client.get_ticker_price(&self.symbol).await?)
    }

    /// Fetch fresh candles and recompute the envelope
    pub async fn fetch(&self) -> Result<MarketSnapshot> {
        let candles = self
            .client
            .get_candles(&self.symbol, self.bar, self.limit)
            .await?;

        if candles.is_empty() {
            return Err("Exchange returned no candles".into());
        }

        let bands = compute_bands(&candles);

        for band in bands.iter().rev().take(3).rev() {
            tracing::info!(
                "{} | close ${:.4} | upper ${:.4} | lower ${:.4}",
                band.timestamp.format("%Y-%m-%d %H:%M:%S"),
                band.close,
                band.upper,
                band.lower
            );
        }

        Ok(MarketSnapshot { candles, bands })
    }
}
