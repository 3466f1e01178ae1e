use chrono::{DateTime, TimeZone, Utc};
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::models::{Bar, Candle, Side};

pub const DEMO_BASE_URL: &str = "https://demo-trading-openapi.blofin.com";
const RATE_LIMIT_RPM: u32 = 60;
const MAX_RETRIES: u32 = 3;

type BlofinRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Errors from the Blofin REST surface
#[derive(Debug, thiserror::Error)]
pub enum BlofinError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Blofin API error {code}: {message}")]
    Api { code: String, message: String },

    #[error("Unexpected response shape: {0}")]
    Malformed(String),

    #[error("Exhausted {0} retries")]
    RetriesExhausted(u32),
}

/// API credentials for the demo account
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
}

impl Credentials {
    /// Read `BLOFIN_API_KEY`, `BLOFIN_SECRET_KEY` and `BLOFIN_API_PASSPHRASE`
    pub fn from_env() -> Option<Self> {
        Some(Self {
            api_key: std::env::var("BLOFIN_API_KEY").ok()?,
            api_secret: std::env::var("BLOFIN_SECRET_KEY").ok()?,
            passphrase: std::env::var("BLOFIN_API_PASSPHRASE").ok()?,
        })
    }
}

// ============== Response Types ==============

/// Every Blofin response carries this envelope; code "0" means success
#[derive(Debug, Deserialize)]
struct BlofinResponse<T> {
    code: String,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerRaw {
    #[allow(dead_code)]
    inst_id: String,
    last: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderAckRaw {
    order_id: String,
    #[serde(default)]
    client_order_id: String,
}

// ============== Public Types ==============

/// Parameters for a market order with attached TP/SL triggers
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub size: f64,
    /// Sent as the order's `tdMode`
    pub margin_mode: String,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
    /// When true, the order reduces an existing position instead of opening one
    pub reduce_only: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderResult {
    pub order_id: String,
    pub client_order_id: String,
}

// ============== Implementation ==============

/// Client for the Blofin futures REST API
///
/// Signs every request with HMAC-SHA256 over
/// `timestamp + METHOD + request_path + body` (hex digest), sent in the
/// `BF-API-SIGN` header alongside key, timestamp and passphrase.
#[derive(Clone)]
pub struct BlofinClient {
    client: Client,
    credentials: Credentials,
    base_url: String,
    rate_limiter: Arc<BlofinRateLimiter>,
}

impl BlofinClient {
    pub fn new(credentials: Credentials, base_url: impl Into<String>) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(RATE_LIMIT_RPM).unwrap());

        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            credentials,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn sign(&self, timestamp: &str, method: &str, request_path: &str, body: &str) -> String {
        let message = format!("{}{}{}{}", timestamp, method, request_path, body);

        let mut mac = Hmac::<Sha256>::new_from_slice(self.credentials.api_secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(message.as_bytes());

        hex::encode(mac.finalize().into_bytes())
    }

    /// Signed, rate-limited request with retry on 429/5xx
    ///
    /// The signature covers the endpoint path without query parameters.
    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<T, BlofinError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let body_str = body.map(|b| b.to_string()).unwrap_or_default();

        for attempt in 1..=MAX_RETRIES {
            self.rate_limiter.until_ready().await;

            let timestamp = Utc::now().timestamp_millis().to_string();
            let signature = self.sign(&timestamp, method.as_str(), endpoint, &body_str);

            let mut request = self
                .client
                .request(method.clone(), &url)
                .header("BF-API-KEY", &self.credentials.api_key)
                .header("BF-API-TIMESTAMP", &timestamp)
                .header("BF-API-SIGN", signature)
                .header("BF-API-PASSPHRASE", &self.credentials.passphrase)
                .header("Content-Type", "application/json")
                .query(query);

            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let backoff_secs = 2u64.pow(attempt);
                tracing::warn!(
                    "Blofin returned {}, backing off {}s (attempt {}/{})",
                    status,
                    backoff_secs,
                    attempt,
                    MAX_RETRIES
                );
                tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                continue;
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(BlofinError::Api {
                    code: status.as_u16().to_string(),
                    message: text,
                });
            }

            let envelope: BlofinResponse<T> = response.json().await?;

            if envelope.code != "0" {
                return Err(BlofinError::Api {
                    code: envelope.code,
                    message: envelope.msg,
                });
            }

            return envelope
                .data
                .ok_or_else(|| BlofinError::Malformed("missing data field".to_string()));
        }

        Err(BlofinError::RetriesExhausted(MAX_RETRIES))
    }

    /// Fetch recent candles, oldest first
    ///
    /// Endpoint: GET /api/v1/market/candles
    ///
    /// The exchange returns rows of strings, newest first:
    /// `[ts, open, high, low, close, vol, volCurrency, volCurrencyQuote, confirm]`
    pub async fn get_candles(
        &self,
        symbol: &str,
        bar: Bar,
        limit: u32,
    ) -> Result<Vec<Candle>, BlofinError> {
        let rows: Vec<Vec<String>> = self
            .request(
                reqwest::Method::GET,
                "/api/v1/market/candles",
                &[
                    ("instId", symbol.to_string()),
                    ("bar", bar.as_str().to_string()),
                    ("limit", limit.to_string()),
                ],
                None,
            )
            .await?;

        let mut candles = rows
            .iter()
            .map(|row| parse_candle_row(row))
            .collect::<Result<Vec<_>, _>>()?;

        candles.sort_by_key(|c| c.timestamp);

        tracing::debug!("Retrieved {} candles for {}", candles.len(), symbol);

        Ok(candles)
    }

    /// Get the last traded price
    ///
    /// Endpoint: GET /api/v1/market/ticker
    pub async fn get_ticker_price(&self, symbol: &str) -> Result<f64, BlofinError> {
        let tickers: Vec<TickerRaw> = self
            .request(
                reqwest::Method::GET,
                "/api/v1/market/ticker",
                &[("instId", symbol.to_string())],
                None,
            )
            .await?;

        let ticker = tickers
            .first()
            .ok_or_else(|| BlofinError::Malformed(format!("no ticker data for {}", symbol)))?;

        ticker
            .last
            .parse::<f64>()
            .map_err(|e| BlofinError::Malformed(format!("bad ticker price: {}", e)))
    }

    /// Set leverage for a symbol
    ///
    /// Endpoint: POST /api/v1/account/set-leverage
    pub async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), BlofinError> {
        let body = serde_json::json!({
            "instId": symbol,
            "lever": leverage.to_string(),
        });

        let _: serde_json::Value = self
            .request(
                reqwest::Method::POST,
                "/api/v1/account/set-leverage",
                &[],
                Some(&body),
            )
            .await?;

        tracing::info!("Leverage set to {}x for {}", leverage, symbol);

        Ok(())
    }

    /// Place a market order, optionally with TP/SL trigger prices
    ///
    /// Endpoint: POST /api/v1/trade/order
    ///
    /// Trigger order prices are sent as "-1" so the exchange fills them at
    /// market when triggered.
    pub async fn place_order(&self, order: &OrderRequest) -> Result<OrderResult, BlofinError> {
        let mut body = serde_json::json!({
            "instId": order.symbol,
            "tdMode": order.margin_mode,
            "side": order.side.order_side(),
            "ordType": "market",
            "sz": format_size(order.size),
        });

        let fields = body.as_object_mut().expect("body is an object");

        if order.reduce_only {
            fields.insert("reduceOnly".to_string(), "true".into());
        }

        if let Some(tp) = order.take_profit {
            fields.insert("tpTriggerPrice".to_string(), format_price(tp).into());
            fields.insert("tpOrderPrice".to_string(), "-1".into());
        }

        if let Some(sl) = order.stop_loss {
            fields.insert("slTriggerPrice".to_string(), format_price(sl).into());
            fields.insert("slOrderPrice".to_string(), "-1".into());
        }

        tracing::info!("Placing order: {}", body);

        let acks: Vec<OrderAckRaw> = self
            .request(reqwest::Method::POST, "/api/v1/trade/order", &[], Some(&body))
            .await?;

        let ack = acks
            .into_iter()
            .next()
            .ok_or_else(|| BlofinError::Malformed("empty order ack".to_string()))?;

        Ok(OrderResult {
            order_id: ack.order_id,
            client_order_id: ack.client_order_id,
        })
    }
}

fn parse_candle_row(row: &[String]) -> Result<Candle, BlofinError> {
    if row.len() < 9 {
        return Err(BlofinError::Malformed(format!(
            "candle row has {} fields, expected 9",
            row.len()
        )));
    }

    let ts_millis: i64 = row[0]
        .parse()
        .map_err(|e| BlofinError::Malformed(format!("bad timestamp: {}", e)))?;
    let timestamp: DateTime<Utc> = Utc
        .timestamp_millis_opt(ts_millis)
        .single()
        .ok_or_else(|| BlofinError::Malformed(format!("timestamp out of range: {}", ts_millis)))?;

    let parse_f64 = |s: &String, field: &str| -> Result<f64, BlofinError> {
        s.parse()
            .map_err(|e| BlofinError::Malformed(format!("bad {}: {}", field, e)))
    };

    Ok(Candle {
        timestamp,
        open: parse_f64(&row[1], "open")?,
        high: parse_f64(&row[2], "high")?,
        low: parse_f64(&row[3], "low")?,
        close: parse_f64(&row[4], "close")?,
        volume: parse_f64(&row[5], "volume")?,
        confirm: row[8] == "1",
    })
}

fn format_price(price: f64) -> String {
    // Trim trailing zeros so "0.25000000" goes out as "0.25"
    let s = format!("{:.8}", price);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn format_size(size: f64) -> String {
    format_price(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> BlofinClient {
        BlofinClient::new(
            Credentials {
                api_key: "key".to_string(),
                api_secret: "secret".to_string(),
                passphrase: "pass".to_string(),
            },
            DEMO_BASE_URL,
        )
    }

    #[test]
    fn test_signature_is_deterministic_hex() {
        let client = test_client();

        let sig = client.sign("1700000000000", "GET", "/api/v1/market/candles", "");
        let again = client.sign("1700000000000", "GET", "/api/v1/market/candles", "");

        assert_eq!(sig, again);
        assert_eq!(sig.len(), 64); // SHA-256 hex digest
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signature_covers_body() {
        let client = test_client();

        let without = client.sign("1700000000000", "POST", "/api/v1/trade/order", "");
        let with = client.sign("1700000000000", "POST", "/api/v1/trade/order", "{\"a\":1}");

        assert_ne!(without, with);
    }

    #[test]
    fn test_parse_candle_row() {
        let row: Vec<String> = vec![
            "1700000000000", "100.1", "101.5", "99.8", "100.9", "1234.5", "0", "0", "1",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let candle = parse_candle_row(&row).unwrap();
        assert_eq!(candle.open, 100.1);
        assert_eq!(candle.high, 101.5);
        assert_eq!(candle.low, 99.8);
        assert_eq!(candle.close, 100.9);
        assert_eq!(candle.volume, 1234.5);
        assert!(candle.confirm);
        assert_eq!(candle.timestamp.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_parse_candle_row_rejects_short_rows() {
        let row: Vec<String> = vec!["1700000000000", "100.1"]
            .into_iter()
            .map(String::from)
            .collect();

        assert!(matches!(
            parse_candle_row(&row),
            Err(BlofinError::Malformed(_))
        ));
    }

    #[test]
    fn test_format_price_trims_zeros() {
        assert_eq!(format_price(0.25), "0.25");
        assert_eq!(format_price(100.0), "100");
        assert_eq!(format_price(0.00012345), "0.00012345");
    }

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let client = BlofinClient::new(
            Credentials {
                api_key: "k".to_string(),
                api_secret: "s".to_string(),
                passphrase: "p".to_string(),
            },
            "https://example.com/",
        );
        assert_eq!(client.base_url(), "https://example.com");
    }
}
