use reqwest::Client;

use crate::execution::ClosedPosition;
use crate::models::Signal;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// SMS notifications through the Twilio REST API
///
/// Disabled (all sends become no-ops) unless TWILIO_ACCOUNT_SID,
/// TWILIO_AUTH_TOKEN, TWILIO_PHONE_NUMBER and NOTIFICATION_PHONE_NUMBER are
/// all present in the environment.
pub struct Notifier {
    client: Client,
    config: Option<TwilioConfig>,
    base_url: String,
}

#[derive(Debug, Clone)]
struct TwilioConfig {
    account_sid: String,
    auth_token: String,
    from_number: String,
    to_number: String,
}

impl Notifier {
    pub fn from_env() -> Self {
        Self::with_base_url(TWILIO_API_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let config = Self::load_config();

        if config.is_some() {
            tracing::info!("SMS notifications enabled");
        } else {
            tracing::warn!("SMS notifications disabled: missing configuration");
        }

        Self {
            client: Client::new(),
            config,
            base_url: base_url.into(),
        }
    }

    fn load_config() -> Option<TwilioConfig> {
        Some(TwilioConfig {
            account_sid: std::env::var("TWILIO_ACCOUNT_SID").ok()?,
            auth_token: std::env::var("TWILIO_AUTH_TOKEN").ok()?,
            from_number: std::env::var("TWILIO_PHONE_NUMBER").ok()?,
            to_number: std::env::var("NOTIFICATION_PHONE_NUMBER").ok()?,
        })
    }

    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Send a raw SMS; returns whether a message went out
    pub async fn send(&self, message: &str) -> bool {
        let Some(config) = &self.config else {
            tracing::debug!("Notification skipped (service disabled): {}", message);
            return false;
        };

        let url = format!(
            "{}/Accounts/{}/Messages.json",
            self.base_url, config.account_sid
        );

        let params = [
            ("Body", message),
            ("From", config.from_number.as_str()),
            ("To", config.to_number.as_str()),
        ];

        let result = self
            .client
            .post(&url)
            .basic_auth(&config.account_sid, Some(&config.auth_token))
            .form(&params)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::info!("SMS notification sent: {}", message);
                true
            }
            Ok(response) => {
                tracing::error!("Failed to send SMS notification: HTTP {}", response.status());
                false
            }
            Err(e) => {
                tracing::error!("Failed to send SMS notification: {}", e);
                false
            }
        }
    }

    /// Notify that a signal fired, with the entry's TP/SL levels
    pub async fn notify_signal(
        &self,
        symbol: &str,
        signal: Signal,
        price: f64,
        tp_price: Option<f64>,
        sl_price: Option<f64>,
    ) -> bool {
        let mut message = format!(
            "Trading Signal: {} {} @ ${:.2}",
            signal.to_string().to_uppercase(),
            symbol,
            price
        );
        if let Some(tp) = tp_price {
            message.push_str(&format!("\nTake Profit: ${:.2}", tp));
        }
        if let Some(sl) = sl_price {
            message.push_str(&format!("\nStop Loss: ${:.2}", sl));
        }
        self.send(&message).await
    }

    /// Notify that a position closed, with its PnL
    pub async fn notify_position_closed(&self, closed: &ClosedPosition) -> bool {
        let position = &closed.position;
        let pnl = position.unrealized_pnl(closed.exit_price);

        let message = format!(
            "Position Closed: {} {}\nEntry: ${:.2}\nExit: ${:.2}\nPnL: ${:.2} ({:.2}%)",
            position.side,
            position.symbol,
            position.entry_price,
            closed.exit_price,
            pnl,
            (pnl / position.entry_price) * 100.0
        );
        self.send(&message).await
    }
}
