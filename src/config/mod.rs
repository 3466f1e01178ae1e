use serde::Deserialize;

use crate::api::blofin::DEMO_BASE_URL;
use crate::models::Bar;
use crate::risk::RiskLimits;

/// Bot configuration, layered from defaults, an optional `config.toml` and
/// `BOT_`-prefixed environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub symbol: String,
    pub bar: String,
    pub position_size_usd: f64,
    pub leverage: u32,
    pub margin_mode: String,
    pub tp_multiplier: f64,
    pub sl_multiplier: f64,
    pub candle_limit: u32,
    pub base_url: String,
    #[serde(default)]
    pub risk: RiskLimits,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC-USDT".to_string(),
            bar: "5m".to_string(),
            position_size_usd: 100.0,
            leverage: 3,
            margin_mode: "isolated".to_string(),
            tp_multiplier: 2.0,
            sl_multiplier: 1.0,
            candle_limit: 300,
            base_url: DEMO_BASE_URL.to_string(),
            risk: RiskLimits::default(),
        }
    }
}

impl BotConfig {
    /// Load configuration: defaults, then `config.toml` if present, then
    /// environment variables (e.g. `BOT_LEVERAGE=5`)
    pub fn load() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let settings = config::Config::builder()
            .set_default("symbol", defaults.symbol)?
            .set_default("bar", defaults.bar)?
            .set_default("position_size_usd", defaults.position_size_usd)?
            .set_default("leverage", defaults.leverage as i64)?
            .set_default("margin_mode", defaults.margin_mode)?
            .set_default("tp_multiplier", defaults.tp_multiplier)?
            .set_default("sl_multiplier", defaults.sl_multiplier)?
            .set_default("candle_limit", defaults.candle_limit as i64)?
            .set_default("base_url", defaults.base_url)?
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("BOT"))
            .build()?;

        let config: BotConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parsed candle timeframe
    pub fn parsed_bar(&self) -> anyhow::Result<Bar> {
        self.bar
            .parse()
            .map_err(|e: String| anyhow::anyhow!("Invalid bar '{}': {}", self.bar, e))
    }

    /// Validate user-supplied parameters
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.position_size_usd <= 0.0 {
            anyhow::bail!("Position size must be positive");
        }

        if self.leverage < 1 {
            anyhow::bail!("Leverage must be at least 1");
        }

        if self.tp_multiplier <= 0.0 || self.sl_multiplier <= 0.0 {
            anyhow::bail!("TP and SL multipliers must be positive");
        }

        if !self.symbol.ends_with("-USDT") {
            anyhow::bail!("Symbol must be in format XXX-USDT");
        }

        if self.margin_mode != "isolated" && self.margin_mode != "cross" {
            anyhow::bail!("Margin mode must be 'isolated' or 'cross'");
        }

        self.parsed_bar()?;

        Ok(())
    }
}
