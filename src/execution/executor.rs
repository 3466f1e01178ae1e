use chrono::Utc;

use crate::api::{BlofinClient, OrderRequest, OrderResult};
use crate::execution::sizing;
use crate::models::{Candle, OpenPosition, Side, Signal};
use crate::risk::{RiskLimits, TradingState};
use crate::strategy::EntryLevels;
use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionAction {
    Execute,
    Skip,
}

#[derive(Debug, Clone)]
pub struct ExecutionDecision {
    pub action: ExecutionAction,
    pub reason: String,
}

/// Why a position left the book
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    BandCross,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::TakeProfit => f.write_str("take-profit"),
            ExitReason::StopLoss => f.write_str("stop-loss"),
            ExitReason::BandCross => f.write_str("band cross"),
        }
    }
}

/// A position close observed or initiated by the bot
#[derive(Debug, Clone)]
pub struct ClosedPosition {
    pub position: OpenPosition,
    pub exit_price: f64,
    pub reason: ExitReason,
}

/// Turns fired signals into exchange orders and tracks the open position
///
/// The exchange holds the TP/SL trigger orders; this side only keeps enough
/// state to avoid doubling up and to notice when a trigger has fired.
pub struct TradeExecutor {
    client: BlofinClient,
    symbol: String,
    margin_mode: String,
    position_size_usd: f64,
    leverage: u32,
    limits: RiskLimits,
    state: TradingState,
    position: Option<OpenPosition>,
    leverage_synced: bool,
}

impl TradeExecutor {
    pub fn new(
        client: BlofinClient,
        symbol: impl Into<String>,
        margin_mode: impl Into<String>,
        position_size_usd: f64,
        leverage: u32,
        limits: RiskLimits,
    ) -> Self {
        Self {
            client,
            symbol: symbol.into(),
            margin_mode: margin_mode.into(),
            position_size_usd,
            leverage,
            limits,
            state: TradingState::new(),
            position: None,
            leverage_synced: false,
        }
    }

    pub fn position(&self) -> Option<&OpenPosition> {
        self.position.as_ref()
    }

    pub fn trading_state(&self) -> &TradingState {
        &self.state
    }

    /// Decide whether an entry signal should be executed
    pub fn decide_entry(&mut self, signal: Signal) -> ExecutionDecision {
        self.state.roll_day(Utc::now());

        if let Some(position) = &self.position {
            return ExecutionDecision {
                action: ExecutionAction::Skip,
                reason: format!("Already holding a {} position", position.side),
            };
        }

        if let Err(trip) = self.limits.check(&self.state, self.position_size_usd) {
            return ExecutionDecision {
                action: ExecutionAction::Skip,
                reason: format!("Risk limit: {}", trip),
            };
        }

        ExecutionDecision {
            action: ExecutionAction::Execute,
            reason: format!("{} signal with capacity available", signal.side()),
        }
    }

    /// Place the entry order with attached TP/SL triggers
    pub async fn execute_entry(
        &mut self,
        signal: Signal,
        entry_price: f64,
        levels: EntryLevels,
    ) -> Result<OpenPosition> {
        if !self.leverage_synced {
            self.client
                .set_leverage(&self.symbol, self.leverage)
                .await?;
            self.leverage_synced = true;
        }

        let side = signal.side();
        let size = sizing::position_size(
            entry_price,
            self.position_size_usd,
            self.leverage,
            &self.symbol,
        );

        tracing::info!(
            "Placing {} order: entry ${:.4}, size {:.4}, TP ${:.4}, SL ${:.4}",
            side,
            entry_price,
            size,
            levels.take_profit,
            levels.stop_loss
        );

        let order = OrderRequest {
            symbol: self.symbol.clone(),
            side,
            size,
            margin_mode: self.margin_mode.clone(),
            take_profit: Some(levels.take_profit),
            stop_loss: Some(levels.stop_loss),
            reduce_only: false,
        };

        match self.client.place_order(&order).await {
            Ok(result) => {
                tracing::info!("Order placed: {}", result.order_id);
                self.state.record_entry(self.position_size_usd);

                let position = OpenPosition {
                    symbol: self.symbol.clone(),
                    side,
                    entry_price,
                    size,
                    stop_loss: levels.stop_loss,
                    take_profit: levels.take_profit,
                    entry_time: Utc::now(),
                };
                self.position = Some(position.clone());
                Ok(position)
            }
            Err(e) => {
                self.state.record_failure();
                Err(e.into())
            }
        }
    }

    /// Detect an exchange-side TP/SL fill from the latest candle range
    ///
    /// The trigger orders live on the exchange, so a fill only shows up here
    /// as the candle trading through the recorded trigger price. Clears the
    /// local position when that happens.
    pub fn check_exchange_exit(&mut self, latest: &Candle) -> Option<ClosedPosition> {
        let position = self.position.as_ref()?;

        let hit = if position.side.is_long() {
            if latest.low <= position.stop_loss {
                Some((position.stop_loss, ExitReason::StopLoss))
            } else if latest.high >= position.take_profit {
                Some((position.take_profit, ExitReason::TakeProfit))
            } else {
                None
            }
        } else if latest.high >= position.stop_loss {
            Some((position.stop_loss, ExitReason::StopLoss))
        } else if latest.low <= position.take_profit {
            Some((position.take_profit, ExitReason::TakeProfit))
        } else {
            None
        };

        let (exit_price, reason) = hit?;

        let position = self.position.take()?;
        self.state.record_exit(self.position_size_usd);

        tracing::info!(
            "{} {} position closed by exchange {} at ${:.4}",
            position.symbol,
            position.side,
            reason,
            exit_price
        );

        Some(ClosedPosition {
            position,
            exit_price,
            reason,
        })
    }

    /// Close the open position with a reduce-only market order
    pub async fn close_position(&mut self, exit_price: f64) -> Result<ClosedPosition> {
        let position = self
            .position
            .as_ref()
            .ok_or("No open position to close")?
            .clone();

        let order = OrderRequest {
            symbol: position.symbol.clone(),
            side: match position.side {
                Side::Long => Side::Short,
                Side::Short => Side::Long,
            },
            size: position.size,
            margin_mode: self.margin_mode.clone(),
            take_profit: None,
            stop_loss: None,
            reduce_only: true,
        };

        let result: OrderResult = self.client.place_order(&order).await?;
        tracing::info!(
            "Closed {} {} position at ~${:.4} (order {})",
            position.symbol,
            position.side,
            exit_price,
            result.order_id
        );

        self.position = None;
        self.state.record_exit(self.position_size_usd);

        Ok(ClosedPosition {
            position,
            exit_price,
            reason: ExitReason::BandCross,
        })
    }

    /// Restore a position (used by tests and by manual recovery)
    #[cfg(test)]
    pub fn set_position(&mut self, position: OpenPosition) {
        self.position = Some(position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{BlofinClient, Credentials};
    use chrono::Utc;

    fn test_executor() -> TradeExecutor {
        let client = BlofinClient::new(
            Credentials {
                api_key: "k".to_string(),
                api_secret: "s".to_string(),
                passphrase: "p".to_string(),
            },
            "http://127.0.0.1:1",
        );
        TradeExecutor::new(client, "BTC-USDT", "isolated", 100.0, 3, RiskLimits::default())
    }

    fn open_long(entry: f64, sl: f64, tp: f64) -> OpenPosition {
        OpenPosition {
            symbol: "BTC-USDT".to_string(),
            side: Side::Long,
            entry_price: entry,
            size: 0.1,
            stop_loss: sl,
            take_profit: tp,
            entry_time: Utc::now(),
        }
    }

    fn candle(high: f64, low: f64, close: f64) -> Candle {
        Candle {
            timestamp: Utc::now(),
            open: close,
            high,
            low,
            close,
            volume: 1.0,
            confirm: true,
        }
    }

    #[test]
    fn test_entry_allowed_when_flat() {
        let mut executor = test_executor();
        let decision = executor.decide_entry(Signal::Long);
        assert_eq!(decision.action, ExecutionAction::Execute);
    }

    #[test]
    fn test_entry_skipped_with_open_position() {
        let mut executor = test_executor();
        executor.set_position(open_long(100.0, 95.0, 110.0));

        let decision = executor.decide_entry(Signal::Short);
        assert_eq!(decision.action, ExecutionAction::Skip);
        assert!(decision.reason.contains("Already holding"));
    }

    #[test]
    fn test_entry_skipped_when_risk_trips() {
        let mut executor = test_executor();
        executor.limits.max_daily_trades = 0;

        let decision = executor.decide_entry(Signal::Long);
        assert_eq!(decision.action, ExecutionAction::Skip);
        assert!(decision.reason.contains("Risk limit"));
    }

    #[test]
    fn test_exchange_exit_long_stop_loss() {
        let mut executor = test_executor();
        executor.set_position(open_long(100.0, 95.0, 110.0));

        // Candle traded down through the stop
        let closed = executor.check_exchange_exit(&candle(101.0, 94.0, 96.0));

        let closed = closed.unwrap();
        assert_eq!(closed.reason, ExitReason::StopLoss);
        assert_eq!(closed.exit_price, 95.0);
        assert!(executor.position().is_none());
    }

    #[test]
    fn test_exchange_exit_long_take_profit() {
        let mut executor = test_executor();
        executor.set_position(open_long(100.0, 95.0, 110.0));

        let closed = executor.check_exchange_exit(&candle(111.0, 99.0, 109.0));

        let closed = closed.unwrap();
        assert_eq!(closed.reason, ExitReason::TakeProfit);
        assert_eq!(closed.exit_price, 110.0);
    }

    #[test]
    fn test_exchange_exit_short_sides_flipped() {
        let mut executor = test_executor();
        executor.set_position(OpenPosition {
            side: Side::Short,
            stop_loss: 105.0,
            take_profit: 90.0,
            ..open_long(100.0, 0.0, 0.0)
        });

        // Short stop-loss sits above entry
        let closed = executor.check_exchange_exit(&candle(106.0, 99.0, 104.0));
        assert_eq!(closed.unwrap().reason, ExitReason::StopLoss);
    }

    #[test]
    fn test_no_exit_when_candle_inside_triggers() {
        let mut executor = test_executor();
        executor.set_position(open_long(100.0, 95.0, 110.0));

        assert!(executor.check_exchange_exit(&candle(103.0, 98.0, 101.0)).is_none());
        assert!(executor.position().is_some());
    }

    #[test]
    fn test_no_exit_when_flat() {
        let mut executor = test_executor();
        assert!(executor.check_exchange_exit(&candle(103.0, 98.0, 101.0)).is_none());
    }
}
