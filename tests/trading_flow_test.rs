use bandbot::api::{BlofinClient, Credentials};
use bandbot::execution::{ExecutionAction, ExitReason, TradeExecutor};
use bandbot::models::{Bar, Candle, Signal};
use bandbot::risk::RiskLimits;
use bandbot::strategy::{BandBreakoutStrategy, Strategy};
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;

/// Uniform 5m series: flat closes, then a breakout candle and its successor
fn breakout_history() -> Vec<Candle> {
    let start = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();

    let mut closes = vec![100.0; 38];
    closes.push(105.0); // closes above the envelope
    closes.push(104.0); // next candle, currently forming

    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            timestamp: start + Duration::minutes(5 * i as i64),
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 1000.0,
            confirm: true,
        })
        .collect()
}

fn client_for(server: &mockito::ServerGuard) -> BlofinClient {
    BlofinClient::new(
        Credentials {
            api_key: "test-key".to_string(),
            api_secret: "test-secret".to_string(),
            passphrase: "test-pass".to_string(),
        },
        server.url(),
    )
}

#[tokio::test]
async fn test_breakout_signal_opens_and_closes_a_position() {
    let candles = breakout_history();
    let mut strategy = BandBreakoutStrategy::new(Bar::M5, 2.0, 1.0);

    // First poll of the forming candle arms the signal off the breakout close
    assert_eq!(strategy.evaluate(&candles).unwrap(), None);
    assert!(strategy.has_pending_signal());

    // Second poll within the same candle fires it
    let signal = strategy.evaluate(&candles).unwrap();
    assert_eq!(signal, Some(Signal::Long));

    // Exchange accepts the leverage change and the entry order
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/v1/account/set-leverage")
        .with_status(200)
        .with_body(json!({"code": "0", "msg": "", "data": {}}).to_string())
        .create_async()
        .await;
    let order_mock = server
        .mock("POST", "/api/v1/trade/order")
        .with_status(200)
        .with_body(
            json!({
                "code": "0",
                "msg": "",
                "data": [{"orderId": "7001", "clientOrderId": ""}]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let mut executor = TradeExecutor::new(
        client_for(&server),
        "BTC-USDT",
        "isolated",
        100.0,
        3,
        RiskLimits::default(),
    );

    let decision = executor.decide_entry(Signal::Long);
    assert_eq!(decision.action, ExecutionAction::Execute);

    use bandbot::indicators::compute_bands;
    let bands = compute_bands(&candles);
    let entry_band = bands.last().unwrap();
    let entry_price = entry_band.close;
    let levels = strategy.entry_levels(entry_price, entry_band, Signal::Long);

    assert!(levels.take_profit > entry_price);
    assert!(levels.stop_loss < entry_price);

    let position = executor
        .execute_entry(Signal::Long, entry_price, levels)
        .await
        .unwrap();

    assert_eq!(position.symbol, "BTC-USDT");
    assert_eq!(position.entry_price, entry_price);
    assert!(position.size > 0.0);
    order_mock.assert_async().await;

    // A second signal is rejected while the position is open
    let decision = executor.decide_entry(Signal::Short);
    assert_eq!(decision.action, ExecutionAction::Skip);

    // A later candle trades through the take-profit trigger
    let exit_candle = Candle {
        timestamp: candles.last().unwrap().timestamp + Duration::minutes(5),
        open: entry_price,
        high: levels.take_profit + 1.0,
        low: entry_price - 0.1,
        close: levels.take_profit,
        volume: 1000.0,
        confirm: true,
    };

    let closed = executor.check_exchange_exit(&exit_candle).unwrap();
    assert_eq!(closed.reason, ExitReason::TakeProfit);
    assert_eq!(closed.exit_price, levels.take_profit);
    assert!(executor.position().is_none());

    // Trade accounting survived the round trip
    assert_eq!(executor.trading_state().daily_trades, 1);
    assert_eq!(executor.trading_state().margin_in_use, 0.0);
}

#[tokio::test]
async fn test_rejected_order_counts_as_failure() {
    let candles = breakout_history();

    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/v1/account/set-leverage")
        .with_status(200)
        .with_body(json!({"code": "0", "msg": "", "data": {}}).to_string())
        .create_async()
        .await;
    server
        .mock("POST", "/api/v1/trade/order")
        .with_status(200)
        .with_body(
            json!({"code": "103003", "msg": "Insufficient balance", "data": null}).to_string(),
        )
        .create_async()
        .await;

    let mut executor = TradeExecutor::new(
        client_for(&server),
        "BTC-USDT",
        "isolated",
        100.0,
        3,
        RiskLimits::default(),
    );

    use bandbot::indicators::compute_bands;
    let bands = compute_bands(&candles);
    let entry_band = bands.last().unwrap();
    let strategy = BandBreakoutStrategy::new(Bar::M5, 2.0, 1.0);
    let levels = strategy.entry_levels(entry_band.close, entry_band, Signal::Long);

    let result = executor
        .execute_entry(Signal::Long, entry_band.close, levels)
        .await;

    assert!(result.is_err());
    assert!(executor.position().is_none());
    assert_eq!(executor.trading_state().consecutive_failures, 1);
}

#[test]
fn test_gapped_history_is_rejected() {
    let mut candles = breakout_history();
    // Drop a candle from the middle to break uniform spacing
    candles.remove(25);

    let mut strategy = BandBreakoutStrategy::new(Bar::M5, 2.0, 1.0);
    let err = strategy.evaluate(&candles).unwrap_err();
    assert!(err.to_string().to_lowercase().contains("gap"));
}
