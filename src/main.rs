use bandbot::api::{BlofinClient, Credentials};
use bandbot::backtest::{self, BacktestConfig};
use bandbot::config::BotConfig;
use bandbot::execution::{ExecutionAction, OhlcvFeed, TradeExecutor};
use bandbot::indicators::analyze_market_conditions;
use bandbot::models::Bar;
use bandbot::notify::Notifier;
use bandbot::strategy::{BandBreakoutStrategy, Strategy};
use bandbot::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::time::{sleep, Duration};

#[derive(Parser)]
#[command(name = "bandbot", about = "SMA21/EMA34 band breakout bot for Blofin demo trading")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Instrument, e.g. BTC-USDT
    #[arg(long, global = true)]
    symbol: Option<String>,

    /// Candle timeframe, e.g. 5m, 15m, 1H
    #[arg(long, global = true)]
    bar: Option<String>,

    /// Margin per position in USD
    #[arg(long, global = true)]
    size: Option<f64>,

    #[arg(long, global = true)]
    leverage: Option<u32>,

    /// Take-profit distance as a multiple of the band width
    #[arg(long, global = true)]
    tp_mult: Option<f64>,

    /// Stop-loss distance as a multiple of the band width
    #[arg(long, global = true)]
    sl_mult: Option<f64>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the live trading loop (default)
    Run,
    /// Fetch candles once and print the current band envelope
    Bands,
    /// Replay the strategy over recent candle history
    Backtest {
        /// Number of candles to fetch
        #[arg(long, default_value_t = 300)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_live(config).await,
        Command::Bands => run_bands(config).await,
        Command::Backtest { limit } => run_backtest(config, limit).await,
    }
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bandbot=info")),
        )
        .init();
}

fn load_config(cli: &Cli) -> Result<BotConfig> {
    let mut config = BotConfig::load()?;

    if let Some(symbol) = &cli.symbol {
        config.symbol = symbol.clone();
    }
    if let Some(bar) = &cli.bar {
        config.bar = bar.clone();
    }
    if let Some(size) = cli.size {
        config.position_size_usd = size;
    }
    if let Some(leverage) = cli.leverage {
        config.leverage = leverage;
    }
    if let Some(tp) = cli.tp_mult {
        config.tp_multiplier = tp;
    }
    if let Some(sl) = cli.sl_mult {
        config.sl_multiplier = sl;
    }

    config.validate()?;
    Ok(config)
}

fn build_client(config: &BotConfig) -> Result<BlofinClient> {
    let credentials = Credentials::from_env().ok_or(
        "Missing credentials: set BLOFIN_API_KEY, BLOFIN_SECRET_KEY and BLOFIN_API_PASSPHRASE",
    )?;
    Ok(BlofinClient::new(credentials, &config.base_url))
}

/// Seconds to sleep until the next evaluation point
///
/// The loop wakes twice per candle: just after each bar boundary (when a
/// fresh candle appears and a breakout can arm a signal) and a couple of
/// seconds before the next boundary (when an armed signal fires while the
/// breakout's successor is still the latest candle).
fn seconds_until_next_wake(bar: Bar) -> u64 {
    let period = bar.duration().num_seconds();
    let into_candle = Utc::now().timestamp().rem_euclid(period);
    let until_boundary = period - into_candle;

    if until_boundary > 3 {
        // Late wake, 2s before the candle closes
        (until_boundary - 2) as u64
    } else {
        // Too close to the boundary, wake 1s after it instead
        (until_boundary + 1) as u64
    }
}

async fn run_live(config: BotConfig) -> Result<()> {
    let bar = config.parsed_bar()?;
    let client = build_client(&config)?;

    tracing::info!("🚀 Band breakout bot starting");
    tracing::info!("  Symbol: {}", config.symbol);
    tracing::info!("  Bar: {}", bar);
    tracing::info!(
        "  Position: ${:.2} @ {}x {}",
        config.position_size_usd,
        config.leverage,
        config.margin_mode
    );
    tracing::info!(
        "  TP/SL multipliers: {:.1} / {:.1}",
        config.tp_multiplier,
        config.sl_multiplier
    );

    let feed = OhlcvFeed::new(
        client.clone(),
        &config.symbol,
        bar,
        config.candle_limit,
    );
    let mut strategy = BandBreakoutStrategy::new(bar, config.tp_multiplier, config.sl_multiplier);
    let mut executor = TradeExecutor::new(
        client,
        &config.symbol,
        &config.margin_mode,
        config.position_size_usd,
        config.leverage,
        config.risk.clone(),
    );
    let notifier = Notifier::from_env();

    tracing::info!("Press Ctrl+C to stop...");

    loop {
        let wait = seconds_until_next_wake(bar);
        tracing::debug!("Sleeping {}s until next evaluation", wait);

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("⚠️  Received Ctrl+C, shutting down...");
                break;
            }
            _ = sleep(Duration::from_secs(wait)) => {}
        }

        if let Err(e) = evaluate_once(&feed, &mut strategy, &mut executor, &notifier).await {
            tracing::error!("Evaluation failed: {}", e);
        }
    }

    tracing::info!("👋 Bot stopped");
    Ok(())
}

/// One pass of the trading loop: refresh data, manage exits, act on signals
async fn evaluate_once(
    feed: &OhlcvFeed,
    strategy: &mut BandBreakoutStrategy,
    executor: &mut TradeExecutor,
    notifier: &Notifier,
) -> Result<()> {
    let snapshot = feed.fetch().await?;

    let latest_candle = snapshot
        .candles
        .last()
        .ok_or("Snapshot missing candles")?;
    let latest_band = snapshot.latest_band().ok_or("Not enough data for bands")?;

    // Exchange-held TP/SL triggers fill on their own; notice and record it
    if let Some(closed) = executor.check_exchange_exit(latest_candle) {
        notifier.notify_position_closed(&closed).await;
    }

    // Manual exit when price crosses back through the far band
    let crossed_back = executor
        .position()
        .map(|position| strategy.should_close(latest_band, position))
        .unwrap_or(false);
    if crossed_back {
        tracing::info!("Price crossed back through the bands, closing position");
        let closed = executor.close_position(latest_band.close).await?;
        notifier.notify_position_closed(&closed).await;
        return Ok(());
    }

    let Some(signal) = strategy.evaluate(&snapshot.candles)? else {
        return Ok(());
    };

    let decision = executor.decide_entry(signal);
    tracing::info!("Decision: {:?} - {}", decision.action, decision.reason);
    if decision.action != ExecutionAction::Execute {
        return Ok(());
    }

    // Enter at the live price; fall back to the last close if the ticker fails
    let entry_price = match feed.ticker_price().await {
        Ok(price) => price,
        Err(e) => {
            tracing::warn!("Ticker fetch failed ({}), using last close", e);
            latest_band.close
        }
    };
    let levels = strategy.entry_levels(entry_price, latest_band, signal);
    let position = executor.execute_entry(signal, entry_price, levels).await?;

    notifier
        .notify_signal(
            &position.symbol,
            signal,
            entry_price,
            Some(levels.take_profit),
            Some(levels.stop_loss),
        )
        .await;

    Ok(())
}

async fn run_bands(config: BotConfig) -> Result<()> {
    let bar = config.parsed_bar()?;
    let client = build_client(&config)?;
    let feed = OhlcvFeed::new(client, &config.symbol, bar, config.candle_limit);

    let snapshot = feed.fetch().await?;
    tracing::info!(
        "{}: {} candles, {} band points",
        config.symbol,
        snapshot.candles.len(),
        snapshot.bands.len()
    );

    for band in snapshot.bands.iter().rev().take(10).rev() {
        tracing::info!(
            "{} | close ${:.4} | SMA ${:.4} | EMA ${:.4} | band ${:.4}..${:.4}",
            band.timestamp.format("%Y-%m-%d %H:%M:%S"),
            band.close,
            band.sma,
            band.ema,
            band.lower,
            band.upper
        );
    }

    match analyze_market_conditions(&snapshot.bands) {
        Some(analysis) => {
            tracing::info!("Market condition: {:?}", analysis.condition);
            if let Some(crossover) = analysis.crossover {
                tracing::info!("Recent crossover: {:?}", crossover);
            }
        }
        None => tracing::warn!("Not enough band history to analyze market conditions"),
    }

    Ok(())
}

async fn run_backtest(config: BotConfig, limit: u32) -> Result<()> {
    let bar = config.parsed_bar()?;
    let client = build_client(&config)?;

    let candles = client.get_candles(&config.symbol, bar, limit).await?;
    tracing::info!(
        "Replaying {} {} candles for {}",
        candles.len(),
        bar,
        config.symbol
    );

    let report = backtest::run(
        &candles,
        &BacktestConfig {
            position_size_usd: config.position_size_usd,
            leverage: config.leverage,
            tp_multiplier: config.tp_multiplier,
            sl_multiplier: config.sl_multiplier,
        },
    );

    for trade in &report.trades {
        tracing::info!(
            "{} {} | entry ${:.4} @ {} | exit ${:.4} @ {} ({}) | PnL ${:.2}",
            config.symbol,
            trade.side,
            trade.entry_price,
            trade.entry_time.format("%m-%d %H:%M"),
            trade.exit_price,
            trade.exit_time.format("%m-%d %H:%M"),
            trade.reason,
            trade.pnl
        );
    }

    tracing::info!("📊 Backtest summary:");
    tracing::info!("  Trades: {}", report.trades.len());
    tracing::info!("  Wins/Losses: {}/{}", report.wins, report.losses);
    tracing::info!("  Win rate: {:.1}%", report.win_rate() * 100.0);
    tracing::info!(
        "  Total PnL: ${:.2} (avg ${:.2})",
        report.total_pnl,
        report.avg_pnl()
    );

    Ok(())
}
