// Order execution module
pub mod executor;
pub mod ohlcv_feed;
pub mod sizing;

pub use executor::{
    ClosedPosition, ExecutionAction, ExecutionDecision, ExitReason, TradeExecutor,
};
pub use ohlcv_feed::{MarketSnapshot, OhlcvFeed};
pub use sizing::{minimum_size, position_size, tp_sl_from_percent};
