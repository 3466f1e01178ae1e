// Risk management module
pub mod limits;

pub use limits::{RiskLimits, RiskTrip, TradingState};
