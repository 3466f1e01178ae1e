// Technical indicators
pub mod bands;
pub mod moving_average;

pub use bands::{analyze_market_conditions, compute_bands, Band, BandAnalysis};
pub use moving_average::{calculate_ema, calculate_sma, ema_series, sma_series};
