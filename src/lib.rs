pub mod api;
pub mod backtest;
pub mod config;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod notify;
pub mod risk;
pub mod strategy;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
