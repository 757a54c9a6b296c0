pub mod api;
pub mod chain;
pub mod config;
pub mod detectors;
pub mod error;
pub mod monitor;
pub mod risk;
pub mod store;
pub mod watchlist;
