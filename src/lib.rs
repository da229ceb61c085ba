//! Odds Arbitrage Scanner
//!
//! Finds two-outcome sports betting arbitrage across bookmakers and sizes
//! the stakes that lock in a profit.

pub mod arbitrage;
pub mod client;
pub mod config;
pub mod error;
pub mod notify;
pub mod report;
pub mod scanner;
pub mod storage;
pub mod types;
