//! Yahoo Finance integration

pub mod client;
pub mod types;

pub use client::{ClientConfig, YahooClient};
pub use types::QuoteData;
