//! Telegram notifications

pub mod client;
pub mod message;

pub use client::TelegramClient;
