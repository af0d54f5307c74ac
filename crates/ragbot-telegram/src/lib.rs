//! Transport layer: three Telegram bots plus the HTTP surface.
//!
//! The user bot feeds the conversation engine, the admin bot edits the
//! knowledge base, the notification bot is the operators' broadcast
//! channel. The axum server exposes health, the stateless question
//! endpoint, transcript pages and visit-counting entry redirect.

pub mod admin;
pub mod bot;
pub mod config;
mod error;
pub mod http;
pub mod notify;

pub use config::AppConfig;
pub use error::{Result, TelegramError};
