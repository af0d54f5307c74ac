//! Conversation core: state machine, answer composer, lead finalization.
//!
//! The engine is transport-agnostic. The Telegram layer translates
//! updates into [`UserEvent`]s and renders the returned [`Outgoing`]
//! actions; everything stateful happens here, behind the storage, AI,
//! CRM and notification seams.

pub mod composer;
pub mod config;
mod engine;
mod error;
mod flow;
mod lead;
pub mod messages;
mod notify;
pub mod triggers;

pub use composer::Composer;
pub use config::Settings;
pub use engine::{ChatEngine, Outgoing, UserEvent};
pub use error::{CoreError, Result};
pub use flow::ContactFlow;
pub use notify::Notifier;
