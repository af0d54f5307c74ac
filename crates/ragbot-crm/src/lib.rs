//! amoCRM lead submission.
//!
//! [`CrmApi`] is the seam the conversation core talks to; [`AmoClient`]
//! is the production implementation over the amoCRM v4 REST API, and
//! [`DisabledCrm`] stands in when the integration is not configured.
//! Tag and branch derivation is pure and lives in [`tags`].

mod client;
mod config;
mod error;
pub mod tags;

pub use client::{client_from_env, AmoClient, CrmApi, DisabledCrm, LeadRequest};
pub use config::AmoConfig;
pub use error::{CrmError, Result};
