//! # SGNL client library
//!
//! Shared authorization core for the host-side adapters: configuration
//! discovery, logging, the HTTP transport to the SGNL access service, and
//! the typed evaluation/search operations the sudo policy plugin and the
//! PAM account module are built on.

pub mod access;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod request_id;
mod retry;

pub use access::{
    AccessEvaluator, AccessQuery, AccessResult, BatchEvaluation, Decision, SearchResult,
};
pub use client::{ClientBuilder, SgnlClient};
pub use config::{ConfigLoader, SgnlConfig};
pub use error::ClientError;

pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");
