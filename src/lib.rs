//! Local stand-in for the Mailjet webhook and send APIs.
//!
//! Records webhook callbacks per API key in JSON files, forwards send and
//! event-callback setup requests to Mailjet, and serves static files for a web UI.

pub mod config;
pub mod error;
pub mod http_server;
pub mod provider;
pub mod store;
pub mod types;

pub use config::Config;
pub use http_server::{router, AppState};
pub use store::{EventLogError, EventLogStore};
