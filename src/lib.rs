// NativiWeb client library.
// Authenticated API access with response caching, error normalization, and build polling.

pub mod api;
pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod polling;
pub mod retry;
pub mod state;
pub mod telemetry;
pub mod ui;

pub use api::ApiClient;
pub use config::ClientConfig;
pub use error::{ApiError, Result};
