// NativiWeb API module.
// HTTP client, resource endpoints, and types for the backend REST API.

pub mod classify;
pub mod client;
pub mod download;
pub mod endpoints;
pub mod types;

pub use classify::ResponseKind;
pub use client::ApiClient;
pub use download::{DownloadProgress, DownloadedFile};
pub use types::*;
