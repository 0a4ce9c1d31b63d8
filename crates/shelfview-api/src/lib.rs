//! Data API client for the model library server
//!
//! ```ignore
//! let client = ApiClient::new("http://localhost:3000/api");
//! let models = client.models().await?;
//! ```

pub mod client;
pub mod error;
pub mod protocol;

pub use client::ApiClient;
pub use error::ApiError;
pub use protocol::*;

/// Default API base used when nothing is configured
pub const DEFAULT_API_BASE: &str = "http://localhost:3000/api";
