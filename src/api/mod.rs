//! Client for the SUPERVIVE stats API on op.gg
//!
//! This module wraps two HTTP transports (a retrying one for reads and a
//! single-attempt one for side-effecting calls) and the expiring disk cache
//! behind a single [`StatsClient`].

pub mod client;
pub mod models;
pub mod retry;
pub mod transport;
pub mod xsrf;

use thiserror::Error;

use crate::cache::CacheError;

pub use client::{normalize_player_id, StatsClient};
pub use models::{HunterRef, MatchPage, MatchSummary, PageMeta};
pub use retry::RetryPolicy;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport};

/// Base URL for the op.gg SUPERVIVE API
pub const BASE_URL: &str = "https://op.gg/supervive/";

/// User agent sent with every request
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36";

/// Errors that can occur when talking to the stats API
#[derive(Debug, Error)]
pub enum ApiError {
    /// A retryable status persisted through every allowed attempt
    #[error("Server kept answering HTTP {status} after {attempts} attempts")]
    TransportExhausted { status: u16, attempts: u32 },

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server answered HTTP {status}")]
    Status { status: u16 },

    /// Response body was empty or `null`
    #[error("Response data is null")]
    NullPayload,

    /// Missing expected field in response
    #[error("Missing expected field in response: {0}")]
    MissingField(String),

    /// No `XSRF-TOKEN` cookie in the token response
    #[error("Could not find the XSRF-TOKEN cookie")]
    TokenNotFound,

    /// Refresh endpoint answered with HTML or no content type
    #[error("Invalid player id or XSRF token")]
    InvalidToken,

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Reading or writing the response cache failed
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl ApiError {
    /// Whether retrying the same request might succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Request(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}
