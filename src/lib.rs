//! svstats library
//!
//! Exposes the expiring cache, the stats API client and the CLI definitions
//! for use by the binary and integration tests.

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
