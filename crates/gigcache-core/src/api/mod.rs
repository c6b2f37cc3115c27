//! HTTP client for the shows endpoint.
//!
//! This module provides the `ApiClient` for fetching nearby events from
//! whichever endpoint the resolver picked. Remote endpoints may require a
//! bearer token obtained from a `TokenProvider`.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
