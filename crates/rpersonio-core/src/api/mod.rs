//! HTTP API module for Personio's internal endpoints.
//!
//! This module provides the `ApiClient`, which owns the login session and
//! issues authenticated requests, and the `Transport` seam it sends them
//! through.
//!
//! Personio has no public token API for these endpoints; authentication is
//! the same cookie session the browser gets from `/login/index`.

pub mod client;
pub mod error;
pub mod transport;

pub use client::ApiClient;
pub use error::ApiError;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, RequestBody, Transport};

#[cfg(test)]
pub(crate) mod testing;
