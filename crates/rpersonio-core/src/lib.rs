//! Core library for rpersonio.
//!
//! Logs in to a Personio instance through its browser login flow and talks to
//! the attendance endpoints the web frontend uses.
//!
//! - [`api`]: HTTP transport, the authenticated [`ApiClient`], errors
//! - [`auth`]: credentials, session state machine, OS keychain
//! - [`cache`]: per-run day identifier cache
//! - [`models`]: request and response shapes
//! - [`service`]: the [`AttendanceService`] tying it together

pub mod api;
pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod models;
pub mod service;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthState, Credentials, Session, SessionData};
pub use cache::DayIdCache;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use service::AttendanceService;
