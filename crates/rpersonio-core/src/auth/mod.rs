//! Authentication module for the Personio login flow.
//!
//! This module provides:
//! - `Credentials`: the email/password pair plus the new-device challenge tokens
//! - `Session`: the login state machine (logged out, awaiting challenge, logged in)
//! - `CredentialStore`: Secure OS-level password storage via keyring
//!
//! Sessions live for one process run and are never written to disk.

pub mod credentials;
pub mod session;

pub use credentials::{CredentialStore, Credentials};
pub use session::{AuthState, Session, SessionData};
