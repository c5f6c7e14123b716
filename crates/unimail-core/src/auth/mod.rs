//! Authentication for the unimail API.
//!
//! This module provides:
//! - `Credentials`: the long-lived key/secret pair, secret held in a `SecretString`
//! - `SessionManager`: short-lived session tokens, cached on disk per
//!   credential pair and refreshed once when the server answers 401

pub mod credentials;
pub mod session;

pub use credentials::{redact, Credentials};
pub use session::{Authenticator, SessionManager, SessionState};
