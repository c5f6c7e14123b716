//! Local session token cache.
//!
//! This module provides the `CredentialCache`, which persists session tokens
//! in a JSON file so repeated CLI invocations can skip authentication. Entries
//! are namespaced by a `CredentialFingerprint` of the API key/secret pair.

pub mod fingerprint;
pub mod manager;

pub use fingerprint::CredentialFingerprint;
pub use manager::{CacheError, CredentialCache, SESSION_TOKEN_KEY};
