use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::cache::CredentialFingerprint;

/// Long-lived API key/secret pair used to create sessions.
///
/// The secret is held in a [`SecretString`] so it never ends up in debug
/// output or logs by accident.
pub struct Credentials {
    key: String,
    secret: SecretString,
}

/// Wire body of `POST /v1/sessions`.
#[derive(Serialize)]
pub(crate) struct SessionRequest<'a> {
    key: &'a str,
    secret: &'a str,
}

impl Credentials {
    pub fn new(key: impl Into<String>, secret: SecretString) -> Self {
        Self {
            key: key.into(),
            secret,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// Cache namespace for this pair.
    pub fn fingerprint(&self) -> CredentialFingerprint {
        CredentialFingerprint::of(&self.key, self.secret.expose_secret())
    }

    pub(crate) fn session_request(&self) -> SessionRequest<'_> {
        SessionRequest {
            key: &self.key,
            secret: self.secret.expose_secret(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &redact(&self.key))
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Show only the first few characters of a credential or token.
pub fn redact(value: &str) -> String {
    const VISIBLE: usize = 4;
    let prefix: String = value.chars().take(VISIBLE).collect();
    if value.chars().count() > VISIBLE {
        format!("{}…", prefix)
    } else {
        "…".to_string()
    }
}
