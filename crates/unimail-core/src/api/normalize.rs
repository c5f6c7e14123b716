//! Classification of failed calls into [`ApiError`].

use serde::Deserialize;
use tracing::error;

use super::error::{ApiError, BoxError, UnexpectedResponse, ERROR_PRELUDE, SUPPORT_EMAIL};
use super::transport::TransportError;

/// A call that did not produce a successful response.
#[derive(Debug)]
pub enum Failure {
    Transport(TransportError),
    Status { status: u16, body: String },
    /// The response arrived but could not be understood.
    Decode(BoxError),
}

#[derive(Deserialize)]
struct ErrorPayload {
    error: String,
}

/// Turns raw failures into user-facing errors. Holds the host and base URL
/// so network errors can name what was unreachable.
#[derive(Debug, Clone, Copy)]
pub struct ErrorNormalizer<'a> {
    host: &'a str,
    base_url: &'a str,
}

impl<'a> ErrorNormalizer<'a> {
    pub fn new(host: &'a str, base_url: &'a str) -> Self {
        Self { host, base_url }
    }

    /// Classify a failure. `action` is a gerund phrase such as
    /// "getting a session key" used to give messages context.
    pub fn normalize(&self, failure: Failure, action: Option<&str>) -> ApiError {
        match failure {
            Failure::Transport(TransportError::HostNotFound { source }) => ApiError::DnsResolution {
                host: self.host.to_string(),
                base_url: self.base_url.to_string(),
                source,
            },
            Failure::Transport(TransportError::ConnectionRefused { source }) => {
                ApiError::ConnectionRefused {
                    base_url: self.base_url.to_string(),
                    source,
                }
            }
            Failure::Transport(TransportError::Other(source)) => self.unknown(source, action),
            Failure::Status { status: 401, .. } => ApiError::InvalidCredentials,
            Failure::Status { status, body } => match serde_json::from_str::<ErrorPayload>(&body) {
                Ok(payload) => ApiError::Api {
                    status,
                    message: payload.error,
                    action: action.map(str::to_owned),
                },
                Err(_) => self.unknown(Box::new(UnexpectedResponse::new(status, &body)), action),
            },
            Failure::Decode(source) => self.unknown(source, action),
        }
    }

    fn unknown(&self, source: BoxError, action: Option<&str>) -> ApiError {
        let context = action.map(|a| format!(" while {}", a)).unwrap_or_default();
        error!(
            error = %source,
            "{} Unknown exception emerged{}. The unimail API client endeavors to handle all \
             exceptions gracefully and with a sane explanation, but we were unable to do so in \
             this case. Please report this incident to {} so we can resolve this issue. \
             Thank you for your patience.",
            ERROR_PRELUDE,
            context,
            SUPPORT_EMAIL
        );

        ApiError::Unknown {
            action: action.map(str::to_owned),
            source,
        }
    }
}
