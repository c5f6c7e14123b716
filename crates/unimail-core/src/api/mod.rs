//! REST client for the unimail API.
//!
//! Requests go out through a [`Transport`]; every failure is classified by
//! the [`ErrorNormalizer`] into an [`ApiError`] whose message starts with
//! `unimail API Error:`.

pub mod client;
pub mod error;
pub mod normalize;
pub mod transport;

pub use client::{Templates, UnimailClient};
pub use error::{ApiError, UnexpectedResponse, ERROR_PRELUDE, SUPPORT_EMAIL, UPTIME_MONITOR};
pub use normalize::{ErrorNormalizer, Failure};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
