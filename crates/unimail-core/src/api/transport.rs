//! HTTP transport abstraction.
//!
//! The client never inspects library-specific error shapes. A [`Transport`]
//! turns a request into either an [`HttpResponse`] (any status) or one of a
//! closed set of [`TransportError`] outcomes, which the normalizer matches on.

use std::future::Future;
use std::io;
use std::time::Duration;

use reqwest::{header, Client, Method, Url};
use serde_json::Value;

use super::error::BoxError;

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("json"))
    }
}

/// Failures that happen before a response is received.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("host not found: {source}")]
    HostNotFound {
        #[source]
        source: BoxError,
    },

    #[error("connection refused: {source}")]
    ConnectionRefused {
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Other(BoxError),
}

pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

/// Default transport backed by `reqwest`.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.request(request.method, request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify)?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Other(Box::new(e)))?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ConnectFailure {
    HostNotFound,
    ConnectionRefused,
}

/// Walk the error chain of a connect failure looking for the DNS or socket
/// error underneath hyper's wrappers.
fn classify(err: reqwest::Error) -> TransportError {
    let failure = if err.is_connect() {
        connect_failure(&err)
    } else {
        None
    };

    let source: BoxError = Box::new(err);
    match failure {
        Some(ConnectFailure::HostNotFound) => TransportError::HostNotFound { source },
        Some(ConnectFailure::ConnectionRefused) => TransportError::ConnectionRefused { source },
        None => TransportError::Other(source),
    }
}

fn connect_failure(err: &(dyn std::error::Error + 'static)) -> Option<ConnectFailure> {
    let mut cause = Some(err);
    while let Some(current) = cause {
        if let Some(io_err) = current.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::ConnectionRefused {
                return Some(ConnectFailure::ConnectionRefused);
            }
        }
        if looks_like_dns_failure(&current.to_string()) {
            return Some(ConnectFailure::HostNotFound);
        }
        cause = current.source();
    }
    None
}

fn looks_like_dns_failure(message: &str) -> bool {
    const MARKERS: [&str; 5] = [
        "dns error",
        "failed to lookup address",
        "name or service not known",
        "nodename nor servname",
        "no such host",
    ];
    let message = message.to_ascii_lowercase();
    MARKERS.iter().any(|marker| message.contains(marker))
}

// ============================================================================
// Test transport
// ============================================================================

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Scripted transport: replies are handed out in order and every request
    /// is recorded.
    #[derive(Default)]
    pub struct FakeTransport {
        replies: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, reply: Result<HttpResponse, TransportError>) -> Self {
            self.replies.lock().unwrap().push_back(reply);
            self
        }

        pub fn json(self, status: u16, body: Value) -> Self {
            self.reply(Ok(HttpResponse {
                status,
                content_type: Some("application/json; charset=utf-8".into()),
                body: body.to_string(),
            }))
        }

        pub fn html(self, status: u16, body: &str) -> Self {
            self.reply(Ok(HttpResponse {
                status,
                content_type: Some("text/html".into()),
                body: body.to_string(),
            }))
        }

        pub fn session(self, token: &str) -> Self {
            self.json(201, serde_json::json!({ "sessionToken": token }))
        }

        pub fn unauthorized(self) -> Self {
            self.json(401, serde_json::json!({ "error": "Session expired" }))
        }

        pub fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn paths(&self) -> Vec<String> {
            self.requests()
                .iter()
                .map(|r| format!("{} {}", r.method, r.url.path()))
                .collect()
        }
    }

    impl Transport for FakeTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Other("no scripted reply left".into())))
        }
    }
}
