//! API client for the unimail REST API.
//!
//! [`UnimailClient`] resolves its configuration once, then routes every call
//! through the session manager (token acquisition and the single 401 retry)
//! and the error normalizer.

use std::collections::BTreeMap;

use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::auth::{redact, Authenticator, SessionManager};
use crate::cache::CredentialCache;
use crate::config::{ClientOptions, Config, ConfigKey, Environment};
use crate::models::{RenderOptions, SessionGrant, Template};

use super::normalize::{ErrorNormalizer, Failure};
use super::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Header carrying the session token on authenticated requests
const SESSION_HEADER: &str = "session";

const ACTION_SESSION: &str = "getting a session key";
const ACTION_LIST_TEMPLATES: &str = "listing templates";
const ACTION_RENDER_TEMPLATE: &str = "rendering a template";

/// A single call against the API, before the session token is attached.
#[derive(Debug, Clone)]
struct ApiRequest {
    method: Method,
    path: Vec<String>,
    query: BTreeMap<String, String>,
    body: Option<Value>,
    action: &'static str,
}

impl ApiRequest {
    fn new<I, S>(method: Method, path: I, action: &'static str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            path: path.into_iter().map(Into::into).collect(),
            query: BTreeMap::new(),
            body: None,
            action,
        }
    }

    fn query(mut self, query: &BTreeMap<String, String>) -> Self {
        self.query
            .extend(query.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// GET requests carry no body; its fields become query parameters, with
    /// explicit query values taking precedence.
    fn query_pairs(&self) -> BTreeMap<String, String> {
        let mut pairs = BTreeMap::new();
        if self.method == Method::GET {
            if let Some(Value::Object(fields)) = &self.body {
                for (name, value) in fields {
                    if let Some(value) = query_value(value) {
                        pairs.insert(name.clone(), value);
                    }
                }
            }
        }
        pairs.extend(self.query.iter().map(|(k, v)| (k.clone(), v.clone())));
        pairs
    }

    fn wire_body(&self) -> Option<Value> {
        if self.method == Method::GET {
            None
        } else {
            self.body.clone()
        }
    }
}

fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Strip a `{"data": ...}` envelope if the server sent one.
fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut fields) => match fields.remove("data") {
            Some(data) => data,
            None => Value::Object(fields),
        },
        other => other,
    }
}

/// Copy of a request body that is safe to log.
fn redacted_body(body: &Value) -> Value {
    match body {
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, value)| {
                    let value = match (name.as_str(), value) {
                        ("secret", _) => Value::String("[REDACTED]".into()),
                        ("key", Value::String(key)) => Value::String(redact(key)),
                        _ => redacted_body(value),
                    };
                    (name.clone(), value)
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Resolved settings plus the transport. Split from the session manager so
/// the manager can borrow it as its [`Authenticator`].
struct Connection<T> {
    config: Config,
    transport: T,
    host: String,
    base_url: String,
    verbose: bool,
}

impl<T: Transport> Connection<T> {
    fn normalizer(&self) -> ErrorNormalizer<'_> {
        ErrorNormalizer::new(&self.host, &self.base_url)
    }

    fn url(&self, request: &ApiRequest) -> Result<Url, ApiError> {
        let invalid = |reason: String| ApiError::InvalidUrl {
            url: self.base_url.clone(),
            reason,
        };

        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(&request.path);

        let pairs = request.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(&pairs);
        }
        Ok(url)
    }

    fn trace(&self, request: &HttpRequest, session: Option<&str>) {
        let session = session.map(redact).unwrap_or_default();
        let body = request
            .body
            .as_ref()
            .map(|body| redacted_body(body).to_string())
            .unwrap_or_default();

        if self.verbose {
            info!(method = %request.method, url = %request.url, session = %session, body = %body, "unimail API request");
        } else {
            debug!(method = %request.method, url = %request.url, session = %session, body = %body, "unimail API request");
        }
    }

    /// Issue one request. Anything but a 2xx response is normalized.
    async fn execute(
        &self,
        request: &ApiRequest,
        session: Option<&str>,
    ) -> Result<HttpResponse, ApiError> {
        let mut headers = Vec::new();
        if let Some(token) = session {
            headers.push((SESSION_HEADER.to_string(), token.to_string()));
        }

        let http = HttpRequest {
            method: request.method.clone(),
            url: self.url(request)?,
            headers,
            body: request.wire_body(),
        };
        self.trace(&http, session);

        let response = self
            .transport
            .send(http)
            .await
            .map_err(|e| self.normalizer().normalize(Failure::Transport(e), Some(request.action)))?;

        debug!(status = response.status, action = request.action, "unimail API response");

        if !response.is_success() {
            let failure = Failure::Status {
                status: response.status,
                body: response.body,
            };
            return Err(self.normalizer().normalize(failure, Some(request.action)));
        }

        Ok(response)
    }

    fn decode<D: DeserializeOwned>(
        &self,
        response: HttpResponse,
        action: &'static str,
    ) -> Result<D, ApiError> {
        serde_json::from_str::<Value>(&response.body)
            .map(unwrap_data)
            .and_then(serde_json::from_value)
            .map_err(|e| self.normalizer().normalize(Failure::Decode(Box::new(e)), Some(action)))
    }

    /// Response body as text; a JSON string payload is unwrapped.
    fn text(&self, response: HttpResponse, action: &'static str) -> Result<String, ApiError> {
        if !response.is_json() {
            return Ok(response.body);
        }
        self.decode(response, action)
    }
}

impl<T: Transport> Authenticator for Connection<T> {
    async fn create_session(&self) -> Result<SessionGrant, ApiError> {
        let credentials = self.config.credentials()?;
        debug!(key = %redact(credentials.key()), "Requesting session token");

        let body = serde_json::to_value(credentials.session_request()).map_err(|e| {
            ApiError::Unknown {
                action: Some(ACTION_SESSION.to_string()),
                source: Box::new(e),
            }
        })?;
        let request = ApiRequest::new(Method::POST, ["v1", "sessions"], ACTION_SESSION).body(body);

        let response = self.execute(&request, None).await?;
        self.decode(response, request.action)
    }
}

/// Client for the unimail API.
///
/// Generic over the [`Transport`] so tests can script responses; the default
/// is [`ReqwestTransport`].
pub struct UnimailClient<T: Transport = ReqwestTransport> {
    connection: Connection<T>,
    session: SessionManager,
}

impl UnimailClient<ReqwestTransport> {
    /// Create a client over HTTP.
    pub fn new(options: ClientOptions, env: Environment) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new().map_err(|e| ApiError::Unknown {
            action: Some("creating the HTTP client".to_string()),
            source: Box::new(e),
        })?;
        Self::with_transport(options, env, transport)
    }
}

impl<T: Transport> UnimailClient<T> {
    pub fn with_transport(
        options: ClientOptions,
        env: Environment,
        transport: T,
    ) -> Result<Self, ApiError> {
        let config = Config::new(options, env);
        let host = config.get(ConfigKey::Host)?;
        let base_url = config.base_url()?;
        let verbose = config.flag(ConfigKey::Verbose)?;
        let override_token = config.get_optional(ConfigKey::SessionKey)?;

        // An override is never cached, so it needs no credentials.
        let cache = match (&override_token, config.cache_path()?) {
            (None, Some(path)) => {
                let fingerprint = config.credentials()?.fingerprint();
                debug!(path = %path.display(), fingerprint = %fingerprint, "Using session cache");
                Some(CredentialCache::new(path, fingerprint))
            }
            _ => None,
        };

        let session = SessionManager::new(override_token, cache).verbose(verbose);

        Ok(Self {
            connection: Connection {
                config,
                transport,
                host,
                base_url,
                verbose,
            },
            session,
        })
    }

    pub fn config(&self) -> &Config {
        &self.connection.config
    }

    /// `protocol://host[:port]` this client talks to.
    pub fn base_url(&self) -> &str {
        &self.connection.base_url
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Template operations.
    pub fn templates(&mut self) -> Templates<'_, T> {
        Templates { client: self }
    }

    /// Get a session token, authenticating if needed.
    pub async fn session_key(&mut self, force: bool) -> Result<String, ApiError> {
        self.session.session_key(&self.connection, force).await
    }

    /// Run an authenticated request, refreshing the session once on a 401.
    async fn request(&mut self, request: ApiRequest) -> Result<HttpResponse, ApiError> {
        let Self {
            connection,
            session,
        } = self;
        let connection = &*connection;
        let request = &request;

        session
            .with_session(connection, |token| async move {
                connection.execute(request, Some(&token)).await
            })
            .await
    }
}

/// Accessor returned by [`UnimailClient::templates`].
pub struct Templates<'a, T: Transport> {
    client: &'a mut UnimailClient<T>,
}

impl<T: Transport> Templates<'_, T> {
    /// List all templates on the account, in server order.
    pub async fn index(&mut self) -> Result<Vec<Template>, ApiError> {
        let request = ApiRequest::new(Method::GET, ["v1", "templates"], ACTION_LIST_TEMPLATES);
        let response = self.client.request(request).await?;
        self.client
            .connection
            .decode(response, ACTION_LIST_TEMPLATES)
    }

    /// Render a template to HTML. Query options are forwarded verbatim.
    pub async fn render(&mut self, id: &str, options: &RenderOptions) -> Result<String, ApiError> {
        let request = ApiRequest::new(
            Method::POST,
            ["v1", "templates", id, "renders"],
            ACTION_RENDER_TEMPLATE,
        )
        .query(&options.query);
        let response = self.client.request(request).await?;
        self.client
            .connection
            .text(response, ACTION_RENDER_TEMPLATE)
    }
}
