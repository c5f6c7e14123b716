use thiserror::Error;

use crate::config::ConfigFileError;

/// Prefix on every normalized error message, for easy grepping in logs.
pub const ERROR_PRELUDE: &str = "unimail API Error:";

/// Where users report failures we cannot explain.
pub const SUPPORT_EMAIL: &str = "support@unimail.co";

/// Public status page for the API.
pub const UPTIME_MONITOR: &str = "uptime.unimail.co";

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(
        "{prelude} Missing required configuration value for key `{key}`\n\
         Specify by:\n  \
         - Passing \"{key}\" as an option when creating the client\n  \
         - Setting the \"{env_var}\" environment variable\n  \
         - Setting \"{key}\" in the unimail config file {location}",
        prelude = ERROR_PRELUDE
    )]
    Configuration {
        key: String,
        env_var: String,
        location: String,
    },

    #[error("{prelude} {0}", prelude = ERROR_PRELUDE)]
    ConfigFile(#[from] ConfigFileError),

    #[error("{prelude} Invalid API URL {url}: {reason}", prelude = ERROR_PRELUDE)]
    InvalidUrl { url: String, reason: String },

    #[error(
        "{prelude} {host} did not resolve. Check your internet connection and DNS settings \
         and check the URL ({base_url}). If everything seems in order, check {uptime}. \
         If {uptime} is not responding and your internet seems to be working fine, \
         please report this incident to {support}. Thank you for your patience.",
        prelude = ERROR_PRELUDE,
        uptime = UPTIME_MONITOR,
        support = SUPPORT_EMAIL
    )]
    DnsResolution {
        host: String,
        base_url: String,
        #[source]
        source: BoxError,
    },

    #[error(
        "{prelude} Connection refused by server. Check your internet connection.\n\
         If your connection is fine, the unimail API could be down. Check {uptime} \
         for status reports.\n\
         This could also be a configuration issue on the client end. \
         The API URL you're using is {base_url}",
        prelude = ERROR_PRELUDE,
        uptime = UPTIME_MONITOR
    )]
    ConnectionRefused {
        base_url: String,
        #[source]
        source: BoxError,
    },

    #[error("{prelude} Provided API Key and Secret are invalid.", prelude = ERROR_PRELUDE)]
    InvalidCredentials,

    #[error(
        "{prelude}{} server responded with {status}. Server says \"{message}\".",
        while_clause(.action, ","),
        prelude = ERROR_PRELUDE
    )]
    Api {
        status: u16,
        message: String,
        action: Option<String>,
    },

    #[error(
        "{prelude} Could not get session token for some reason; could be a unimail issue. \
         Please report this incident to {support}. Thank you for your patience.",
        prelude = ERROR_PRELUDE,
        support = SUPPORT_EMAIL
    )]
    AuthenticationUnavailable,

    #[error(
        "{prelude} Unknown failure{}: {source}",
        while_clause(.action, ""),
        prelude = ERROR_PRELUDE
    )]
    Unknown {
        action: Option<String>,
        #[source]
        source: BoxError,
    },
}

/// ` while <action><suffix>`, or nothing when there is no action.
fn while_clause(action: &Option<String>, suffix: &str) -> String {
    match action {
        Some(action) => format!(" while {}{}", action, suffix),
        None => String::new(),
    }
}

impl ApiError {
    /// The server rejected the session (HTTP 401).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::InvalidCredentials)
    }
}

/// Maximum length for response bodies embedded in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// A non-success response that carried no structured error payload.
#[derive(Error, Debug)]
#[error("server responded with {status}: {body}")]
pub struct UnexpectedResponse {
    pub status: u16,
    pub body: String,
}

impl UnexpectedResponse {
    pub fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            body: truncate_body(body),
        }
    }
}

/// Truncate a response body to avoid logging excessive data
pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }

    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
}
