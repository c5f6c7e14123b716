use serde::Deserialize;
use serde_json::Value;

/// Response of `POST /v1/sessions`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionGrant {
    #[serde(rename = "sessionToken")]
    pub session_token: Option<String>,
    /// Notices for the user. Kept raw so a malformed list never fails
    /// authentication.
    #[serde(default)]
    pub messages: Option<Value>,
}

/// A notice attached to a session grant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerMessage {
    pub text: String,
    #[serde(default)]
    pub level: MessageLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Debug,
    #[serde(alias = "warning")]
    Warn,
    Error,
    /// Also the fallback for missing or unrecognized levels.
    #[default]
    #[serde(other)]
    Info,
}

impl SessionGrant {
    /// Parse the attached messages, if any.
    pub fn parse_messages(&self) -> Result<Vec<ServerMessage>, serde_json::Error> {
        match &self.messages {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(raw) => serde_json::from_value(raw.clone()),
        }
    }
}
