use std::fmt;
use std::future::Future;

use tracing::{debug, error, info, warn};

use crate::api::error::ERROR_PRELUDE;
use crate::api::ApiError;
use crate::cache::{CredentialCache, SESSION_TOKEN_KEY};
use crate::models::{MessageLevel, SessionGrant};

use super::credentials::redact;

/// Performs the session-creation exchange with the server.
pub trait Authenticator {
    fn create_session(&self) -> impl Future<Output = Result<SessionGrant, ApiError>> + Send;
}

#[derive(Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated(String),
    Refreshing,
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unauthenticated => f.write_str("Unauthenticated"),
            SessionState::Authenticated(token) => {
                f.debug_tuple("Authenticated").field(&redact(token)).finish()
            }
            SessionState::Refreshing => f.write_str("Refreshing"),
        }
    }
}

/// Owns the short-lived session token.
///
/// Tokens come from, in order: an explicit override (never cached), the
/// in-memory token, the credential cache, and finally a fresh exchange with
/// the server. Server-side expiry is only discovered through a 401, which
/// [`SessionManager::with_session`] answers with exactly one forced refresh.
pub struct SessionManager {
    override_token: Option<String>,
    cache: Option<CredentialCache>,
    state: SessionState,
    verbose: bool,
}

impl SessionManager {
    pub fn new(override_token: Option<String>, cache: Option<CredentialCache>) -> Self {
        Self {
            override_token: override_token.filter(|t| !t.is_empty()),
            cache,
            state: SessionState::Unauthenticated,
            verbose: false,
        }
    }

    /// Report session refreshes at `info` instead of `debug`.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn cache(&self) -> Option<&CredentialCache> {
        self.cache.as_ref()
    }

    fn token(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated(token) => Some(token),
            _ => None,
        }
    }

    /// Get a session token, authenticating if needed. `force` skips the
    /// in-memory and cached tokens.
    pub async fn session_key<A: Authenticator>(
        &mut self,
        auth: &A,
        force: bool,
    ) -> Result<String, ApiError> {
        if let Some(token) = &self.override_token {
            return Ok(token.clone());
        }

        if !force && self.token().is_none() {
            if let Some(token) = self.cached_token() {
                debug!(token = %redact(&token), "Using cached session token");
                self.state = SessionState::Authenticated(token.clone());
                return Ok(token);
            }
        }

        if force || self.token().is_none() {
            let previous = std::mem::replace(&mut self.state, SessionState::Refreshing);
            let grant = match auth.create_session().await {
                Ok(grant) => grant,
                Err(err) => {
                    self.state = previous;
                    return Err(err);
                }
            };

            report_messages(&grant);

            match grant.session_token.filter(|t| !t.is_empty()) {
                Some(token) => {
                    debug!(token = %redact(&token), "Obtained new session token");
                    self.store_token(&token);
                    self.state = SessionState::Authenticated(token);
                }
                None => {
                    warn!("Session response did not include a session token");
                    self.state = previous;
                }
            }
        }

        self.token()
            .map(str::to_owned)
            .ok_or(ApiError::AuthenticationUnavailable)
    }

    /// Run `call` with a session token. If it fails with a 401, reauthenticate
    /// once and run it again; a second 401 is returned to the caller.
    pub async fn with_session<A, F, Fut, T>(&mut self, auth: &A, mut call: F) -> Result<T, ApiError>
    where
        A: Authenticator,
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let token = self.session_key(auth, false).await?;
        match call(token).await {
            Err(err) if err.is_unauthorized() => {
                if self.verbose {
                    info!("unimail API: Session key expired; fetching new one");
                } else {
                    debug!("Session key expired; fetching new one");
                }
                let token = self.session_key(auth, true).await?;
                call(token).await
            }
            result => result,
        }
    }

    fn cached_token(&self) -> Option<String> {
        let cache = self.cache.as_ref()?;
        match cache.get(SESSION_TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable session cache");
                None
            }
        }
    }

    fn store_token(&self, token: &str) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(SESSION_TOKEN_KEY, token) {
                warn!(error = %e, "Failed to save session token to cache");
            }
        }
    }
}

/// Relay server notices to the log. Best effort: a malformed payload is
/// reported once and never blocks authentication.
fn report_messages(grant: &SessionGrant) {
    let messages = match grant.parse_messages() {
        Ok(messages) => messages,
        Err(e) => {
            let raw = grant
                .messages
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            warn!(
                error = %e,
                "{} Swallowed an error trying to send you a message. Not sure exactly what \
                 happened, but the raw message is this: {}",
                ERROR_PRELUDE,
                raw
            );
            return;
        }
    };

    for message in messages {
        match message.level {
            MessageLevel::Debug => debug!(target: "unimail::server", "{}", message.text),
            MessageLevel::Info => info!(target: "unimail::server", "{}", message.text),
            MessageLevel::Warn => warn!(target: "unimail::server", "{}", message.text),
            MessageLevel::Error => error!(target: "unimail::server", "{}", message.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::cache::CredentialFingerprint;

    /// Hands out scripted grants and counts exchanges.
    #[derive(Default)]
    struct FakeAuthenticator {
        grants: Mutex<VecDeque<Result<SessionGrant, ApiError>>>,
        calls: AtomicUsize,
    }

    impl FakeAuthenticator {
        fn issuing(tokens: &[&str]) -> Self {
            let auth = Self::default();
            for token in tokens {
                auth.push(Ok(grant(Some(token))));
            }
            auth
        }

        fn push(&self, grant: Result<SessionGrant, ApiError>) {
            self.grants.lock().unwrap().push_back(grant);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Authenticator for FakeAuthenticator {
        async fn create_session(&self) -> Result<SessionGrant, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.grants
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ApiError::AuthenticationUnavailable))
        }
    }

    fn grant(token: Option<&str>) -> SessionGrant {
        SessionGrant {
            session_token: token.map(str::to_owned),
            messages: None,
        }
    }

    fn cache_at(path: &Path) -> CredentialCache {
        CredentialCache::new(path, CredentialFingerprint::of("key", "secret"))
    }

    #[tokio::test]
    async fn test_override_is_returned_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let auth = FakeAuthenticator::issuing(&["tok_server"]);
        let mut manager = SessionManager::new(Some("tok_override".into()), Some(cache_at(&path)));

        assert_eq!(manager.session_key(&auth, false).await.unwrap(), "tok_override");
        assert_eq!(manager.session_key(&auth, true).await.unwrap(), "tok_override");
        assert_eq!(auth.calls(), 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_cached_token_is_adopted() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_at(&dir.path().join("cache.json"));
        cache.set(SESSION_TOKEN_KEY, "tok_cached").unwrap();

        let auth = FakeAuthenticator::default();
        let mut manager = SessionManager::new(None, Some(cache));

        assert_eq!(manager.session_key(&auth, false).await.unwrap(), "tok_cached");
        assert_eq!(
            manager.state(),
            &SessionState::Authenticated("tok_cached".into())
        );
        assert_eq!(auth.calls(), 0);
    }

    #[tokio::test]
    async fn test_fresh_token_is_cached_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let auth = FakeAuthenticator::issuing(&["tok_1"]);
        let mut manager = SessionManager::new(None, Some(cache_at(&path)));

        assert_eq!(manager.session_key(&auth, false).await.unwrap(), "tok_1");
        assert_eq!(manager.session_key(&auth, false).await.unwrap(), "tok_1");
        assert_eq!(auth.calls(), 1);
        assert_eq!(
            cache_at(&path).get(SESSION_TOKEN_KEY).unwrap().as_deref(),
            Some("tok_1")
        );
    }

    #[tokio::test]
    async fn test_force_skips_memory_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = cache_at(&path);
        cache.set(SESSION_TOKEN_KEY, "tok_cached").unwrap();
        let auth = FakeAuthenticator::issuing(&["tok_fresh"]);
        let mut manager = SessionManager::new(None, Some(cache));

        assert_eq!(manager.session_key(&auth, true).await.unwrap(), "tok_fresh");
        assert_eq!(auth.calls(), 1);
        assert_eq!(
            cache_at(&path).get(SESSION_TOKEN_KEY).unwrap().as_deref(),
            Some("tok_fresh")
        );
    }

    #[tokio::test]
    async fn test_missing_token_is_authentication_unavailable() {
        let auth = FakeAuthenticator::default();
        auth.push(Ok(grant(None)));
        let mut manager = SessionManager::new(None, None);

        let err = manager.session_key(&auth, false).await.unwrap_err();
        assert!(matches!(err, ApiError::AuthenticationUnavailable));
        assert_eq!(manager.state(), &SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_failed_exchange_restores_state() {
        let auth = FakeAuthenticator::issuing(&["tok_1"]);
        auth.push(Err(ApiError::Api {
            status: 503,
            message: "maintenance".into(),
            action: Some("getting a session key".into()),
        }));
        let mut manager = SessionManager::new(None, None);

        manager.session_key(&auth, false).await.unwrap();
        let err = manager.session_key(&auth, true).await.unwrap_err();
        assert!(matches!(err, ApiError::Api { status: 503, .. }));
        assert_eq!(manager.state(), &SessionState::Authenticated("tok_1".into()));
    }

    #[tokio::test]
    async fn test_with_session_retries_once_after_401() {
        let auth = FakeAuthenticator::issuing(&["tok_1", "tok_2"]);
        let mut manager = SessionManager::new(None, None);
        let seen = Mutex::new(Vec::new());

        let result = manager
            .with_session(&auth, |token| {
                let seen = &seen;
                async move {
                    seen.lock().unwrap().push(token.clone());
                    if token == "tok_1" {
                        Err(ApiError::InvalidCredentials)
                    } else {
                        Ok(format!("rendered with {}", token))
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "rendered with tok_2");
        assert_eq!(auth.calls(), 2);
        assert_eq!(*seen.lock().unwrap(), vec!["tok_1", "tok_2"]);
    }

    #[tokio::test]
    async fn test_with_session_gives_up_after_second_401() {
        let auth = FakeAuthenticator::issuing(&["tok_1", "tok_2", "tok_3"]);
        let mut manager = SessionManager::new(None, None);
        let attempts = AtomicUsize::new(0);

        let err = manager
            .with_session(&auth, |_token| {
                let attempts = &attempts;
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ApiError::InvalidCredentials)
                }
            })
            .await
            .unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(auth.calls(), 2);
    }

    #[tokio::test]
    async fn test_with_session_does_not_retry_other_errors() {
        let auth = FakeAuthenticator::issuing(&["tok_1", "tok_2"]);
        let mut manager = SessionManager::new(None, None);
        let attempts = AtomicUsize::new(0);

        let err = manager
            .with_session(&auth, |_token| {
                let attempts = &attempts;
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ApiError::Api {
                        status: 404,
                        message: "Template not found".into(),
                        action: None,
                    })
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Api { status: 404, .. }));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(auth.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_cached_token_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = cache_at(&path);
        cache.set(SESSION_TOKEN_KEY, "tok_stale").unwrap();

        let auth = FakeAuthenticator::issuing(&["tok_fresh"]);
        let mut manager = SessionManager::new(None, Some(cache));

        let token = manager
            .with_session(&auth, |token| async move {
                if token == "tok_stale" {
                    Err(ApiError::InvalidCredentials)
                } else {
                    Ok(token)
                }
            })
            .await
            .unwrap();

        assert_eq!(token, "tok_fresh");
        assert_eq!(auth.calls(), 1);
        assert_eq!(
            cache_at(&path).get(SESSION_TOKEN_KEY).unwrap().as_deref(),
            Some("tok_fresh")
        );
    }

    #[tokio::test]
    async fn test_unreadable_cache_falls_back_to_exchange() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ corrupt").unwrap();

        let auth = FakeAuthenticator::issuing(&["tok_1"]);
        let mut manager = SessionManager::new(None, Some(cache_at(&path)));

        assert_eq!(manager.session_key(&auth, false).await.unwrap(), "tok_1");
        assert_eq!(auth.calls(), 1);
    }

    #[tokio::test]
    async fn test_malformed_messages_do_not_block_authentication() {
        let auth = FakeAuthenticator::default();
        auth.push(Ok(SessionGrant {
            session_token: Some("tok_1".into()),
            messages: Some(serde_json::json!({"unexpected": true})),
        }));
        let mut manager = SessionManager::new(None, None);

        assert_eq!(manager.session_key(&auth, false).await.unwrap(), "tok_1");
    }

    #[tokio::test]
    async fn test_unrecognized_message_level_is_relayed() {
        let auth = FakeAuthenticator::default();
        let grant: SessionGrant = serde_json::from_value(serde_json::json!({
            "sessionToken": "tok_1",
            "messages": [
                {"text": "Scheduled maintenance tonight", "level": "shout"},
                {"text": "Trial ends soon", "level": "warning"}
            ]
        }))
        .unwrap();
        let levels: Vec<MessageLevel> = grant
            .parse_messages()
            .unwrap()
            .into_iter()
            .map(|m| m.level)
            .collect();
        assert_eq!(levels, vec![MessageLevel::Info, MessageLevel::Warn]);

        auth.push(Ok(grant));
        let mut manager = SessionManager::new(None, None);
        assert_eq!(manager.session_key(&auth, false).await.unwrap(), "tok_1");
        assert_eq!(manager.state(), &SessionState::Authenticated("tok_1".into()));
    }

    #[test]
    fn test_state_debug_redacts_token() {
        let state = SessionState::Authenticated("tok_very_secret".into());
        assert!(!format!("{:?}", state).contains("very_secret"));
    }
}
