//! Bearer-token session shared by every network-calling component.
//!
//! Tokens are opaque. The access token is short-lived and may be rotated by
//! the server at any time through the `X-New-Access-Token` response header;
//! the refresh token is only ever forwarded as an auxiliary header.

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::RequestBuilder;
use reqwest::header::HeaderMap;

use crate::error::ConsentError;

pub const ACCESS_TOKEN_KEY: &str = "authToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const REFRESH_HEADER: &str = "Authorization-Refresh";
pub const NEW_ACCESS_TOKEN_HEADER: &str = "X-New-Access-Token";

/// Durable key/value storage backing a [`Session`].
pub trait TokenStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, ConsentError>;
    fn store(&self, key: &str, value: &str) -> Result<(), ConsentError>;
    fn remove(&self, key: &str) -> Result<(), ConsentError>;
}

#[derive(Debug, Default, Clone)]
struct Tokens {
    access: String,
    refresh: String,
}

struct Inner {
    tokens: RwLock<Tokens>,
    store: Arc<dyn TokenStore>,
}

/// Cheap to clone; all clones observe the same tokens.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Load whatever tokens the store already holds. Missing or unreadable
    /// values start out empty.
    pub fn load(store: Arc<dyn TokenStore>) -> Self {
        let read = |key: &str| match store.load(key) {
            Ok(value) => value.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Could not read {key} from session store: {e}");
                String::new()
            }
        };
        let tokens = Tokens {
            access: read(ACCESS_TOKEN_KEY),
            refresh: read(REFRESH_TOKEN_KEY),
        };
        Self {
            inner: Arc::new(Inner {
                tokens: RwLock::new(tokens),
                store,
            }),
        }
    }

    pub fn access_token(&self) -> String {
        self.read().access.clone()
    }

    pub fn refresh_token(&self) -> String {
        self.read().refresh.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        !self.read().access.is_empty()
    }

    pub fn set_access_token(&self, token: &str) {
        self.write().access = token.to_string();
        self.persist(ACCESS_TOKEN_KEY, token);
    }

    pub fn set_refresh_token(&self, token: &str) {
        self.write().refresh = token.to_string();
        self.persist(REFRESH_TOKEN_KEY, token);
    }

    /// Forget both tokens, in memory and on disk.
    pub fn clear(&self) {
        *self.write() = Tokens::default();
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.inner.store.remove(key) {
                tracing::warn!("Could not remove {key} from session store: {e}");
            }
        }
    }

    pub fn apply_auth_headers(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(AUTHORIZATION_HEADER, format!("Bearer {}", self.access_token()));
        let refresh = self.refresh_token();
        if refresh.is_empty() {
            request
        } else {
            request.header(REFRESH_HEADER, format!("Bearer {refresh}"))
        }
    }

    /// Must run on every response before its body is read.
    pub fn observe_response(&self, headers: &HeaderMap) {
        let Some(value) = headers.get(NEW_ACCESS_TOKEN_HEADER) else {
            return;
        };
        match value.to_str() {
            Ok(token) if !token.trim().is_empty() => {
                tracing::debug!("Access token rotated by server");
                self.set_access_token(token.trim());
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Ignoring non-ASCII {NEW_ACCESS_TOKEN_HEADER}: {e}"),
        }
    }

    fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.inner.store.store(key, value) {
            tracing::warn!("Could not persist {key}: {e}");
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tokens> {
        self.inner.tokens.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tokens> {
        self.inner.tokens.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory [`TokenStore`] for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryTokenStore {
    values: std::sync::Mutex<std::collections::HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryTokenStore {
    pub fn with_tokens(access: &str, refresh: &str) -> Self {
        let store = Self::default();
        if !access.is_empty() {
            store.store(ACCESS_TOKEN_KEY, access).unwrap();
        }
        if !refresh.is_empty() {
            store.store(REFRESH_TOKEN_KEY, refresh).unwrap();
        }
        store
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }
}

#[cfg(test)]
impl TokenStore for MemoryTokenStore {
    fn load(&self, key: &str) -> Result<Option<String>, ConsentError> {
        Ok(self.get(key))
    }

    fn store(&self, key: &str, value: &str) -> Result<(), ConsentError> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ConsentError> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::{HeaderName, HeaderValue};

    use super::*;

    fn rotation_header() -> HeaderName {
        HeaderName::from_static("x-new-access-token")
    }

    fn session_with(access: &str, refresh: &str) -> (Session, Arc<MemoryTokenStore>) {
        let store = Arc::new(MemoryTokenStore::with_tokens(access, refresh));
        (Session::load(store.clone()), store)
    }

    fn built_headers(session: &Session) -> HeaderMap {
        let client = reqwest::Client::new();
        session
            .apply_auth_headers(client.get("http://localhost/thirdparty/all/pending"))
            .build()
            .unwrap()
            .headers()
            .clone()
    }

    #[test]
    fn test_absent_tokens_read_as_empty() {
        let (session, _) = session_with("", "");
        assert_eq!(session.access_token(), "");
        assert_eq!(session.refresh_token(), "");
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_authorization_always_sent() {
        let (session, _) = session_with("", "");
        let headers = built_headers(&session);
        assert_eq!(headers.get(AUTHORIZATION_HEADER).unwrap(), "Bearer ");
        assert!(headers.get(REFRESH_HEADER).is_none());
    }

    #[test]
    fn test_refresh_header_only_when_present() {
        let (session, _) = session_with("A1", "R1");
        let headers = built_headers(&session);
        assert_eq!(headers.get(AUTHORIZATION_HEADER).unwrap(), "Bearer A1");
        assert_eq!(headers.get(REFRESH_HEADER).unwrap(), "Bearer R1");
    }

    #[test]
    fn test_rotation_header_replaces_access_token() {
        let (session, store) = session_with("T1", "R1");
        let mut headers = HeaderMap::new();
        headers.insert(rotation_header(), HeaderValue::from_static("T2"));
        session.observe_response(&headers);

        assert_eq!(session.access_token(), "T2");
        assert_eq!(store.get(ACCESS_TOKEN_KEY).as_deref(), Some("T2"));
        assert_eq!(built_headers(&session).get(AUTHORIZATION_HEADER).unwrap(), "Bearer T2");
        // Refresh token untouched
        assert_eq!(session.refresh_token(), "R1");
    }

    #[test]
    fn test_empty_rotation_header_is_ignored() {
        let (session, _) = session_with("T1", "");
        let mut headers = HeaderMap::new();
        headers.insert(rotation_header(), HeaderValue::from_static(""));
        session.observe_response(&headers);
        assert_eq!(session.access_token(), "T1");

        session.observe_response(&HeaderMap::new());
        assert_eq!(session.access_token(), "T1");
    }

    #[test]
    fn test_clones_share_tokens() {
        let (session, _) = session_with("T1", "");
        let other = session.clone();
        other.set_access_token("T9");
        assert_eq!(session.access_token(), "T9");
    }

    #[test]
    fn test_clear_forgets_everything() {
        let (session, store) = session_with("T1", "R1");
        session.clear();
        assert_eq!(session.access_token(), "");
        assert_eq!(session.refresh_token(), "");
        assert!(store.get(ACCESS_TOKEN_KEY).is_none());
        assert!(store.get(REFRESH_TOKEN_KEY).is_none());
    }

    #[test]
    fn test_database_backed_session_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fintrust.db");

        {
            let db = Arc::new(crate::db::Database::open(&path).unwrap());
            let session = Session::load(db);
            session.set_access_token("A1");
            session.set_refresh_token("R1");
        }

        let db = Arc::new(crate::db::Database::open(&path).unwrap());
        let session = Session::load(db);
        assert_eq!(session.access_token(), "A1");
        assert_eq!(session.refresh_token(), "R1");
    }
}
