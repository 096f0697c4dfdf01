//! Login, registration and the OAuth session probe.
//!
//! These endpoints live on the auth service, not the consent API, and
//! never carry bearer headers. A successful login seeds the [`Session`].

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::config::USER_AGENT;
use crate::error::{ConsentError, FieldError};
use crate::session::Session;

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REGISTER_PATH: &str = "/api/auth/register";
pub const ME_PATH: &str = "/api/auth/me";
pub const OAUTH_GOOGLE_PATH: &str = "/oauth2/authorization/google";

pub const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+@\S+\.\S+").expect("email pattern is valid"));

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn validate(&self) -> Result<(), ConsentError> {
        let mut errors = Vec::new();
        check_email(&self.email, &mut errors);
        check_password(&self.password, &mut errors);
        into_result(errors)
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub username: String,
}

impl Registration {
    pub fn validate(&self) -> Result<(), ConsentError> {
        let mut errors = Vec::new();
        check_email(&self.email, &mut errors);
        check_password(&self.password, &mut errors);
        if self.username.trim().is_empty() {
            errors.push(FieldError::new("username", "Username is required"));
        }
        if self.password != self.confirm_password {
            errors.push(FieldError::new("confirmPassword", "Passwords do not match"));
        }
        into_result(errors)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody<'a> {
    email: &'a str,
    password: &'a str,
    user_name: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

fn check_email(email: &str, errors: &mut Vec<FieldError>) {
    if email.is_empty() {
        errors.push(FieldError::new("email", "Email is required"));
    } else if !EMAIL_PATTERN.is_match(email) {
        errors.push(FieldError::new("email", "Please enter a valid email"));
    }
}

fn check_password(password: &str, errors: &mut Vec<FieldError>) {
    if password.is_empty() {
        errors.push(FieldError::new("password", "Password is required"));
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
}

fn into_result(errors: Vec<FieldError>) -> Result<(), ConsentError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConsentError::Validation(errors))
    }
}

pub struct AuthClient {
    client: Client,
    base_url: String,
    session: Session,
}

impl AuthClient {
    pub fn new(base_url: &str, session: Session, timeout: Duration) -> Result<Self, ConsentError> {
        // The OAuth probe is cookie-based
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .cookie_store(true)
            .build()?;
        Ok(Self {
            client,
            base_url: crate::config::normalize_base_url(base_url),
            session,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn oauth_url(&self) -> String {
        self.url(OAUTH_GOOGLE_PATH)
    }

    /// Validate locally, then exchange credentials for a token pair.
    pub async fn login(&self, credentials: &Credentials) -> Result<(), ConsentError> {
        credentials.validate()?;

        let resp = self
            .client
            .post(self.url(LOGIN_PATH))
            .json(credentials)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(server_error(resp, "Login failed").await);
        }

        let tokens: TokenResponse = resp
            .json()
            .await
            .map_err(|e| ConsentError::Decode(format!("login response: {e}")))?;
        if !self.store_tokens(tokens) {
            return Err(ConsentError::Decode(
                "login response is missing accessToken".into(),
            ));
        }
        tracing::info!("Logged in as {}", credentials.email);
        Ok(())
    }

    pub async fn register(&self, registration: &Registration) -> Result<(), ConsentError> {
        registration.validate()?;

        let resp = self
            .client
            .post(self.url(REGISTER_PATH))
            .json(&RegisterBody {
                email: &registration.email,
                password: &registration.password,
                user_name: &registration.username,
            })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(server_error(resp, "Signup failed").await);
        }
        tracing::info!("Registered {}", registration.email);
        Ok(())
    }

    /// Whether the auth service recognizes this client's cookie session.
    /// Tokens found on the response are taken into the session.
    pub async fn probe_session(&self) -> Result<bool, ConsentError> {
        let resp = self.client.get(self.url(ME_PATH)).send().await?;
        self.session.observe_response(resp.headers());
        if !resp.status().is_success() {
            tracing::debug!("Session probe answered HTTP {}", resp.status());
            return Ok(false);
        }
        let body = resp.text().await.unwrap_or_default();
        if let Ok(tokens) = serde_json::from_str::<TokenResponse>(&body) {
            self.store_tokens(tokens);
        }
        Ok(true)
    }

    /// Poll [`AuthClient::probe_session`] until it succeeds or `attempts`
    /// run out. Network failures count as "not yet".
    pub async fn wait_for_oauth(&self, interval: Duration, attempts: u32) -> Result<bool, ConsentError> {
        for attempt in 1..=attempts {
            match self.probe_session().await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) if e.is_network() => {
                    tracing::debug!("Session probe {attempt}/{attempts} failed: {e}");
                }
                Err(e) => return Err(e),
            }
            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }
        Ok(false)
    }

    /// Returns false when no access token was present.
    fn store_tokens(&self, tokens: TokenResponse) -> bool {
        let Some(access) = tokens.access_token.filter(|t| !t.is_empty()) else {
            return false;
        };
        self.session.set_access_token(&access);
        // A login without a refresh token must not pair with a stale one
        let refresh = tokens.refresh_token.unwrap_or_default();
        self.session.set_refresh_token(&refresh);
        true
    }
}

async fn server_error(resp: Response, fallback: &str) -> ConsentError {
    let status = resp.status().as_u16();
    let message = resp
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string());
    ConsentError::Http { status, message }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::session::MemoryTokenStore;
    use crate::testing::{StubResponse, StubServer};

    fn client_for(base_url: &str) -> (AuthClient, Session) {
        let session = Session::load(Arc::new(MemoryTokenStore::default()));
        let client = AuthClient::new(base_url, session.clone(), Duration::from_secs(5)).unwrap();
        (client, session)
    }

    fn creds(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.into(),
            password: password.into(),
        }
    }

    fn field_errors(err: ConsentError) -> Vec<(String, String)> {
        match err {
            ConsentError::Validation(errors) => {
                errors.into_iter().map(|e| (e.field, e.message)).collect()
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_credentials_validation() {
        assert!(creds("jane@example.com", "hunter22").validate().is_ok());

        let errors = field_errors(creds("", "").validate().unwrap_err());
        assert_eq!(
            errors,
            [
                ("email".to_string(), "Email is required".to_string()),
                ("password".to_string(), "Password is required".to_string()),
            ]
        );

        let errors = field_errors(creds("jane@example", "short").validate().unwrap_err());
        assert_eq!(errors[0].1, "Please enter a valid email");
        assert_eq!(errors[1].1, "Password must be at least 8 characters");
    }

    #[test]
    fn test_registration_validation() {
        let mut reg = Registration {
            email: "jane@example.com".into(),
            password: "hunter22".into(),
            confirm_password: "hunter22".into(),
            username: "jane".into(),
        };
        assert!(reg.validate().is_ok());

        reg.confirm_password = "hunter23".into();
        reg.username = " ".into();
        let fields: Vec<_> = field_errors(reg.validate().unwrap_err())
            .into_iter()
            .map(|(f, _)| f)
            .collect();
        assert_eq!(fields, ["username", "confirmPassword"]);
    }

    #[tokio::test]
    async fn test_login_stores_token_pair() {
        let server = StubServer::start(|call| match call.path.as_str() {
            LOGIN_PATH => StubResponse::json(
                200,
                json!({ "accessToken": "A1", "refreshToken": "R1" }),
            ),
            _ => StubResponse::empty(404),
        })
        .await;
        let (client, session) = client_for(&server.base_url);

        client
            .login(&creds("jane@example.com", "hunter22"))
            .await
            .unwrap();
        assert_eq!(session.access_token(), "A1");
        assert_eq!(session.refresh_token(), "R1");

        let calls = server.calls();
        assert_eq!(calls[0].method, "POST");
        assert_eq!(
            calls[0].json(),
            json!({ "email": "jane@example.com", "password": "hunter22" })
        );
        assert!(calls[0].authorization.is_none());
    }

    #[tokio::test]
    async fn test_login_failure_uses_server_message() {
        let server = StubServer::start(|_| {
            StubResponse::json(401, json!({ "message": "Bad credentials" }))
        })
        .await;
        let (client, session) = client_for(&server.base_url);

        let err = client
            .login(&creds("jane@example.com", "hunter22"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Bad credentials (HTTP 401)");
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_failure_without_message() {
        let server = StubServer::start(|_| StubResponse::text(500, "boom")).await;
        let (client, _) = client_for(&server.base_url);

        let err = client
            .login(&creds("jane@example.com", "hunter22"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Login failed (HTTP 500)");
    }

    #[tokio::test]
    async fn test_login_without_access_token_is_decode_error() {
        let server = StubServer::start(|_| StubResponse::json(200, json!({ "ok": true }))).await;
        let (client, session) = client_for(&server.base_url);

        let err = client
            .login(&creds("jane@example.com", "hunter22"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsentError::Decode(_)));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_invalid_credentials_never_reach_server() {
        let server = StubServer::start(|_| StubResponse::empty(200)).await;
        let (client, _) = client_for(&server.base_url);

        let err = client.login(&creds("nope", "x")).await.unwrap_err();
        assert!(matches!(err, ConsentError::Validation(_)));
        assert!(server.calls().is_empty());
    }

    #[tokio::test]
    async fn test_register_sends_user_name() {
        let server = StubServer::start(|call| match call.path.as_str() {
            REGISTER_PATH => StubResponse::json(201, json!({ "id": 1 })),
            _ => StubResponse::empty(404),
        })
        .await;
        let (client, _) = client_for(&server.base_url);

        client
            .register(&Registration {
                email: "jane@example.com".into(),
                password: "hunter22".into(),
                confirm_password: "hunter22".into(),
                username: "jane".into(),
            })
            .await
            .unwrap();

        let calls = server.calls();
        assert_eq!(
            calls[0].json(),
            json!({ "email": "jane@example.com", "password": "hunter22", "userName": "jane" })
        );
    }

    #[tokio::test]
    async fn test_register_failure_default_message() {
        let server = StubServer::start(|_| StubResponse::json(409, json!({}))).await;
        let (client, _) = client_for(&server.base_url);

        let err = client
            .register(&Registration {
                email: "jane@example.com".into(),
                password: "hunter22".into(),
                confirm_password: "hunter22".into(),
                username: "jane".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Signup failed (HTTP 409)");
    }

    #[tokio::test]
    async fn test_wait_for_oauth_polls_until_session_exists() {
        let probes = Arc::new(AtomicUsize::new(0));
        let counter = probes.clone();
        let server = StubServer::start(move |call| {
            if call.path != ME_PATH {
                return StubResponse::empty(404);
            }
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                StubResponse::empty(401)
            } else {
                StubResponse::json(200, json!({ "email": "jane@example.com" }))
                    .with_header("X-New-Access-Token", "A9")
            }
        })
        .await;
        let (client, session) = client_for(&server.base_url);

        let ok = client
            .wait_for_oauth(Duration::from_millis(5), 10)
            .await
            .unwrap();
        assert!(ok);
        assert_eq!(probes.load(Ordering::SeqCst), 3);
        assert_eq!(session.access_token(), "A9");
    }

    #[tokio::test]
    async fn test_wait_for_oauth_gives_up() {
        let server = StubServer::start(|_| StubResponse::empty(401)).await;
        let (client, _) = client_for(&server.base_url);

        let ok = client
            .wait_for_oauth(Duration::from_millis(1), 3)
            .await
            .unwrap();
        assert!(!ok);
        assert_eq!(server.calls().len(), 3);
    }

    #[test]
    fn test_oauth_url() {
        let session = Session::load(Arc::new(MemoryTokenStore::default()));
        let client =
            AuthClient::new("http://localhost:8080/", session, Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.oauth_url(),
            "http://localhost:8080/oauth2/authorization/google"
        );
    }
}
