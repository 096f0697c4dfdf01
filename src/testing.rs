//! Test doubles for the remote API.
//!
//! [`StubServer`] is a real HTTP server on a random local port that records
//! every call and answers through a closure, so the reqwest clients can be
//! exercised end to end. [`ScriptedApi`] is an in-memory [`ConsentApi`]
//! that behaves like a consistent server, with per-operation failures.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;

use crate::api::{ConsentApi, Decision};
use crate::error::ConsentError;
use crate::model::{DynamicField, FieldKind, Request, RequestKind, RequestStatus};

// ---------------------------------------------------------------------------
// HTTP stub
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub refresh: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

impl RecordedCall {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

pub struct StubResponse {
    status: u16,
    headers: Vec<(&'static str, String)>,
    body: String,
}

impl StubResponse {
    pub fn json(status: u16, value: serde_json::Value) -> Self {
        Self {
            status,
            headers: vec![("Content-Type", "application/json".into())],
            body: value.to_string(),
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: vec![("Content-Type", "text/plain".into())],
            body: body.into(),
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

type Responder = Arc<dyn Fn(&RecordedCall) -> StubResponse + Send + Sync>;

#[derive(Clone)]
struct StubState {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    responder: Responder,
}

pub struct StubServer {
    pub base_url: String,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl StubServer {
    pub async fn start(
        responder: impl Fn(&RecordedCall) -> StubResponse + Send + Sync + 'static,
    ) -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            calls: calls.clone(),
            responder: Arc::new(responder),
        };
        let app = Router::new().fallback(handle).with_state(state);

        // Bound before spawning, so early connections queue instead of failing.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            calls,
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

async fn handle(
    State(state): State<StubState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };
    let call = RecordedCall {
        method: method.to_string(),
        path: uri.path().to_string(),
        authorization: header("authorization"),
        refresh: header("authorization-refresh"),
        content_type: header("content-type"),
        body,
    };
    state.calls.lock().unwrap().push(call.clone());

    let stub = (state.responder)(&call);
    let mut builder = axum::http::Response::builder().status(stub.status);
    for (name, value) in stub.headers {
        builder = builder.header(name, value);
    }
    builder.body(Body::from(stub.body)).unwrap()
}

/// An address nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

// ---------------------------------------------------------------------------
// In-memory API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    FetchPending,
    Respond(String, Decision),
    Remove(String),
    SubmitFields(String, BTreeMap<String, String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    FetchPending,
    Respond,
    Remove,
    SubmitFields,
}

#[derive(Default)]
pub struct ScriptedApi {
    requests: Mutex<Vec<Request>>,
    failures: Mutex<HashMap<Op, u16>>,
    calls: Mutex<Vec<ApiCall>>,
}

impl ScriptedApi {
    pub fn with_requests(requests: Vec<Request>) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(requests),
            ..Default::default()
        })
    }

    /// Make `op` answer with HTTP `status` until [`ScriptedApi::heal`].
    pub fn fail(&self, op: Op, status: u16) {
        self.failures.lock().unwrap().insert(op, status);
    }

    pub fn heal(&self, op: Op) {
        self.failures.lock().unwrap().remove(&op);
    }

    /// Replace the server-side collection.
    pub fn set_requests(&self, requests: Vec<Request>) {
        *self.requests.lock().unwrap() = requests;
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    fn check(&self, op: Op, call: ApiCall) -> Result<(), ConsentError> {
        self.calls.lock().unwrap().push(call);
        match self.failures.lock().unwrap().get(&op) {
            Some(&status) => Err(ConsentError::Http {
                status,
                message: format!("{op:?} failed"),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ConsentApi for ScriptedApi {
    async fn fetch_pending(&self) -> Result<Vec<Request>, ConsentError> {
        self.check(Op::FetchPending, ApiCall::FetchPending)?;
        Ok(self.requests.lock().unwrap().clone())
    }

    async fn respond(&self, request_id: &str, decision: Decision) -> Result<(), ConsentError> {
        self.check(Op::Respond, ApiCall::Respond(request_id.into(), decision))?;
        let status = match decision {
            Decision::Approved => RequestStatus::Accepted,
            Decision::Rejected => RequestStatus::Rejected,
        };
        for r in self.requests.lock().unwrap().iter_mut() {
            if r.id == request_id {
                r.status = status;
            }
        }
        Ok(())
    }

    async fn remove(&self, request_id: &str) -> Result<(), ConsentError> {
        self.check(Op::Remove, ApiCall::Remove(request_id.into()))?;
        self.requests.lock().unwrap().retain(|r| r.id != request_id);
        Ok(())
    }

    async fn submit_fields(
        &self,
        request_id: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<(), ConsentError> {
        self.check(
            Op::SubmitFields,
            ApiCall::SubmitFields(request_id.into(), values.clone()),
        )
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn request(id: &str, status: RequestStatus) -> Request {
    Request {
        id: id.into(),
        sender: format!("Sender {id}"),
        organization: "Unknown".into(),
        logo: crate::api::decode::PLACEHOLDER_LOGO.into(),
        description: "Transaction history access".into(),
        purpose: String::new(),
        use_case: String::new(),
        kind: RequestKind::Data,
        email: String::new(),
        timestamp: String::new(),
        created_at: None,
        status,
        dynamic_fields: Vec::new(),
    }
}

pub fn field(key: &str, required: bool) -> DynamicField {
    DynamicField {
        key: key.into(),
        label: key.to_uppercase(),
        kind: FieldKind::Text,
        required,
    }
}

pub fn request_with_fields(id: &str, fields: Vec<DynamicField>) -> Request {
    Request {
        dynamic_fields: fields,
        ..request(id, RequestStatus::Pending)
    }
}
