use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};

use super::decode::decode_requests;
use super::{
    ConsentApi, Decision, PENDING_REQUESTS_PATH, RespondBody, form_submit_path,
    notification_path, respond_path,
};
use crate::config::USER_AGENT;
use crate::error::ConsentError;
use crate::model::Request;
use crate::session::Session;

/// reqwest-backed [`ConsentApi`]. Every call carries the session's bearer
/// headers and feeds the response headers back into the session.
pub struct HttpConsentApi {
    client: Client,
    base_url: String,
    session: Session,
}

impl HttpConsentApi {
    pub fn new(base_url: &str, session: Session, timeout: Duration) -> Result<Self, ConsentError> {
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

    /// Dispatch with auth headers, apply any token rotation, then check the
    /// status. Rotation is applied on failures too.
    async fn send(&self, request: RequestBuilder, failure: &str) -> Result<Response, ConsentError> {
        let resp = self.session.apply_auth_headers(request).send().await?;
        self.session.observe_response(resp.headers());

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!("{failure}: HTTP {status} from {}", resp.url().path());
            return Err(ConsentError::Http {
                status: status.as_u16(),
                message: failure.to_string(),
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl ConsentApi for HttpConsentApi {
    async fn fetch_pending(&self) -> Result<Vec<Request>, ConsentError> {
        let resp = self
            .send(
                self.client.get(self.url(PENDING_REQUESTS_PATH)),
                "Failed to fetch notifications",
            )
            .await?;

        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| ConsentError::Decode(e.to_string()))?;

        let requests = decode_requests(&value);
        tracing::info!("Fetched {} pending request(s)", requests.len());
        Ok(requests)
    }

    async fn respond(&self, request_id: &str, decision: Decision) -> Result<(), ConsentError> {
        let failure = match decision {
            Decision::Approved => "Failed to submit consent",
            Decision::Rejected => "Failed to reject consent",
        };
        self.send(
            self.client
                .post(self.url(&respond_path(request_id)))
                .json(&RespondBody { status: decision }),
            failure,
        )
        .await?;
        tracing::info!("Responded {decision} to request {request_id}");
        Ok(())
    }

    async fn remove(&self, request_id: &str) -> Result<(), ConsentError> {
        self.send(
            self.client.delete(self.url(&notification_path(request_id))),
            "Failed to delete notification",
        )
        .await?;
        tracing::info!("Deleted notification {request_id}");
        Ok(())
    }

    async fn submit_fields(
        &self,
        request_id: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<(), ConsentError> {
        self.send(
            self.client
                .post(self.url(&form_submit_path(request_id)))
                .json(values),
            "Failed to submit form data",
        )
        .await?;
        tracing::info!("Submitted {} field(s) for request {request_id}", values.len());
        Ok(())
    }
}
