pub mod auth;
pub mod decode;
pub mod http;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ConsentError;
use crate::model::Request;

pub const PENDING_REQUESTS_PATH: &str = "/thirdparty/all/pending";

pub fn respond_path(id: &str) -> String {
    format!("/consent/respond/{id}")
}

pub fn notification_path(id: &str) -> String {
    format!("/api/notifications/{id}")
}

pub fn form_submit_path(request_id: &str) -> String {
    format!("/form/submit/{request_id}")
}

/// The user's answer to a consent request, as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Approved,
    Rejected,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved => f.write_str("APPROVED"),
            Self::Rejected => f.write_str("REJECTED"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RespondBody {
    pub status: Decision,
}

/// Remote consent API. None of these calls touch local state; callers
/// apply confirmed results themselves.
#[async_trait]
pub trait ConsentApi: Send + Sync {
    async fn fetch_pending(&self) -> Result<Vec<Request>, ConsentError>;

    async fn respond(&self, request_id: &str, decision: Decision) -> Result<(), ConsentError>;

    async fn remove(&self, request_id: &str) -> Result<(), ConsentError>;

    async fn submit_fields(
        &self,
        request_id: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<(), ConsentError>;
}
