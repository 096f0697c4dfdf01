use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Server-reported lifecycle of a request, normalized at the decode boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    /// Case-insensitive; unknown values fall back to pending.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "accepted" | "approved" => Self::Accepted,
            "rejected" | "denied" => Self::Rejected,
            "pending" | "" => Self::Pending,
            other => {
                tracing::debug!("Unknown request status '{other}', treating as pending");
                Self::Pending
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Badge category derived from a request's use case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Payment,
    Access,
    Data,
}

impl RequestKind {
    pub fn from_use_case(use_case: &str) -> Self {
        match use_case {
            "payment_auth" => Self::Payment,
            "account_access" => Self::Access,
            _ => Self::Data,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Payment => "Payment",
            Self::Access => "Access",
            Self::Data => "Data",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    MultiLine,
    Other(String),
}

impl FieldKind {
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "text" => Self::Text,
            "textarea" => Self::MultiLine,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::MultiLine => "textarea",
            Self::Other(kind) => kind,
        }
    }
}

/// One input a requester needs collected after consent is granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DynamicField {
    pub key: String,
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
}

/// A third party's solicitation for access to the user's data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub id: String,
    pub sender: String,
    pub organization: String,
    pub logo: String,
    pub description: String,
    pub purpose: String,
    pub use_case: String,
    pub kind: RequestKind,
    pub email: String,
    pub timestamp: String,
    pub created_at: Option<DateTime<Utc>>,
    pub status: RequestStatus,
    pub dynamic_fields: Vec<DynamicField>,
}

impl Request {
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    pub fn field(&self, key: &str) -> Option<&DynamicField> {
        self.dynamic_fields.iter().find(|f| f.key == key)
    }
}
