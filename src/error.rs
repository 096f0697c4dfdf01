use std::fmt;

use thiserror::Error;

use crate::inbox::flow::ConsentState;

/// A single failed local constraint, keyed by the form field it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ConsentError {
    #[error("{message} (HTTP {status})")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Could not decode response: {0}")]
    Decode(String),

    #[error("Validation failed: {}", join_field_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("Cannot {action} request '{id}' while it is {state}")]
    InvalidTransition {
        id: String,
        state: ConsentState,
        action: &'static str,
    },

    #[error("Request not found: {0}")]
    RequestNotFound(String),

    #[error("Request '{0}' is already open; cancel it first")]
    SelectionBusy(String),

    #[error("No request is selected")]
    NoSelection,

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl ConsentError {
    /// Non-success status or transport failure.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::Transport(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
