//! Per-request consent state machine.
//!
//! At most one request is selected at a time, held by id inside [`Modal`].
//! The selection is released whenever the modal closes, whether the
//! interaction succeeded, failed, was cancelled, or the request vanished on
//! refresh.
//!
//! ```text
//! Pending --open--> AwaitingConsentConfirmation --confirm--> Accepted
//!                                   |                        |
//!                                   |            (has fields)v
//!                                   |             AwaitingDynamicFields --submit--> Submitted
//! Pending --reject--> Rejected
//! {Pending, Accepted, Rejected} --delete--> Deleted
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use super::Inbox;
use crate::api::Decision;
use crate::error::{ConsentError, FieldError};
use crate::model::{DynamicField, Request, RequestStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentState {
    Pending,
    AwaitingConsentConfirmation,
    Accepted,
    AwaitingDynamicFields,
    Submitted,
    Rejected,
    Deleted,
}

impl fmt::Display for ConsentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::AwaitingConsentConfirmation => "awaiting consent confirmation",
            Self::Accepted => "accepted",
            Self::AwaitingDynamicFields => "awaiting dynamic fields",
            Self::Submitted => "submitted",
            Self::Rejected => "rejected",
            Self::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// The buffer behind the post-consent form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldsForm {
    pub request_id: String,
    pub fields: Vec<DynamicField>,
    pub values: BTreeMap<String, String>,
}

impl FieldsForm {
    fn new(request: &Request) -> Self {
        Self {
            request_id: request.id.clone(),
            fields: request.dynamic_fields.clone(),
            values: request
                .dynamic_fields
                .iter()
                .map(|f| (f.key.clone(), String::new()))
                .collect(),
        }
    }

    pub fn missing_required(&self) -> Vec<FieldError> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .filter(|f| self.values.get(&f.key).is_none_or(|v| v.trim().is_empty()))
            .map(|f| FieldError::new(&f.key, format!("{} is required", f.label)))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Modal {
    #[default]
    Closed,
    Details {
        request_id: String,
    },
    ConsentForm {
        request_id: String,
    },
    FieldsForm(FieldsForm),
}

impl Modal {
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Closed => None,
            Self::Details { request_id } | Self::ConsentForm { request_id } => Some(request_id),
            Self::FieldsForm(form) => Some(&form.request_id),
        }
    }
}

pub struct ConsentFlow {
    inbox: Inbox,
    modal: Modal,
    submitted: HashSet<String>,
    deleted: HashSet<String>,
}

impl ConsentFlow {
    pub fn new(inbox: Inbox) -> Self {
        Self {
            inbox,
            modal: Modal::Closed,
            submitted: HashSet::new(),
            deleted: HashSet::new(),
        }
    }

    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    pub fn modal(&self) -> &Modal {
        &self.modal
    }

    pub fn selected(&self) -> Option<&Request> {
        self.modal.request_id().and_then(|id| self.inbox.get(id))
    }

    /// Reload from the server. States restart from the reported status, and
    /// a modal whose request disappeared is closed. Deleted requests stay
    /// deleted even if a stale listing still reports them.
    pub async fn refresh(&mut self) -> Result<usize, ConsentError> {
        self.inbox.refresh().await?;
        for id in &self.deleted {
            if self.inbox.excise(id).is_some() {
                tracing::debug!("Dropping deleted request {id} from a stale listing");
            }
        }
        let count = self.inbox.requests().len();
        self.submitted.clear();
        if let Some(id) = self.modal.request_id() {
            match self.inbox.get(id) {
                None => {
                    tracing::info!("Selected request {id} is gone after refresh, closing it");
                    self.modal = Modal::Closed;
                }
                Some(request)
                    if !request.is_pending() && matches!(self.modal, Modal::ConsentForm { .. }) =>
                {
                    tracing::info!("Request {id} was settled elsewhere, closing its consent form");
                    self.modal = Modal::Closed;
                }
                Some(_) => {}
            }
        }
        Ok(count)
    }

    pub fn state_of(&self, id: &str) -> Option<ConsentState> {
        let Some(request) = self.inbox.get(id) else {
            return self.deleted.contains(id).then_some(ConsentState::Deleted);
        };

        match &self.modal {
            Modal::FieldsForm(form) if form.request_id == id => {
                return Some(ConsentState::AwaitingDynamicFields);
            }
            Modal::ConsentForm { request_id } if request_id == id && request.is_pending() => {
                return Some(ConsentState::AwaitingConsentConfirmation);
            }
            Modal::Details { request_id } if request_id == id && request.is_pending() => {
                return Some(ConsentState::AwaitingConsentConfirmation);
            }
            _ => {}
        }

        Some(match request.status {
            RequestStatus::Pending => ConsentState::Pending,
            RequestStatus::Accepted if self.submitted.contains(id) => ConsentState::Submitted,
            RequestStatus::Accepted => ConsentState::Accepted,
            RequestStatus::Rejected => ConsentState::Rejected,
        })
    }

    /// Show a request's details. Any request may be viewed; only a pending
    /// one can go on to be confirmed from here.
    pub fn open_details(&mut self, id: &str) -> Result<&Request, ConsentError> {
        self.require(id)?;
        if let Some(open) = self.modal.request_id() {
            return Err(ConsentError::SelectionBusy(open.to_string()));
        }
        self.modal = Modal::Details {
            request_id: id.to_string(),
        };
        self.require(id)
    }

    /// Open the consent confirmation, directly or from the details view.
    pub fn open_consent(&mut self, id: &str) -> Result<&Request, ConsentError> {
        self.require(id)?;
        self.ensure_free_for(id)?;
        match self.state_of(id) {
            Some(ConsentState::Pending | ConsentState::AwaitingConsentConfirmation) => {}
            state => return Err(self.invalid(id, state, "accept")),
        }
        self.modal = Modal::ConsentForm {
            request_id: id.to_string(),
        };
        self.require(id)
    }

    /// Close whatever is open with no network effect. Returns the released id.
    pub fn cancel(&mut self) -> Option<String> {
        let released = self.modal.request_id().map(String::from);
        self.modal = Modal::Closed;
        released
    }

    /// Approve the selected request. Continues into the fields form when
    /// the requester declared any fields.
    pub async fn confirm(&mut self) -> Result<ConsentState, ConsentError> {
        let id = match &self.modal {
            Modal::Details { request_id } | Modal::ConsentForm { request_id } => {
                request_id.clone()
            }
            Modal::FieldsForm(form) => {
                return Err(ConsentError::InvalidTransition {
                    id: form.request_id.clone(),
                    state: ConsentState::AwaitingDynamicFields,
                    action: "confirm",
                });
            }
            Modal::Closed => return Err(ConsentError::NoSelection),
        };
        let state = self.state_of(&id);
        if state != Some(ConsentState::AwaitingConsentConfirmation) {
            return Err(self.invalid(&id, state, "confirm"));
        }

        if let Err(e) = self.inbox.api().respond(&id, Decision::Approved).await {
            self.modal = Modal::Closed;
            return Err(e);
        }

        if !self.inbox.set_status(&id, RequestStatus::Accepted) {
            self.modal = Modal::Closed;
            return Err(ConsentError::RequestNotFound(id));
        }
        match self.inbox.get(&id) {
            Some(request) if !request.dynamic_fields.is_empty() => {
                self.modal = Modal::FieldsForm(FieldsForm::new(request));
                Ok(ConsentState::AwaitingDynamicFields)
            }
            _ => {
                self.modal = Modal::Closed;
                Ok(ConsentState::Accepted)
            }
        }
    }

    pub fn set_field(&mut self, key: &str, value: &str) -> Result<(), ConsentError> {
        let Modal::FieldsForm(form) = &mut self.modal else {
            return Err(ConsentError::NoSelection);
        };
        if !form.fields.iter().any(|f| f.key == key) {
            return Err(ConsentError::Validation(vec![FieldError::new(
                key,
                "Unknown field",
            )]));
        }
        form.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Send the filled fields. Empty required fields are refused locally.
    pub async fn submit(&mut self) -> Result<(), ConsentError> {
        let Modal::FieldsForm(form) = &self.modal else {
            return Err(ConsentError::NoSelection);
        };
        let missing = form.missing_required();
        if !missing.is_empty() {
            return Err(ConsentError::Validation(missing));
        }

        let id = form.request_id.clone();
        let values = form.values.clone();
        self.inbox.api().submit_fields(&id, &values).await?;

        if self.inbox.get(&id).is_some() {
            self.submitted.insert(id);
        }
        self.modal = Modal::Closed;
        Ok(())
    }

    pub async fn reject(&mut self, id: &str) -> Result<(), ConsentError> {
        self.require(id)?;
        self.ensure_free_for(id)?;
        match self.state_of(id) {
            Some(ConsentState::Pending | ConsentState::AwaitingConsentConfirmation) => {}
            state => return Err(self.invalid(id, state, "reject")),
        }

        self.inbox.api().respond(id, Decision::Rejected).await?;

        if !self.inbox.set_status(id, RequestStatus::Rejected) {
            tracing::warn!("Request {id} vanished before its rejection was applied");
        }
        if self.modal.request_id() == Some(id) {
            self.modal = Modal::Closed;
        }
        Ok(())
    }

    /// Remove a request. It leaves the collection only once the server
    /// confirms; deletions cannot be undone.
    pub async fn delete(&mut self, id: &str) -> Result<(), ConsentError> {
        match self.state_of(id) {
            Some(ConsentState::Pending | ConsentState::Accepted | ConsentState::Rejected) => {}
            None => return Err(ConsentError::RequestNotFound(id.to_string())),
            state => return Err(self.invalid(id, state, "delete")),
        }

        self.inbox.api().remove(id).await?;

        if self.inbox.excise(id).is_none() {
            tracing::warn!("Request {id} vanished before its deletion was applied");
        }
        if self.modal.request_id() == Some(id) {
            self.modal = Modal::Closed;
        }
        self.deleted.insert(id.to_string());
        Ok(())
    }

    fn require(&self, id: &str) -> Result<&Request, ConsentError> {
        self.inbox
            .get(id)
            .ok_or_else(|| ConsentError::RequestNotFound(id.to_string()))
    }

    fn ensure_free_for(&self, id: &str) -> Result<(), ConsentError> {
        match self.modal.request_id() {
            Some(open) if open != id => Err(ConsentError::SelectionBusy(open.to_string())),
            _ => Ok(()),
        }
    }

    fn invalid(&self, id: &str, state: Option<ConsentState>, action: &'static str) -> ConsentError {
        match state {
            Some(state) => ConsentError::InvalidTransition {
                id: id.to_string(),
                state,
                action,
            },
            None => ConsentError::RequestNotFound(id.to_string()),
        }
    }
}
