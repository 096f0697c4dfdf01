pub mod flow;

use std::sync::Arc;

use crate::api::ConsentApi;
use crate::error::ConsentError;
use crate::model::{Request, RequestStatus};

/// The in-memory collection of requests last fetched from the server.
///
/// Only a refresh replaces the collection wholesale; the flow controller
/// applies confirmed single-request changes through the crate-private
/// mutators.
pub struct Inbox {
    api: Arc<dyn ConsentApi>,
    requests: Vec<Request>,
    last_error: Option<String>,
}

impl Inbox {
    pub fn new(api: Arc<dyn ConsentApi>) -> Self {
        Self {
            api,
            requests: Vec::new(),
            last_error: None,
        }
    }

    /// Replace the collection with the server's. On failure the previous
    /// collection stays and the message is kept for display.
    pub async fn refresh(&mut self) -> Result<&[Request], ConsentError> {
        match self.api.fetch_pending().await {
            Ok(requests) => {
                self.requests = requests;
                self.last_error = None;
                Ok(&self.requests)
            }
            Err(e) => {
                tracing::warn!("Refreshing requests failed: {e}");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn get(&self, id: &str) -> Option<&Request> {
        self.requests.iter().find(|r| r.id == id)
    }

    pub fn pending_count(&self) -> usize {
        self.requests.iter().filter(|r| r.is_pending()).count()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn api(&self) -> Arc<dyn ConsentApi> {
        self.api.clone()
    }

    /// Returns false when the request is no longer in the collection.
    pub(crate) fn set_status(&mut self, id: &str, status: RequestStatus) -> bool {
        match self.requests.iter_mut().find(|r| r.id == id) {
            Some(r) => {
                r.status = status;
                true
            }
            None => false,
        }
    }

    pub(crate) fn excise(&mut self, id: &str) -> Option<Request> {
        let idx = self.requests.iter().position(|r| r.id == id)?;
        Some(self.requests.remove(idx))
    }
}
