use std::collections::BTreeMap;

use comfy_table::{Cell, Table};

use crate::error::{ConsentError, FieldError};
use crate::inbox::flow::{ConsentFlow, ConsentState};
use crate::model::Request;

use super::ListFormat;

pub async fn list(flow: &mut ConsentFlow, format: ListFormat) -> anyhow::Result<()> {
    flow.refresh().await?;

    match format {
        ListFormat::Json => {
            println!("{}", serde_json::to_string_pretty(flow.inbox().requests())?);
        }
        ListFormat::Table => print_list(flow),
    }
    Ok(())
}

pub async fn show(flow: &mut ConsentFlow, id: &str) -> anyhow::Result<()> {
    flow.refresh().await?;
    let request = flow
        .inbox()
        .get(id)
        .ok_or_else(|| ConsentError::RequestNotFound(id.to_string()))?;
    print_request(request, flow.state_of(id));
    Ok(())
}

/// One-shot accept. Field values are checked against the request before
/// consent is sent, since a granted consent cannot be taken back.
pub async fn accept(
    flow: &mut ConsentFlow,
    id: &str,
    fields: &[(String, String)],
) -> anyhow::Result<()> {
    flow.refresh().await?;
    let request = flow.open_consent(id)?;
    let sender = request.sender.clone();
    let checked = precheck_fields(request, fields);
    if let Err(e) = checked {
        flow.cancel();
        return Err(e.into());
    }

    match flow.confirm().await? {
        ConsentState::AwaitingDynamicFields => {
            for (key, value) in fields {
                flow.set_field(key, value)?;
            }
            flow.submit().await?;
            println!("Consent granted to {sender} and {} field(s) submitted.", fields.len());
        }
        _ => {
            if !fields.is_empty() {
                tracing::warn!("Request {id} asks for no fields; ignoring --field values");
            }
            println!("Consent granted to {sender}.");
        }
    }
    Ok(())
}

pub async fn reject(flow: &mut ConsentFlow, id: &str) -> anyhow::Result<()> {
    flow.refresh().await?;
    flow.reject(id).await?;
    println!("Request {id} rejected.");
    Ok(())
}

pub async fn delete(flow: &mut ConsentFlow, id: &str) -> anyhow::Result<()> {
    flow.refresh().await?;
    flow.delete(id).await?;
    println!("Request {id} deleted.");
    Ok(())
}

fn precheck_fields(request: &Request, fields: &[(String, String)]) -> Result<(), ConsentError> {
    if request.dynamic_fields.is_empty() {
        return Ok(());
    }
    let provided: BTreeMap<&str, &str> = fields
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    let mut errors: Vec<FieldError> = provided
        .keys()
        .filter(|key| request.field(key).is_none())
        .map(|key| FieldError::new(*key, "Unknown field"))
        .collect();
    errors.extend(
        request
            .dynamic_fields
            .iter()
            .filter(|f| f.required)
            .filter(|f| provided.get(f.key.as_str()).is_none_or(|v| v.trim().is_empty()))
            .map(|f| FieldError::new(&f.key, format!("{} is required", f.label))),
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConsentError::Validation(errors))
    }
}

pub fn print_list(flow: &ConsentFlow) {
    let inbox = flow.inbox();
    if inbox.last_error().is_some() {
        println!("(Showing requests from before the last failed refresh.)");
    }
    if inbox.requests().is_empty() {
        println!("No requests.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "From", "Type", "State", "Received", "Fields"]);
    for r in inbox.requests() {
        let state = flow
            .state_of(&r.id)
            .map_or_else(|| r.status.to_string(), |s| s.to_string());
        table.add_row(vec![
            Cell::new(&r.id),
            Cell::new(&r.sender),
            Cell::new(r.kind.label()),
            Cell::new(state),
            Cell::new(&r.timestamp),
            Cell::new(r.dynamic_fields.len()),
        ]);
    }
    println!("{table}");
    println!("{} pending", inbox.pending_count());
}

pub fn print_request(request: &Request, state: Option<ConsentState>) {
    println!("Request {}", request.id);
    println!("  From:         {}", request.sender);
    println!("  Organization: {}", request.organization);
    if !request.email.is_empty() {
        println!("  Contact:      {}", request.email);
    }
    println!("  Type:         {}", request.kind.label());
    println!("  Description:  {}", request.description);
    if !request.purpose.is_empty() {
        println!("  Purpose:      {}", request.purpose);
    }
    println!("  Received:     {}", request.timestamp);
    match state {
        Some(state) => println!("  State:        {state}"),
        None => println!("  State:        {}", request.status),
    }

    if !request.dynamic_fields.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Key", "Label", "Kind", "Required"]);
        for f in &request.dynamic_fields {
            table.add_row(vec![
                Cell::new(&f.key),
                Cell::new(&f.label),
                Cell::new(f.kind.as_str()),
                Cell::new(if f.required { "yes" } else { "no" }),
            ]);
        }
        println!("  Fields requested after consent:");
        println!("{table}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbox::Inbox;
    use crate::model::RequestStatus;
    use crate::testing::{Op, ScriptedApi, field, request, request_with_fields};

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_list_failure_propagates_once() {
        let api = ScriptedApi::with_requests(vec![request("r1", RequestStatus::Pending)]);
        api.fail(Op::FetchPending, 503);
        let mut flow = ConsentFlow::new(Inbox::new(api));

        let err = list(&mut flow, ListFormat::Table).await.unwrap_err();
        let err = err.downcast_ref::<ConsentError>().unwrap();
        assert_eq!(err.status(), Some(503));
        assert_eq!(flow.inbox().last_error(), Some(err.to_string().as_str()));
    }

    #[tokio::test]
    async fn test_accept_refuses_missing_field_before_consent() {
        let api = ScriptedApi::with_requests(vec![request_with_fields(
            "r1",
            vec![field("ssn", true)],
        )]);
        let mut flow = ConsentFlow::new(Inbox::new(api.clone()));

        assert!(accept(&mut flow, "r1", &[]).await.is_err());
        assert_eq!(flow.state_of("r1"), Some(ConsentState::Pending));
        assert_eq!(api.calls(), [crate::testing::ApiCall::FetchPending]);
    }

    #[test]
    fn test_precheck_accepts_complete_fields() {
        let request = request_with_fields("r1", vec![field("ssn", true), field("notes", false)]);
        assert!(precheck_fields(&request, &pairs(&[("ssn", "123")])).is_ok());
    }

    #[test]
    fn test_precheck_reports_missing_and_unknown() {
        let request = request_with_fields("r1", vec![field("ssn", true)]);
        match precheck_fields(&request, &pairs(&[("ssn", " "), ("dob", "x")])) {
            Err(ConsentError::Validation(errors)) => {
                let keys: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(keys, ["dob", "ssn"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_precheck_ignores_fields_when_none_requested() {
        let request = request_with_fields("r1", vec![]);
        assert!(precheck_fields(&request, &pairs(&[("anything", "")])).is_ok());
    }
}
