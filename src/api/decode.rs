//! Total decoder from the loosely-typed pending-requests payload to
//! [`Request`] view models.
//!
//! Every attribute has exactly one documented fallback, so no element
//! shape can make decoding fail. Elements that cannot be addressed at all
//! (no id) are skipped rather than invented.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::model::{DynamicField, FieldKind, Request, RequestKind, RequestStatus};

pub const UNKNOWN: &str = "Unknown";
pub const PLACEHOLDER_LOGO: &str = "/placeholder.svg?height=40&width=40";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Decode a whole response body. A non-array body yields no requests.
pub fn decode_requests(body: &Value) -> Vec<Request> {
    let Some(items) = body.as_array() else {
        tracing::warn!("Pending requests payload is not an array, treating as empty");
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut requests = Vec::with_capacity(items.len());
    for item in items {
        let Some(request) = decode_request(item) else {
            tracing::warn!("Skipping pending request without an id");
            continue;
        };
        if !seen.insert(request.id.clone()) {
            tracing::warn!("Skipping duplicate pending request '{}'", request.id);
            continue;
        }
        requests.push(request);
    }
    requests
}

/// Decode one element; `None` only when it carries no usable id.
pub fn decode_request(item: &Value) -> Option<Request> {
    let id = text(item, &["requestId", "id"])?;
    let use_case = text(item, &["useCase", "usecase"]).unwrap_or_default();
    let created_at = item.get("createdAt").and_then(parse_instant);
    let timestamp = match (&created_at, item.get("createdAt")) {
        (Some(at), _) => at.format(TIMESTAMP_FORMAT).to_string(),
        // Unparseable but present: show what the server sent
        (None, Some(raw)) => scalar_text(raw).unwrap_or_default(),
        (None, None) => String::new(),
    };

    Some(Request {
        id,
        sender: text(item, &["thirdPartyName"]).unwrap_or_else(|| UNKNOWN.to_string()),
        organization: text(item, &["organization"]).unwrap_or_else(|| UNKNOWN.to_string()),
        logo: text(item, &["logo", "logoUrl"]).unwrap_or_else(|| PLACEHOLDER_LOGO.to_string()),
        description: text(item, &["description"]).unwrap_or_default(),
        purpose: text(item, &["purpose"]).unwrap_or_default(),
        kind: RequestKind::from_use_case(&use_case),
        use_case,
        email: text(item, &["email"]).unwrap_or_default(),
        timestamp,
        created_at,
        status: text(item, &["status"])
            .map(|s| RequestStatus::from_wire(&s))
            .unwrap_or(RequestStatus::Pending),
        dynamic_fields: decode_fields(item.get("dynamicFields")),
    })
}

fn decode_fields(source: Option<&Value>) -> Vec<DynamicField> {
    let Some(entries) = source.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    entries
        .iter()
        .filter_map(|entry| {
            let key = text(entry, &["key"])?;
            if !seen.insert(key.clone()) {
                tracing::warn!("Skipping duplicate dynamic field '{key}'");
                return None;
            }
            Some(DynamicField {
                label: text(entry, &["value"]).unwrap_or_else(|| key.clone()),
                kind: text(entry, &["type"])
                    .map(|t| FieldKind::from_wire(&t))
                    .unwrap_or(FieldKind::Text),
                required: entry.get("required").is_some_and(truthy),
                key,
            })
        })
        .collect()
}

/// First of `keys` holding a non-empty scalar.
fn text(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| item.get(*k))
        .find_map(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty() || s.eq_ignore_ascii_case("false") || s == "0")
        }
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_instant_str(s.trim()),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        // Jackson LocalDateTime arrays: [year, month, day, hour, minute, second, nanos]
        Value::Array(parts) => {
            let nums: Vec<i64> = parts.iter().map(Value::as_i64).collect::<Option<_>>()?;
            let part = |i: usize| nums.get(i).copied().unwrap_or(0);
            let date = NaiveDate::from_ymd_opt(
                i32::try_from(part(0)).ok()?,
                u32::try_from(part(1)).ok()?,
                u32::try_from(part(2)).ok()?,
            )?;
            let time = date.and_hms_nano_opt(
                u32::try_from(part(3)).ok()?,
                u32::try_from(part(4)).ok()?,
                u32::try_from(part(5)).ok()?,
                u32::try_from(part(6)).ok()?,
            )?;
            Some(Utc.from_utc_datetime(&time))
        }
        _ => None,
    }
}

fn parse_instant_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(s) {
        return Some(at.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
