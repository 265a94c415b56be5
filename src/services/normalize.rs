// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Normalization of report function responses.
//!
//! The report Lambda answers with an envelope whose payload is JSON of the
//! form `{statusCode?, body}`, where `body` may be an object, a JSON-encoded
//! string, or plain text. Everything here is pure and never fails: values
//! that cannot be parsed are carried through as raw text.

use crate::services::compute::InvocationEnvelope;
use crate::services::report::{ReportError, ReportErrorKind};
use serde_json::{Map, Value};

/// Key used to wrap reports that came back as plain text.
pub const SUMMARY_KEY: &str = "summary";

/// A value of unknown shape taken from a function response.
#[derive(Debug, Clone, PartialEq)]
pub enum RawBody {
    /// Already-decoded JSON
    Json(Value),
    /// Text that may or may not contain JSON
    Text(String),
    /// Undecoded bytes
    Bytes(Vec<u8>),
}

/// Outcome of [`normalize`].
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// Structured JSON (object, array, number, ...)
    Structured(Value),
    /// Text that did not parse, kept verbatim
    RawFallback(String),
}

impl Normalized {
    pub fn into_value(self) -> Value {
        match self {
            Normalized::Structured(value) => value,
            Normalized::RawFallback(text) => Value::String(text),
        }
    }
}

/// Opportunistically turn a raw value into JSON.
///
/// Text is parsed only when it looks like an object or array; bytes are
/// decoded as UTF-8 first. A JSON string is treated like text, so an
/// encoded-JSON body is parsed exactly once.
pub fn normalize(raw: RawBody) -> Normalized {
    match raw {
        RawBody::Json(Value::String(text)) => normalize(RawBody::Text(text)),
        RawBody::Json(value) => Normalized::Structured(value),
        RawBody::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => normalize(RawBody::Text(text)),
            Err(e) => Normalized::RawFallback(String::from_utf8_lossy(e.as_bytes()).into_owned()),
        },
        RawBody::Text(text) => {
            let trimmed = text.trim();
            if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
                return Normalized::RawFallback(text);
            }
            match serde_json::from_str(trimmed) {
                Ok(value) => Normalized::Structured(value),
                Err(_) => Normalized::RawFallback(text),
            }
        }
    }
}

/// Ensure a successful report is a JSON object.
///
/// Plain text becomes `{"summary": text}`; other non-object values are
/// wrapped the same way.
pub fn into_report_object(normalized: Normalized) -> Value {
    match normalized.into_value() {
        Value::Object(map) => Value::Object(map),
        other => {
            let mut map = Map::new();
            map.insert(SUMMARY_KEY.to_string(), other);
            Value::Object(map)
        }
    }
}

/// Turn an invocation envelope into a report body or a typed failure.
pub fn classify(envelope: &InvocationEnvelope) -> Result<Value, ReportError> {
    let payload = if envelope.payload.iter().all(u8::is_ascii_whitespace) {
        b"{}".to_vec()
    } else {
        envelope.payload.clone()
    };

    if let Some(function_error) = &envelope.function_error {
        let details = decode_payload(payload).into_value();
        tracing::warn!(function_error = %function_error, "Report function raised an error");
        return Err(ReportError::new(ReportErrorKind::LambdaFunctionError, details));
    }

    let decoded = match decode_payload(payload) {
        Normalized::Structured(value) => value,
        raw @ Normalized::RawFallback(_) => return Ok(into_report_object(raw)),
    };

    let (status, body) = match decoded {
        Value::Object(mut fields) => {
            let status = fields.get("statusCode").cloned();
            let body = match fields.remove("body") {
                Some(body) => body,
                None => Value::Object(fields),
            };
            (status, body)
        }
        other => (None, other),
    };

    let body = normalize(RawBody::Json(body));

    if !is_ok_status(status.as_ref()) {
        tracing::warn!(status = ?status, "Report function returned a failure status");
        return Err(ReportError::new(
            ReportErrorKind::ReportGenerationFailed,
            body.into_value(),
        ));
    }

    Ok(into_report_object(body))
}

/// Decode a Lambda payload, which is normally a JSON document; anything
/// else gets the lenient path.
fn decode_payload(payload: Vec<u8>) -> Normalized {
    match serde_json::from_slice::<Value>(&payload) {
        Ok(value) => normalize(RawBody::Json(value)),
        Err(_) => normalize(RawBody::Bytes(payload)),
    }
}

/// `statusCode` must be absent, null, or numerically 200. Strings such as
/// `"200"` are not a success status.
fn is_ok_status(raw: Option<&Value>) -> bool {
    match raw {
        None | Some(Value::Null) => true,
        Some(Value::Number(n)) => n.as_f64() == Some(200.0),
        Some(_) => false,
    }
}
