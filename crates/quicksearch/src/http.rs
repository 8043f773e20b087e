// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Request building and response mapping shared by both transports.
//!
//! The async and blocking transports differ only in the I/O call; the
//! description of each request and the translation of a status code plus
//! body into a model or an [`Error`] live here.

use crate::config::ClientConfig;
use crate::error::{Error, FieldError, Result};
use crate::models::{EventData, SearchQuery, SyslogPayload};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const EVENTS_PATH: &str = "/api/events";
pub const SYSLOG_PATH: &str = "/api/syslog";

/// Idle connections kept per host by each client's pool
pub(crate) const POOL_MAX_IDLE_PER_HOST: usize = 5;

const USER_AGENT: &str = concat!("quicksearch-rust/", env!("CARGO_PKG_VERSION"));

/// Body of an outgoing request
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Body {
    Json(Value),
    /// Sent as `text/plain`, byte for byte
    Text(String),
}

/// Transport-agnostic description of one API call
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ApiRequest {
    pub method: Method,
    pub path: &'static str,
    pub query: Vec<(String, String)>,
    pub body: Option<Body>,
}

impl ApiRequest {
    pub fn ingest_event(event: &EventData) -> Self {
        Self {
            method: Method::POST,
            path: EVENTS_PATH,
            query: Vec::new(),
            body: Some(Body::Json(event.to_value())),
        }
    }

    pub fn search(query: &SearchQuery) -> Self {
        Self {
            method: Method::GET,
            path: EVENTS_PATH,
            query: query.to_params(),
            body: None,
        }
    }

    pub fn ingest_syslog(payload: &SyslogPayload) -> Self {
        let body = match payload {
            SyslogPayload::Structured(syslog) => Body::Json(syslog.to_value()),
            SyslogPayload::Raw(raw) => Body::Text(raw.clone()),
        };
        Self {
            method: Method::POST,
            path: SYSLOG_PATH,
            query: Vec::new(),
            body: Some(body),
        }
    }
}

/// Headers attached to every request of a client: auth, accept and user agent.
pub(crate) fn default_headers(config: &ClientConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
    if let Some(value) = config.auth.header_value() {
        let mut value = HeaderValue::from_str(&value)
            .map_err(|_| Error::Config("credentials contain invalid header characters".to_string()))?;
        value.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, value);
    }
    Ok(headers)
}

/// Builds the pooled async HTTP client for one SDK client instance.
pub(crate) fn build_client(config: &ClientConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .default_headers(default_headers(config)?)
        .timeout(config.timeout)
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .danger_accept_invalid_certs(!config.verify_ssl)
        .build()
        .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))
}

/// Turns a received response into the expected model or the matching error.
pub(crate) fn parse_response<T: DeserializeOwned>(
    request: &ApiRequest,
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<T> {
    debug!(
        "{} {} -> {}",
        request.method,
        request.path,
        status.as_u16()
    );
    if !status.is_success() {
        return Err(error_for_status(status, headers, body));
    }
    serde_json::from_slice(body).map_err(|e| Error::InvalidResponse {
        status: status.as_u16(),
        message: e.to_string(),
    })
}

/// Maps a non-success response to exactly one error variant.
pub(crate) fn error_for_status(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Error {
    let body: Option<Value> = serde_json::from_slice(body).ok();
    let message_or = |default: &str| {
        body.as_ref()
            .and_then(|body| {
                body.get("statusMessage")
                    .or_else(|| body.get("message"))
                    .and_then(Value::as_str)
            })
            .unwrap_or(default)
            .to_string()
    };

    match status.as_u16() {
        401 => Error::Authentication {
            message: message_or("Authentication required"),
        },
        403 => Error::Permission {
            message: message_or("Permission denied"),
        },
        code @ (400 | 422) => {
            let details = body
                .as_ref()
                .and_then(|body| body.get("data").or_else(|| body.get("errors")))
                .filter(|details| !details.is_null())
                .cloned();
            Error::Validation {
                message: message_or("Validation failed"),
                status: Some(code),
                fields: details.as_ref().map(field_errors).unwrap_or_default(),
                details,
            }
        }
        429 => Error::RateLimit {
            message: message_or("Rate limit exceeded"),
            retry_after: retry_after(headers),
        },
        code @ 500..=599 => Error::Server {
            status: code,
            message: message_or("Server error"),
        },
        code => Error::Api {
            status: code,
            message: message_or(&format!("Unexpected status code: {code}")),
        },
    }
}

/// Reads field-level detail from either `{"field": "message"}` or
/// `[{"field"|"path": .., "message": ..}]`.
fn field_errors(details: &Value) -> Vec<FieldError> {
    match details {
        Value::Object(map) => map
            .iter()
            .filter_map(|(field, message)| {
                let message = match message {
                    Value::String(message) => message.clone(),
                    Value::Array(messages) => messages
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join(", "),
                    _ => return None,
                };
                Some(FieldError::new(field.clone(), message))
            })
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                let field = item
                    .get("field")
                    .or_else(|| item.get("path"))
                    .map(|field| match field {
                        Value::String(field) => field.clone(),
                        Value::Array(parts) => parts
                            .iter()
                            .map(|part| match part {
                                Value::String(part) => part.clone(),
                                other => other.to_string(),
                            })
                            .collect::<Vec<_>>()
                            .join("."),
                        other => other.to_string(),
                    })?;
                let message = item.get("message").and_then(Value::as_str).unwrap_or("invalid");
                Some(FieldError::new(field, message))
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
