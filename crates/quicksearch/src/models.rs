// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Request and response models for the QuickSearch REST API.
//!
//! Request models ([`EventData`], [`SyslogData`]) are validated once at
//! construction and are immutable afterwards. They can be built either
//! through their typed builders or from an equivalent JSON object; both paths
//! run the same checks, so a model that exists is always one the service
//! accepts.

use crate::error::{Error, FieldError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Default number of search hits requested
pub const DEFAULT_SEARCH_LIMIT: u32 = 100;

const EVENT_FIELDS: &[&str] = &[
    "type",
    "application",
    "timestamp",
    "message",
    "data",
    "source",
];

const SYSLOG_FIELDS: &[&str] = &["type", "severity", "hostname", "message", "data"];

/// Offset layouts RFC 3339 rejects, like `+0000`
const OFFSET_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Naive layouts accepted on top of RFC 3339
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Returns true when `value` is an ISO 8601 date or date-time.
///
/// Accepts RFC 3339 strings (`Z` or numeric offset, optional fractional
/// seconds), offsets without a colon, naive date-times and plain dates.
pub fn is_iso8601(value: &str) -> bool {
    if DateTime::parse_from_rfc3339(value).is_ok() {
        return true;
    }
    if OFFSET_TIMESTAMP_FORMATS
        .iter()
        .any(|format| DateTime::parse_from_str(value, format).is_ok())
    {
        return true;
    }
    if NAIVE_TIMESTAMP_FORMATS
        .iter()
        .any(|format| NaiveDateTime::parse_from_str(value, format).is_ok())
    {
        return true;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

/// An event to be ingested via `POST /api/events`.
///
/// # Example
///
/// ```
/// use quicksearch::EventData;
///
/// let event = EventData::builder("user_login")
///     .application("web_app")
///     .message("User logged in")
///     .data_entry("user_id", "12345")
///     .build()
///     .unwrap();
/// assert_eq!(event.event_type(), "user_login");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct EventData {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    application: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    data: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

impl EventData {
    pub fn builder(event_type: impl Into<String>) -> EventDataBuilder {
        EventDataBuilder {
            event_type: event_type.into(),
            ..Default::default()
        }
    }

    /// Shorthand for an event carrying only its type.
    pub fn new(event_type: impl Into<String>) -> Result<Self> {
        Self::builder(event_type).build()
    }

    /// Builds an event from a loosely-typed JSON object.
    ///
    /// Every problem is reported at once: unknown keys, keys with the wrong
    /// JSON type, a missing or empty `type` and a malformed `timestamp`.
    pub fn from_value(value: Value) -> Result<Self> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(Error::invalid_field(
                    "event",
                    format!("expected a JSON object, got {}", json_type_name(&other)),
                ))
            }
        };
        Self::from_map(map)
    }

    pub fn from_map(mut map: Map<String, Value>) -> Result<Self> {
        let mut errors = unknown_fields(&map, EVENT_FIELDS);

        let event_type = take_string(&mut map, "type", &mut errors);
        let builder = EventDataBuilder {
            event_type: event_type.clone().unwrap_or_default(),
            application: take_string(&mut map, "application", &mut errors),
            timestamp: take_string(&mut map, "timestamp", &mut errors),
            message: take_string(&mut map, "message", &mut errors),
            data: take_data(&mut map, &mut errors),
            source: take_string(&mut map, "source", &mut errors),
        };

        if event_type.is_none() && !errors.iter().any(|e| e.field == "type") {
            errors.push(FieldError::new("type", "field required"));
        }
        errors.extend(
            builder
                .check()
                .into_iter()
                .filter(|e| e.field != "type" || event_type.is_some()),
        );

        if errors.is_empty() {
            Ok(builder.into_event())
        } else {
            Err(Error::invalid_fields(errors))
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn application(&self) -> Option<&str> {
        self.application.as_deref()
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// The JSON body sent to the service: absent optional fields are omitted
    /// and `data` is always present.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("type".to_string(), Value::String(self.event_type.clone()));
        insert_opt(&mut map, "application", &self.application);
        insert_opt(&mut map, "timestamp", &self.timestamp);
        insert_opt(&mut map, "message", &self.message);
        map.insert("data".to_string(), Value::Object(self.data.clone()));
        insert_opt(&mut map, "source", &self.source);
        Value::Object(map)
    }
}

impl TryFrom<Value> for EventData {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

/// Builder for [`EventData`]
#[derive(Debug, Clone, Default)]
pub struct EventDataBuilder {
    event_type: String,
    application: Option<String>,
    timestamp: Option<String>,
    message: Option<String>,
    data: Map<String, Value>,
    source: Option<String>,
}

impl EventDataBuilder {
    #[must_use]
    pub fn application(mut self, application: impl Into<String>) -> Self {
        self.application = Some(application.into());
        self
    }

    /// ISO 8601 timestamp, checked by [`build`](Self::build)
    #[must_use]
    pub fn timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Replaces the whole `data` payload
    #[must_use]
    pub fn data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    #[must_use]
    pub fn data_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    fn check(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.event_type.trim().is_empty() {
            errors.push(FieldError::new("type", "must not be empty"));
        }
        if let Some(timestamp) = &self.timestamp {
            if !is_iso8601(timestamp) {
                errors.push(FieldError::new(
                    "timestamp",
                    "timestamp must be in ISO 8601 format",
                ));
            }
        }
        errors
    }

    pub fn build(self) -> Result<EventData> {
        let errors = self.check();
        if errors.is_empty() {
            Ok(self.into_event())
        } else {
            Err(Error::invalid_fields(errors))
        }
    }

    fn into_event(self) -> EventData {
        EventData {
            event_type: self.event_type,
            application: self.application,
            timestamp: self.timestamp,
            message: self.message,
            data: self.data,
            source: self.source,
        }
    }
}

/// A structured syslog event for `POST /api/syslog`.
///
/// Every field is optional; the service fills in what is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct SyslogData {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    event_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    data: Map<String, Value>,
}

impl SyslogData {
    pub fn builder() -> SyslogDataBuilder {
        SyslogDataBuilder::default()
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Self::from_map(map),
            other => Err(Error::invalid_field(
                "syslog",
                format!("expected a JSON object, got {}", json_type_name(&other)),
            )),
        }
    }

    pub fn from_map(mut map: Map<String, Value>) -> Result<Self> {
        let mut errors = unknown_fields(&map, SYSLOG_FIELDS);
        let syslog = SyslogData {
            event_type: take_string(&mut map, "type", &mut errors),
            severity: take_string(&mut map, "severity", &mut errors),
            hostname: take_string(&mut map, "hostname", &mut errors),
            message: take_string(&mut map, "message", &mut errors),
            data: take_data(&mut map, &mut errors),
        };
        if errors.is_empty() {
            Ok(syslog)
        } else {
            Err(Error::invalid_fields(errors))
        }
    }

    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref()
    }

    pub fn severity(&self) -> Option<&str> {
        self.severity.as_deref()
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        insert_opt(&mut map, "type", &self.event_type);
        insert_opt(&mut map, "severity", &self.severity);
        insert_opt(&mut map, "hostname", &self.hostname);
        insert_opt(&mut map, "message", &self.message);
        map.insert("data".to_string(), Value::Object(self.data.clone()));
        Value::Object(map)
    }
}

impl TryFrom<Value> for SyslogData {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

/// Builder for [`SyslogData`]
#[derive(Debug, Clone, Default)]
pub struct SyslogDataBuilder {
    inner: SyslogData,
}

impl SyslogDataBuilder {
    #[must_use]
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.inner.event_type = Some(event_type.into());
        self
    }

    #[must_use]
    pub fn severity(mut self, severity: impl Into<String>) -> Self {
        self.inner.severity = Some(severity.into());
        self
    }

    #[must_use]
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.inner.hostname = Some(hostname.into());
        self
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.inner.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn data(mut self, data: Map<String, Value>) -> Self {
        self.inner.data = data;
        self
    }

    #[must_use]
    pub fn data_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inner.data.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> SyslogData {
        self.inner
    }
}

/// What gets posted to `/api/syslog`.
///
/// Raw lines such as `<34>Oct 11 22:14:15 mymachine su: 'su root' failed`
/// are forwarded verbatim; parsing them is left to the service.
#[derive(Debug, Clone, PartialEq)]
pub enum SyslogPayload {
    Structured(SyslogData),
    Raw(String),
}

/// Conversion into a validated [`EventData`].
///
/// Implemented for the typed model and for loosely-typed JSON, so every
/// ingestion method accepts either.
pub trait IntoEventData {
    fn into_event_data(self) -> Result<EventData>;

    /// JSON view of the input, kept for error reports when conversion fails
    fn to_json(&self) -> Value;
}

impl IntoEventData for EventData {
    fn into_event_data(self) -> Result<EventData> {
        Ok(self)
    }

    fn to_json(&self) -> Value {
        self.to_value()
    }
}

impl IntoEventData for &EventData {
    fn into_event_data(self) -> Result<EventData> {
        Ok(self.clone())
    }

    fn to_json(&self) -> Value {
        self.to_value()
    }
}

impl IntoEventData for Value {
    fn into_event_data(self) -> Result<EventData> {
        EventData::from_value(self)
    }

    fn to_json(&self) -> Value {
        self.clone()
    }
}

impl IntoEventData for Map<String, Value> {
    fn into_event_data(self) -> Result<EventData> {
        EventData::from_map(self)
    }

    fn to_json(&self) -> Value {
        Value::Object(self.clone())
    }
}

/// Conversion into a [`SyslogPayload`].
pub trait IntoSyslog {
    fn into_syslog(self) -> Result<SyslogPayload>;
}

impl IntoSyslog for SyslogData {
    fn into_syslog(self) -> Result<SyslogPayload> {
        Ok(SyslogPayload::Structured(self))
    }
}

impl IntoSyslog for &SyslogData {
    fn into_syslog(self) -> Result<SyslogPayload> {
        Ok(SyslogPayload::Structured(self.clone()))
    }
}

impl IntoSyslog for String {
    fn into_syslog(self) -> Result<SyslogPayload> {
        if self.trim().is_empty() {
            return Err(Error::invalid_field("syslog", "raw message must not be empty"));
        }
        Ok(SyslogPayload::Raw(self))
    }
}

impl IntoSyslog for &str {
    fn into_syslog(self) -> Result<SyslogPayload> {
        self.to_string().into_syslog()
    }
}

impl IntoSyslog for Value {
    fn into_syslog(self) -> Result<SyslogPayload> {
        match self {
            Value::String(raw) => raw.into_syslog(),
            other => SyslogData::from_value(other).map(SyslogPayload::Structured),
        }
    }
}

impl IntoSyslog for Map<String, Value> {
    fn into_syslog(self) -> Result<SyslogPayload> {
        SyslogData::from_map(self).map(SyslogPayload::Structured)
    }
}

impl IntoSyslog for SyslogPayload {
    fn into_syslog(self) -> Result<SyslogPayload> {
        match self {
            SyslogPayload::Raw(raw) => raw.into_syslog(),
            structured => Ok(structured),
        }
    }
}

/// Response from event and syslog ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResponse {
    pub success: bool,
    pub message: String,
    #[serde(rename = "eventId", default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

/// Response from `GET /api/events`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSearchResult {
    pub success: bool,
    pub events: Vec<Map<String, Value>>,
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl EventSearchResult {
    /// Decodes the loosely-typed hits into [`Event`]s.
    pub fn typed_events(&self) -> Result<Vec<Event>> {
        self.events
            .iter()
            .enumerate()
            .map(|(index, event)| {
                serde_json::from_value(Value::Object(event.clone())).map_err(|e| {
                    Error::InvalidResponse {
                        status: 200,
                        message: format!("event {index}: {e}"),
                    }
                })
            })
            .collect()
    }
}

/// Event timestamps come back either as epoch seconds or as a string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventTimestamp {
    Epoch(i64),
    Text(String),
}

/// A stored event as returned by search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub id: Option<String>,
    pub timestamp: EventTimestamp,
    #[serde(default)]
    pub timestamp_iso: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: String,
    #[serde(default)]
    pub application: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
}

/// Filters for `search_events`.
///
/// `SearchQuery::default()` asks for the newest 100 events with no filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub limit: u32,
    pub source: Option<String>,
    pub severity: Option<String>,
    pub timestamp_gte: Option<String>,
    /// Additional parameters; one named like a built-in filter replaces it
    pub extra: BTreeMap<String, String>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: None,
            limit: DEFAULT_SEARCH_LIMIT,
            source: None,
            severity: None,
            timestamp_gte: None,
            extra: BTreeMap::new(),
        }
    }
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full-text query, sent as `q`
    #[must_use]
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = Some(severity.into());
        self
    }

    #[must_use]
    pub fn timestamp_gte(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp_gte = Some(timestamp.into());
        self
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Query string pairs in wire order; unset filters are left out and each
    /// key is sent once.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(query) = &self.query {
            params.push(("q".to_string(), query.clone()));
        }
        params.push(("limit".to_string(), self.limit.to_string()));
        let filters = [
            ("source", &self.source),
            ("severity", &self.severity),
            ("timestamp_gte", &self.timestamp_gte),
        ];
        for (key, value) in filters {
            if let Some(value) = value {
                params.push((key.to_string(), value.clone()));
            }
        }
        for (key, value) in &self.extra {
            match params.iter_mut().find(|(name, _)| name == key) {
                Some(param) => param.1 = value.clone(),
                None => params.push((key.clone(), value.clone())),
            }
        }
        params
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn unknown_fields(map: &Map<String, Value>, known: &[&str]) -> Vec<FieldError> {
    map.keys()
        .filter(|key| !known.contains(&key.as_str()))
        .map(|key| FieldError::new(key.clone(), "extra fields not permitted"))
        .collect()
}

fn take_string(
    map: &mut Map<String, Value>,
    key: &str,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    match map.remove(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(value)) => Some(value),
        Some(other) => {
            errors.push(FieldError::new(
                key,
                format!("expected a string, got {}", json_type_name(&other)),
            ));
            None
        }
    }
}

fn take_data(map: &mut Map<String, Value>, errors: &mut Vec<FieldError>) -> Map<String, Value> {
    match map.remove("data") {
        None => Map::new(),
        Some(Value::Object(data)) => data,
        Some(other) => {
            errors.push(FieldError::new(
                "data",
                format!("expected an object, got {}", json_type_name(&other)),
            ));
            Map::new()
        }
    }
}

fn insert_opt(map: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        map.insert(key.to_string(), Value::String(value.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_create_event_with_required_fields() {
        let event = EventData::new("user_login").unwrap();
        assert_eq!(event.event_type(), "user_login");
        assert_eq!(event.application(), None);
        assert_eq!(event.message(), None);
        assert!(event.data().is_empty());
    }

    #[test]
    fn test_create_event_with_all_fields() {
        let event = EventData::builder("user_login")
            .application("web_app")
            .timestamp("2024-01-01T00:00:00Z")
            .message("User logged in")
            .source("api")
            .data_entry("user_id", "12345")
            .build()
            .unwrap();
        assert_eq!(event.application(), Some("web_app"));
        assert_eq!(event.timestamp(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(event.message(), Some("User logged in"));
        assert_eq!(event.source(), Some("api"));
        assert_eq!(event.data().get("user_id"), Some(&json!("12345")));
    }

    #[test]
    fn test_event_serialization_omits_absent_fields() {
        let event = EventData::builder("test")
            .data_entry("key", "value")
            .build()
            .unwrap();
        assert_eq!(
            event.to_value(),
            json!({"type": "test", "data": {"key": "value"}})
        );
        assert_eq!(serde_json::to_value(&event).unwrap(), event.to_value());
    }

    #[test]
    fn test_event_from_mapping_round_trip() {
        let input = json!({
            "type": "user_login",
            "application": "web_app",
            "message": "User logged in successfully",
            "data": {"user_id": "12345", "ip_address": "192.168.1.100"},
        });
        let event = EventData::from_value(input.clone()).unwrap();
        assert_eq!(event.to_value(), input);

        // Missing `data` takes the empty default
        let event = EventData::from_value(json!({"type": "ping", "source": null})).unwrap();
        assert_eq!(event.to_value(), json!({"type": "ping", "data": {}}));
    }

    #[test]
    fn test_event_deserialize_runs_validation() {
        let event: EventData = serde_json::from_str(r#"{"type":"x","data":{"a":1}}"#).unwrap();
        assert_eq!(event.data().get("a"), Some(&json!(1)));
        assert!(serde_json::from_str::<EventData>(r#"{"type":""}"#).is_err());
    }

    #[test]
    fn test_invalid_timestamp() {
        let err = EventData::builder("test")
            .timestamp("invalid-timestamp")
            .build()
            .unwrap_err();
        assert_eq!(err.fields()[0].field, "timestamp");
        assert_eq!(err.fields()[0].message, "timestamp must be in ISO 8601 format");
    }

    #[test]
    fn test_valid_timestamp_formats() {
        for ts in [
            "2024-01-01T00:00:00Z",
            "2024-01-01T00:00:00.123Z",
            "2024-01-01T00:00:00+00:00",
            "2024-01-01T00:00:00.123+00:00",
            "2024-01-01T00:00:00+0000",
            "2024-01-01T12:30:00.5-0530",
            "2024-01-01T00:00:00",
            "2024-01-01 12:30:00",
            "2024-01-01",
        ] {
            let event = EventData::builder("test").timestamp(ts).build().unwrap();
            assert_eq!(event.timestamp(), Some(ts));
        }
    }

    #[test]
    fn test_mapping_errors_list_every_field() {
        let err = EventData::from_value(json!({
            "type": "",
            "message": 42,
            "data": [1, 2],
            "severity": "high",
        }))
        .unwrap_err();
        let mut fields: Vec<&str> = err.fields().iter().map(|f| f.field.as_str()).collect();
        fields.sort_unstable();
        assert_eq!(fields, vec!["data", "message", "severity", "type"]);
    }

    #[test]
    fn test_missing_type_is_required() {
        let err = EventData::from_value(json!({"message": "no type"})).unwrap_err();
        assert_eq!(err.fields(), &[FieldError::new("type", "field required")]);

        let err = EventData::from_value(json!({"type": 7})).unwrap_err();
        assert_eq!(err.fields().len(), 1);
        assert_eq!(err.fields()[0].field, "type");
    }

    #[test]
    fn test_event_from_non_object() {
        let err = EventData::from_value(json!("user_login")).unwrap_err();
        assert_eq!(err.fields()[0].field, "event");
    }

    #[test]
    fn test_create_syslog_minimal() {
        let syslog = SyslogData::builder().build();
        assert_eq!(syslog.event_type(), None);
        assert_eq!(syslog.severity(), None);
        assert!(syslog.data().is_empty());
        assert_eq!(syslog.to_value(), json!({"data": {}}));
    }

    #[test]
    fn test_syslog_from_mapping() {
        let input = json!({
            "type": "auth_failure",
            "severity": "error",
            "hostname": "web-server-01",
            "message": "Authentication failed",
            "data": {"user": "admin"},
        });
        let syslog = SyslogData::from_value(input.clone()).unwrap();
        assert_eq!(syslog.hostname(), Some("web-server-01"));
        assert_eq!(syslog.to_value(), input);

        let err = SyslogData::from_value(json!({"application": "x"})).unwrap_err();
        assert_eq!(err.fields()[0].field, "application");
    }

    #[test]
    fn test_syslog_inputs() {
        let raw = "<34>Oct 11 22:14:15 mymachine su: 'su root' failed for user";
        assert_eq!(
            raw.into_syslog().unwrap(),
            SyslogPayload::Raw(raw.to_string())
        );
        assert_eq!(
            json!(raw).into_syslog().unwrap(),
            SyslogPayload::Raw(raw.to_string())
        );
        assert!(matches!(
            json!({"severity": "info"}).into_syslog().unwrap(),
            SyslogPayload::Structured(_)
        ));
        assert!("   ".into_syslog().is_err());
        assert!(json!(12).into_syslog().is_err());
    }

    #[test]
    fn test_event_response_wire_names() {
        let response: EventResponse = serde_json::from_value(json!({
            "success": true,
            "message": "Event logged successfully",
            "eventId": "1704067200000-abc123",
        }))
        .unwrap();
        assert_eq!(response.event_id.as_deref(), Some("1704067200000-abc123"));

        let response: EventResponse =
            serde_json::from_value(json!({"success": true, "message": "ok"})).unwrap();
        assert_eq!(response.event_id, None);
    }

    #[test]
    fn test_search_result_and_typed_events() {
        let result: EventSearchResult = serde_json::from_value(json!({
            "success": true,
            "events": [{
                "id": "1704067200000-abc123",
                "timestamp": 1704067200,
                "timestamp_iso": "2024-01-01T00:00:00Z",
                "type": "user_login",
                "source": "api",
                "application": "web_app",
                "message": "User logged in successfully",
            }],
            "count": 1,
            "estimated_total": 100,
            "processing_time_ms": 12,
            "query": "test",
        }))
        .unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.estimated_total, Some(100));

        let events = result.typed_events().unwrap();
        assert_eq!(events[0].timestamp, EventTimestamp::Epoch(1704067200));
        assert_eq!(events[0].event_type, "user_login");
        assert_eq!(events[0].data, None);

        let minimal: EventSearchResult =
            serde_json::from_value(json!({"success": true, "events": [], "count": 0})).unwrap();
        assert_eq!(minimal.estimated_total, None);
        assert_eq!(minimal.processing_time_ms, None);
        assert_eq!(minimal.query, None);
    }

    #[test]
    fn test_search_query_params() {
        assert_eq!(
            SearchQuery::default().to_params(),
            vec![("limit".to_string(), "100".to_string())]
        );

        let params = SearchQuery::new()
            .query("error")
            .limit(10)
            .severity("error")
            .param("application", "web_app")
            .to_params();
        assert_eq!(
            params,
            vec![
                ("q".to_string(), "error".to_string()),
                ("limit".to_string(), "10".to_string()),
                ("severity".to_string(), "error".to_string()),
                ("application".to_string(), "web_app".to_string()),
            ]
        );
    }

    #[test]
    fn test_extra_params_replace_builtin_keys() {
        let params = SearchQuery::new()
            .source("api")
            .param("limit", "5")
            .param("q", "x")
            .param("source", "worker")
            .to_params();
        assert_eq!(
            params,
            vec![
                ("limit".to_string(), "5".to_string()),
                ("source".to_string(), "worker".to_string()),
                ("q".to_string(), "x".to_string()),
            ]
        );

        let replaced = SearchQuery::new().query("login").param("q", "logout").to_params();
        assert_eq!(replaced.iter().filter(|(key, _)| key == "q").count(), 1);
        assert_eq!(replaced[0], ("q".to_string(), "logout".to_string()));
    }

    proptest! {
        #[test]
        fn prop_non_blank_types_round_trip(event_type in "[a-z_]{1,24}", message in ".{0,64}") {
            let event = EventData::builder(event_type.clone()).message(message).build().unwrap();
            let rebuilt = EventData::from_value(event.to_value()).unwrap();
            prop_assert_eq!(rebuilt, event);
        }

        #[test]
        fn prop_blank_types_rejected(event_type in "[ \t]{0,8}") {
            prop_assert!(EventData::new(event_type).is_err());
        }
    }
}
