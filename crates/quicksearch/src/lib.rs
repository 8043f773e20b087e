// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client SDK for the QuickSearch event log storage service.
//!
//! Wraps the service's REST API: event ingestion (single, sequential or
//! concurrent bulk), full-text search and syslog ingestion. Request models are
//! validated before anything is sent, and every non-success response maps to
//! exactly one [`Error`] variant.
//!
//! Two clients expose the same operations:
//! - [`Client`]: async, for use inside a tokio runtime
//! - [`blocking::Client`]: blocks the calling thread (feature `blocking`,
//!   on by default)
//!
//! Both can also queue events for a background batch processor once batching
//! is switched on in [`BatchIngestOptions`].

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod auth;
pub mod batch;
mod batch_processor;
#[cfg(feature = "blocking")]
pub mod blocking;
mod client;
pub mod config;
pub mod error;
mod http;
pub mod models;
mod transport;

pub use auth::Auth;
pub use batch::{BatchIngestError, BatchIngestOptions, BatchIngestResult, BatchStats};
pub use client::Client;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{Error, ErrorKind, FieldError, Result};
pub use http::{EVENTS_PATH, SYSLOG_PATH};
pub use models::{
    Event, EventData, EventDataBuilder, EventResponse, EventSearchResult, EventTimestamp,
    IntoEventData, IntoSyslog, SearchQuery, SyslogData, SyslogDataBuilder, SyslogPayload,
};
