// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

use quicksearch::{BatchIngestOptions, ClientConfig};
use serde_json::{json, Value};
use std::net::TcpListener;
use std::time::Duration;

pub const API_KEY: &str = "test-api-key";

/// Config pointing at a mock server, authenticated with [`API_KEY`]
pub fn config(url: &str) -> ClientConfig {
    ClientConfig::builder()
        .base_url(url)
        .api_key(API_KEY)
        .timeout(Duration::from_secs(5))
        .build()
        .expect("failed to build config")
}

/// Batch options with short delays so retry tests stay fast
pub fn fast_batch_options() -> BatchIngestOptions {
    BatchIngestOptions {
        enabled: true,
        batch_size: 2,
        max_concurrency: 2,
        retry_attempts: 2,
        retry_delay: Duration::from_millis(100),
        ..Default::default()
    }
}

pub fn ingest_response(event_id: &str) -> String {
    json!({"success": true, "message": "ok", "eventId": event_id}).to_string()
}

pub fn search_response(events: Vec<Value>) -> String {
    json!({
        "success": true,
        "count": events.len(),
        "estimated_total": events.len(),
        "processing_time_ms": 4,
        "events": events,
    })
    .to_string()
}

/// A listener that accepts connections but never answers.
///
/// Keep the returned listener alive for the duration of the test.
pub fn silent_server() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind listener");
    let url = format!(
        "http://{}",
        listener.local_addr().expect("failed to read local address")
    );
    (listener, url)
}
