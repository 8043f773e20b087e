// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::batch::{BatchIngestError, BatchIngestOptions, BatchIngestResult, EventOutcome};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::http::{self, ApiRequest, Body};
use crate::models::{
    EventData, EventResponse, EventSearchResult, IntoEventData, SearchQuery, SyslogPayload,
};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Blocking counterpart of the async transport, over
/// `reqwest::blocking::Client`.
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    client: reqwest::blocking::Client,
    config: Arc<ClientConfig>,
}

impl Transport {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::blocking::Client::builder()
            .default_headers(http::default_headers(&config)?)
            .timeout(config.timeout)
            .pool_max_idle_per_host(http::POOL_MAX_IDLE_PER_HOST)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.config.url(request.path));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match &request.body {
            Some(Body::Json(value)) => builder.json(value),
            Some(Body::Text(text)) => builder
                .header(reqwest::header::CONTENT_TYPE, "text/plain")
                .body(text.clone()),
            None => builder,
        };

        let response = builder.send().map_err(|e| {
            debug!("{} {} failed: {}", request.method, request.path, e);
            Error::from_transport(e)
        })?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().map_err(Error::from_transport)?;
        http::parse_response(&request, status, &headers, &body)
    }

    pub fn ingest_event(&self, event: &EventData) -> Result<EventResponse> {
        self.send(ApiRequest::ingest_event(event))
    }

    pub fn search_events(&self, query: &SearchQuery) -> Result<EventSearchResult> {
        self.send(ApiRequest::search(query))
    }

    pub fn ingest_syslog(&self, payload: &SyslogPayload) -> Result<EventResponse> {
        self.send(ApiRequest::ingest_syslog(payload))
    }

    fn ingest_with_retry(
        &self,
        index: usize,
        event: &EventData,
        options: &BatchIngestOptions,
    ) -> EventOutcome {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.ingest_event(event) {
                Ok(response) => return EventOutcome::Ingested { index, response },
                Err(e) if e.is_retryable() && attempts <= options.retry_attempts => {
                    let delay = options.backoff(attempts, &e);
                    warn!(
                        "Event {index}: attempt {attempts} failed, retrying in {delay:?}: {e}"
                    );
                    thread::sleep(delay);
                }
                Err(e) => {
                    return EventOutcome::Failed(BatchIngestError::new(
                        index,
                        event.to_value(),
                        &e,
                        attempts,
                    ))
                }
            }
        }
    }

    /// Each chunk is worked by up to `max_concurrency` scoped threads
    /// pulling events off a shared cursor.
    pub fn ingest_batch<I, E>(&self, events: I, options: &BatchIngestOptions) -> BatchIngestResult
    where
        I: IntoIterator<Item = E>,
        E: IntoEventData,
    {
        let started = Instant::now();
        let mut result = BatchIngestResult::default();
        let mut pending = Vec::new();

        for (index, event) in events.into_iter().enumerate() {
            result.total_count += 1;
            let raw = event.to_json();
            match event.into_event_data() {
                Ok(event) => pending.push((index, event)),
                Err(e) => result.record(EventOutcome::Failed(BatchIngestError::new(
                    index, raw, &e, 0,
                ))),
            }
        }

        for chunk in pending.chunks(options.batch_size) {
            result.batch_count += 1;
            debug!("Ingesting batch {} of {} events", result.batch_count, chunk.len());

            let cursor = AtomicUsize::new(0);
            let workers = options.max_concurrency.min(chunk.len());
            thread::scope(|scope| {
                let handles: Vec<_> = (0..workers)
                    .map(|_| {
                        scope.spawn(|| {
                            let mut outcomes = Vec::new();
                            while let Some((index, event)) =
                                chunk.get(cursor.fetch_add(1, Ordering::Relaxed))
                            {
                                outcomes.push(self.ingest_with_retry(*index, event, options));
                            }
                            outcomes
                        })
                    })
                    .collect();

                for handle in handles {
                    match handle.join() {
                        Ok(outcomes) => outcomes.into_iter().for_each(|o| result.record(o)),
                        Err(_) => error!("Ingestion worker panicked"),
                    }
                }
            });
        }

        // Events owned by a panicked worker never recorded an outcome
        let missing = result.total_count - result.success_count - result.failure_count;
        result.failure_count += missing;

        result.finish(started.elapsed());
        debug!(
            "Batch ingestion finished: {} ok, {} failed in {}ms",
            result.success_count,
            result.failure_count,
            result.processing_time_ms.unwrap_or_default()
        );
        result
    }
}
