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
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// Async transport: one pooled `reqwest::Client` plus the immutable
/// configuration. Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    client: reqwest::Client,
    config: Arc<ClientConfig>,
}

impl Transport {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = http::build_client(&config)?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Performs exactly one HTTP round trip.
    ///
    /// Dropping the returned future abandons the request; the connection
    /// goes back to the pool.
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
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

        let response = builder.send().await.map_err(|e| {
            debug!("{} {} failed: {}", request.method, request.path, e);
            Error::from_transport(e)
        })?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(Error::from_transport)?;
        http::parse_response(&request, status, &headers, &body)
    }

    pub async fn ingest_event(&self, event: &EventData) -> Result<EventResponse> {
        self.send(ApiRequest::ingest_event(event)).await
    }

    pub async fn search_events(&self, query: &SearchQuery) -> Result<EventSearchResult> {
        self.send(ApiRequest::search(query)).await
    }

    pub async fn ingest_syslog(&self, payload: &SyslogPayload) -> Result<EventResponse> {
        self.send(ApiRequest::ingest_syslog(payload)).await
    }

    /// Ingests one event, retrying retryable failures per `options`.
    async fn ingest_with_retry(
        &self,
        index: usize,
        event: EventData,
        options: &BatchIngestOptions,
    ) -> EventOutcome {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.ingest_event(&event).await {
                Ok(response) => return EventOutcome::Ingested { index, response },
                Err(e) if e.is_retryable() && attempts <= options.retry_attempts => {
                    let delay = options.backoff(attempts, &e);
                    warn!(
                        "Event {index}: attempt {attempts} failed, retrying in {delay:?}: {e}"
                    );
                    tokio::time::sleep(delay).await;
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

    /// Concurrent bulk ingestion collecting per-event failures.
    pub async fn ingest_batch<I, E>(
        &self,
        events: I,
        options: &BatchIngestOptions,
    ) -> BatchIngestResult
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

        let semaphore = Arc::new(Semaphore::new(options.max_concurrency));
        for chunk in pending.chunks(options.batch_size) {
            result.batch_count += 1;
            debug!("Ingesting batch {} of {} events", result.batch_count, chunk.len());

            let mut set = JoinSet::new();
            for (index, event) in chunk.iter().cloned() {
                let transport = self.clone();
                let options = options.clone();
                let semaphore = Arc::clone(&semaphore);
                set.spawn(async move {
                    // The semaphore is never closed
                    let _permit = semaphore.acquire_owned().await.ok();
                    transport.ingest_with_retry(index, event, &options).await
                });
            }

            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok(outcome) => result.record(outcome),
                    Err(e) => error!("Failed to join ingestion task: {e}"),
                }
            }
        }

        // Tasks that failed to join never recorded an outcome
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
