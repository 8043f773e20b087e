// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Options and results for bulk ingestion.
//!
//! `ingest_batch` sends one `POST /api/events` per event. Events are split
//! into chunks of `batch_size`; inside a chunk up to `max_concurrency`
//! requests are in flight at once. Retryable failures (429, 5xx, connection
//! errors) are retried with exponential backoff, and every event that still
//! fails ends up in [`BatchIngestResult::errors`] instead of aborting the
//! whole batch.

use crate::error::{Error, Result};
use crate::models::EventResponse;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

const MAX_BATCH_SIZE: usize = 1_000;
const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(100);
const MAX_FLUSH_INTERVAL: Duration = Duration::from_secs(3_600);
const MIN_QUEUE_SIZE_LIMIT: usize = 100;
const MAX_QUEUE_SIZE_LIMIT: usize = 1_000_000;
const MAX_CONCURRENCY: usize = 50;
const MAX_RETRY_ATTEMPTS: u32 = 10;
const MIN_RETRY_DELAY: Duration = Duration::from_millis(100);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Upper bound on any single wait between retries, jitter and `Retry-After`
/// included
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Tuning for bulk ingestion and the background batch processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchIngestOptions {
    /// Enables `ingest_event_batched` on the client
    pub enabled: bool,
    /// Events per chunk, and the size that triggers a background flush
    pub batch_size: usize,
    /// Background flush period
    pub flush_interval: Duration,
    /// Capacity of the background queue
    pub queue_size_limit: usize,
    /// Requests in flight at once
    pub max_concurrency: usize,
    /// Retries after the first attempt, 0 disables retrying
    pub retry_attempts: u32,
    /// Base delay, doubled on every retry
    pub retry_delay: Duration,
}

impl Default for BatchIngestOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            batch_size: 100,
            flush_interval: Duration::from_secs(2),
            queue_size_limit: 10_000,
            max_concurrency: 5,
            retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl BatchIngestOptions {
    /// Default options with batching switched on
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(Error::Config(format!(
                "batch_size must be between 1 and {MAX_BATCH_SIZE}, got {}",
                self.batch_size
            )));
        }
        if self.flush_interval < MIN_FLUSH_INTERVAL || self.flush_interval > MAX_FLUSH_INTERVAL {
            return Err(Error::Config(format!(
                "flush_interval must be between {MIN_FLUSH_INTERVAL:?} and {MAX_FLUSH_INTERVAL:?}, got {:?}",
                self.flush_interval
            )));
        }
        if self.queue_size_limit < MIN_QUEUE_SIZE_LIMIT
            || self.queue_size_limit > MAX_QUEUE_SIZE_LIMIT
        {
            return Err(Error::Config(format!(
                "queue_size_limit must be between {MIN_QUEUE_SIZE_LIMIT} and {MAX_QUEUE_SIZE_LIMIT}, got {}",
                self.queue_size_limit
            )));
        }
        if self.max_concurrency == 0 || self.max_concurrency > MAX_CONCURRENCY {
            return Err(Error::Config(format!(
                "max_concurrency must be between 1 and {MAX_CONCURRENCY}, got {}",
                self.max_concurrency
            )));
        }
        if self.retry_attempts > MAX_RETRY_ATTEMPTS {
            return Err(Error::Config(format!(
                "retry_attempts must be at most {MAX_RETRY_ATTEMPTS}, got {}",
                self.retry_attempts
            )));
        }
        if self.retry_delay < MIN_RETRY_DELAY || self.retry_delay > MAX_RETRY_DELAY {
            return Err(Error::Config(format!(
                "retry_delay must be between {MIN_RETRY_DELAY:?} and {MAX_RETRY_DELAY:?}, got {:?}",
                self.retry_delay
            )));
        }
        Ok(())
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// Doubles from `retry_delay` and adds up to a quarter of random jitter; a
    /// `Retry-After` hint from the service wins when it is longer. Never
    /// exceeds [`MAX_BACKOFF`].
    pub fn backoff(&self, retry: u32, error: &Error) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let base = self
            .retry_delay
            .saturating_mul(1 << exponent)
            .min(MAX_BACKOFF);
        let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=base_ms / 4));
        let delay = base.saturating_add(jitter);
        let delay = match error {
            Error::RateLimit {
                retry_after: Some(retry_after),
                ..
            } => delay.max(*retry_after),
            _ => delay,
        };
        delay.min(MAX_BACKOFF)
    }
}

/// One event that could not be ingested
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchIngestError {
    /// Position of the event in the input
    pub event_index: usize,
    pub event_data: Value,
    pub error_message: String,
    pub status_code: Option<u16>,
    /// Whether at least one retry was attempted
    pub retried: bool,
}

impl BatchIngestError {
    pub(crate) fn new(event_index: usize, event_data: Value, error: &Error, attempts: u32) -> Self {
        Self {
            event_index,
            event_data,
            error_message: error.to_string(),
            status_code: error.status_code(),
            retried: attempts > 1,
        }
    }
}

/// Outcome of a bulk ingestion
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchIngestResult {
    pub success_count: usize,
    pub failure_count: usize,
    pub total_count: usize,
    /// Failures ordered by `event_index`
    pub errors: Vec<BatchIngestError>,
    /// Number of chunks the input was split into
    pub batch_count: usize,
    pub processing_time_ms: Option<u64>,
    /// Successful responses keyed by input position
    #[serde(skip)]
    pub responses: BTreeMap<usize, EventResponse>,
}

impl BatchIngestResult {
    /// Percentage of events ingested, 100.0 for an empty batch
    pub fn success_rate(&self) -> f64 {
        if self.total_count == 0 {
            return 100.0;
        }
        self.success_count as f64 / self.total_count as f64 * 100.0
    }

    pub fn is_complete_success(&self) -> bool {
        self.failure_count == 0
    }

    pub(crate) fn record(&mut self, outcome: EventOutcome) {
        match outcome {
            EventOutcome::Ingested { index, response } => {
                self.success_count += 1;
                self.responses.insert(index, response);
            }
            EventOutcome::Failed(error) => {
                self.failure_count += 1;
                self.errors.push(error);
            }
        }
    }

    pub(crate) fn finish(&mut self, elapsed: Duration) {
        self.errors.sort_by_key(|e| e.event_index);
        self.processing_time_ms = Some(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
    }
}

/// Counters kept by a background batch processor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Events accepted into the queue
    pub queued: u64,
    /// Events the service acknowledged
    pub flushed: u64,
    /// Events dropped after exhausting retries
    pub failed: u64,
    /// Flushes performed
    pub batches: u64,
}

impl BatchStats {
    /// Events accepted but not yet flushed
    pub fn pending(&self) -> u64 {
        self.queued.saturating_sub(self.flushed + self.failed)
    }

    pub(crate) fn record_flush(&mut self, result: &BatchIngestResult) {
        self.batches += 1;
        self.flushed += result.success_count as u64;
        self.failed += result.failure_count as u64;
    }
}

/// Result of pushing a single event, retries included
#[derive(Debug)]
pub(crate) enum EventOutcome {
    Ingested {
        index: usize,
        response: EventResponse,
    },
    Failed(BatchIngestError),
}
