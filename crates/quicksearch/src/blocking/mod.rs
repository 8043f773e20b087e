// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Blocking QuickSearch client.
//!
//! Same operations as the async [`crate::Client`], each blocking the calling
//! thread until the response arrives. Must not be used from inside an async
//! runtime.

mod batch_processor;
mod transport;

use crate::batch::{BatchIngestOptions, BatchIngestResult, BatchStats};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::{EventResponse, EventSearchResult, IntoEventData, IntoSyslog, SearchQuery};
use batch_processor::{BatchHandle, BatchService};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};
use transport::Transport;

/// How long dropping a client waits for the batch thread to flush
const DROP_FLUSH_TIMEOUT: Duration = Duration::from_secs(30);
const DROP_POLL_INTERVAL: Duration = Duration::from_millis(10);

struct Batcher {
    handle: BatchHandle,
    thread: JoinHandle<BatchStats>,
}

/// Blocking QuickSearch client.
///
/// The underlying connection pool is released when the client is dropped;
/// [`close`](Self::close) does the same explicitly and reports what the
/// background batch processor sent.
///
/// ```no_run
/// use quicksearch::blocking::Client;
/// use quicksearch::{ClientConfig, SearchQuery};
/// use serde_json::json;
///
/// let client = Client::new(ClientConfig::builder().api_key("your-api-key").build()?)?;
/// client.ingest_event(json!({"type": "user_login", "data": {"user_id": "12345"}}))?;
/// let results = client.search_events(SearchQuery::new().query("user_login"))?;
/// # Ok::<(), quicksearch::Error>(())
/// ```
pub struct Client {
    transport: Transport,
    batcher: Mutex<Option<Batcher>>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", self.transport.config())
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(config)?,
            batcher: Mutex::new(None),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        self.transport.config()
    }

    pub fn ingest_event(&self, event: impl IntoEventData) -> Result<EventResponse> {
        let event = event.into_event_data()?;
        self.transport.ingest_event(&event)
    }

    /// Ingests events one request at a time, stopping at the first failure.
    pub fn ingest_events<I, E>(&self, events: I) -> Result<Vec<EventResponse>>
    where
        I: IntoIterator<Item = E>,
        E: IntoEventData,
    {
        let events = events
            .into_iter()
            .map(IntoEventData::into_event_data)
            .collect::<Result<Vec<_>>>()?;
        events
            .iter()
            .map(|event| self.transport.ingest_event(event))
            .collect()
    }

    pub fn search_events(&self, query: SearchQuery) -> Result<EventSearchResult> {
        self.transport.search_events(&query)
    }

    pub fn ingest_syslog(&self, syslog: impl IntoSyslog) -> Result<EventResponse> {
        let payload = syslog.into_syslog()?;
        self.transport.ingest_syslog(&payload)
    }

    /// See [`crate::Client::ingest_batch`].
    pub fn ingest_batch<I, E>(
        &self,
        events: I,
        options: Option<&BatchIngestOptions>,
    ) -> Result<BatchIngestResult>
    where
        I: IntoIterator<Item = E>,
        E: IntoEventData,
    {
        let options = match options {
            Some(options) => {
                options.validate()?;
                options
            }
            None => &self.config().batch_options,
        };
        Ok(self.transport.ingest_batch(events, options))
    }

    /// Queues an event for the background batch thread.
    pub fn ingest_event_batched(&self, event: impl IntoEventData) -> Result<()> {
        if !self.config().batch_options.enabled {
            return Err(Error::BatchingDisabled);
        }
        let event = event.into_event_data()?;
        self.handle(true)?
            .ok_or(Error::ProcessorClosed)?
            .add(event)
    }

    pub fn flush_batch(&self) -> Result<BatchStats> {
        match self.handle(false)? {
            Some(handle) => handle.flush(),
            None => Ok(BatchStats::default()),
        }
    }

    /// Flushes queued events, stops the batch thread and releases the pool.
    pub fn close(mut self) -> Result<BatchStats> {
        let Some(batcher) = self.take_batcher() else {
            return Ok(BatchStats::default());
        };
        let stats = batcher.handle.shutdown()?;
        if batcher.thread.join().is_err() {
            error!("Batch processor thread panicked");
        }
        debug!("Client closed");
        Ok(stats)
    }

    /// Handle to the batch thread, starting it first when `start` is set.
    fn handle(&self, start: bool) -> Result<Option<BatchHandle>> {
        let mut batcher = self.batcher.lock().map_err(|_| Error::ProcessorClosed)?;
        if batcher.is_none() && start {
            let (handle, thread) = BatchService::spawn(
                self.transport.clone(),
                self.config().batch_options.clone(),
            )?;
            *batcher = Some(Batcher { handle, thread });
        }
        Ok(batcher.as_ref().map(|batcher| batcher.handle.clone()))
    }

    fn take_batcher(&mut self) -> Option<Batcher> {
        match self.batcher.get_mut() {
            Ok(batcher) => batcher.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

/// Joins the batch thread if it finishes within `timeout`, otherwise leaves
/// it running detached.
fn join_within(thread: JoinHandle<BatchStats>, timeout: Duration) -> Option<BatchStats> {
    let deadline = Instant::now() + timeout;
    while !thread.is_finished() {
        if Instant::now() >= deadline {
            warn!(
                "Batch processor still flushing after {:?}, detaching it",
                timeout
            );
            return None;
        }
        thread::sleep(DROP_POLL_INTERVAL);
    }
    match thread.join() {
        Ok(stats) => Some(stats),
        Err(_) => {
            error!("Batch processor thread panicked");
            None
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(Batcher { handle, thread }) = self.take_batcher() {
            // Disconnecting makes the thread flush what is queued and exit
            drop(handle);
            join_within(thread, DROP_FLUSH_TIMEOUT);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventData;

    #[test]
    fn test_batched_ingest_requires_enabled_batching() {
        let client = Client::new(ClientConfig::default()).unwrap();
        let result = client.ingest_event_batched(EventData::new("test").unwrap());
        assert!(matches!(result, Err(Error::BatchingDisabled)));
        assert_eq!(client.close().unwrap(), BatchStats::default());
    }

    #[test]
    fn test_validation_before_sending() {
        let client = Client::new(
            ClientConfig::builder()
                .base_url("http://127.0.0.1:1")
                .build()
                .unwrap(),
        )
        .unwrap();
        let error = client
            .ingest_event(serde_json::json!({"type": "x", "unexpected": 1}))
            .unwrap_err();
        assert_eq!(error.fields()[0].field, "unexpected");
    }

    #[test]
    fn test_join_within_detaches_slow_thread() {
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let slow = thread::spawn(move || {
            let _ = release_rx.recv();
            BatchStats::default()
        });
        let started = Instant::now();
        assert_eq!(join_within(slow, Duration::from_millis(50)), None);
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(release_tx);

        let fast = thread::spawn(|| BatchStats {
            flushed: 2,
            ..Default::default()
        });
        let stats = join_within(fast, Duration::from_secs(5)).unwrap();
        assert_eq!(stats.flushed, 2);
    }
}
