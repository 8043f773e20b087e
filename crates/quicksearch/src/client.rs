// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::batch::{BatchIngestOptions, BatchIngestResult, BatchStats};
use crate::batch_processor::{BatchHandle, BatchService};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::{EventResponse, EventSearchResult, IntoEventData, IntoSyslog, SearchQuery};
use crate::transport::Transport;
use std::sync::OnceLock;
use tokio::task::JoinHandle;
use tracing::{debug, error};

struct Batcher {
    handle: BatchHandle,
    task: JoinHandle<BatchStats>,
}

/// Asynchronous QuickSearch client.
///
/// Every operation is one or more HTTP round trips over a shared connection
/// pool; the client can be used from many tasks at once through `&self`.
///
/// ```no_run
/// # async fn run() -> quicksearch::Result<()> {
/// use quicksearch::{Client, ClientConfig, EventData, SearchQuery};
///
/// let client = Client::new(
///     ClientConfig::builder()
///         .base_url("https://search.example.com")
///         .api_key("your-api-key")
///         .build()?,
/// )?;
///
/// let event = EventData::builder("user_login")
///     .application("web_app")
///     .message("User logged in")
///     .build()?;
/// client.ingest_event(event).await?;
///
/// let results = client
///     .search_events(SearchQuery::new().query("user_login").limit(10))
///     .await?;
/// println!("found {} events", results.count);
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Client {
    transport: Transport,
    batcher: OnceLock<Batcher>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", self.transport.config())
            .field("batching", &self.batcher.get().is_some())
            .finish()
    }
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(config)?,
            batcher: OnceLock::new(),
        })
    }

    /// Client configured from `QUICKSEARCH_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        self.transport.config()
    }

    /// Ingest a single event
    pub async fn ingest_event(&self, event: impl IntoEventData) -> Result<EventResponse> {
        let event = event.into_event_data()?;
        self.transport.ingest_event(&event).await
    }

    /// Ingests events one request at a time, in input order.
    ///
    /// Every event is validated before anything is sent. The first failed
    /// request aborts the call and the remaining events are not sent; use
    /// [`ingest_batch`](Self::ingest_batch) to collect failures instead.
    pub async fn ingest_events<I, E>(&self, events: I) -> Result<Vec<EventResponse>>
    where
        I: IntoIterator<Item = E>,
        E: IntoEventData,
    {
        let events = events
            .into_iter()
            .map(IntoEventData::into_event_data)
            .collect::<Result<Vec<_>>>()?;

        let mut responses = Vec::with_capacity(events.len());
        for event in &events {
            responses.push(self.transport.ingest_event(event).await?);
        }
        Ok(responses)
    }

    /// Search events
    pub async fn search_events(&self, query: SearchQuery) -> Result<EventSearchResult> {
        self.transport.search_events(&query).await
    }

    /// Ingest a syslog message, structured or raw
    pub async fn ingest_syslog(&self, syslog: impl IntoSyslog) -> Result<EventResponse> {
        let payload = syslog.into_syslog()?;
        self.transport.ingest_syslog(&payload).await
    }

    /// Ingests events concurrently, retrying transient failures and
    /// collecting the ones that still fail.
    ///
    /// Uses the client's batch options unless `options` is given.
    pub async fn ingest_batch<I, E>(
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
        Ok(self.transport.ingest_batch(events, options).await)
    }

    /// Queues an event for the background batch processor and returns at
    /// once.
    ///
    /// The processor starts on first use. Fails with
    /// [`Error::BatchingDisabled`] unless batching is enabled in the client's
    /// [`BatchIngestOptions`], and with [`Error::QueueFull`] once
    /// `queue_size_limit` events are waiting.
    pub async fn ingest_event_batched(&self, event: impl IntoEventData) -> Result<()> {
        if !self.config().batch_options.enabled {
            return Err(Error::BatchingDisabled);
        }
        let event = event.into_event_data()?;
        self.batcher().handle.add(event)
    }

    /// Sends everything queued by [`ingest_event_batched`](Self::ingest_event_batched)
    /// and waits for it.
    pub async fn flush_batch(&self) -> Result<BatchStats> {
        match self.batcher.get() {
            Some(batcher) => batcher.handle.flush().await,
            None => Ok(BatchStats::default()),
        }
    }

    /// Flushes queued events and stops the batch processor.
    ///
    /// Dropping the client without calling this still flushes queued events,
    /// but in the background with nothing to report failures to.
    pub async fn close(mut self) -> Result<BatchStats> {
        let Some(batcher) = self.batcher.take() else {
            return Ok(BatchStats::default());
        };
        let stats = batcher.handle.shutdown().await?;
        if let Err(e) = batcher.task.await {
            error!("Batch processor task failed: {e}");
        }
        debug!("Client closed");
        Ok(stats)
    }

    fn batcher(&self) -> &Batcher {
        self.batcher.get_or_init(|| {
            let options = self.config().batch_options.clone();
            let (service, handle) = BatchService::new(self.transport.clone(), options);
            Batcher {
                handle,
                task: tokio::spawn(service.run()),
            }
        })
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(batcher) = self.batcher.get() {
            batcher.handle.cancel();
        }
    }
}
