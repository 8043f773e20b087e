// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::batch::{BatchIngestOptions, BatchIngestResult, BatchStats};
use crate::error::{Error, Result};
use crate::models::EventData;
use crate::transport::Transport;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Destination of the batches assembled by [`BatchService`].
#[async_trait]
pub(crate) trait BatchSink: Send + Sync + 'static {
    async fn send_batch(&self, events: Vec<EventData>) -> BatchIngestResult;
}

#[async_trait]
impl BatchSink for Transport {
    async fn send_batch(&self, events: Vec<EventData>) -> BatchIngestResult {
        let options = self.config().batch_options.clone();
        self.ingest_batch(events, &options).await
    }
}

#[derive(Debug)]
pub(crate) enum BatchCommand {
    Add(EventData),
    Flush(oneshot::Sender<BatchStats>),
    Shutdown(oneshot::Sender<BatchStats>),
}

#[derive(Debug, Clone)]
pub(crate) struct BatchHandle {
    tx: mpsc::Sender<BatchCommand>,
    queue_size_limit: usize,
    cancel: CancellationToken,
}

impl BatchHandle {
    /// Queues an event without waiting; fails once the queue is full.
    pub fn add(&self, event: EventData) -> Result<()> {
        self.tx
            .try_send(BatchCommand::Add(event))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => Error::QueueFull {
                    limit: self.queue_size_limit,
                },
                mpsc::error::TrySendError::Closed(_) => Error::ProcessorClosed,
            })
    }

    /// Flushes everything queued before this call.
    pub async fn flush(&self) -> Result<BatchStats> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(BatchCommand::Flush(response_tx))
            .await
            .map_err(|_| Error::ProcessorClosed)?;
        response_rx.await.map_err(|_| Error::ProcessorClosed)
    }

    /// Flushes everything queued and stops the service.
    pub async fn shutdown(&self) -> Result<BatchStats> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(BatchCommand::Shutdown(response_tx))
            .await
            .map_err(|_| Error::ProcessorClosed)?;
        response_rx.await.map_err(|_| Error::ProcessorClosed)
    }

    /// Asks the service to drain and stop without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

fn reply(response_tx: oneshot::Sender<BatchStats>, stats: BatchStats) {
    if response_tx.send(stats).is_err() {
        debug!("Batch requester went away before the response");
    }
}

/// Buffers queued events and hands them to a [`BatchSink`] in batches.
pub(crate) struct BatchService<S> {
    sink: S,
    options: BatchIngestOptions,
    rx: mpsc::Receiver<BatchCommand>,
    cancel: CancellationToken,
    buffer: Vec<EventData>,
    stats: BatchStats,
}

impl<S: BatchSink> BatchService<S> {
    pub fn new(sink: S, options: BatchIngestOptions) -> (Self, BatchHandle) {
        let (tx, rx) = mpsc::channel(options.queue_size_limit);
        let cancel = CancellationToken::new();
        let handle = BatchHandle {
            tx,
            queue_size_limit: options.queue_size_limit,
            cancel: cancel.clone(),
        };
        let service = Self {
            sink,
            buffer: Vec::with_capacity(options.batch_size),
            options,
            rx,
            cancel,
            stats: BatchStats::default(),
        };
        (service, handle)
    }

    pub async fn run(mut self) -> BatchStats {
        debug!(
            "Batch processor started: batch_size={}, flush_interval={:?}",
            self.options.batch_size, self.options.flush_interval
        );

        let mut ticker = time::interval(self.options.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(BatchCommand::Add(event)) => self.push(event).await,
                    Some(BatchCommand::Flush(response_tx)) => {
                        self.flush().await;
                        reply(response_tx, self.stats);
                    }
                    Some(BatchCommand::Shutdown(response_tx)) => {
                        self.drain().await;
                        reply(response_tx, self.stats);
                        break;
                    }
                    None => {
                        self.flush().await;
                        break;
                    }
                },
                _ = ticker.tick() => self.flush().await,
                () = self.cancel.cancelled() => {
                    self.drain().await;
                    break;
                }
            }
        }

        debug!(
            "Batch processor stopped: {} queued, {} flushed, {} failed",
            self.stats.queued, self.stats.flushed, self.stats.failed
        );
        self.stats
    }

    async fn push(&mut self, event: EventData) {
        self.stats.queued += 1;
        self.buffer.push(event);
        if self.buffer.len() >= self.options.batch_size {
            self.flush().await;
        }
    }

    /// Pulls whatever is still queued, then flushes it.
    async fn drain(&mut self) {
        self.rx.close();
        while let Ok(command) = self.rx.try_recv() {
            match command {
                BatchCommand::Add(event) => self.push(event).await,
                BatchCommand::Flush(response_tx) | BatchCommand::Shutdown(response_tx) => {
                    self.flush().await;
                    reply(response_tx, self.stats);
                }
            }
        }
        self.flush().await;
    }

    async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let batch = std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(self.options.batch_size),
        );
        let count = batch.len();

        let result = self.sink.send_batch(batch).await;
        self.stats.record_flush(&result);

        if result.failure_count > 0 {
            error!(
                "Failed to ingest {} of {} batched events",
                result.failure_count, count
            );
            for failure in &result.errors {
                debug!(
                    "Batched event {} dropped: {}",
                    failure.event_index, failure.error_message
                );
            }
        } else {
            debug!("Flushed {} batched events", count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchIngestError, EventOutcome};
    use crate::models::EventResponse;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tracing_test::traced_test;

    #[derive(Clone, Default)]
    struct RecordingSink {
        batches: Arc<Mutex<Vec<Vec<EventData>>>>,
        fail: bool,
    }

    impl RecordingSink {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn batch_sizes(&self) -> Vec<usize> {
            self.batches.lock().unwrap().iter().map(Vec::len).collect()
        }
    }

    #[async_trait]
    impl BatchSink for RecordingSink {
        async fn send_batch(&self, events: Vec<EventData>) -> BatchIngestResult {
            let mut result = BatchIngestResult {
                total_count: events.len(),
                batch_count: 1,
                ..Default::default()
            };
            for (index, event) in events.iter().enumerate() {
                let outcome = if self.fail {
                    EventOutcome::Failed(BatchIngestError::new(
                        index,
                        event.to_value(),
                        &Error::Server {
                            status: 503,
                            message: "Service unavailable".to_string(),
                        },
                        1,
                    ))
                } else {
                    EventOutcome::Ingested {
                        index,
                        response: EventResponse {
                            success: true,
                            message: "ok".to_string(),
                            event_id: None,
                        },
                    }
                };
                result.record(outcome);
            }
            self.batches.lock().unwrap().push(events);
            result
        }
    }

    fn options(batch_size: usize) -> BatchIngestOptions {
        BatchIngestOptions {
            enabled: true,
            batch_size,
            flush_interval: Duration::from_secs(3_600),
            queue_size_limit: 100,
            ..Default::default()
        }
    }

    fn event(n: usize) -> EventData {
        EventData::builder("test")
            .data_entry("n", n)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_flushes_when_batch_is_full() {
        let sink = RecordingSink::default();
        let (service, handle) = BatchService::new(sink.clone(), options(2));
        let task = tokio::spawn(service.run());

        for n in 0..5 {
            handle.add(event(n)).unwrap();
        }
        let stats = handle.flush().await.unwrap();

        assert_eq!(sink.batch_sizes(), vec![2, 2, 1]);
        assert_eq!(stats.queued, 5);
        assert_eq!(stats.flushed, 5);
        assert_eq!(stats.batches, 3);
        assert_eq!(stats.pending(), 0);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_flushes_on_interval() {
        let sink = RecordingSink::default();
        let (service, handle) = BatchService::new(
            sink.clone(),
            BatchIngestOptions {
                flush_interval: Duration::from_millis(100),
                ..options(100)
            },
        );
        let task = tokio::spawn(service.run());

        handle.add(event(1)).unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(sink.batch_sizes(), vec![1]);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_flushes_remaining_events() {
        let sink = RecordingSink::default();
        let (service, handle) = BatchService::new(sink.clone(), options(100));
        let task = tokio::spawn(service.run());

        for n in 0..3 {
            handle.add(event(n)).unwrap();
        }
        let stats = handle.shutdown().await.unwrap();
        assert_eq!(stats.flushed, 3);
        assert_eq!(sink.batch_sizes(), vec![3]);

        let final_stats = task.await.unwrap();
        assert_eq!(final_stats, stats);
        assert!(matches!(handle.add(event(4)), Err(Error::ProcessorClosed)));
        assert!(matches!(handle.flush().await, Err(Error::ProcessorClosed)));
    }

    #[tokio::test]
    async fn test_cancel_drains_queue() {
        let sink = RecordingSink::default();
        let (service, handle) = BatchService::new(sink.clone(), options(100));

        // Queue before the service runs so the events sit in the channel
        for n in 0..4 {
            handle.add(event(n)).unwrap();
        }
        handle.cancel();
        let stats = service.run().await;

        assert_eq!(stats.queued, 4);
        assert_eq!(stats.flushed, 4);
        assert_eq!(sink.batch_sizes(), vec![4]);
    }

    #[tokio::test]
    async fn test_dropped_handle_flushes() {
        let sink = RecordingSink::default();
        let (service, handle) = BatchService::new(sink.clone(), options(100));
        let task = tokio::spawn(service.run());

        handle.add(event(1)).unwrap();
        drop(handle);

        let stats = task.await.unwrap();
        assert_eq!(stats.flushed, 1);
    }

    #[tokio::test]
    async fn test_queue_full() {
        let (_service, handle) = BatchService::new(RecordingSink::default(), options(100));
        for n in 0..100 {
            handle.add(event(n)).unwrap();
        }
        assert!(matches!(
            handle.add(event(100)),
            Err(Error::QueueFull { limit: 100 })
        ));
    }

    #[tokio::test]
    async fn test_closed_processor() {
        let (service, handle) = BatchService::new(RecordingSink::default(), options(100));
        drop(service);
        assert!(matches!(handle.add(event(1)), Err(Error::ProcessorClosed)));
        assert!(matches!(handle.shutdown().await, Err(Error::ProcessorClosed)));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failed_flush_is_logged_and_counted() {
        let (service, handle) = BatchService::new(RecordingSink::failing(), options(10));
        let task = tokio::spawn(service.run());

        handle.add(event(1)).unwrap();
        handle.add(event(2)).unwrap();
        let stats = handle.shutdown().await.unwrap();
        task.await.unwrap();

        assert_eq!(stats.failed, 2);
        assert_eq!(stats.flushed, 0);
        assert!(logs_contain("Failed to ingest 2 of 2 batched events"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_abandoned_flush_request_is_logged() {
        let sink = RecordingSink::default();
        let (service, handle) = BatchService::new(sink.clone(), options(100));
        handle.add(event(1)).unwrap();

        let (response_tx, response_rx) = oneshot::channel();
        drop(response_rx);
        handle.tx.try_send(BatchCommand::Flush(response_tx)).unwrap();
        drop(handle);

        let stats = service.run().await;
        assert_eq!(stats.flushed, 1);
        assert!(logs_contain("Batch requester went away before the response"));
    }
}
