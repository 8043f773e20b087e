// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::transport::Transport;
use crate::batch::{BatchIngestOptions, BatchIngestResult, BatchStats};
use crate::error::{Error, Result};
use crate::models::EventData;
use std::sync::mpsc::{self, RecvTimeoutError, TrySendError};
use std::thread;
use std::time::Instant;
use tracing::{debug, error};

const THREAD_NAME: &str = "quicksearch-batch";

pub(crate) trait BlockingBatchSink: Send + 'static {
    fn send_batch(&self, events: Vec<EventData>) -> BatchIngestResult;
}

impl BlockingBatchSink for Transport {
    fn send_batch(&self, events: Vec<EventData>) -> BatchIngestResult {
        let options = self.config().batch_options.clone();
        self.ingest_batch(events, &options)
    }
}

#[derive(Debug)]
enum BatchCommand {
    Add(EventData),
    Flush(mpsc::Sender<BatchStats>),
    Shutdown(mpsc::Sender<BatchStats>),
}

#[derive(Debug, Clone)]
pub(crate) struct BatchHandle {
    tx: mpsc::SyncSender<BatchCommand>,
    queue_size_limit: usize,
}

impl BatchHandle {
    pub fn add(&self, event: EventData) -> Result<()> {
        self.tx
            .try_send(BatchCommand::Add(event))
            .map_err(|e| match e {
                TrySendError::Full(_) => Error::QueueFull {
                    limit: self.queue_size_limit,
                },
                TrySendError::Disconnected(_) => Error::ProcessorClosed,
            })
    }

    pub fn flush(&self) -> Result<BatchStats> {
        self.request(BatchCommand::Flush)
    }

    pub fn shutdown(&self) -> Result<BatchStats> {
        self.request(BatchCommand::Shutdown)
    }

    fn request(
        &self,
        command: fn(mpsc::Sender<BatchStats>) -> BatchCommand,
    ) -> Result<BatchStats> {
        let (response_tx, response_rx) = mpsc::channel();
        self.tx
            .send(command(response_tx))
            .map_err(|_| Error::ProcessorClosed)?;
        response_rx.recv().map_err(|_| Error::ProcessorClosed)
    }
}

fn reply(response_tx: &mpsc::Sender<BatchStats>, stats: BatchStats) {
    if response_tx.send(stats).is_err() {
        debug!("Batch requester went away before the response");
    }
}

/// Background thread buffering events for a [`BlockingBatchSink`].
pub(crate) struct BatchService<S> {
    sink: S,
    options: BatchIngestOptions,
    rx: mpsc::Receiver<BatchCommand>,
    buffer: Vec<EventData>,
    stats: BatchStats,
}

impl<S: BlockingBatchSink> BatchService<S> {
    pub fn new(sink: S, options: BatchIngestOptions) -> (Self, BatchHandle) {
        let (tx, rx) = mpsc::sync_channel(options.queue_size_limit);
        let handle = BatchHandle {
            tx,
            queue_size_limit: options.queue_size_limit,
        };
        let service = Self {
            sink,
            buffer: Vec::with_capacity(options.batch_size),
            options,
            rx,
            stats: BatchStats::default(),
        };
        (service, handle)
    }

    /// Starts the processor on its own named thread.
    pub fn spawn(
        sink: S,
        options: BatchIngestOptions,
    ) -> Result<(BatchHandle, thread::JoinHandle<BatchStats>)> {
        let (service, handle) = Self::new(sink, options);
        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || service.run())
            .map_err(|e| {
                error!("Failed to spawn batch processor thread: {e}");
                Error::ProcessorClosed
            })?;
        Ok((handle, thread))
    }

    pub fn run(mut self) -> BatchStats {
        debug!(
            "Batch processor started: batch_size={}, flush_interval={:?}",
            self.options.batch_size, self.options.flush_interval
        );

        let mut deadline = Instant::now() + self.options.flush_interval;
        loop {
            let timeout = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(timeout) {
                Ok(BatchCommand::Add(event)) => self.push(event),
                Ok(BatchCommand::Flush(response_tx)) => {
                    self.flush();
                    reply(&response_tx, self.stats);
                }
                Ok(BatchCommand::Shutdown(response_tx)) => {
                    self.drain();
                    reply(&response_tx, self.stats);
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.flush();
                    break;
                }
            }

            if Instant::now() >= deadline {
                self.flush();
                deadline = Instant::now() + self.options.flush_interval;
            }
        }

        debug!(
            "Batch processor stopped: {} queued, {} flushed, {} failed",
            self.stats.queued, self.stats.flushed, self.stats.failed
        );
        self.stats
    }

    fn push(&mut self, event: EventData) {
        self.stats.queued += 1;
        self.buffer.push(event);
        if self.buffer.len() >= self.options.batch_size {
            self.flush();
        }
    }

    fn drain(&mut self) {
        while let Ok(command) = self.rx.try_recv() {
            match command {
                BatchCommand::Add(event) => self.push(event),
                BatchCommand::Flush(response_tx) | BatchCommand::Shutdown(response_tx) => {
                    self.flush();
                    reply(&response_tx, self.stats);
                }
            }
        }
        self.flush();
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let batch = std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(self.options.batch_size),
        );
        let count = batch.len();

        let result = self.sink.send_batch(batch);
        self.stats.record_flush(&result);

        if result.failure_count > 0 {
            error!(
                "Failed to ingest {} of {} batched events",
                result.failure_count, count
            );
        } else {
            debug!("Flushed {} batched events", count);
        }
    }
}
