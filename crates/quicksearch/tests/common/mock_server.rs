// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock ingest endpoint that tracks how many requests it handles at once

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Default)]
struct Counters {
    received: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    served: AtomicUsize,
}

#[derive(Clone)]
pub struct MockServer {
    pub addr: SocketAddr,
    counters: Arc<Counters>,
}

impl MockServer {
    /// Start a server on a random port.
    ///
    /// Every request is answered with 201 after `delay`, except the first
    /// `stalled` requests, which are never answered.
    pub async fn start(delay: Duration, stalled: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock server");
        let addr = listener.local_addr().expect("Failed to get local addr");

        let counters = Arc::new(Counters::default());
        let counters_clone = counters.clone();

        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };

                let io = TokioIo::new(stream);
                let counters = counters_clone.clone();

                tokio::spawn(async move {
                    let service = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let counters = counters.clone();
                        async move {
                            let n = counters.received.fetch_add(1, Ordering::SeqCst);
                            let _ = req.into_body().collect().await;
                            if n < stalled {
                                std::future::pending::<()>().await;
                            }

                            let current = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                            counters.peak_in_flight.fetch_max(current, Ordering::SeqCst);
                            tokio::time::sleep(delay).await;
                            counters.in_flight.fetch_sub(1, Ordering::SeqCst);
                            counters.served.fetch_add(1, Ordering::SeqCst);

                            let body = json!({
                                "success": true,
                                "message": "ok",
                                "eventId": n.to_string(),
                            });
                            Response::builder()
                                .status(201)
                                .header("content-type", "application/json")
                                .body(Full::new(Bytes::from(body.to_string())))
                        }
                    });

                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        MockServer { addr, counters }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Requests answered so far
    pub fn served(&self) -> usize {
        self.counters.served.load(Ordering::SeqCst)
    }

    /// Highest number of requests handled at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.counters.peak_in_flight.load(Ordering::SeqCst)
    }
}
