// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use clap::{Parser, Subcommand};
use quicksearch::{
    BatchIngestOptions, Client, ClientConfig, EventData, SearchQuery, SyslogData,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::process::ExitCode;
use std::{env, fs};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "quicksearch", version, about = "QuickSearch event log client")]
struct Cli {
    /// Service root URL
    #[arg(long, env = "QUICKSEARCH_URL", default_value = quicksearch::config::DEFAULT_BASE_URL)]
    url: String,
    /// API key, sent as a bearer token
    #[arg(long, env = "QUICKSEARCH_API_KEY", hide_env_values = true, conflicts_with = "jwt_token")]
    api_key: Option<String>,
    /// JWT, sent as a bearer token
    #[arg(long, env = "QUICKSEARCH_JWT_TOKEN", hide_env_values = true)]
    jwt_token: Option<String>,
    /// Per-request timeout in seconds
    #[arg(long, env = "QUICKSEARCH_TIMEOUT", default_value_t = 30.0)]
    timeout: f64,
    /// Skip TLS certificate verification
    #[arg(long)]
    insecure: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a single event
    Ingest {
        /// Event type
        #[arg(long = "type")]
        event_type: String,
        #[arg(long)]
        application: Option<String>,
        #[arg(long)]
        message: Option<String>,
        #[arg(long)]
        source: Option<String>,
        /// ISO 8601 timestamp
        #[arg(long)]
        timestamp: Option<String>,
        /// JSON object stored as the event's data
        #[arg(long, value_parser = parse_json_object)]
        data: Option<Map<String, Value>>,
    },
    /// Ingest every event of a JSON array or JSON lines file
    IngestFile {
        path: String,
        /// Events per batch
        #[arg(long, default_value_t = 100)]
        batch_size: usize,
        /// Requests in flight at once
        #[arg(long, default_value_t = 5)]
        concurrency: usize,
        /// Retries per event on 429, 5xx and connection errors
        #[arg(long, default_value_t = 3)]
        retries: u32,
    },
    /// Search events
    Search {
        /// Full-text query
        query: Option<String>,
        #[arg(long, default_value_t = quicksearch::models::DEFAULT_SEARCH_LIMIT)]
        limit: u32,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        severity: Option<String>,
        /// Only events at or after this ISO 8601 timestamp
        #[arg(long)]
        since: Option<String>,
    },
    /// Ingest a syslog message
    Syslog {
        /// Raw syslog line, forwarded as is
        #[arg(conflicts_with_all = ["severity", "hostname", "message"])]
        line: Option<String>,
        #[arg(long)]
        severity: Option<String>,
        #[arg(long)]
        hostname: Option<String>,
        #[arg(long)]
        message: Option<String>,
    },
}

fn parse_json_object(value: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("expected a JSON object".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

fn read_events(path: &str) -> Result<Vec<Value>, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("failed to read {path}: {e}"))?;
    if content.trim_start().starts_with('[') {
        return serde_json::from_str(&content).map_err(|e| format!("invalid JSON in {path}: {e}"));
    }
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).map_err(|e| format!("invalid JSON on line {}: {e}", n + 1))
        })
        .collect()
}

fn build_config(cli: &Cli) -> quicksearch::Result<ClientConfig> {
    let mut builder = ClientConfig::builder()
        .base_url(cli.url.clone())
        .timeout_secs(cli.timeout)?
        .verify_ssl(!cli.insecure);
    if let Some(api_key) = &cli.api_key {
        builder = builder.api_key(api_key.clone());
    }
    if let Some(jwt_token) = &cli.jwt_token {
        builder = builder.jwt_token(jwt_token.clone());
    }
    builder.build()
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let output = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{output}");
    Ok(())
}

async fn run(cli: Cli) -> Result<bool, String> {
    let config = build_config(&cli).map_err(|e| e.to_string())?;
    debug!("Using QuickSearch at {}", config.base_url);
    let client = Client::new(config).map_err(|e| e.to_string())?;

    match cli.command {
        Command::Ingest {
            event_type,
            application,
            message,
            source,
            timestamp,
            data,
        } => {
            let mut builder = EventData::builder(event_type).data(data.unwrap_or_default());
            if let Some(application) = application {
                builder = builder.application(application);
            }
            if let Some(message) = message {
                builder = builder.message(message);
            }
            if let Some(source) = source {
                builder = builder.source(source);
            }
            if let Some(timestamp) = timestamp {
                builder = builder.timestamp(timestamp);
            }
            let event = builder.build().map_err(|e| e.to_string())?;
            let response = client.ingest_event(event).await.map_err(|e| e.to_string())?;
            print_json(&response)?;
        }
        Command::IngestFile {
            path,
            batch_size,
            concurrency,
            retries,
        } => {
            let events = read_events(&path)?;
            let options = BatchIngestOptions {
                batch_size,
                max_concurrency: concurrency,
                retry_attempts: retries,
                ..Default::default()
            };
            let result = client
                .ingest_batch(events, Some(&options))
                .await
                .map_err(|e| e.to_string())?;
            print_json(&result)?;
            return Ok(result.is_complete_success());
        }
        Command::Search {
            query,
            limit,
            source,
            severity,
            since,
        } => {
            let search = SearchQuery {
                query,
                limit,
                source,
                severity,
                timestamp_gte: since,
                ..Default::default()
            };
            let result = client.search_events(search).await.map_err(|e| e.to_string())?;
            print_json(&result)?;
        }
        Command::Syslog {
            line,
            severity,
            hostname,
            message,
        } => {
            let response = match line {
                Some(line) => client.ingest_syslog(line).await,
                None => {
                    let mut builder = SyslogData::builder();
                    if let Some(severity) = severity {
                        builder = builder.severity(severity);
                    }
                    if let Some(hostname) = hostname {
                        builder = builder.hostname(hostname);
                    }
                    if let Some(message) = message {
                        builder = builder.message(message);
                    }
                    client.ingest_syslog(builder.build()).await
                }
            }
            .map_err(|e| e.to_string())?;
            print_json(&response)?;
        }
    }
    Ok(true)
}

#[tokio::main]
pub async fn main() -> ExitCode {
    let log_level = env::var("QUICKSEARCH_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());
    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_target(false)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
