// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::auth::Auth;
use crate::batch::BatchIngestOptions;
use crate::error::{Error, Result};
use std::env;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration shared by the async and blocking clients.
///
/// Immutable once a client is built from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Service root, without trailing slash
    pub base_url: String,
    pub auth: Auth,
    /// Per-request timeout
    pub timeout: Duration,
    /// Verify the server certificate on https connections
    pub verify_ssl: bool,
    pub batch_options: BatchIngestOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth: Auth::Anonymous,
            timeout: DEFAULT_TIMEOUT,
            verify_ssl: true,
            batch_options: BatchIngestOptions::default(),
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(base_url) = non_empty_var("QUICKSEARCH_URL") {
            builder = builder.base_url(base_url);
        }
        if let Some(api_key) = non_empty_var("QUICKSEARCH_API_KEY") {
            builder = builder.api_key(api_key);
        }
        if let Some(jwt_token) = non_empty_var("QUICKSEARCH_JWT_TOKEN") {
            builder = builder.jwt_token(jwt_token);
        }
        if let Ok(timeout) = env::var("QUICKSEARCH_TIMEOUT") {
            let secs = timeout.trim().parse::<f64>().map_err(|_| {
                Error::Config(format!("QUICKSEARCH_TIMEOUT must be a number of seconds, got '{timeout}'"))
            })?;
            builder = builder.timeout_secs(secs)?;
        }
        let verify_ssl = env::var("QUICKSEARCH_VERIFY_SSL")
            .map(|val| val.to_lowercase() != "false")
            .unwrap_or(true);
        builder.verify_ssl(verify_ssl).build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "base_url must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        if self.base_url.ends_with('/') {
            return Err(Error::Config("base_url must not end with '/'".to_string()));
        }

        match &self.auth {
            Auth::ApiKey(key) if key.trim().is_empty() => {
                return Err(Error::Config("api_key cannot be empty".to_string()))
            }
            Auth::Jwt(token) if token.trim().is_empty() => {
                return Err(Error::Config("jwt_token cannot be empty".to_string()))
            }
            _ => {}
        }

        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than 0".to_string()));
        }

        self.batch_options.validate()
    }

    /// `base_url` joined with an API path
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Builder for [`ClientConfig`].
///
/// Credentials are mutually exclusive: setting both an API key and a JWT
/// makes [`build`](Self::build) fail. Setting neither yields an anonymous
/// client.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    jwt_token: Option<String>,
    timeout: Option<Duration>,
    verify_ssl: Option<bool>,
    batch_options: Option<BatchIngestOptions>,
}

impl ClientConfigBuilder {
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn jwt_token(mut self, jwt_token: impl Into<String>) -> Self {
        self.jwt_token = Some(jwt_token.into());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Timeout in (fractional) seconds
    pub fn timeout_secs(self, secs: f64) -> Result<Self> {
        let timeout = Duration::try_from_secs_f64(secs)
            .map_err(|_| Error::Config(format!("invalid timeout: {secs}")))?;
        Ok(self.timeout(timeout))
    }

    #[must_use]
    pub fn verify_ssl(mut self, verify_ssl: bool) -> Self {
        self.verify_ssl = Some(verify_ssl);
        self
    }

    #[must_use]
    pub fn batch_options(mut self, batch_options: BatchIngestOptions) -> Self {
        self.batch_options = Some(batch_options);
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        let auth = match (self.api_key, self.jwt_token) {
            (Some(_), Some(_)) => {
                return Err(Error::Config(
                    "api_key and jwt_token are mutually exclusive".to_string(),
                ))
            }
            (Some(api_key), None) => Auth::ApiKey(api_key),
            (None, Some(jwt_token)) => Auth::Jwt(jwt_token),
            (None, None) => Auth::Anonymous,
        };

        let defaults = ClientConfig::default();
        let config = ClientConfig {
            base_url: self
                .base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            auth,
            timeout: self.timeout.unwrap_or(defaults.timeout),
            verify_ssl: self.verify_ssl.unwrap_or(defaults.verify_ssl),
            batch_options: self.batch_options.unwrap_or(defaults.batch_options),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Reads `name`, treating a blank value as unset
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
