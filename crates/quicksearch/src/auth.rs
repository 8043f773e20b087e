// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Debug;

/// Credentials attached to every request.
///
/// Chosen once when the client is configured. API keys and JWTs both travel
/// as `Authorization: Bearer <token>`; a client never sends both.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Auth {
    ApiKey(String),
    Jwt(String),
    /// No credentials, for local development servers
    #[default]
    Anonymous,
}

impl Auth {
    pub fn new_from_api_key(api_key: &str) -> Self {
        Self::ApiKey(api_key.to_string())
    }

    pub fn new_from_jwt(token: &str) -> Self {
        Self::Jwt(token.to_string())
    }

    /// Value of the `Authorization` header, if any.
    pub fn header_value(&self) -> Option<String> {
        match self {
            Self::ApiKey(token) | Self::Jwt(token) => Some(format!("Bearer {token}")),
            Self::Anonymous => None,
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Self::ApiKey(_) => "api_key",
            Self::Jwt(_) => "jwt",
            Self::Anonymous => "anonymous",
        }
    }
}

impl Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Auth({})", self.scheme())
    }
}
