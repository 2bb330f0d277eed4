// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Errors raised while building a reporter from its configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Failure of a single call against the logs ingestion endpoint
#[derive(Debug, Clone, thiserror::Error)]
pub enum ShippingError {
    #[error("Failed to prepare payload: {0}")]
    Payload(String),

    #[error("{status}: {} {message}", .error_type.as_deref().unwrap_or("UnknownError"))]
    Destination {
        status: StatusCode,
        error_type: Option<String>,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),
}

impl ShippingError {
    /// Only server side failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Destination { status, .. } if status.is_server_error())
    }

    /// Whether the service tagged this failure with the given exception name,
    /// e.g. `ResourceNotFoundException`.
    pub fn is_error_type(&self, name: &str) -> bool {
        match self {
            Self::Destination {
                error_type: Some(error_type),
                ..
            } => error_type == name,
            _ => false,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Destination { status, .. } => Some(*status),
            _ => None,
        }
    }
}
