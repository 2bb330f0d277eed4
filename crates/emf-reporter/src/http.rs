// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::cloudwatch::{LogsAction, LogsRequest, LogsTransport};
use crate::constants::{CONTENT_TYPE, LOGS_FORMAT_EMF, LOGS_FORMAT_HEADER, TARGET_HEADER};
use crate::errors::ShippingError;
use async_trait::async_trait;
use core::time::Duration;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE as CONTENT_TYPE_HEADER};
use serde::Deserialize;
use std::time::Instant;
use tracing::debug;

/// Builds a reqwest client with optional proxy configuration and timeout.
pub fn build_client(
    proxy_url: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(proxy) = proxy_url {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    builder.build()
}

/// Posts CloudWatch Logs JSON requests to a single endpoint
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(
        endpoint: impl Into<String>,
        proxy_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_client(proxy_url, timeout)?, endpoint))
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

pub(crate) fn request_headers(action: LogsAction) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE_HEADER, HeaderValue::from_static(CONTENT_TYPE));
    headers.insert(TARGET_HEADER, HeaderValue::from_static(action.target()));
    if action == LogsAction::PutLogEvents {
        headers.insert(LOGS_FORMAT_HEADER, HeaderValue::from_static(LOGS_FORMAT_EMF));
    }
    headers
}

#[async_trait]
impl LogsTransport for HttpTransport {
    async fn send(&self, request: &LogsRequest) -> Result<String, ShippingError> {
        let time = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .headers(request_headers(request.action))
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| ShippingError::Network(e.to_string()))?;

        let status = response.status();
        let header_error_type = response
            .headers()
            .get("x-amzn-ErrorType")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();
        debug!(
            "{} returned {status} in {} ms",
            request.action,
            time.elapsed().as_millis()
        );

        if status.is_success() {
            return Ok(body);
        }

        Err(ShippingError::Destination {
            status,
            error_type: parse_error_type(&body).or_else(|| {
                header_error_type
                    .as_deref()
                    .and_then(|header| header.split(':').next())
                    .map(str::to_string)
            }),
            message: body,
        })
    }
}

#[derive(Deserialize)]
struct AwsErrorBody {
    #[serde(rename = "__type")]
    error_type: Option<String>,
}

/// Extracts the exception name from an AWS JSON error body. The `__type`
/// field may carry a service prefix, e.g.
/// `com.amazonaws.logs#ResourceNotFoundException`.
pub(crate) fn parse_error_type(body: &str) -> Option<String> {
    let parsed: AwsErrorBody = serde_json::from_str(body).ok()?;
    let error_type = parsed.error_type?;
    error_type
        .rsplit('#')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}
