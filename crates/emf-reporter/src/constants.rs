// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Content type of every CloudWatch Logs JSON request
pub const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Header flagging a `PutLogEvents` payload as embedded metric format
pub const LOGS_FORMAT_HEADER: &str = "x-amzn-logs-format";
pub const LOGS_FORMAT_EMF: &str = "json/emf";

pub const TARGET_HEADER: &str = "x-amz-target";

/// Key of the metadata block at the root of an EMF document
pub const EMF_METADATA_KEY: &str = "_aws";

pub const RESOURCE_ALREADY_EXISTS: &str = "ResourceAlreadyExistsException";
pub const RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";

/// `PutLogEvents` accepts at most this many events per call
pub const MAX_BATCH_EVENTS: usize = 10_000;

/// Entries merged while a serialized append is in flight, beyond which the
/// oldest are dropped
pub const MAX_PENDING_EVENTS: usize = MAX_BATCH_EVENTS;

/// Upper bound on queued entries for the bounded aggregator
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 50_000;

pub const DEFAULT_LOGS_ENDPOINT: &str = "https://logs.us-east-1.amazonaws.com";
pub const DEFAULT_LOG_GROUP: &str = "WebsiteLogs";
pub const DEFAULT_NAMESPACE: &str = "WebsiteMetrics";
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 10;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

// Metric names emitted by the built-in actions
pub const INVOCATIONS: &str = "Invocations";
pub const LATENCY: &str = "Latency";
pub const INTERACTIONS: &str = "Interactions";
