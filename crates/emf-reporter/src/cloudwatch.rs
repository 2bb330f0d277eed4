// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle of the remote log stream: bootstrap, then sequenced appends.
//!
//! The client owns the [`StreamIdentity`] (group, stream and the sequence
//! token the service expects on the next append). Every call goes through
//! [`retry`] with the configured [`RetryPolicy`]; only server side failures
//! are retried. Failures are logged and absorbed here, producers never see
//! them.

use crate::aggregator::LogEntry;
use crate::constants::{
    MAX_BATCH_EVENTS, MAX_PENDING_EVENTS, RESOURCE_ALREADY_EXISTS, RESOURCE_NOT_FOUND,
};
use crate::errors::ShippingError;
use crate::retry::{retry, RetryPolicy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogsAction {
    CreateLogGroup,
    CreateLogStream,
    PutLogEvents,
}

impl LogsAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateLogGroup => "CreateLogGroup",
            Self::CreateLogStream => "CreateLogStream",
            Self::PutLogEvents => "PutLogEvents",
        }
    }

    /// Value of the `X-Amz-Target` header selecting this operation
    pub fn target(&self) -> &'static str {
        match self {
            Self::CreateLogGroup => "Logs_20140328.CreateLogGroup",
            Self::CreateLogStream => "Logs_20140328.CreateLogStream",
            Self::PutLogEvents => "Logs_20140328.PutLogEvents",
        }
    }
}

impl fmt::Display for LogsAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A serialized CloudWatch Logs call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogsRequest {
    pub action: LogsAction,
    pub body: String,
}

impl LogsRequest {
    pub fn new<T: Serialize>(action: LogsAction, payload: &T) -> Result<Self, ShippingError> {
        let body =
            serde_json::to_string(payload).map_err(|e| ShippingError::Payload(e.to_string()))?;
        Ok(Self { action, body })
    }
}

/// Sends one request and returns the response body of a 2xx reply.
#[async_trait]
pub trait LogsTransport: Send + Sync {
    async fn send(&self, request: &LogsRequest) -> Result<String, ShippingError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLogGroupRequest<'a> {
    log_group_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLogStreamRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence_token: Option<&'a str>,
    log_events: &'a [LogEntry],
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsResponse {
    next_sequence_token: Option<String>,
    rejected_log_events_info: Option<RejectedLogEventsInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedLogEventsInfo {
    pub too_new_log_event_start_index: Option<i64>,
    pub too_old_log_event_end_index: Option<i64>,
    pub expired_log_event_end_index: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Uninitialized,
    Creating,
    Ready,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamIdentity {
    pub log_group: String,
    pub log_stream: Option<String>,
    /// Token required by the next append; absent before the first append to
    /// a fresh stream
    pub sequence_token: Option<String>,
}

/// How appends coordinate their use of the sequence token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppendMode {
    /// One append in flight at a time; each append reads the token left by
    /// the previous one. Batches arriving meanwhile are merged into a single
    /// pending batch of at most `MAX_PENDING_EVENTS` entries, sent by the
    /// running append once it completes.
    #[default]
    Serialized,
    /// Appends overlap. Each reads the token, sends, and writes back the
    /// token it was given, so overlapping appends may send a stale token.
    Concurrent,
}

pub struct CloudWatchClient {
    transport: Arc<dyn LogsTransport>,
    retry_policy: RetryPolicy,
    append_mode: AppendMode,
    log_group: String,
    identity: tokio::sync::Mutex<StreamIdentity>,
    /// Entries waiting for the serialized append in flight
    pending: Mutex<Vec<LogEntry>>,
    state: Mutex<StreamState>,
}

impl fmt::Debug for CloudWatchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudWatchClient")
            .field("log_group", &self.log_group)
            .field("retry_policy", &self.retry_policy)
            .field("append_mode", &self.append_mode)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[allow(clippy::expect_used)]
impl CloudWatchClient {
    pub fn new(
        log_group: impl Into<String>,
        transport: Arc<dyn LogsTransport>,
        retry_policy: RetryPolicy,
    ) -> Self {
        let log_group = log_group.into();
        Self {
            transport,
            retry_policy,
            append_mode: AppendMode::default(),
            identity: tokio::sync::Mutex::new(StreamIdentity {
                log_group: log_group.clone(),
                log_stream: None,
                sequence_token: None,
            }),
            log_group,
            pending: Mutex::new(Vec::new()),
            state: Mutex::new(StreamState::Uninitialized),
        }
    }

    #[must_use]
    pub fn with_append_mode(mut self, append_mode: AppendMode) -> Self {
        self.append_mode = append_mode;
        self
    }

    pub fn log_group(&self) -> &str {
        &self.log_group
    }

    pub fn state(&self) -> StreamState {
        *self.state.lock().expect("lock poisoned")
    }

    /// Waits for any serialized append in flight to finish.
    pub async fn identity(&self) -> StreamIdentity {
        self.identity.lock().await.clone()
    }

    fn set_state(&self, state: StreamState) {
        *self.state.lock().expect("lock poisoned") = state;
    }

    /// Ensures `log_stream_name` exists in the configured group, creating the
    /// group if needed. On success the stream becomes the append target and
    /// any previous sequence token is forgotten.
    pub async fn bootstrap_stream(&self, log_stream_name: &str) -> bool {
        self.set_state(StreamState::Creating);

        match self.create_stream_or_group(log_stream_name).await {
            Ok(()) => {
                {
                    let mut identity = self.identity.lock().await;
                    identity.log_stream = Some(log_stream_name.to_string());
                    identity.sequence_token = None;
                }
                self.set_state(StreamState::Ready);
                debug!("Log stream {}/{log_stream_name} is ready", self.log_group);
                true
            }
            Err(e) => {
                self.set_state(StreamState::Failed);
                error!(
                    "Failed to bootstrap log stream {}/{log_stream_name}: {e}",
                    self.log_group
                );
                false
            }
        }
    }

    async fn create_stream_or_group(&self, log_stream_name: &str) -> Result<(), ShippingError> {
        match self.create_log_stream(log_stream_name).await {
            Err(e) if e.is_error_type(RESOURCE_NOT_FOUND) => {
                info!("Log group {} does not exist, creating it", self.log_group);
                self.create_log_group().await?;
                self.create_log_stream(log_stream_name).await
            }
            result => result,
        }
    }

    async fn create_log_stream(&self, log_stream_name: &str) -> Result<(), ShippingError> {
        let request = LogsRequest::new(
            LogsAction::CreateLogStream,
            &CreateLogStreamRequest {
                log_group_name: &self.log_group,
                log_stream_name,
            },
        )?;
        match self.call(&request).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_error_type(RESOURCE_ALREADY_EXISTS) => {
                debug!("Log stream {log_stream_name} already exists, reusing it");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn create_log_group(&self) -> Result<(), ShippingError> {
        let request = LogsRequest::new(
            LogsAction::CreateLogGroup,
            &CreateLogGroupRequest {
                log_group_name: &self.log_group,
            },
        )?;
        match self.call(&request).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_error_type(RESOURCE_ALREADY_EXISTS) => {
                debug!("Log group {} already exists", self.log_group);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn call(&self, request: &LogsRequest) -> Result<String, ShippingError> {
        retry(&self.retry_policy, ShippingError::is_retryable, || {
            self.transport.send(request)
        })
        .await
    }

    /// Ships `entries` to the bootstrapped stream in order. Entries that can
    /// not be delivered are logged and dropped.
    ///
    /// In [`AppendMode::Serialized`] this returns right away when another
    /// append is in flight; the entries are then sent by that append.
    pub async fn append_batch(&self, entries: Vec<LogEntry>) {
        if entries.is_empty() {
            return;
        }

        match self.append_mode {
            AppendMode::Serialized => {
                let (mut identity, mut batch) = {
                    let mut pending = self.pending.lock().expect("lock poisoned");
                    match self.identity.try_lock() {
                        Ok(identity) => {
                            let mut batch = std::mem::take(&mut *pending);
                            batch.extend(entries);
                            (identity, batch)
                        }
                        Err(_) => {
                            enqueue_pending(&mut pending, entries);
                            return;
                        }
                    }
                };

                loop {
                    self.put_log_events(&mut identity, &batch).await;

                    // The identity is released under the pending lock so no
                    // merged batch is left behind
                    let mut pending = self.pending.lock().expect("lock poisoned");
                    if pending.is_empty() {
                        drop(identity);
                        return;
                    }
                    batch = std::mem::take(&mut *pending);
                }
            }
            AppendMode::Concurrent => {
                let mut snapshot = self.identity.lock().await.clone();
                self.put_log_events(&mut snapshot, &entries).await;
                let mut identity = self.identity.lock().await;
                // A bootstrap in between owns the token now
                if identity.log_stream == snapshot.log_stream {
                    identity.sequence_token = snapshot.sequence_token;
                }
            }
        }
    }

    async fn put_log_events(&self, identity: &mut StreamIdentity, entries: &[LogEntry]) {
        let Some(log_stream) = identity.log_stream.clone() else {
            warn!(
                "No log stream has been bootstrapped, dropping {} log events",
                entries.len()
            );
            return;
        };

        for (index, chunk) in entries.chunks(MAX_BATCH_EVENTS).enumerate() {
            match self
                .put_chunk(&log_stream, identity.sequence_token.as_deref(), chunk)
                .await
            {
                Ok(Some(next_token)) => identity.sequence_token = Some(next_token),
                Ok(None) => {}
                Err(e) => {
                    let dropped = entries.len() - index * MAX_BATCH_EVENTS;
                    error!("Failed to put log events, dropping {dropped} log events: {e}");
                    return;
                }
            }
        }
        debug!("Sent {} log events to {log_stream}", entries.len());
    }

    async fn put_chunk(
        &self,
        log_stream: &str,
        sequence_token: Option<&str>,
        chunk: &[LogEntry],
    ) -> Result<Option<String>, ShippingError> {
        let request = LogsRequest::new(
            LogsAction::PutLogEvents,
            &PutLogEventsRequest {
                log_group_name: &self.log_group,
                log_stream_name: log_stream,
                sequence_token,
                log_events: chunk,
            },
        )?;
        let body = self.call(&request).await?;

        let response = if body.trim().is_empty() {
            PutLogEventsResponse::default()
        } else {
            serde_json::from_str::<PutLogEventsResponse>(&body).unwrap_or_else(|e| {
                warn!("Unable to parse PutLogEvents response: {e}");
                PutLogEventsResponse::default()
            })
        };
        if let Some(rejected) = response.rejected_log_events_info {
            info!("Rejected log events: {rejected:?}");
        }
        Ok(response.next_sequence_token)
    }
}

fn enqueue_pending(pending: &mut Vec<LogEntry>, entries: Vec<LogEntry>) {
    pending.extend(entries);
    if pending.len() > MAX_PENDING_EVENTS {
        let overflow = pending.len() - MAX_PENDING_EVENTS;
        pending.drain(..overflow);
        warn!("Pending append is full, dropping {overflow} oldest log events");
    }
    debug!(
        "Append in flight, {} log events pending",
        pending.len()
    );
}
