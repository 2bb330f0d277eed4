// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory logs transport used by unit tests.

use crate::cloudwatch::{LogsAction, LogsRequest, LogsTransport};
use crate::errors::ShippingError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub action: LogsAction,
    pub body: Value,
    pub at: Instant,
}

type Response = Result<String, ShippingError>;

/// Replies with queued responses per action, then with the action's
/// fallback, then with an empty JSON object.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    queued: Mutex<HashMap<LogsAction, VecDeque<Response>>>,
    fallback: Mutex<HashMap<LogsAction, Response>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

#[allow(clippy::expect_used)]
impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, action: LogsAction, response: Response) {
        self.queued
            .lock()
            .expect("lock poisoned")
            .entry(action)
            .or_default()
            .push_back(response);
    }

    pub fn always(&self, action: LogsAction, response: Response) {
        self.fallback
            .lock()
            .expect("lock poisoned")
            .insert(action, response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("lock poisoned").clone()
    }

    pub fn actions(&self) -> Vec<LogsAction> {
        self.requests().into_iter().map(|r| r.action).collect()
    }

    pub fn requests_for(&self, action: LogsAction) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.action == action)
            .collect()
    }
}

#[async_trait]
#[allow(clippy::expect_used)]
impl LogsTransport for ScriptedTransport {
    async fn send(&self, request: &LogsRequest) -> Result<String, ShippingError> {
        self.requests
            .lock()
            .expect("lock poisoned")
            .push(RecordedRequest {
                action: request.action,
                body: serde_json::from_str(&request.body).expect("request body is JSON"),
                at: Instant::now(),
            });

        if let Some(response) = self
            .queued
            .lock()
            .expect("lock poisoned")
            .get_mut(&request.action)
            .and_then(VecDeque::pop_front)
        {
            return response;
        }
        self.fallback
            .lock()
            .expect("lock poisoned")
            .get(&request.action)
            .cloned()
            .unwrap_or_else(|| Ok("{}".to_string()))
    }
}

pub(crate) fn aws_error(status: u16, error_type: &str) -> ShippingError {
    ShippingError::Destination {
        status: StatusCode::from_u16(status).expect("valid status"),
        error_type: Some(error_type.to_string()),
        message: format!("{{\"__type\":\"{error_type}\"}}"),
    }
}

pub(crate) fn next_token(token: &str) -> Response {
    Ok(format!("{{\"nextSequenceToken\":\"{token}\"}}"))
}
