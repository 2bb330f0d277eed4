// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Units of user activity that resolve into a group of observations.

use crate::constants::{INTERACTIONS, INVOCATIONS, LATENCY};
use crate::metric::{Context, Observation};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use tokio::time::Instant;
use tracing::warn;

/// Something that happened in the application and can be reported as one
/// document. `emit` may enrich the context, so read it afterwards.
#[async_trait]
pub trait Action: Send {
    fn context(&self) -> &Context;

    async fn emit(&mut self) -> Vec<Observation>;
}

/// Result of an HTTP call made by the application
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCallOutcome {
    pub url: reqwest::Url,
    pub status: u16,
    pub request_body: Value,
    pub response_body: Value,
}

impl ApiCallOutcome {
    /// Reads status, final URL and body of `response`. Bodies that are not
    /// JSON are kept as strings.
    pub async fn from_response(response: reqwest::Response, request_body: Value) -> Self {
        let url = response.url().clone();
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let response_body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Self {
            url,
            status,
            request_body,
            response_body,
        }
    }

    pub fn endpoint(&self) -> &str {
        self.url.path()
    }
}

type PendingCall = Pin<Box<dyn Future<Output = Result<ApiCallOutcome, String>> + Send>>;

/// Measures an in-flight API call. The latency clock starts when the action is
/// built, so build it right as the call is issued.
pub struct ApiCallAction {
    call: Option<PendingCall>,
    started: Instant,
    context: Context,
}

impl ApiCallAction {
    pub fn new<F, E>(call: F, context: Context) -> Self
    where
        F: Future<Output = Result<ApiCallOutcome, E>> + Send + 'static,
        E: Display + 'static,
    {
        Self {
            call: Some(Box::pin(async move { call.await.map_err(|e| e.to_string()) })),
            started: Instant::now(),
            context,
        }
    }
}

#[async_trait]
impl Action for ApiCallAction {
    fn context(&self) -> &Context {
        &self.context
    }

    /// Produces `Invocations` by status code and endpoint, and `Latency` by
    /// endpoint. A non-200 status adds the response body as `error` and the
    /// request body as `request` to the context.
    async fn emit(&mut self) -> Vec<Observation> {
        let Some(call) = self.call.take() else {
            return Vec::new();
        };

        let outcome = match call.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("API call failed before a response was received: {e}");
                self.context.insert("error".to_string(), Value::String(e));
                return Vec::new();
            }
        };
        let latency = self.started.elapsed().as_nanos() as f64 / 1_000_000.0;
        let endpoint = outcome.endpoint().to_string();

        if outcome.status != 200 {
            self.context
                .insert("error".to_string(), outcome.response_body.clone());
            self.context
                .insert("request".to_string(), outcome.request_body.clone());
        }

        vec![
            Observation::new(INVOCATIONS)
                .with_dimension("StatusCode", outcome.status.to_string())
                .with_dimension("Endpoint", endpoint.clone()),
            Observation::duration(LATENCY, latency).with_dimension("Endpoint", endpoint),
        ]
    }
}

/// A user interacting with a named UI component
#[derive(Debug, Clone)]
pub struct InteractionAction {
    component: String,
    context: Context,
}

impl InteractionAction {
    pub fn new(component: impl Into<String>, context: Context) -> Self {
        Self {
            component: component.into(),
            context,
        }
    }
}

#[async_trait]
impl Action for InteractionAction {
    fn context(&self) -> &Context {
        &self.context
    }

    async fn emit(&mut self) -> Vec<Observation> {
        vec![Observation::new(INTERACTIONS).with_dimension("ComponentName", self.component.clone())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::Unit;
    use serde_json::json;
    use std::time::Duration;

    fn outcome(status: u16) -> ApiCallOutcome {
        ApiCallOutcome {
            url: reqwest::Url::parse("https://api.example.com/v1/albums?page=2").expect("url"),
            status,
            request_body: json!({"album": "Views"}),
            response_body: json!({"message": "not found"}),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_call_emits_invocation_and_latency() {
        let mut action = ApiCallAction::new(
            async {
                tokio::time::sleep(Duration::from_millis(120)).await;
                Ok::<_, String>(outcome(200))
            },
            Context::new(),
        );

        let observations = action.emit().await;

        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].name, "Invocations");
        assert_eq!(observations[0].unit, Unit::Count);
        assert_eq!(observations[0].dimensions["StatusCode"], "200");
        assert_eq!(observations[0].dimensions["Endpoint"], "/v1/albums");
        assert_eq!(observations[1].name, "Latency");
        assert_eq!(observations[1].unit, Unit::Milliseconds);
        assert_eq!(observations[1].value, 120.0);
        assert_eq!(observations[1].dimensions.len(), 1);
        assert!(action.context().is_empty());
    }

    #[tokio::test]
    async fn test_failed_status_enriches_context() {
        let mut context = Context::new();
        context.insert("user".to_string(), json!("u-1"));
        let mut action = ApiCallAction::new(async { Ok::<_, String>(outcome(404)) }, context);

        let observations = action.emit().await;

        assert_eq!(observations[0].dimensions["StatusCode"], "404");
        assert_eq!(action.context()["error"], json!({"message": "not found"}));
        assert_eq!(action.context()["request"], json!({"album": "Views"}));
        assert_eq!(action.context()["user"], json!("u-1"));
    }

    #[tokio::test]
    async fn test_transport_failure_emits_nothing() {
        let mut action = ApiCallAction::new(
            async { Err::<ApiCallOutcome, _>("connection reset") },
            Context::new(),
        );

        assert!(action.emit().await.is_empty());
        assert_eq!(action.context()["error"], json!("connection reset"));
    }

    #[tokio::test]
    async fn test_second_emit_is_empty() {
        let mut action = ApiCallAction::new(async { Ok::<_, String>(outcome(200)) }, Context::new());
        assert_eq!(action.emit().await.len(), 2);
        assert!(action.emit().await.is_empty());
    }

    #[tokio::test]
    async fn test_interaction_emits_component_count() {
        let mut action = InteractionAction::new("PlayButton", Context::new());
        let observations = action.emit().await;
        assert_eq!(
            observations,
            vec![Observation::new("Interactions").with_dimension("ComponentName", "PlayButton")]
        );
    }
}
