// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::action::Action;
use crate::aggregator::Aggregator;
use crate::cloudwatch::{CloudWatchClient, LogsTransport};
use crate::config::ReporterConfig;
use crate::emf::EmbeddedMetric;
use crate::errors::ConfigError;
use crate::http::HttpTransport;
use crate::metric::{Context, Observation};
use crate::recorder::MetricsRecorder;
use crate::util::is_valid_log_stream_name;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Name of the log stream for a session started at `now`:
/// `<label>/YYYY/MM/DD/HH/MM/SS.mmm` in UTC.
pub fn stream_name(session_label: &str, now: DateTime<Utc>) -> String {
    format!("{session_label}/{}", now.format("%Y/%m/%d/%H/%M/%S%.3f"))
}

/// Buffers documents from producers and ships them to one log stream per
/// session on a fixed interval.
#[derive(Debug)]
pub struct SessionReporter {
    client: Arc<CloudWatchClient>,
    aggregator: Arc<dyn Aggregator>,
    namespace: String,
    flush_interval: Duration,
    /// Timer of the most recent session
    active: Mutex<Option<CancellationToken>>,
}

impl SessionReporter {
    pub fn new(config: ReporterConfig, aggregator: Arc<dyn Aggregator>) -> Result<Self, ConfigError> {
        config.validate()?;
        let transport = HttpTransport::new(
            config.logs_endpoint.clone(),
            config.https_proxy.as_deref(),
            config.request_timeout,
        )
        .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Self::with_transport(config, aggregator, Arc::new(transport))
    }

    pub fn with_transport(
        config: ReporterConfig,
        aggregator: Arc<dyn Aggregator>,
        transport: Arc<dyn LogsTransport>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = CloudWatchClient::new(
            config.log_group_name.clone(),
            transport,
            config.retry_policy,
        )
        .with_append_mode(config.append_mode);

        Ok(Self {
            client: Arc::new(client),
            aggregator,
            flush_interval: config.flush_interval(),
            namespace: config.namespace,
            active: Mutex::new(None),
        })
    }

    pub fn client(&self) -> &Arc<CloudWatchClient> {
        &self.client
    }

    pub fn aggregator(&self) -> &Arc<dyn Aggregator> {
        &self.aggregator
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Creates the session's log stream and arms the flush timer. Returns
    /// `None` when the stream name is invalid or the stream could not be
    /// created; nothing is scheduled then.
    ///
    /// Starting again bootstraps a new stream and stops the timer of the
    /// previous session, whose handle then no longer reports.
    pub async fn start_reporting(&self, session_label: &str) -> Option<ReportingHandle> {
        let log_stream_name = stream_name(session_label, Utc::now());
        if !is_valid_log_stream_name(&log_stream_name) {
            error!("Failed to start reporting, invalid log stream name {log_stream_name}");
            return None;
        }
        if !self.client.bootstrap_stream(&log_stream_name).await {
            error!("Failed to start reporting, unable to create log stream {log_stream_name}");
            return None;
        }

        let cancel = CancellationToken::new();
        if let Some(previous) = self.replace_active(cancel.clone()) {
            debug!("Stopping the flush timer of the previous session");
            previous.cancel();
        }
        tokio::spawn(flush_loop(
            Arc::clone(&self.client),
            Arc::clone(&self.aggregator),
            self.flush_interval,
            cancel.clone(),
        ));
        info!("Starting session reporter using log stream {log_stream_name}");

        Some(ReportingHandle {
            cancel,
            log_stream_name,
        })
    }

    #[allow(clippy::expect_used)]
    fn replace_active(&self, cancel: CancellationToken) -> Option<CancellationToken> {
        self.active.lock().expect("lock poisoned").replace(cancel)
    }

    /// Drains the aggregator and ships the drained entries in the background.
    /// Awaiting the returned handle is optional. Must be called from within a
    /// tokio runtime.
    pub fn flush(&self) -> JoinHandle<()> {
        spawn_flush(&self.client, self.aggregator.as_ref())
    }

    /// Emits `action` and buffers the resulting document with the action's
    /// context.
    pub async fn report<A: Action>(&self, mut action: A) {
        let observations = action.emit().await;
        if observations.is_empty() {
            debug!("Action produced no observations, nothing to report");
            return;
        }
        self.record(observations, action.context());
    }
}

impl MetricsRecorder for SessionReporter {
    fn record(&self, observations: Vec<Observation>, context: &Context) {
        let document = EmbeddedMetric::encode(&observations, &self.namespace, context);
        self.aggregator.append(&document);
    }
}

fn spawn_flush(client: &Arc<CloudWatchClient>, aggregator: &dyn Aggregator) -> JoinHandle<()> {
    let entries = aggregator.drain();
    if !entries.is_empty() {
        debug!("Flushing {} log entries", entries.len());
    }
    let client = Arc::clone(client);
    tokio::spawn(async move { client.append_batch(entries).await })
}

async fn flush_loop(
    client: Arc<CloudWatchClient>,
    aggregator: Arc<dyn Aggregator>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut flush_interval = interval(period);
    flush_interval.tick().await; // discard first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("Flush timer stopped");
                break;
            }
            _ = flush_interval.tick() => {
                // Appends may be retrying for a long time, never wait on them here
                spawn_flush(&client, aggregator.as_ref());
            }
        }
    }
}

/// Running flush timer of one session. Dropping the handle stops reporting.
#[derive(Debug)]
pub struct ReportingHandle {
    cancel: CancellationToken,
    log_stream_name: String,
}

impl ReportingHandle {
    pub fn log_stream_name(&self) -> &str {
        &self.log_stream_name
    }

    pub fn is_reporting(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Stops the flush timer. Buffered entries stay in the aggregator and
    /// appends already in flight run to completion, along with at most one
    /// batch merged while they were retrying.
    pub fn stop_reporting(self) {
        info!("Stopping session reporter for log stream {}", self.log_stream_name);
        self.cancel.cancel();
    }
}

impl Drop for ReportingHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
