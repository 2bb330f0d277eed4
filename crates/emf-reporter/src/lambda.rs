// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Reporter for hosts whose standard output already lands in CloudWatch Logs,
//! such as AWS Lambda. Documents are written immediately instead of being
//! buffered and shipped.

use crate::action::Action;
use crate::emf::EmbeddedMetric;
use crate::metric::{Context, Observation};
use crate::recorder::MetricsRecorder;
use std::io::{self, Write};
use std::sync::Mutex;
use tracing::{debug, error};

/// Writes each encoded document as one JSON line.
#[derive(Debug)]
pub struct EmfLogger<W: Write + Send = io::Stdout> {
    namespace: String,
    writer: Mutex<W>,
}

impl EmfLogger {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self::with_writer(namespace, io::stdout())
    }
}

impl<W: Write + Send> EmfLogger<W> {
    pub fn with_writer(namespace: impl Into<String>, writer: W) -> Self {
        Self {
            namespace: namespace.into(),
            writer: Mutex::new(writer),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Emits `action` and writes the resulting document with the action's
    /// context.
    pub async fn report<A: Action>(&self, mut action: A) {
        let observations = action.emit().await;
        if observations.is_empty() {
            debug!("Action produced no observations, nothing to report");
            return;
        }
        self.record(observations, action.context());
    }

    pub fn into_writer(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> MetricsRecorder for EmfLogger<W> {
    fn record(&self, observations: Vec<Observation>, context: &Context) {
        let document = EmbeddedMetric::encode(&observations, &self.namespace, context);
        let mut line = document.to_json_string();
        line.push('\n');

        let mut writer = match self.writer.lock() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writer.write_all(line.as_bytes()).and_then(|()| writer.flush()) {
            error!("Failed to write embedded metric document: {e}");
        }
    }
}
