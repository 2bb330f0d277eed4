// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, sync::Arc};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use emf_reporter::{
    aggregator::BoundedAggregator,
    config::ReporterConfig,
    metric::Context,
    recorder::MetricsRecorder,
    reporter::SessionReporter,
    timer::Timer,
};

const DEFAULT_SESSION_LABEL: &str = "session";
const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_LOG_LEVEL: &str = "info";

fn env_filter(log_level: &str) -> String {
    format!("h2=off,hyper=off,rustls=off,{log_level}")
}

#[tokio::main]
pub async fn main() {
    let config = ReporterConfig::from_env();
    let log_level = config
        .as_ref()
        .map_or(DEFAULT_LOG_LEVEL, |config| config.log_level.as_str());

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter(log_level))
                .expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("{e}. Shutting down session reporter.");
            return;
        }
    };

    let session_label = env::args()
        .nth(1)
        .or_else(|| env::var("EMF_SESSION_LABEL").ok())
        .unwrap_or(DEFAULT_SESSION_LABEL.to_string());

    let reporter = match SessionReporter::new(config, Arc::new(BoundedAggregator::default())) {
        Ok(reporter) => reporter,
        Err(e) => {
            error!("{e}. Shutting down session reporter.");
            return;
        }
    };

    let Some(handle) = reporter.start_reporting(&session_label).await else {
        error!("Unable to start reporting. Shutting down session reporter.");
        return;
    };
    info!(
        "Reporting session {session_label} to {}",
        handle.log_stream_name()
    );

    let session = Timer::start();
    reporter.add_count("CurrentStreams", 1.0, &Context::new());

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {e}");
    }

    handle.stop_reporting();
    reporter.add_time("SessionLength", &session, &Context::new());

    // Stopping never flushes, ship what is left before exiting
    if timeout(SHUTDOWN_FLUSH_TIMEOUT, reporter.flush()).await.is_err() {
        warn!("Final flush did not complete in time, buffered metrics were dropped");
    }
    info!("Session reporter stopped");
}
