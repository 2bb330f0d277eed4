// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Embedded metric format reporting for CloudWatch.
//!
//! Producers record [`metric::Observation`]s through a [`reporter::SessionReporter`]
//! (buffered, shipped to one log stream per session on a timer) or through a
//! [`lambda::EmfLogger`] (written straight to stdout). Observations are encoded
//! into [`emf::EmbeddedMetric`] documents which CloudWatch Logs turns into
//! metrics on ingestion.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod action;
pub mod aggregator;
pub mod cloudwatch;
pub mod config;
pub mod constants;
pub mod emf;
pub mod errors;
pub mod http;
pub mod lambda;
pub mod metric;
pub mod recorder;
pub mod reporter;
pub mod retry;
pub mod timer;
pub mod util;

#[cfg(test)]
pub(crate) mod test_support;
