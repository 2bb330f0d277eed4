// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::cloudwatch::AppendMode;
use crate::constants::{
    DEFAULT_FLUSH_INTERVAL_SECS, DEFAULT_LOGS_ENDPOINT, DEFAULT_LOG_GROUP, DEFAULT_NAMESPACE,
    DEFAULT_REQUEST_TIMEOUT,
};
use crate::errors::ConfigError;
use crate::retry::RetryPolicy;
use crate::util::{is_valid_log_group_name, parse_metric_namespace};
use std::env;
use std::time::Duration;

/// Configuration for a session reporter
#[derive(Debug, Clone, PartialEq)]
pub struct ReporterConfig {
    /// CloudWatch Logs compatible endpoint receiving the JSON requests
    pub logs_endpoint: String,
    /// Log group holding one stream per reporting session
    pub log_group_name: String,
    /// Seconds between two flushes
    pub flush_interval_secs: u64,
    /// Namespace of observations that do not carry their own
    pub namespace: String,
    /// Timeout of a single HTTP request
    pub request_timeout: Duration,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
    pub retry_policy: RetryPolicy,
    pub append_mode: AppendMode,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            logs_endpoint: DEFAULT_LOGS_ENDPOINT.to_string(),
            log_group_name: DEFAULT_LOG_GROUP.to_string(),
            flush_interval_secs: DEFAULT_FLUSH_INTERVAL_SECS,
            namespace: DEFAULT_NAMESPACE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            https_proxy: None,
            retry_policy: RetryPolicy::default(),
            append_mode: AppendMode::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ReporterConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from any variable source. Unset or unparseable
    /// numeric values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let logs_endpoint = lookup("EMF_LOGS_ENDPOINT").unwrap_or(defaults.logs_endpoint);
        let log_group_name = lookup("EMF_LOG_GROUP").unwrap_or(defaults.log_group_name);
        let flush_interval_secs = lookup("EMF_FLUSH_INTERVAL")
            .and_then(|val| val.trim().parse::<u64>().ok())
            .unwrap_or(defaults.flush_interval_secs);
        let namespace = match lookup("EMF_NAMESPACE") {
            Some(val) => parse_metric_namespace(&val).ok_or_else(|| {
                ConfigError::Invalid(format!("EMF_NAMESPACE '{val}' is not a valid namespace"))
            })?,
            None => defaults.namespace,
        };
        let request_timeout = lookup("EMF_REQUEST_TIMEOUT_SECS")
            .and_then(|val| val.trim().parse::<u64>().ok())
            .map_or(defaults.request_timeout, Duration::from_secs);
        let https_proxy = lookup("HTTPS_PROXY").filter(|val| !val.trim().is_empty());
        let log_level = lookup("EMF_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or(defaults.log_level);

        let config = Self {
            logs_endpoint,
            log_group_name,
            flush_interval_secs,
            namespace,
            request_timeout,
            https_proxy,
            log_level,
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "flush interval must be greater than 0".to_string(),
            ));
        }

        if self.logs_endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "EMF_LOGS_ENDPOINT cannot be empty".to_string(),
            ));
        }

        if !is_valid_log_group_name(&self.log_group_name) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log group name '{}'",
                self.log_group_name
            )));
        }

        if parse_metric_namespace(&self.namespace).is_none() {
            return Err(ConfigError::Invalid(format!(
                "Invalid metric namespace '{}'",
                self.namespace
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request timeout must be greater than 0".to_string(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }
}
