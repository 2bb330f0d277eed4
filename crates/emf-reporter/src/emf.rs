// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Encoder for the CloudWatch embedded metric format.
//!
//! An [`EmbeddedMetric`] is a structured log document that CloudWatch Logs
//! turns into metrics on ingestion. The root object carries an `_aws` metadata
//! block describing which root members are metric values and which are
//! dimensions, followed by the members themselves:
//!
//! ```json
//! {
//!   "_aws": {
//!     "Timestamp": 1690000000000,
//!     "CloudWatchMetrics": [
//!       { "Namespace": "WebsiteMetrics",
//!         "Dimensions": [["Endpoint"]],
//!         "Metrics": [{ "Name": "Latency", "Unit": "Milliseconds" }] }
//!     ]
//!   },
//!   "Latency": 200,
//!   "Endpoint": "/login"
//! }
//! ```
//!
//! Each observation produces its own directive with a single dimension set.
//! CloudWatch rejects dimension sets with more than 9 keys; that limit is the
//! caller's to respect and is not checked here.
//!
//! See <https://docs.aws.amazon.com/AmazonCloudWatch/latest/monitoring/CloudWatch_Embedded_Metric_Format_Specification.html>

use crate::constants::EMF_METADATA_KEY;
use crate::metric::{Context, Observation, Unit};
use chrono::Utc;
use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDefinition {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Unit")]
    pub unit: Unit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricDirective {
    pub namespace: String,
    pub dimensions: Vec<Vec<String>>,
    pub metrics: Vec<MetricDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricMetadata {
    /// Milliseconds since the Unix epoch
    #[serde(rename = "Timestamp")]
    pub timestamp: i64,
    #[serde(rename = "CloudWatchMetrics")]
    pub directives: Vec<MetricDirective>,
}

/// One encoded flush unit.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedMetric {
    metadata: MetricMetadata,
    /// Root members in write order: metric values, dimension values, context
    members: Map<String, Value>,
}

impl EmbeddedMetric {
    /// Encodes `observations` under `namespace`, merging `context` last.
    ///
    /// Colliding keys are resolved by the last write: a dimension overwrites an
    /// earlier metric of the same name, and context overwrites both.
    pub fn encode(observations: &[Observation], namespace: &str, context: &Context) -> Self {
        let timestamp = observations
            .first()
            .and_then(|observation| observation.timestamp)
            .unwrap_or_else(Utc::now)
            .timestamp_millis();

        let mut members = Map::new();
        let mut directives = Vec::with_capacity(observations.len());

        for observation in observations {
            members.insert(observation.name.clone(), metric_value(observation.value));

            let mut dimension_set = Vec::with_capacity(observation.dimensions.len());
            for (key, value) in &observation.dimensions {
                dimension_set.push(key.clone());
                members.insert(key.clone(), Value::String(value.clone()));
            }

            directives.push(MetricDirective {
                namespace: observation
                    .namespace
                    .clone()
                    .unwrap_or_else(|| namespace.to_string()),
                dimensions: vec![dimension_set],
                metrics: vec![MetricDefinition {
                    name: observation.name.clone(),
                    unit: observation.unit,
                }],
            });
        }

        for (key, value) in context {
            members.insert(key.clone(), value.clone());
        }

        Self {
            metadata: MetricMetadata {
                timestamp,
                directives,
            },
            members,
        }
    }

    pub fn metadata(&self) -> &MetricMetadata {
        &self.metadata
    }

    pub fn timestamp(&self) -> i64 {
        self.metadata.timestamp
    }

    /// Looks up a root member (metric value, dimension value or context entry)
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.members.get(key)
    }

    /// The full document with `_aws` as its first key
    pub fn to_value(&self) -> Value {
        let mut document = Map::with_capacity(self.members.len() + 1);
        document.insert(EMF_METADATA_KEY.to_string(), metadata_value(&self.metadata));
        for (key, value) in &self.members {
            document.insert(key.clone(), value.clone());
        }
        Value::Object(document)
    }

    pub fn to_json_string(&self) -> String {
        self.to_value().to_string()
    }
}

impl Serialize for EmbeddedMetric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

fn metadata_value(metadata: &MetricMetadata) -> Value {
    // Serializing plain structs of strings and integers cannot fail
    serde_json::to_value(metadata).unwrap_or(Value::Null)
}

// Integral values are written without a fractional part so `200.0` reads as `200`.
fn metric_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        return Value::Number(Number::from(value as i64));
    }
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}
