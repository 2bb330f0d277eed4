// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants::DEFAULT_MAX_QUEUE_SIZE;
use crate::emf::EmbeddedMetric;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::Mutex;
use tracing::warn;

/// Transport envelope around one serialized document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub message: String,
}

impl LogEntry {
    pub fn new(timestamp: i64, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }

    /// Stamps the entry with the current time; the message text is fixed here,
    /// not at flush time.
    pub fn from_document(document: &EmbeddedMetric) -> Self {
        Self::new(Utc::now().timestamp_millis(), document.to_json_string())
    }
}

/// Buffering strategy sitting between producers and the flush timer.
///
/// `drain` must be indivisible with respect to concurrent `append` calls: an
/// entry appended while a drain is in progress lands either in that drain or
/// in the next one, never in both and never in neither.
pub trait Aggregator: Send + Sync + Debug {
    fn append_entry(&self, entry: LogEntry);

    /// Removes and returns every buffered entry in append order
    fn drain(&self) -> Vec<LogEntry>;

    /// Current contents without clearing
    fn snapshot(&self) -> Vec<LogEntry>;

    fn clear(&self);

    fn len(&self) -> usize;

    fn append(&self, document: &EmbeddedMetric) {
        self.append_entry(LogEntry::from_document(document));
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Collects raw entries without any size limit.
#[derive(Debug, Default)]
pub struct BasicAggregator {
    entries: Mutex<Vec<LogEntry>>,
}

impl BasicAggregator {
    pub fn new() -> Self {
        Self::default()
    }
}

#[allow(clippy::expect_used)]
impl Aggregator for BasicAggregator {
    fn append_entry(&self, entry: LogEntry) {
        self.entries.lock().expect("lock poisoned").push(entry);
    }

    fn drain(&self) -> Vec<LogEntry> {
        std::mem::take(&mut *self.entries.lock().expect("lock poisoned"))
    }

    fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.lock().expect("lock poisoned").clone()
    }

    fn clear(&self) {
        self.entries.lock().expect("lock poisoned").clear();
    }

    fn len(&self) -> usize {
        self.entries.lock().expect("lock poisoned").len()
    }
}

/// Collects raw entries up to a fixed capacity, evicting the oldest entry
/// once full so that appends keep succeeding under sustained volume.
#[derive(Debug)]
pub struct BoundedAggregator {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
}

impl Default for BoundedAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUEUE_SIZE)
    }
}

impl BoundedAggregator {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[allow(clippy::expect_used)]
impl Aggregator for BoundedAggregator {
    fn append_entry(&self, entry: LogEntry) {
        let mut entries = self.entries.lock().expect("lock poisoned");
        if entries.len() >= self.capacity {
            entries.pop_front();
            warn!(
                "Aggregator queue full ({} entries), dropping oldest entry",
                self.capacity
            );
        }
        entries.push_back(entry);
    }

    fn drain(&self) -> Vec<LogEntry> {
        let drained = std::mem::take(&mut *self.entries.lock().expect("lock poisoned"));
        drained.into()
    }

    fn snapshot(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .expect("lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    fn clear(&self) {
        self.entries.lock().expect("lock poisoned").clear();
    }

    fn len(&self) -> usize {
        self.entries.lock().expect("lock poisoned").len()
    }
}
