//! Bounded in-memory event log for the dashboard.
//!
//! A fixed-capacity FIFO of recent gateway events. Appends are O(1) and evict
//! the oldest entry on overflow; snapshots return newest-first. Every entry is
//! mirrored to `tracing` so the console stays the operational surface while
//! the ring feeds `GET /`.

use crate::clock::Clock;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Default ring capacity.
pub const DEFAULT_LOG_CAPACITY: usize = 500;

/// Longest body snippet stored in a log message, in characters.
const BODY_SNIPPET_MAX: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// Short category tag identifying which part of the gateway wrote the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogCategory {
    Register,
    Forward,
    Sweep,
    Reject,
    Error,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Register => "REGISTER",
            LogCategory::Forward => "FORWARD",
            LogCategory::Sweep => "SWEEP",
            LogCategory::Reject => "REJECT",
            LogCategory::Error => "ERROR",
        }
    }
}

/// Optional structured context attached to an entry.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LogContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub category: LogCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<LogContext>,
}

pub struct LogRing {
    clock: Arc<dyn Clock>,
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
}

impl LogRing {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_capacity(clock, DEFAULT_LOG_CAPACITY)
    }

    pub fn with_capacity(clock: Arc<dyn Clock>, capacity: usize) -> Self {
        Self {
            clock,
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    /// Appends an entry, evicting the oldest when the ring is full, and
    /// mirrors it to `tracing`.
    pub fn record(
        &self,
        level: LogLevel,
        category: LogCategory,
        message: impl Into<String>,
        context: Option<LogContext>,
    ) {
        let entry = LogEntry {
            timestamp: self.clock.wall(),
            level,
            category,
            message: message.into(),
            context,
        };

        match level {
            LogLevel::Info => tracing::info!(category = category.as_str(), "{}", entry.message),
            LogLevel::Warning => {
                tracing::warn!(category = category.as_str(), "{}", entry.message)
            }
            LogLevel::Error => tracing::error!(category = category.as_str(), "{}", entry.message),
        }

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Consistent copy of the ring, newest entry first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Truncates a body for inclusion in a log message.
pub fn body_snippet(body: &str) -> String {
    if body.chars().count() <= BODY_SNIPPET_MAX {
        body.to_string()
    } else {
        body.chars().take(BODY_SNIPPET_MAX).collect()
    }
}
