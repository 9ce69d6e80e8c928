//! Append-only security event log.

use super::patterns::ThreatIndicator;
use crate::constants::EVENT_PREVIEW_LENGTH;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// Kind of security event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventKind {
    /// Question rejected by the input guard
    BlockedQuestion,
    /// Schema rejected by the input guard
    BlockedSchema,
}

impl std::fmt::Display for SecurityEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityEventKind::BlockedQuestion => write!(f, "BLOCKED"),
            SecurityEventKind::BlockedSchema => write!(f, "BLOCKED_SCHEMA"),
        }
    }
}

/// A recorded rejection. Never mutated after creation.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    /// When the rejection happened
    pub timestamp: DateTime<Utc>,
    /// Event kind
    pub event_type: SecurityEventKind,
    /// First 100 characters of the offending text, "..." appended if cut
    pub content_preview: String,
    /// Detector hits
    pub indicators: Vec<ThreatIndicator>,
}

impl SecurityEvent {
    /// Create an event stamped with the current time.
    pub fn new(
        event_type: SecurityEventKind,
        content: &str,
        indicators: Vec<ThreatIndicator>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            content_preview: preview(content),
            indicators,
        }
    }
}

fn preview(content: &str) -> String {
    if content.chars().count() > EVENT_PREVIEW_LENGTH {
        let mut cut: String = content.chars().take(EVENT_PREVIEW_LENGTH).collect();
        cut.push_str("...");
        cut
    } else {
        content.to_string()
    }
}

/// Shared append-only event log.
///
/// Cloning the log shares the underlying storage. There is no eviction;
/// callers that need bounded memory rotate with [`SecurityEventLog::drain`].
#[derive(Debug, Clone, Default)]
pub struct SecurityEventLog {
    events: Arc<Mutex<Vec<SecurityEvent>>>,
}

impl SecurityEventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn append(&self, event: SecurityEvent) {
        self.events.lock().push(event);
    }

    /// Copy of every recorded event, oldest first.
    pub fn snapshot(&self) -> Vec<SecurityEvent> {
        self.events.lock().clone()
    }

    /// Remove and return every recorded event.
    pub fn drain(&self) -> Vec<SecurityEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Check if no events were recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}
