use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::models::MediaType;

/// Maximum number of events retained in the ring buffer.
const EVENT_LOG_CAPACITY: usize = 200;

/// A typed event from the dispatch pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    SampleReceived {
        raw_title: String,
        page_url: String,
    },
    Duplicate {
        raw_title: String,
    },
    Dispatched {
        raw_title: String,
        media_type: MediaType,
        lookup_title: String,
    },
    LookupFailed {
        lookup_title: String,
        message: String,
    },
    PanelUpdated {
        media_type: MediaType,
    },
    StoreError {
        message: String,
    },
}

/// A timestamped event entry.
pub type EventEntry = (DateTime<Utc>, PipelineEvent);

/// Bounded ring buffer of pipeline events.
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<EventEntry>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(EVENT_LOG_CAPACITY),
        }
    }

    /// Push a new event, evicting the oldest if at capacity.
    pub fn push(&mut self, event: PipelineEvent) {
        if self.entries.len() >= EVENT_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back((Utc::now(), event));
    }

    /// Return a snapshot of all entries (newest last).
    pub fn snapshot(&self) -> Vec<EventEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
