pub mod host;
pub mod observer;
pub mod page;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use host::{MutationBatch, MutationRecord, PageHost, ScriptedPage, WatchKind};
pub use observer::{HandlerId, TitleObserver};
pub use page::{WatchPage, WatchPageDef};

/// A title candidate read from the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTitleSample {
    /// Trimmed text content of the title element.
    pub text: String,
    pub observed_at: DateTime<Utc>,
    pub page_url: String,
}

impl RawTitleSample {
    pub fn new(text: impl Into<String>, page_url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            observed_at: Utc::now(),
            page_url: page_url.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("invalid watch URL pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("no watch URL patterns configured")]
    NoPatterns,

    #[error("title selector is empty")]
    EmptySelector,
}
