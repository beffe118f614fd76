//! The metadata service seam.
//!
//! The dispatcher only needs to hand the service a lookup key and get an
//! opaque JSON record back; the record is forwarded to the panel unchanged.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A metadata lookup backend.
pub trait MetadataService: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the enrichment record for a title.
    fn lookup(
        &self,
        request: &LookupRequest,
    ) -> impl Future<Output = Result<Value, Self::Error>> + Send;
}

/// Key of a metadata lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LookupRequest {
    Movie {
        title: String,
    },
    Episode {
        title: String,
        #[serde(rename = "episodeTitle")]
        episode_title: String,
    },
}

impl LookupRequest {
    /// Path segment of the endpoint serving this request.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Movie { .. } => "movie",
            Self::Episode { .. } => "episode",
        }
    }

    /// Query string parameters.
    pub fn query(&self) -> Vec<(&'static str, &str)> {
        match self {
            Self::Movie { title } => vec![("title", title.as_str())],
            Self::Episode {
                title,
                episode_title,
            } => vec![
                ("title", title.as_str()),
                ("episodeTitle", episode_title.as_str()),
            ],
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Movie { title } | Self::Episode { title, .. } => title,
        }
    }
}
