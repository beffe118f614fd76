use std::fmt;

use serde::{Deserialize, Serialize};

/// Structured form of a displayed title, used as the metadata lookup key.
///
/// String fields are always trimmed, and `title` / `series_title` are never
/// empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ParsedTitle {
    Movie {
        title: String,
    },
    Episode {
        #[serde(rename = "seriesTitle")]
        series_title: String,
        /// Episode number (>= 1).
        #[serde(rename = "episodeNumber")]
        episode_number: u32,
        /// Text after the episode marker. May be empty.
        #[serde(rename = "episodeTitle")]
        episode_title: String,
        /// Season number, only when the raw text encoded one.
        #[serde(
            rename = "seasonNumber",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        season_number: Option<u32>,
    },
}

impl ParsedTitle {
    /// The title the metadata service is queried with: the movie title or
    /// the series title.
    pub fn lookup_title(&self) -> &str {
        match self {
            Self::Movie { title } => title,
            Self::Episode { series_title, .. } => series_title,
        }
    }
}

impl fmt::Display for ParsedTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie { title } => write!(f, "{title}"),
            Self::Episode {
                series_title,
                episode_number,
                episode_title,
                season_number,
            } => {
                write!(f, "{series_title} ")?;
                if let Some(season) = season_number {
                    write!(f, "S{season:02}")?;
                }
                write!(f, "E{episode_number:02}")?;
                if !episode_title.is_empty() {
                    write!(f, " - {episode_title}")?;
                }
                Ok(())
            }
        }
    }
}
