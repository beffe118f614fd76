use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use xray_detect::RawTitleSample;
use xray_parse::ParsedTitle;

/// Store key holding the [`LastSeenTitle`].
pub const LAST_SEEN_KEY: &str = "currentVideo";

/// Store key holding the last [`PanelMessage`].
pub const PANEL_DATA_KEY: &str = "panelData";

/// The raw title that last triggered a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastSeenTitle {
    #[serde(rename = "title")]
    pub raw_text: String,
    /// Observation time in epoch milliseconds.
    pub timestamp: i64,
    pub url: String,
}

impl From<&RawTitleSample> for LastSeenTitle {
    fn from(sample: &RawTitleSample) -> Self {
        Self {
            raw_text: sample.text.clone(),
            timestamp: sample.observed_at.timestamp_millis(),
            url: sample.page_url.clone(),
        }
    }
}

/// Message sent from the dispatcher to the lookup stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TitleEvent {
    Movie {
        title: String,
    },
    Episode {
        title: String,
        #[serde(rename = "episodeNumber")]
        episode_number: u32,
        #[serde(rename = "episodeTitle")]
        episode_title: String,
        #[serde(
            rename = "seasonNumber",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        season_number: Option<u32>,
    },
}

impl TitleEvent {
    pub fn media_type(&self) -> MediaType {
        match self {
            Self::Movie { .. } => MediaType::Movie,
            Self::Episode { .. } => MediaType::TvShow,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Movie { title } | Self::Episode { title, .. } => title,
        }
    }
}

impl From<ParsedTitle> for TitleEvent {
    fn from(parsed: ParsedTitle) -> Self {
        match parsed {
            ParsedTitle::Movie { title } => Self::Movie { title },
            ParsedTitle::Episode {
                series_title,
                episode_number,
                episode_title,
                season_number,
            } => Self::Episode {
                title: series_title,
                episode_number,
                episode_title,
                season_number,
            },
        }
    }
}

/// Tag telling the panel how to lay out the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "movie")]
    Movie,
    #[serde(rename = "tvShow")]
    TvShow,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::TvShow => "tvShow",
        }
    }
}

/// Render-ready payload: the metadata record, untouched, plus its media type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelMessage {
    pub media_type: MediaType,
    pub record: Value,
}

impl PanelMessage {
    pub fn new(media_type: MediaType, record: Value) -> Self {
        Self { media_type, record }
    }

    /// The `data` object seen by the panel. Object records are flattened
    /// next to `mediaType`; anything else is nested under `record`.
    pub fn data(&self) -> Value {
        match &self.record {
            Value::Object(fields) => {
                let mut data = fields.clone();
                data.insert("mediaType".into(), json!(self.media_type.as_str()));
                Value::Object(data)
            }
            other => json!({
                "mediaType": self.media_type.as_str(),
                "record": other,
            }),
        }
    }

    /// Full `update_panel` envelope.
    pub fn to_wire(&self) -> Value {
        json!({
            "type": "update_panel",
            "data": self.data(),
        })
    }
}
