use tracing::{debug, info, warn};
use xray_detect::RawTitleSample;
use xray_parse::{parse_with, PatternPriority};

use crate::error::XrayError;
use crate::models::{LastSeenTitle, PanelMessage, TitleEvent, LAST_SEEN_KEY, PANEL_DATA_KEY};
use crate::storage::KeyValueStore;

/// Turns raw title samples into at most one lookup event per title change.
///
/// Deduplication compares raw text against the last dispatched raw text, so
/// whitespace variants of the same title are dispatched again. The last-seen
/// record is written through to the store before the event is produced.
pub struct Dispatcher<S: KeyValueStore> {
    store: S,
    last_seen: Option<LastSeenTitle>,
    priority: PatternPriority,
}

impl<S: KeyValueStore> Dispatcher<S> {
    /// Create a dispatcher, reading the persisted last-seen title once.
    ///
    /// An unreadable record is treated as absent.
    pub fn load(store: S, priority: PatternPriority) -> Result<Self, XrayError> {
        let last_seen = match store.get_json::<LastSeenTitle>(LAST_SEEN_KEY) {
            Ok(last) => last,
            Err(XrayError::Encoding(e)) => {
                warn!(error = %e, "discarding unreadable last-seen title");
                None
            }
            Err(e) => return Err(e),
        };
        if let Some(last) = &last_seen {
            debug!(title = %last.raw_text, "restored last-seen title");
        }

        Ok(Self {
            store,
            last_seen,
            priority,
        })
    }

    /// Handle one sample. Returns `None` when its raw text matches the last
    /// dispatched title.
    pub fn accept(&mut self, sample: &RawTitleSample) -> Result<Option<TitleEvent>, XrayError> {
        if self
            .last_seen
            .as_ref()
            .is_some_and(|last| last.raw_text == sample.text)
        {
            debug!(title = %sample.text, "title already dispatched");
            return Ok(None);
        }

        let record = LastSeenTitle::from(sample);
        self.store.set_json(LAST_SEEN_KEY, &record)?;
        self.last_seen = Some(record);

        let parsed = parse_with(&sample.text, self.priority);
        info!(
            raw = %sample.text,
            parsed = %parsed,
            lookup = parsed.lookup_title(),
            "dispatching title change"
        );
        Ok(Some(TitleEvent::from(parsed)))
    }

    pub fn last_seen(&self) -> Option<&LastSeenTitle> {
        self.last_seen.as_ref()
    }

    /// Persist the payload last forwarded to the panel.
    pub fn record_panel(&self, message: &PanelMessage) -> Result<(), XrayError> {
        self.store.set_json(PANEL_DATA_KEY, message)
    }

    pub fn panel_data(&self) -> Result<Option<PanelMessage>, XrayError> {
        self.store.get_json(PANEL_DATA_KEY)
    }
}
