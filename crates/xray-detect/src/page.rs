use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::DetectError;

/// URL pattern marking active playback on the supported site.
pub const DEFAULT_WATCH_URL_PATTERN: &str = r"netflix\.com/watch";

/// Attribute selector of the element holding the displayed title.
pub const DEFAULT_TITLE_SELECTOR: &str = r#"[data-uia="video-title"]"#;

/// Serialized description of the watch page, as found in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchPageDef {
    /// Regex patterns matched against the full page URL.
    pub watch_url_patterns: Vec<String>,
    /// Selector passed to [`crate::PageHost::query_text`].
    pub title_selector: String,
}

impl Default for WatchPageDef {
    fn default() -> Self {
        Self {
            watch_url_patterns: vec![DEFAULT_WATCH_URL_PATTERN.to_string()],
            title_selector: DEFAULT_TITLE_SELECTOR.to_string(),
        }
    }
}

/// Compiled watch-page rules.
#[derive(Debug, Clone)]
pub struct WatchPage {
    url_patterns: Vec<Regex>,
    title_selector: String,
}

impl WatchPage {
    pub fn new(def: &WatchPageDef) -> Result<Self, DetectError> {
        if def.watch_url_patterns.is_empty() {
            return Err(DetectError::NoPatterns);
        }
        let title_selector = def.title_selector.trim();
        if title_selector.is_empty() {
            return Err(DetectError::EmptySelector);
        }

        let url_patterns = def
            .watch_url_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|source| DetectError::InvalidPattern {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            url_patterns,
            title_selector: title_selector.to_string(),
        })
    }

    /// Whether `url` is a playback page.
    pub fn is_watch_url(&self, url: &str) -> bool {
        self.url_patterns.iter().any(|re| re.is_match(url))
    }

    pub fn title_selector(&self) -> &str {
        &self.title_selector
    }
}

impl Default for WatchPage {
    fn default() -> Self {
        Self::new(&WatchPageDef::default()).expect("built-in watch page rules are valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_watch_url() {
        let page = WatchPage::default();
        assert!(page.is_watch_url("https://www.netflix.com/watch/81564905?trackId=1"));
        assert_eq!(page.title_selector(), r#"[data-uia="video-title"]"#);
    }

    #[test]
    fn test_default_rejects_browse_url() {
        let page = WatchPage::default();
        assert!(!page.is_watch_url("https://www.netflix.com/browse"));
        assert!(!page.is_watch_url("https://www.netflix.com/title/80057281"));
    }

    #[test]
    fn test_custom_patterns() {
        let def = WatchPageDef {
            watch_url_patterns: vec![r"example\.com/play/".into(), r"example\.com/live".into()],
            title_selector: "#title".into(),
        };
        let page = WatchPage::new(&def).unwrap();
        assert!(page.is_watch_url("https://example.com/play/42"));
        assert!(page.is_watch_url("https://example.com/live"));
        assert!(!page.is_watch_url("https://www.netflix.com/watch/1"));
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        let def = WatchPageDef {
            watch_url_patterns: vec!["netflix\\.com/(watch".into()],
            ..Default::default()
        };
        assert!(matches!(
            WatchPage::new(&def),
            Err(DetectError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_empty_selector_is_error() {
        let def = WatchPageDef {
            title_selector: "  ".into(),
            ..Default::default()
        };
        assert!(matches!(WatchPage::new(&def), Err(DetectError::EmptySelector)));
    }

    #[test]
    fn test_no_patterns_is_error() {
        let def = WatchPageDef {
            watch_url_patterns: vec![],
            ..Default::default()
        };
        assert!(matches!(WatchPage::new(&def), Err(DetectError::NoPatterns)));
    }
}
