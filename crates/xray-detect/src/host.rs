//! The page the observer runs in.
//!
//! The host owns the real DOM and delivers structural mutation batches by
//! calling [`crate::TitleObserver::handle_mutations`]. No navigation event is
//! assumed; URL changes are found by comparing `location_href()` between
//! batches.

use std::collections::HashSet;

use crate::page::DEFAULT_TITLE_SELECTOR;

/// The two independent subtree observations the observer registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchKind {
    /// Re-reads the page URL on every batch.
    Url,
    /// Looks for the title element; only enabled on watch pages.
    Title,
}

/// One mutation record (child-list change somewhere in the document).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationRecord {
    pub added_nodes: usize,
    pub removed_nodes: usize,
}

/// Records delivered together by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationBatch {
    pub records: Vec<MutationRecord>,
}

impl MutationBatch {
    pub fn new(records: Vec<MutationRecord>) -> Self {
        Self { records }
    }

    /// A batch with a single insertion record.
    pub fn single() -> Self {
        Self::new(vec![MutationRecord {
            added_nodes: 1,
            removed_nodes: 0,
        }])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Nodes added or removed across all records.
    pub fn changed_nodes(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.added_nodes + r.removed_nodes)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Access to the page DOM and location.
pub trait PageHost {
    /// Current navigation URL.
    fn location_href(&self) -> String;

    /// Text content of the single element matching `selector`, or `None`
    /// when no such element exists.
    fn query_text(&self, selector: &str) -> Option<String>;

    /// Register a child-list/subtree observation on the document root.
    fn observe(&mut self, kind: WatchKind);

    /// Drop a registration made with [`PageHost::observe`].
    fn disconnect(&mut self, kind: WatchKind);
}

/// In-memory page driven by explicit navigation and title updates.
///
/// Used to replay recorded titles through the observer and in tests.
#[derive(Debug, Clone)]
pub struct ScriptedPage {
    href: String,
    title_selector: String,
    title_text: Option<String>,
    active: HashSet<WatchKind>,
    observe_calls: usize,
}

impl ScriptedPage {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            title_selector: DEFAULT_TITLE_SELECTOR.to_string(),
            title_text: None,
            active: HashSet::new(),
            observe_calls: 0,
        }
    }

    /// Serve the title element under a different selector.
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.title_selector = selector.into();
        self
    }

    pub fn navigate(&mut self, href: impl Into<String>) {
        self.href = href.into();
    }

    /// Replace the title element's text; `None` removes the element.
    pub fn set_title(&mut self, text: Option<&str>) {
        self.title_text = text.map(str::to_string);
    }

    pub fn is_observing(&self, kind: WatchKind) -> bool {
        self.active.contains(&kind)
    }

    /// Total number of `observe` calls received, duplicates included.
    pub fn observe_calls(&self) -> usize {
        self.observe_calls
    }
}

impl PageHost for ScriptedPage {
    fn location_href(&self) -> String {
        self.href.clone()
    }

    fn query_text(&self, selector: &str) -> Option<String> {
        if selector == self.title_selector {
            self.title_text.clone()
        } else {
            None
        }
    }

    fn observe(&mut self, kind: WatchKind) {
        self.observe_calls += 1;
        self.active.insert(kind);
    }

    fn disconnect(&mut self, kind: WatchKind) {
        self.active.remove(&kind);
    }
}
