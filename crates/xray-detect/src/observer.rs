use tracing::{debug, trace};

use crate::host::{MutationBatch, PageHost, WatchKind};
use crate::page::WatchPage;
use crate::RawTitleSample;

/// Token returned by [`TitleObserver::on_title_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type TitleHandler = Box<dyn FnMut(&RawTitleSample) + Send>;

/// Reports the displayed title of a single-page streaming site.
///
/// Two watches run over the document subtree. The URL watch lives for the
/// whole started period and toggles the title watch whenever the page URL
/// enters or leaves a watch page. The title watch reads the title element
/// once per mutation batch and notifies every handler with its trimmed text.
/// Consecutive identical titles are reported again; deduplication belongs to
/// the dispatcher.
pub struct TitleObserver<H: PageHost> {
    host: H,
    page: WatchPage,
    handlers: Vec<(HandlerId, TitleHandler)>,
    next_handler: u64,
    started: bool,
    title_watch: bool,
    last_url: Option<String>,
}

impl<H: PageHost> TitleObserver<H> {
    pub fn new(host: H, page: WatchPage) -> Self {
        Self {
            host,
            page,
            handlers: Vec::new(),
            next_handler: 0,
            started: false,
            title_watch: false,
            last_url: None,
        }
    }

    /// Begin watching. Has no effect when already started.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.host.observe(WatchKind::Url);

        let url = self.host.location_href();
        if self.page.is_watch_url(&url) {
            self.enable_title_watch();
        }
        debug!(url = %url, title_watch = self.title_watch, "title observer started");
        self.last_url = Some(url);
    }

    /// Stop watching and release both registrations. Has no effect when
    /// already stopped.
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        self.disable_title_watch();
        self.host.disconnect(WatchKind::Url);
        self.started = false;
        self.last_url = None;
        debug!("title observer stopped");
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_title_watch_enabled(&self) -> bool {
        self.title_watch
    }

    /// Register a handler. Handlers run in registration order.
    pub fn on_title_change<F>(&mut self, handler: F) -> HandlerId
    where
        F: FnMut(&RawTitleSample) + Send + 'static,
    {
        let id = HandlerId(self.next_handler);
        self.next_handler += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Remove a handler. Unknown ids are ignored.
    pub fn off_title_change(&mut self, id: HandlerId) {
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
    }

    /// Process one batch of structural mutations delivered by the host.
    pub fn handle_mutations(&mut self, batch: &MutationBatch) {
        if !self.started {
            return;
        }
        self.check_url();
        if self.title_watch {
            self.check_title(batch);
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    fn check_url(&mut self) {
        let url = self.host.location_href();
        if self.last_url.as_deref() == Some(url.as_str()) {
            return;
        }

        if self.page.is_watch_url(&url) {
            self.enable_title_watch();
        } else {
            self.disable_title_watch();
        }
        debug!(url = %url, title_watch = self.title_watch, "page URL changed");
        self.last_url = Some(url);
    }

    /// The URL is read again here. With push delivery `check_url` has just
    /// run on the same batch, so this guard only fires for hosts whose
    /// location moves between the two reads.
    fn check_title(&mut self, batch: &MutationBatch) {
        let url = self.host.location_href();
        if !self.page.is_watch_url(&url) {
            trace!(url = %url, "ignoring batch outside watch page");
            return;
        }

        let Some(text) = self.host.query_text(self.page.title_selector()) else {
            trace!(
                records = batch.len(),
                nodes = batch.changed_nodes(),
                "title element absent"
            );
            return;
        };
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let sample = RawTitleSample::new(text, url);
        trace!(title = %sample.text, handlers = self.handlers.len(), "notifying title handlers");
        for (_, handler) in &mut self.handlers {
            handler(&sample);
        }
    }

    fn enable_title_watch(&mut self) {
        if !self.title_watch {
            self.host.observe(WatchKind::Title);
            self.title_watch = true;
        }
    }

    fn disable_title_watch(&mut self) {
        if self.title_watch {
            self.host.disconnect(WatchKind::Title);
            self.title_watch = false;
        }
    }
}

impl<H: PageHost> Drop for TitleObserver<H> {
    fn drop(&mut self) {
        self.stop();
    }
}
