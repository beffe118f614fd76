use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use xray_api::{LookupRequest, MetadataService};
use xray_core::dispatch::Dispatcher;
use xray_core::event_log::{EventEntry, EventLog, PipelineEvent};
use xray_core::models::{LastSeenTitle, PanelMessage, TitleEvent};
use xray_core::storage::KeyValueStore;
use xray_detect::RawTitleSample;
use xray_parse::PatternPriority;

use crate::RuntimeError;

const IDLE_POLL: Duration = Duration::from_millis(20);

/// Handle to the dispatcher actor.
///
/// The actor owns the [`Dispatcher`] and its store on a dedicated thread and
/// handles one command at a time. Lookups run as independent tasks on the
/// tokio runtime that spawned the actor and report back through the same
/// command channel.
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::UnboundedSender<DispatchCommand>,
}

enum DispatchCommand {
    Sample(RawTitleSample),
    LookupFinished {
        event: TitleEvent,
        result: Result<Value, String>,
    },
    GetLastSeen {
        reply: oneshot::Sender<Option<LastSeenTitle>>,
    },
    GetPanelData {
        reply: oneshot::Sender<Result<Option<PanelMessage>, RuntimeError>>,
    },
    GetEvents {
        reply: oneshot::Sender<Vec<EventEntry>>,
    },
    GetStats {
        reply: oneshot::Sender<LookupStats>,
    },
}

/// Lookup totals since the actor started. Unlike the event log these are
/// never evicted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupStats {
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl LookupStats {
    /// Lookups spawned but not yet reported back.
    pub fn pending(&self) -> u64 {
        self.dispatched - self.succeeded - self.failed
    }
}

impl DispatcherHandle {
    /// Start the actor. Must be called from within a tokio runtime.
    ///
    /// Returns the handle and the receiving end of the panel channel.
    pub fn spawn<S, M>(
        store: S,
        service: M,
        priority: PatternPriority,
    ) -> Result<(Self, mpsc::UnboundedReceiver<PanelMessage>), RuntimeError>
    where
        S: KeyValueStore + Send + 'static,
        M: MetadataService + 'static,
    {
        let runtime = Handle::try_current().map_err(|e| RuntimeError::Runtime(e.to_string()))?;
        let dispatcher =
            Dispatcher::load(store, priority).map_err(|e| RuntimeError::Storage(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (panel_tx, panel_rx) = mpsc::unbounded_channel();

        let actor = Actor {
            dispatcher,
            service: Arc::new(service),
            runtime,
            self_tx: tx.downgrade(),
            panel_tx,
            log: EventLog::new(),
            stats: LookupStats::default(),
        };

        std::thread::Builder::new()
            .name("dispatch-actor".into())
            .spawn(move || actor.run(rx))
            .map_err(|e| RuntimeError::Runtime(format!("failed to spawn dispatch thread: {e}")))?;

        Ok((Self { tx }, panel_rx))
    }

    /// Queue a sample without waiting. Returns `false` if the actor is gone.
    pub fn submit(&self, sample: RawTitleSample) -> bool {
        self.tx.send(DispatchCommand::Sample(sample)).is_ok()
    }

    /// A title handler forwarding every sample to the actor, suitable for
    /// [`xray_detect::TitleObserver::on_title_change`].
    pub fn sample_sink(&self) -> impl FnMut(&RawTitleSample) + Send + 'static {
        let handle = self.clone();
        move |sample| {
            if !handle.submit(sample.clone()) {
                warn!(title = %sample.text, "dispatcher closed, dropping title sample");
            }
        }
    }

    pub async fn last_seen(&self) -> Option<LastSeenTitle> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DispatchCommand::GetLastSeen { reply });
        rx.await.unwrap_or(None)
    }

    pub async fn panel_data(&self) -> Result<Option<PanelMessage>, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DispatchCommand::GetPanelData { reply });
        rx.await
            .unwrap_or_else(|_| Err(RuntimeError::Runtime("dispatch actor closed".into())))
    }

    pub async fn stats(&self) -> LookupStats {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DispatchCommand::GetStats { reply });
        rx.await.unwrap_or_default()
    }

    /// Resolve once every lookup dispatched so far has reported back.
    ///
    /// Panel messages of finished lookups are already queued on the panel
    /// channel when this returns. Callers bound the wait with a timeout.
    pub async fn wait_idle(&self) -> LookupStats {
        loop {
            let stats = self.stats().await;
            if stats.pending() == 0 || self.tx.is_closed() {
                return stats;
            }
            tokio::time::sleep(IDLE_POLL).await;
        }
    }

    /// Snapshot of the pipeline event log (newest last).
    pub async fn events(&self) -> Vec<EventEntry> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DispatchCommand::GetEvents { reply });
        rx.await.unwrap_or_default()
    }
}

/// Lookup key for a dispatched title.
pub fn lookup_request(event: &TitleEvent) -> LookupRequest {
    match event {
        TitleEvent::Movie { title } => LookupRequest::Movie {
            title: title.clone(),
        },
        TitleEvent::Episode {
            title,
            episode_title,
            ..
        } => LookupRequest::Episode {
            title: title.clone(),
            episode_title: episode_title.clone(),
        },
    }
}

struct Actor<S: KeyValueStore, M> {
    dispatcher: Dispatcher<S>,
    service: Arc<M>,
    runtime: Handle,
    self_tx: mpsc::WeakUnboundedSender<DispatchCommand>,
    panel_tx: mpsc::UnboundedSender<PanelMessage>,
    log: EventLog,
    stats: LookupStats,
}

impl<S, M> Actor<S, M>
where
    S: KeyValueStore,
    M: MetadataService + 'static,
{
    fn run(mut self, mut rx: mpsc::UnboundedReceiver<DispatchCommand>) {
        while let Some(cmd) = rx.blocking_recv() {
            match cmd {
                DispatchCommand::Sample(sample) => self.on_sample(sample),
                DispatchCommand::LookupFinished { event, result } => {
                    self.on_lookup_finished(event, result)
                }
                DispatchCommand::GetLastSeen { reply } => {
                    let _ = reply.send(self.dispatcher.last_seen().cloned());
                }
                DispatchCommand::GetPanelData { reply } => {
                    let _ = reply.send(
                        self.dispatcher
                            .panel_data()
                            .map_err(|e| RuntimeError::Storage(e.to_string())),
                    );
                }
                DispatchCommand::GetEvents { reply } => {
                    let _ = reply.send(self.log.snapshot());
                }
                DispatchCommand::GetStats { reply } => {
                    let _ = reply.send(self.stats);
                }
            }
        }
    }

    fn on_sample(&mut self, sample: RawTitleSample) {
        self.log.push(PipelineEvent::SampleReceived {
            raw_title: sample.text.clone(),
            page_url: sample.page_url.clone(),
        });

        let event = match self.dispatcher.accept(&sample) {
            Ok(Some(event)) => event,
            Ok(None) => {
                self.log.push(PipelineEvent::Duplicate {
                    raw_title: sample.text,
                });
                return;
            }
            Err(e) => {
                error!(title = %sample.text, "failed to record title: {e}");
                self.log.push(PipelineEvent::StoreError {
                    message: e.to_string(),
                });
                return;
            }
        };

        self.log.push(PipelineEvent::Dispatched {
            raw_title: sample.text,
            media_type: event.media_type(),
            lookup_title: event.title().to_string(),
        });
        self.stats.dispatched += 1;
        self.spawn_lookup(event);
    }

    fn spawn_lookup(&self, event: TitleEvent) {
        let service = Arc::clone(&self.service);
        let reply_tx = self.self_tx.clone();
        self.runtime.spawn(async move {
            let request = lookup_request(&event);
            let result = service.lookup(&request).await.map_err(|e| e.to_string());
            if let Some(tx) = reply_tx.upgrade() {
                let _ = tx.send(DispatchCommand::LookupFinished { event, result });
            }
        });
    }

    fn on_lookup_finished(&mut self, event: TitleEvent, result: Result<Value, String>) {
        let record = match result {
            Ok(record) => record,
            Err(message) => {
                self.stats.failed += 1;
                warn!(title = %event.title(), "metadata lookup failed: {message}");
                self.log.push(PipelineEvent::LookupFailed {
                    lookup_title: event.title().to_string(),
                    message,
                });
                return;
            }
        };

        self.stats.succeeded += 1;
        let message = PanelMessage::new(event.media_type(), record);
        if let Err(e) = self.dispatcher.record_panel(&message) {
            error!(title = %event.title(), "failed to persist panel data: {e}");
            self.log.push(PipelineEvent::StoreError {
                message: e.to_string(),
            });
        }

        info!(
            title = %event.title(),
            media_type = message.media_type.as_str(),
            "panel updated"
        );
        self.log.push(PipelineEvent::PanelUpdated {
            media_type: message.media_type,
        });
        let _ = self.panel_tx.send(message);
    }
}
