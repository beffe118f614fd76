mod dispatcher;

use std::time::Duration;

use xray_api::MetadataClient;
use xray_core::config::AppConfig;
use xray_core::storage::SqliteStore;
use xray_detect::{HandlerId, PageHost, TitleObserver};

pub use dispatcher::{lookup_request, DispatcherHandle, LookupStats};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("api error: {0}")]
    Api(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Open the configured SQLite store, creating its directory if needed.
pub fn open_store(config: &AppConfig) -> Result<SqliteStore, RuntimeError> {
    let path = config
        .ensure_db_path()
        .map_err(|e| RuntimeError::Config(e.to_string()))?;
    SqliteStore::open(&path).map_err(|e| RuntimeError::Storage(e.to_string()))
}

/// Build the metadata client from the `[metadata]` section.
pub fn metadata_client(config: &AppConfig) -> Result<MetadataClient, RuntimeError> {
    MetadataClient::new(
        &config.metadata.base_url,
        config.metadata.api_key.clone(),
        Duration::from_secs(config.metadata.timeout_secs),
    )
    .map_err(|e| RuntimeError::Api(e.to_string()))
}

/// Start the dispatcher with the configured store, client and parser order.
pub fn spawn_from_config(
    config: &AppConfig,
) -> Result<
    (
        DispatcherHandle,
        tokio::sync::mpsc::UnboundedReceiver<xray_core::models::PanelMessage>,
    ),
    RuntimeError,
> {
    let store = open_store(config)?;
    let client = metadata_client(config)?;
    DispatcherHandle::spawn(store, client, config.parser.pattern_priority)
}

/// Forward every title the observer reports to the dispatcher.
pub fn attach<H: PageHost>(observer: &mut TitleObserver<H>, handle: &DispatcherHandle) -> HandlerId {
    observer.on_title_change(handle.sample_sink())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use serde_json::{json, Value};
    use tokio::sync::mpsc::UnboundedReceiver;

    use xray_api::{LookupRequest, MetadataService};
    use xray_core::event_log::PipelineEvent;
    use xray_core::models::{MediaType, PanelMessage, LAST_SEEN_KEY};
    use xray_core::storage::{KeyValueStore, MemoryStore};
    use xray_detect::{MutationBatch, RawTitleSample, ScriptedPage, WatchPage};
    use xray_parse::PatternPriority;

    use super::*;

    const WATCH_URL: &str = "https://www.netflix.com/watch/80057281";

    /// Answers with a record echoing the request, or fails for titles
    /// listed in `failing`.
    #[derive(Clone, Default)]
    struct FakeService {
        calls: Arc<Mutex<Vec<LookupRequest>>>,
        failing: Vec<String>,
        delay: Duration,
    }

    impl MetadataService for FakeService {
        type Error = std::io::Error;

        async fn lookup(&self, request: &LookupRequest) -> Result<Value, std::io::Error> {
            self.calls.lock().unwrap().push(request.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.iter().any(|t| t == request.title()) {
                return Err(std::io::Error::other("connection reset"));
            }
            Ok(json!({ "lookup": request, "cast": [] }))
        }
    }

    fn spawn(service: FakeService) -> (DispatcherHandle, UnboundedReceiver<PanelMessage>) {
        DispatcherHandle::spawn(MemoryStore::new(), service, PatternPriority::default()).unwrap()
    }

    async fn next_panel(rx: &mut UnboundedReceiver<PanelMessage>) -> PanelMessage {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("panel message within timeout")
            .expect("panel channel open")
    }

    async fn wait_for<F>(handle: &DispatcherHandle, pred: F)
    where
        F: Fn(&PipelineEvent) -> bool,
    {
        for _ in 0..100 {
            if handle.events().await.iter().any(|(_, e)| pred(e)) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("expected pipeline event not observed");
    }

    fn sample(text: &str) -> RawTitleSample {
        RawTitleSample::new(text, WATCH_URL)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_episode_reaches_panel() {
        let service = FakeService::default();
        let (handle, mut panel) = spawn(service.clone());

        assert!(handle.submit(sample("Band of BrothersE7The Breaking Point")));
        let message = next_panel(&mut panel).await;

        assert_eq!(message.media_type, MediaType::TvShow);
        assert_eq!(message.record["lookup"]["title"], "Band of Brothers");
        assert_eq!(message.record["lookup"]["episodeTitle"], "The Breaking Point");
        assert_eq!(message.data()["mediaType"], "tvShow");
        assert_eq!(
            *service.calls.lock().unwrap(),
            vec![LookupRequest::Episode {
                title: "Band of Brothers".into(),
                episode_title: "The Breaking Point".into(),
            }]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_duplicates_are_looked_up_once() {
        let service = FakeService::default();
        let (handle, mut panel) = spawn(service.clone());

        for raw in ["Show A", "Show A", "Show B", "Show A"] {
            handle.submit(sample(raw));
        }
        for _ in 0..3 {
            next_panel(&mut panel).await;
        }

        let events = handle.events().await;
        let dispatched = events
            .iter()
            .filter(|(_, e)| matches!(e, PipelineEvent::Dispatched { .. }))
            .count();
        let duplicates = events
            .iter()
            .filter(|(_, e)| matches!(e, PipelineEvent::Duplicate { .. }))
            .count();
        assert_eq!(dispatched, 3);
        assert_eq!(duplicates, 1);
        assert_eq!(service.calls.lock().unwrap().len(), 3);
        assert_eq!(handle.last_seen().await.unwrap().raw_text, "Show A");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_lookup_is_dropped() {
        let service = FakeService {
            failing: vec!["Heat".into()],
            ..Default::default()
        };
        let (handle, mut panel) = spawn(service);

        handle.submit(sample("Heat"));
        wait_for(&handle, |e| matches!(e, PipelineEvent::LookupFailed { .. })).await;
        assert!(panel.try_recv().is_err());
        assert!(handle.panel_data().await.unwrap().is_none());

        // The next distinct title still goes through.
        handle.submit(sample("Margin Call"));
        let message = next_panel(&mut panel).await;
        assert_eq!(message.media_type, MediaType::Movie);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_panel_data_is_persisted() {
        let (handle, mut panel) = spawn(FakeService::default());

        handle.submit(sample("Margin Call"));
        let message = next_panel(&mut panel).await;

        assert_eq!(handle.panel_data().await.unwrap(), Some(message));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_restored_last_seen_suppresses_dispatch() {
        let store = MemoryStore::new();
        store
            .set(
                LAST_SEEN_KEY,
                r#"{"title":"Margin Call","timestamp":0,"url":"https://www.netflix.com/watch/1"}"#,
            )
            .unwrap();
        let service = FakeService::default();
        let (handle, _panel) =
            DispatcherHandle::spawn(store, service.clone(), PatternPriority::default()).unwrap();

        handle.submit(sample("Margin Call"));
        wait_for(&handle, |e| matches!(e, PipelineEvent::Duplicate { .. })).await;
        assert!(service.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_observer_to_panel() {
        let (handle, mut panel) = spawn(FakeService::default());

        let mut observer = TitleObserver::new(ScriptedPage::new(WATCH_URL), WatchPage::default());
        attach(&mut observer, &handle);
        observer.start();

        observer.host_mut().set_title(Some("Margin Call"));
        observer.handle_mutations(&MutationBatch::single());
        observer.handle_mutations(&MutationBatch::single());

        let message = next_panel(&mut panel).await;
        assert_eq!(message.record["lookup"]["title"], "Margin Call");

        // Leaving the watch page silences the observer.
        observer.host_mut().navigate("https://www.netflix.com/browse");
        observer.host_mut().set_title(Some("Heat"));
        observer.handle_mutations(&MutationBatch::single());

        let events = handle.events().await;
        let received = events
            .iter()
            .filter(|(_, e)| matches!(e, PipelineEvent::SampleReceived { .. }))
            .count();
        assert_eq!(received, 2);
        assert_eq!(handle.last_seen().await.unwrap().raw_text, "Margin Call");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_wait_idle_outlasts_event_log() {
        let service = FakeService {
            failing: vec!["Title 7".into()],
            delay: Duration::from_millis(200),
            ..Default::default()
        };
        let (handle, mut panel) = spawn(service);

        // Three log entries per title, well past the log's capacity.
        for n in 0..150 {
            handle.submit(sample(&format!("Title {n}")));
        }
        let stats = tokio::time::timeout(Duration::from_secs(10), handle.wait_idle())
            .await
            .expect("lookups settle within timeout");

        assert_eq!(
            stats,
            LookupStats {
                dispatched: 150,
                succeeded: 149,
                failed: 1,
            }
        );
        assert_eq!(stats.pending(), 0);
        assert_eq!(handle.events().await.len(), 200);

        let mut received = 0;
        while panel.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 149);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stats_start_empty() {
        let (handle, _panel) = spawn(FakeService::default());
        assert_eq!(handle.stats().await, LookupStats::default());
        assert_eq!(handle.wait_idle().await.pending(), 0);
    }

    #[test]
    fn test_spawn_outside_runtime_fails() {
        let result =
            DispatcherHandle::spawn(MemoryStore::new(), FakeService::default(), PatternPriority::default());
        assert!(matches!(result, Err(RuntimeError::Runtime(_))));
    }

    #[test]
    fn test_metadata_client_rejects_bad_url() {
        let mut config = AppConfig::default();
        config.metadata.base_url = "::not a url".into();
        assert!(matches!(metadata_client(&config), Err(RuntimeError::Api(_))));
    }
}
