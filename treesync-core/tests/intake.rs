mod common;

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use common::{InMemoryStore, RecordingChannel, ScriptedQueue};
use tempfile::tempdir;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::Registry;
use treesync_core::category::CategoryMapping;
use treesync_core::contract::{
    BoxError, InboundMessage, MockObjectFetcher, MockQueueTransport, ObjectFetcher,
};
use treesync_core::download::TreeDownloader;
use treesync_core::intake::{drain, IntakeSummary, MessageHandler};
use treesync_core::outcome::OutcomeReporter;

struct PanickingFetcher;

#[async_trait]
impl ObjectFetcher for PanickingFetcher {
    async fn exists(&self, _key: &str) -> Result<bool, BoxError> {
        panic!("store client poisoned");
    }

    async fn fetch(&self, _key: &str, _local_path: &Path) -> Result<(), BoxError> {
        Ok(())
    }
}

struct Harness {
    handler: MessageHandler,
    success: Arc<RecordingChannel>,
    error: Arc<RecordingChannel>,
    _media: tempfile::TempDir,
}

fn harness(fetcher: Arc<dyn ObjectFetcher>) -> Harness {
    let media = tempdir().unwrap();
    let mapping = CategoryMapping::new([("movies", media.path().join("movies"))]);
    let success = Arc::new(RecordingChannel::default());
    let error = Arc::new(RecordingChannel::default());
    let handler = MessageHandler::new(
        TreeDownloader::new(Arc::new(mapping), fetcher),
        OutcomeReporter::new(success.clone(), error.clone()),
    );
    Harness {
        handler,
        success,
        error,
        _media: media,
    }
}

const MOVIES_TREE: &str = r#"{"name":"root","files":[],"subfolders":[
    {"name":"movies","files":[{"name":"a.mkv","size":100}],"subfolders":[]}
]}"#;

#[tokio::test]
async fn successful_message_notifies_success_and_acknowledges() {
    let store = Arc::new(InMemoryStore::default().with_object("root/movies/a.mkv", b"film"));
    let h = harness(store);
    let queue = ScriptedQueue::default();

    let outcome = h
        .handler
        .handle(InboundMessage::new("msg-1", MOVIES_TREE), &queue)
        .await;

    assert!(outcome.success);
    assert_eq!(h.success.sent(), vec!["Message msg-1 processed successfully"]);
    assert!(h.error.sent().is_empty());
    assert_eq!(queue.acknowledged(), vec!["msg-1"]);
}

#[tokio::test]
async fn missing_object_sends_exactly_one_error_notification() {
    let store = Arc::new(InMemoryStore::default());
    let h = harness(store);
    let queue = ScriptedQueue::default();

    let outcome = h
        .handler
        .handle(InboundMessage::new("msg-2", MOVIES_TREE), &queue)
        .await;

    assert!(!outcome.success);
    let sent = h.error.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("Message msg-2 failed:"), "got {sent:?}");
    assert!(sent[0].contains("does not exist"));
    assert!(h.success.sent().is_empty());
    assert_eq!(queue.acknowledged(), vec!["msg-2"]);
}

#[tokio::test]
async fn unparseable_body_fails_without_fetching() {
    let mut fetcher = MockObjectFetcher::new();
    fetcher.expect_exists().never();
    fetcher.expect_fetch().never();
    let h = harness(Arc::new(fetcher));
    let queue = ScriptedQueue::default();

    let bodies = [
        ("bad-json", "{oops"),
        ("null-body", "null"),
        ("no-name", r#"{"files":[]}"#),
    ];
    for (id, body) in bodies {
        let outcome = h.handler.handle(InboundMessage::new(id, body), &queue).await;
        assert!(!outcome.success, "{id} should fail");
    }

    assert_eq!(h.error.sent().len(), 3);
    assert_eq!(queue.acknowledged(), vec!["bad-json", "null-body", "no-name"]);
}

#[tokio::test]
async fn panic_during_fetch_becomes_failure_and_is_still_acknowledged() {
    let h = harness(Arc::new(PanickingFetcher));
    let queue = ScriptedQueue::default();

    let outcome = h
        .handler
        .handle(InboundMessage::new("msg-3", MOVIES_TREE), &queue)
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.description.as_deref(), Some("store client poisoned"));
    assert_eq!(h.error.sent(), vec!["Message msg-3 failed: store client poisoned"]);
    assert_eq!(queue.acknowledged(), vec!["msg-3"]);
}

#[tokio::test]
async fn acknowledge_failure_does_not_change_outcome() {
    let store = Arc::new(InMemoryStore::default().with_object("root/movies/a.mkv", b"film"));
    let h = harness(store);
    let mut queue = MockQueueTransport::new();
    queue
        .expect_acknowledge()
        .times(1)
        .returning(|_id: &str| Err("lock lost".into()));

    let outcome = h
        .handler
        .handle(InboundMessage::new("msg-4", MOVIES_TREE), &queue)
        .await;

    assert!(outcome.success);
    assert_eq!(h.success.sent().len(), 1);
}

#[tokio::test]
async fn execute_reports_without_acknowledging() {
    let store = Arc::new(InMemoryStore::default().with_object("root/movies/a.mkv", b"film"));
    let h = harness(store);

    let outcome = h
        .handler
        .execute(&InboundMessage::new("local", MOVIES_TREE))
        .await;

    assert!(outcome.success);
    assert_eq!(h.success.sent().len(), 1);
}

#[tokio::test]
async fn drain_handles_every_message_once() {
    let store = Arc::new(InMemoryStore::default().with_object("root/movies/a.mkv", b"film"));
    let h = harness(store);
    let queue = ScriptedQueue::new(vec![
        InboundMessage::new("m1", MOVIES_TREE),
        InboundMessage::new("m2", "{broken"),
        InboundMessage::new("m3", MOVIES_TREE),
    ]);

    let summary = drain(&h.handler, &queue, 2).await;

    assert_eq!(
        summary,
        IntakeSummary {
            received: 3,
            succeeded: 2,
            failed: 1,
        }
    );
    let mut acked = queue.acknowledged();
    acked.sort();
    assert_eq!(acked, vec!["m1", "m2", "m3"]);
    assert_eq!(h.success.sent().len() + h.error.sent().len(), 3);
}

#[tokio::test]
async fn receive_error_goes_to_transport_hook_and_ends_pass() {
    let h = harness(Arc::new(InMemoryStore::default()));
    let mut queue = MockQueueTransport::new();
    queue
        .expect_receive()
        .times(1)
        .returning(|| Err("connection refused".into()));
    queue
        .expect_report_transport_error()
        .times(1)
        .returning(|description: &str| assert!(description.contains("connection refused")));
    queue.expect_acknowledge().never();

    let summary = drain(&h.handler, &queue, 1).await;

    assert_eq!(summary, IntakeSummary::default());
    assert!(h.success.sent().is_empty());
    assert!(h.error.sent().is_empty());
}

struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{event:?}"));
    }
}

#[tokio::test]
async fn skipped_branch_is_logged_and_job_succeeds() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = Registry::default().with(EventCollector {
        events: events.clone(),
    });
    let _guard = tracing::subscriber::set_default(subscriber);

    let h = harness(Arc::new(InMemoryStore::default()));
    let queue = ScriptedQueue::default();
    let body =
        r#"{"name":"root","subfolders":[{"name":"tv","files":[{"name":"b.mkv","size":50}]}]}"#;

    let outcome = h.handler.handle(InboundMessage::new("msg-tv", body), &queue).await;

    assert!(outcome.success);
    let events = events.lock().unwrap();
    assert!(
        events.iter().any(|e| e.contains("Skipping branch")),
        "expected a skip event, got: {events:?}"
    );
}
