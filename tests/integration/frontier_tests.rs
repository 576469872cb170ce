//! Frontier lifecycle: resuming, stopping and limits

use crate::common::{config, crawler, crawler_with_listener, html_page, state_of};
use crate::common::{RecordingCommitter, RecordingListener};
use ripple_frontier::crawler::{Crawler, Importer, Metadata, PassthroughImporter, RunMode};
use ripple_frontier::state::{Partition, Reference, ReferenceStatus};
use ripple_frontier::storage::{open_store, ReferenceStore};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

#[tokio::test]
async fn test_resume_skips_processed_references() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("Home", &["/page1", "/page2"]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(html_page("Page 1", &[]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(html_page("Page 2", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let base = server.uri();
    let seed = format!("{}/", base);
    let work_dir = tempfile::tempdir().unwrap();
    let config = config(work_dir.path(), &seed, "", "");

    // Leave behind a run that died with page2 done, the seed in flight and
    // page1 still queued
    {
        let store = open_store(&config.crawler.store_path()).unwrap();
        store.create_run("").unwrap();
        store.queue(&Reference::new(format!("{}/page2", base), 1)).unwrap();
        let mut page2 = store.next_queued().unwrap().unwrap();
        page2.status = Some(ReferenceStatus::Ok);
        store.mark_processed(&page2).unwrap();
        store.queue(&Reference::new(seed.as_str(), 0)).unwrap();
        assert_eq!(store.next_queued().unwrap().unwrap().url, seed);
        store.queue(&Reference::new(format!("{}/page1", base), 1)).unwrap();
    }

    let committer = Arc::new(RecordingCommitter::default());
    let crawler = crawler(config, &committer);
    let summary = crawler.run(RunMode::Auto).await.unwrap();

    assert!(summary.resumed);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.count(ReferenceStatus::Ok), 3);
    assert_eq!(committer.take_added(), vec![seed, format!("{}/page1", base)]);

    let latest = crawler.store().latest_run().unwrap().unwrap();
    assert_eq!(latest.id, summary.run_id);
}

#[tokio::test]
async fn test_stopped_run_resumes_on_next_start() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("Home", &[]))
        .expect(1)
        .mount(&server)
        .await;

    let seed = format!("{}/", server.uri());
    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());

    let stopped = crawler(config(work_dir.path(), &seed, "", ""), &committer);
    stopped.stop_handle().stop();
    let summary = stopped.run(RunMode::Auto).await.unwrap();

    assert!(summary.stopped);
    assert_eq!(summary.processed, 0);
    assert_eq!(stopped.store().queue_size().unwrap(), 1);
    // Pending work is still flushed on a stop
    assert_eq!(committer.commit_count(), 1);
    drop(stopped);

    let summary = crawler(config(work_dir.path(), &seed, "", ""), &committer)
        .run(RunMode::Auto)
        .await
        .unwrap();

    assert!(summary.resumed);
    assert!(!summary.stopped);
    assert_eq!(summary.count(ReferenceStatus::Ok), 1);
    assert_eq!(committer.take_added(), vec![seed]);
}

#[tokio::test]
async fn test_fresh_mode_ignores_unfinished_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("Home", &[]))
        .mount(&server)
        .await;

    let seed = format!("{}/", server.uri());
    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());

    let stopped = crawler(config(work_dir.path(), &seed, "", ""), &committer);
    stopped.stop_handle().stop();
    stopped.run(RunMode::Auto).await.unwrap();
    drop(stopped);

    let summary = crawler(config(work_dir.path(), &seed, "", ""), &committer)
        .run(RunMode::Fresh)
        .await
        .unwrap();

    assert!(!summary.resumed);
    assert_eq!(summary.count(ReferenceStatus::Ok), 1);
}

#[tokio::test]
async fn test_max_urls_limits_committed_documents() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("Home", &["/page1", "/page2"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(html_page("Page 1", &[]))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(html_page("Page 2", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let seed = format!("{}/", server.uri());
    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());
    let mut config = config(work_dir.path(), &seed, "max-urls = 1", "");
    config.crawler.num_threads = 1;

    let crawler = crawler(config, &committer);
    let summary = crawler.run(RunMode::Auto).await.unwrap();

    assert_eq!(summary.count(ReferenceStatus::Ok), 1);
    assert_eq!(crawler.store().queue_size().unwrap(), 2);
    assert_eq!(committer.take_added(), vec![seed]);
}

#[tokio::test]
async fn test_max_depth_rejects_deeper_links() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("Home", &["/a"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html_page("A", &["/b"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html_page("B", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let base = server.uri();
    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());
    let listener = Arc::new(RecordingListener::default());
    let config = config(work_dir.path(), &format!("{}/", base), "max-depth = 1", "");

    let crawler = crawler_with_listener(config, &committer, &listener);
    let summary = crawler.run(RunMode::Auto).await.unwrap();

    assert_eq!(summary.count(ReferenceStatus::Ok), 2);
    assert_eq!(
        listener.rejected(ReferenceStatus::TooDeep),
        vec![(format!("{}/b", base), "max-depth")]
    );
    // Rejected candidates never reach the store
    assert_eq!(state_of(crawler.store().as_ref(), &format!("{}/b", base)), None);
    assert_eq!(
        state_of(crawler.store().as_ref(), &format!("{}/a", base)),
        Some((Partition::Processed, Some(ReferenceStatus::Ok)))
    );
}

#[tokio::test]
async fn test_events_bracket_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("Home", &[]))
        .mount(&server)
        .await;

    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());
    let listener = Arc::new(RecordingListener::default());
    let config = config(work_dir.path(), &format!("{}/", server.uri()), "", "");

    crawler_with_listener(config, &committer, &listener)
        .run(RunMode::Auto)
        .await
        .unwrap();

    let kinds = listener.kinds();
    assert_eq!(kinds.first(), Some(&"crawler-started"));
    assert_eq!(kinds.last(), Some(&"crawler-finished"));
    for expected in [
        "document-queued",
        "document-fetched",
        "document-imported",
        "document-committed-add",
    ] {
        assert!(kinds.contains(&expected), "missing {} in {:?}", expected, kinds);
    }
}

/// Imports like the default importer but panics on `/boom`
struct PanickingImporter;

impl Importer for PanickingImporter {
    fn import_document(
        &self,
        content: &mut Vec<u8>,
        content_type: Option<&str>,
        metadata: &mut Metadata,
        reference: &str,
    ) -> anyhow::Result<bool> {
        if reference.ends_with("/boom") {
            panic!("importer blew up");
        }
        PassthroughImporter.import_document(content, content_type, metadata, reference)
    }
}

#[tokio::test]
async fn test_panicking_importer_marks_the_document_as_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("Home", &["/boom", "/fine"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/boom"))
        .respond_with(html_page("Boom", &[]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fine"))
        .respond_with(html_page("Fine", &[]))
        .mount(&server)
        .await;

    let base = server.uri();
    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());
    let listener = Arc::new(RecordingListener::default());
    let crawler = Crawler::builder(config(work_dir.path(), &format!("{}/", base), "", ""))
        .committer(committer.clone())
        .listener(listener.clone())
        .importer(Arc::new(PanickingImporter))
        .build()
        .unwrap();

    let summary = crawler.run(RunMode::Auto).await.expect("a panic should not fail the run");

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.count(ReferenceStatus::Ok), 2);
    assert_eq!(summary.count(ReferenceStatus::Error), 1);
    assert!(listener.kinds().contains(&"error"));
    assert_eq!(
        committer.take_added(),
        vec![format!("{}/", base), format!("{}/fine", base)]
    );
    assert_eq!(
        state_of(crawler.store().as_ref(), &format!("{}/boom", base)),
        Some((Partition::Processed, Some(ReferenceStatus::Error)))
    );
    assert!(!crawler.store().has_active_work().unwrap());
}
