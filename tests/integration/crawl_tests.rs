//! Full crawl cycles, including incremental re-crawls

use crate::common::{config, crawler, html_page, state_of, RecordingCommitter};
use ripple_frontier::crawler::RunMode;
use ripple_frontier::state::{Partition, ReferenceStatus};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

async fn mount_site(server: &MockServer, home_links: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("Home", home_links))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(html_page("Page 1", &[]))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(html_page("Page 2", &[]))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_single_site() {
    let server = MockServer::start().await;
    mount_site(&server, &["/page1", "/page2"]).await;
    let base = server.uri();
    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());

    let crawler = crawler(config(work_dir.path(), &format!("{}/", base), "", ""), &committer);
    let summary = crawler.run(RunMode::Auto).await.expect("crawl should succeed");

    assert!(!summary.resumed);
    assert!(!summary.stopped);
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.count(ReferenceStatus::Ok), 3);
    assert_eq!(
        committer.take_added(),
        vec![
            format!("{}/", base),
            format!("{}/page1", base),
            format!("{}/page2", base),
        ]
    );
    assert!(committer.take_removed().is_empty());
    assert_eq!(committer.commit_count(), 1);

    let store = crawler.store();
    assert!(store.is_queue_empty().unwrap());
    assert!(!store.has_active_work().unwrap());
    assert_eq!(
        state_of(store.as_ref(), &format!("{}/page1", base)),
        Some((Partition::Processed, Some(ReferenceStatus::Ok)))
    );
}

#[tokio::test]
async fn test_committed_metadata() {
    let server = MockServer::start().await;
    mount_site(&server, &["/page1"]).await;
    let base = server.uri();
    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());

    crawler(config(work_dir.path(), &format!("{}/", base), "", ""), &committer)
        .run(RunMode::Auto)
        .await
        .unwrap();

    let metadata = committer
        .metadata_of(&format!("{}/page1", base))
        .expect("page1 should be committed");
    assert_eq!(metadata.get("collector.depth"), Some("1"));
    assert_eq!(metadata.get("collector.content-type"), Some("text/html"));
    assert_eq!(metadata.get("collector.content-encoding"), Some("utf-8"));
    assert_eq!(metadata.get("title"), Some("Page 1"));
}

#[tokio::test]
async fn test_unchanged_site_commits_nothing() {
    let server = MockServer::start().await;
    mount_site(&server, &["/page1", "/page2"]).await;
    let seed = format!("{}/", server.uri());
    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());

    crawler(config(work_dir.path(), &seed, "", ""), &committer)
        .run(RunMode::Auto)
        .await
        .unwrap();
    assert_eq!(committer.take_added().len(), 3);

    // The first run completed, so this one starts fresh against the cache
    let summary = crawler(config(work_dir.path(), &seed, "", ""), &committer)
        .run(RunMode::Auto)
        .await
        .unwrap();

    assert!(!summary.resumed);
    assert_eq!(summary.count(ReferenceStatus::Unmodified), 3);
    assert_eq!(summary.count(ReferenceStatus::Ok), 0);
    assert!(committer.take_added().is_empty());
    assert!(committer.take_removed().is_empty());
}

#[tokio::test]
async fn test_changed_page_is_recommitted() {
    let server = MockServer::start().await;
    mount_site(&server, &["/page1"]).await;
    let base = server.uri();
    let seed = format!("{}/", base);
    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());

    crawler(config(work_dir.path(), &seed, "", ""), &committer)
        .run(RunMode::Auto)
        .await
        .unwrap();
    committer.take_added();

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("Home", &["/page1"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(html_page("Page 1, edited", &[]))
        .mount(&server)
        .await;

    let summary = crawler(config(work_dir.path(), &seed, "", ""), &committer)
        .run(RunMode::Auto)
        .await
        .unwrap();

    assert_eq!(summary.count(ReferenceStatus::Ok), 1);
    assert_eq!(summary.count(ReferenceStatus::Unmodified), 1);
    assert_eq!(committer.take_added(), vec![format!("{}/page1", base)]);
}

#[tokio::test]
async fn test_unchanged_headers_skip_the_download() {
    let server = MockServer::start().await;
    let page = || {
        html_page("Home", &[])
            .insert_header("last-modified", "Tue, 15 Oct 2024 08:00:00 GMT")
            .insert_header("etag", "\"v1\"")
    };
    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(page())
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page())
        .expect(1)
        .mount(&server)
        .await;

    let seed = format!("{}/", server.uri());
    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());
    let sections = "[fetcher]\nfetch-headers = true\n";

    let first = crawler(config(work_dir.path(), &seed, "", sections), &committer)
        .run(RunMode::Auto)
        .await
        .unwrap();
    assert_eq!(first.count(ReferenceStatus::Ok), 1);

    let second = crawler(config(work_dir.path(), &seed, "", sections), &committer)
        .run(RunMode::Auto)
        .await
        .unwrap();
    assert_eq!(second.count(ReferenceStatus::Unmodified), 1);
    assert_eq!(committer.take_added(), vec![seed]);
}

#[tokio::test]
async fn test_missing_page_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("Home", &["/gone"]))
        .mount(&server)
        .await;

    let base = server.uri();
    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());
    let crawler = crawler(config(work_dir.path(), &format!("{}/", base), "", ""), &committer);

    let summary = crawler.run(RunMode::Auto).await.unwrap();

    assert_eq!(summary.count(ReferenceStatus::Ok), 1);
    assert_eq!(summary.count(ReferenceStatus::NotFound), 1);
    assert_eq!(
        state_of(crawler.store().as_ref(), &format!("{}/gone", base)),
        Some((Partition::Processed, Some(ReferenceStatus::NotFound)))
    );
    assert_eq!(committer.take_added(), vec![format!("{}/", base)]);
}
