//! Handling of references that a later run no longer reaches

use crate::common::{config, crawler, crawler_with_listener, html_page, state_of};
use crate::common::{RecordingCommitter, RecordingListener};
use ripple_frontier::crawler::RunMode;
use ripple_frontier::state::{Partition, ReferenceStatus};
use std::path::Path;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Crawls home, page1 and page2, then remounts the site with page2 unlinked
async fn crawl_then_unlink_page2(server: &MockServer, work_dir: &Path, committer: &Arc<RecordingCommitter>) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("Home", &["/page1", "/page2"]))
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

    let seed = format!("{}/", server.uri());
    crawler(config(work_dir, &seed, "", ""), committer)
        .run(RunMode::Auto)
        .await
        .unwrap();
    assert_eq!(committer.take_added().len(), 3);

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("Home", &["/page1"]))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(html_page("Page 1", &[]))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_orphans_are_deleted_by_default() {
    let server = MockServer::start().await;
    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());
    crawl_then_unlink_page2(&server, work_dir.path(), &committer).await;

    let base = server.uri();
    let listener = Arc::new(RecordingListener::default());
    let crawler = crawler_with_listener(
        config(work_dir.path(), &format!("{}/", base), "", ""),
        &committer,
        &listener,
    );
    let summary = crawler.run(RunMode::Auto).await.unwrap();

    // The home page changed, page1 did not
    assert_eq!(summary.count(ReferenceStatus::Ok), 1);
    assert_eq!(summary.count(ReferenceStatus::Unmodified), 1);
    assert_eq!(summary.count(ReferenceStatus::Deleted), 1);
    assert_eq!(committer.take_added(), vec![format!("{}/", base)]);
    assert_eq!(committer.take_removed(), vec![format!("{}/page2", base)]);
    assert_eq!(
        listener.rejected(ReferenceStatus::Deleted),
        vec![(format!("{}/page2", base), "orphan")]
    );
    assert_eq!(
        state_of(crawler.store().as_ref(), &format!("{}/page2", base)),
        Some((Partition::Processed, Some(ReferenceStatus::Deleted)))
    );
    assert_eq!(crawler.store().cached_count().unwrap(), 0);
}

#[tokio::test]
async fn test_orphans_can_be_ignored() {
    let server = MockServer::start().await;
    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());
    crawl_then_unlink_page2(&server, work_dir.path(), &committer).await;

    let base = server.uri();
    let config = config(
        work_dir.path(),
        &format!("{}/", base),
        "orphans-strategy = \"ignore\"",
        "",
    );
    let crawler = crawler(config, &committer);
    let summary = crawler.run(RunMode::Auto).await.unwrap();

    assert_eq!(summary.count(ReferenceStatus::Deleted), 0);
    assert!(committer.take_removed().is_empty());
    assert_eq!(state_of(crawler.store().as_ref(), &format!("{}/page2", base)), None);
    assert_eq!(crawler.store().cached_count().unwrap(), 1);
}

#[tokio::test]
async fn test_processed_orphan_that_still_exists_is_kept() {
    let server = MockServer::start().await;
    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());
    crawl_then_unlink_page2(&server, work_dir.path(), &committer).await;
    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(html_page("Page 2", &[]))
        .expect(1)
        .mount(&server)
        .await;

    let base = server.uri();
    let config = config(
        work_dir.path(),
        &format!("{}/", base),
        "orphans-strategy = \"process\"",
        "",
    );
    let crawler = crawler(config, &committer);
    let summary = crawler.run(RunMode::Auto).await.unwrap();

    assert_eq!(summary.count(ReferenceStatus::Deleted), 0);
    assert_eq!(summary.count(ReferenceStatus::Unmodified), 2);
    assert!(committer.take_removed().is_empty());
    assert_eq!(
        state_of(crawler.store().as_ref(), &format!("{}/page2", base)),
        Some((Partition::Processed, Some(ReferenceStatus::Unmodified)))
    );
}

#[tokio::test]
async fn test_processed_orphan_that_vanished_is_deleted() {
    let server = MockServer::start().await;
    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());
    crawl_then_unlink_page2(&server, work_dir.path(), &committer).await;
    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let base = server.uri();
    let config = config(
        work_dir.path(),
        &format!("{}/", base),
        "orphans-strategy = \"process\"",
        "",
    );
    let crawler = crawler(config, &committer);
    let summary = crawler.run(RunMode::Auto).await.unwrap();

    assert_eq!(summary.count(ReferenceStatus::Deleted), 1);
    assert_eq!(committer.take_removed(), vec![format!("{}/page2", base)]);
    assert_eq!(crawler.store().cached_count().unwrap(), 0);
}

#[tokio::test]
async fn test_unchanged_parent_keeps_its_children() {
    let server = MockServer::start().await;
    let home = || {
        html_page("Home", &["/child"])
            .insert_header("last-modified", "Tue, 15 Oct 2024 08:00:00 GMT")
            .insert_header("etag", "\"h1\"")
    };
    let child = || {
        html_page("Child", &[])
            .insert_header("last-modified", "Tue, 15 Oct 2024 08:00:00 GMT")
            .insert_header("etag", "\"c1\"")
    };
    for method_name in ["HEAD", "GET"] {
        Mock::given(method(method_name))
            .and(path("/"))
            .respond_with(home())
            .mount(&server)
            .await;
        Mock::given(method(method_name))
            .and(path("/child"))
            .respond_with(child())
            .mount(&server)
            .await;
    }

    let base = server.uri();
    let seed = format!("{}/", base);
    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());
    let sections = "[fetcher]\nfetch-headers = true\n";

    let first = crawler(config(work_dir.path(), &seed, "", sections), &committer)
        .run(RunMode::Auto)
        .await
        .unwrap();
    assert_eq!(first.count(ReferenceStatus::Ok), 2);
    committer.take_added();

    // The home page is skipped on its headers, so its links are never parsed
    let rerun = crawler(config(work_dir.path(), &seed, "", sections), &committer);
    let second = rerun.run(RunMode::Auto).await.unwrap();

    assert_eq!(second.count(ReferenceStatus::Unmodified), 2);
    assert_eq!(second.count(ReferenceStatus::Deleted), 0);
    assert!(committer.take_added().is_empty());
    assert!(committer.take_removed().is_empty());
    assert_eq!(
        state_of(rerun.store().as_ref(), &format!("{}/child", base)),
        Some((Partition::Processed, Some(ReferenceStatus::Unmodified)))
    );
    drop(rerun);

    // The carried links keep the child alive on later runs too
    let third = crawler(config(work_dir.path(), &seed, "", sections), &committer)
        .run(RunMode::Auto)
        .await
        .unwrap();
    assert_eq!(third.count(ReferenceStatus::Unmodified), 2);
    assert!(committer.take_removed().is_empty());
}
