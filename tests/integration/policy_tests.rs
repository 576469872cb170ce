//! Admission policies and how fetch outcomes are classified

use crate::common::{config, crawler, crawler_with_listener, html_page, html_response, state_of};
use crate::common::{RecordingCommitter, RecordingListener};
use ripple_frontier::crawler::RunMode;
use ripple_frontier::state::{Partition, ReferenceStatus};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_robots_txt_disallow_is_respected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("Home", &["/private/x", "/public"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/public"))
        .respond_with(html_page("Public", &[]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/x"))
        .respond_with(html_page("Private", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let base = server.uri();
    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());
    let listener = Arc::new(RecordingListener::default());
    let config = config(work_dir.path(), &format!("{}/", base), "", "");

    let summary = crawler_with_listener(config, &committer, &listener)
        .run(RunMode::Auto)
        .await
        .unwrap();

    assert_eq!(summary.count(ReferenceStatus::Ok), 2);
    assert_eq!(
        listener.rejected(ReferenceStatus::Rejected),
        vec![(format!("{}/private/x", base), "robots-txt")]
    );
}

#[tokio::test]
async fn test_robots_txt_can_be_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("Home", &[]))
        .mount(&server)
        .await;

    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());
    let config = config(
        work_dir.path(),
        &format!("{}/", server.uri()),
        "ignore-robots-txt = true\nignore-sitemap = true",
        "",
    );

    let summary = crawler(config, &committer).run(RunMode::Auto).await.unwrap();
    assert_eq!(summary.count(ReferenceStatus::Ok), 1);
}

#[tokio::test]
async fn test_robots_meta_noindex_is_not_committed_but_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(
            r#"<html><head><meta name="robots" content="noindex"></head>
            <body><a href="/next">next</a></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(html_page("Next", &[]))
        .expect(1)
        .mount(&server)
        .await;

    let base = server.uri();
    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());
    let listener = Arc::new(RecordingListener::default());
    let config = config(work_dir.path(), &format!("{}/", base), "", "");

    let summary = crawler_with_listener(config, &committer, &listener)
        .run(RunMode::Auto)
        .await
        .unwrap();

    assert_eq!(summary.count(ReferenceStatus::Rejected), 1);
    assert_eq!(summary.count(ReferenceStatus::Ok), 1);
    assert_eq!(committer.take_added(), vec![format!("{}/next", base)]);
    assert_eq!(
        listener.rejected(ReferenceStatus::Rejected),
        vec![(format!("{}/", base), "robots-meta-noindex")]
    );
}

#[tokio::test]
async fn test_robots_meta_nofollow_is_committed_without_links() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(
            r#"<html><head><meta name="robots" content="nofollow"></head>
            <body><a href="/next">next</a></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(html_page("Next", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let base = server.uri();
    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());
    let config = config(work_dir.path(), &format!("{}/", base), "", "");

    let crawler = crawler(config, &committer);
    let summary = crawler.run(RunMode::Auto).await.unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.count(ReferenceStatus::Ok), 1);
    assert_eq!(committer.take_added(), vec![format!("{}/", base)]);
    assert_eq!(state_of(crawler.store().as_ref(), &format!("{}/next", base)), None);
}

#[tokio::test]
async fn test_redirect_target_is_crawled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html_page("New", &[]))
        .mount(&server)
        .await;

    let base = server.uri();
    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());
    let listener = Arc::new(RecordingListener::default());
    let config = config(work_dir.path(), &format!("{}/old", base), "", "");

    let crawler = crawler_with_listener(config, &committer, &listener);
    let summary = crawler.run(RunMode::Auto).await.unwrap();

    assert_eq!(summary.count(ReferenceStatus::Redirect), 1);
    assert_eq!(summary.count(ReferenceStatus::Ok), 1);
    assert!(listener.kinds().contains(&"redirected"));
    assert_eq!(committer.take_added(), vec![format!("{}/new", base)]);
    assert_eq!(
        state_of(crawler.store().as_ref(), &format!("{}/new", base)).map(|(p, _)| p),
        Some(Partition::Processed)
    );
}

#[tokio::test]
async fn test_server_error_is_bad_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());
    let config = config(work_dir.path(), &format!("{}/", server.uri()), "", "");

    let summary = crawler(config, &committer).run(RunMode::Auto).await.unwrap();

    assert_eq!(summary.count(ReferenceStatus::BadStatus), 1);
    assert!(committer.take_added().is_empty());
}

#[tokio::test]
async fn test_sitemap_urls_are_queued_with_hints() {
    let server = MockServer::start().await;
    let base = server.uri();
    let sitemap = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url>
    <loc>{}/from-sitemap</loc>
    <changefreq>daily</changefreq>
    <priority>0.8</priority>
  </url>
</urlset>"#,
        base
    );
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sitemap, "application/xml"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("Home", &[]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/from-sitemap"))
        .respond_with(html_page("Listed", &[]))
        .expect(1)
        .mount(&server)
        .await;

    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());
    let listener = Arc::new(RecordingListener::default());
    let config = config(work_dir.path(), &format!("{}/", base), "", "");

    let summary = crawler_with_listener(config, &committer, &listener)
        .run(RunMode::Auto)
        .await
        .unwrap();

    assert_eq!(summary.count(ReferenceStatus::Ok), 2);
    assert!(listener.kinds().contains(&"sitemap-resolved"));
    let metadata = committer
        .metadata_of(&format!("{}/from-sitemap", base))
        .expect("sitemap URL should be committed");
    assert_eq!(metadata.get("collector.depth"), Some("0"));
    assert_eq!(metadata.get("collector.sm-changefreq"), Some("daily"));
    assert_eq!(metadata.get("collector.sm-priority"), Some("0.8"));
}

#[tokio::test]
async fn test_sitemap_entries_do_not_expand_their_own_sitemap() {
    let server = MockServer::start().await;
    let other = MockServer::start().await;
    let sitemap = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{}/listed</loc></url>
</urlset>"#,
        other.uri()
    );
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sitemap, "application/xml"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("Home", &[]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/listed"))
        .respond_with(html_page("Listed", &[]))
        .expect(1)
        .mount(&other)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(html_page("Not a sitemap", &[]))
        .expect(0)
        .mount(&other)
        .await;

    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());
    let listener = Arc::new(RecordingListener::default());
    let config = config(work_dir.path(), &format!("{}/", server.uri()), "", "");

    let summary = crawler_with_listener(config, &committer, &listener)
        .run(RunMode::Auto)
        .await
        .unwrap();

    assert_eq!(summary.count(ReferenceStatus::Ok), 2);
    let expansions = listener
        .kinds()
        .into_iter()
        .filter(|kind| *kind == "sitemap-resolved")
        .count();
    assert_eq!(expansions, 1);
    let mut expected = vec![format!("{}/", server.uri()), format!("{}/listed", other.uri())];
    expected.sort();
    assert_eq!(committer.take_added(), expected);
}

#[tokio::test]
async fn test_stay_on_domain_rejects_other_hosts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("Home", &["http://elsewhere.invalid/page"]))
        .mount(&server)
        .await;

    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());
    let listener = Arc::new(RecordingListener::default());
    let config = config(
        work_dir.path(),
        &format!("{}/", server.uri()),
        "",
        "[scope]\nstay-on-domain = true\n",
    );

    crawler_with_listener(config, &committer, &listener)
        .run(RunMode::Auto)
        .await
        .unwrap();

    assert_eq!(
        listener.rejected(ReferenceStatus::Rejected),
        vec![("http://elsewhere.invalid/page".to_string(), "out-of-scope")]
    );
}

#[tokio::test]
async fn test_url_filters_exclude_matches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("Home", &["/report.pdf", "/about"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(html_page("About", &[]))
        .mount(&server)
        .await;

    let base = server.uri();
    let work_dir = tempfile::tempdir().unwrap();
    let committer = Arc::new(RecordingCommitter::default());
    let listener = Arc::new(RecordingListener::default());
    let sections = "[[url-filters]]\npattern = '\\.pdf$'\non-match = \"exclude\"\n";
    let config = config(work_dir.path(), &format!("{}/", base), "", sections);

    let summary = crawler_with_listener(config, &committer, &listener)
        .run(RunMode::Auto)
        .await
        .unwrap();

    assert_eq!(summary.count(ReferenceStatus::Ok), 2);
    assert_eq!(
        listener.rejected(ReferenceStatus::Rejected),
        vec![(format!("{}/report.pdf", base), "url-filter")]
    );
}
