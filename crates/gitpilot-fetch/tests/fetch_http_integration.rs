use gitpilot_fetch::{ContentFetcher, FetchConfig, FetchError, FetchMode, BROWSER_USER_AGENT};
use httpmock::prelude::*;

const PAGE: &str = r#"<html><head><title>Docs</title><script>var x = 1;</script></head>
<body><h1>Getting   started</h1><p>Install the <code>cli</code>.</p>
<img src="images/a.png"><img src="//cdn.example.com/b.gif"></body></html>"#;

fn fetcher() -> ContentFetcher {
    ContentFetcher::new(FetchConfig::default()).expect("fetcher")
}

#[tokio::test]
async fn integration_fetch_sends_browser_user_agent_and_returns_text() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/docs")
            .header("user-agent", BROWSER_USER_AGENT);
        then.status(200)
            .header("content-type", "text/html")
            .body(PAGE);
    });

    let text = fetcher()
        .fetch(&server.url("/docs"), FetchMode::Text, None)
        .await
        .expect("text fetch");

    mock.assert();
    assert_eq!(text, "Docs Getting started Install the cli .");
}

#[tokio::test]
async fn functional_fetch_html_mode_truncates_by_characters() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/docs");
        then.status(200).body(PAGE);
    });

    let fetcher = fetcher();
    let html = fetcher
        .fetch(&server.url("/docs"), FetchMode::Html, None)
        .await
        .expect("html fetch");
    let truncated = fetcher
        .fetch(&server.url("/docs"), FetchMode::Html, Some(12))
        .await
        .expect("truncated fetch");

    assert!(html.contains("<h1>Getting   started</h1>"));
    assert_eq!(truncated.chars().count(), 12);
    assert!(html.starts_with(&truncated));
}

#[tokio::test]
async fn functional_extract_image_urls_returns_sources_as_written() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/gallery");
        then.status(200).body(PAGE);
    });

    let images = fetcher()
        .extract_image_urls(&server.url("/gallery"))
        .await
        .expect("images");

    assert_eq!(images, vec!["images/a.png", "//cdn.example.com/b.gif"]);
}

#[tokio::test]
async fn regression_error_status_is_rendered_as_retrieval_failure() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/gone");
        then.status(404).body("missing");
    });
    let url = server.url("/gone");

    let error = fetcher()
        .fetch(&url, FetchMode::Text, None)
        .await
        .expect_err("404 must fail");

    assert!(matches!(error, FetchError::HttpStatus { status: 404, .. }));
    assert!(error
        .render_for_url(&url)
        .starts_with(&format!("Failed to retrieve content from {url}. Error: 404")));
}

#[tokio::test]
async fn regression_unreachable_host_is_network_error() {
    let fetcher = ContentFetcher::new(FetchConfig {
        timeout_ms: 500,
        ..FetchConfig::default()
    })
    .expect("fetcher");

    let error = fetcher
        .fetch("http://127.0.0.1:9/unreachable", FetchMode::Text, None)
        .await
        .expect_err("closed port must fail");

    assert_eq!(error.kind(), "network");
}
