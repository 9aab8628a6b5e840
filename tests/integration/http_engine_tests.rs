//! Integration tests for the static HTML engine
//!
//! These tests use wiremock to serve pages over real HTTP.

use screen_atlas::auth::{AuthCookie, AuthDescriptor};
use screen_atlas::browser::{
    BrowserEngine, BrowserError, BrowsingContext, HttpEngine, HttpSettings, NavigationOutcome,
};
use screen_atlas::crawler::SiteCrawler;
use screen_atlas::snapshot::{MemorySnapshotStore, SnapshotStore};
use screen_atlas::CrawlConfig;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body.to_string())
        .insert_header("content-type", "text/html")
}

fn page_url(server: &MockServer, route: &str) -> Url {
    Url::parse(&server.uri()).unwrap().join(route).unwrap()
}

fn engine() -> HttpEngine {
    HttpEngine::new(HttpSettings {
        user_agent: "screen-atlas-tests".to_string(),
        timeout: Duration::from_secs(5),
    })
}

#[tokio::test]
async fn test_navigate_follows_redirects() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html_response("<title>New</title><h1>Moved here</h1>"))
        .mount(&server)
        .await;

    let mut context = engine().open_context(None).await.unwrap();
    let response = context.navigate(&page_url(&server, "/old")).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.final_url, page_url(&server, "/new"));
    assert_eq!(context.current_url().await.unwrap(), page_url(&server, "/new"));
    assert!(context.read_dom().await.unwrap().contains("Moved here"));
}

#[tokio::test]
async fn test_hash_route_survives_navigation() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/app"))
        .respond_with(html_response("<div id=\"root\"></div>"))
        .mount(&server)
        .await;

    let mut context = engine().open_context(None).await.unwrap();
    let target = page_url(&server, "/app#/settings");
    let response = context.navigate(&target).await.unwrap();

    assert_eq!(response.final_url, target);
}

#[tokio::test]
async fn test_bearer_token_and_extra_headers_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("Authorization", "Bearer secret-token"))
        .and(header("X-Tenant", "acme"))
        .respond_with(html_response("<h1>Dashboard</h1>"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let auth = AuthDescriptor::BearerToken {
        token: "secret-token".to_string(),
        headers: BTreeMap::from([("X-Tenant".to_string(), "acme".to_string())]),
    };

    let mut authenticated = engine().open_context(Some(&auth)).await.unwrap();
    let response = authenticated.navigate(&page_url(&server, "/")).await.unwrap();
    assert_eq!(response.status, 200);

    let mut anonymous = engine().open_context(None).await.unwrap();
    let response = anonymous.navigate(&page_url(&server, "/")).await.unwrap();
    assert_eq!(response.status, 401);
}

#[tokio::test]
async fn test_cookies_sent_only_to_matching_paths() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/app"))
        .and(header("Cookie", "session=abc123"))
        .respond_with(html_response("<h1>App</h1>"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let mut cookie = AuthCookie::new("session", "abc123");
    cookie.path = Some("/app".to_string());
    let auth = AuthDescriptor::Cookies(vec![cookie]);

    let mut context = engine().open_context(Some(&auth)).await.unwrap();
    let response = context.navigate(&page_url(&server, "/app")).await.unwrap();
    assert_eq!(response.status, 200);

    let response = context.navigate(&page_url(&server, "/other")).await.unwrap();
    assert_eq!(response.status, 403);
}

#[tokio::test]
async fn test_engage_declared_target_navigates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(
            r#"<div role="link" id="go-reports" data-href="/reports">Reports</div>
               <button id="toggle">Toggle</button>"#,
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/reports"))
        .respond_with(html_response("<h1>Reports</h1>"))
        .mount(&server)
        .await;

    let mut context = engine().open_context(None).await.unwrap();
    context.navigate(&page_url(&server, "/")).await.unwrap();

    assert_eq!(
        context.engage("#toggle").await.unwrap(),
        NavigationOutcome::Unchanged
    );

    let outcome = context.engage("#go-reports").await.unwrap();
    assert_eq!(
        outcome,
        NavigationOutcome::Navigated(page_url(&server, "/reports"))
    );
    assert!(context.read_dom().await.unwrap().contains("<h1>Reports</h1>"));
}

#[tokio::test]
async fn test_connection_refused_is_navigation_error() {
    let mut context = engine().open_context(None).await.unwrap();
    let result = context
        .navigate(&Url::parse("http://127.0.0.1:1/").unwrap())
        .await;
    assert!(matches!(result, Err(BrowserError::Navigation(_))));
}

#[tokio::test]
async fn test_crawl_over_http_marks_capture_failures() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(
            r#"<title>Home</title><nav><a href="/users/1">Ann</a><a href="/users/2">Bob</a>
               <a href="/settings">Settings</a></nav>"#,
        ))
        .mount(&server)
        .await;

    for id in ["1", "2"] {
        Mock::given(method("GET"))
            .and(path(format!("/users/{}", id)))
            .respond_with(html_response(&format!(
                "<title>User</title><h1>User {}</h1><a href=\"/\">Back</a>",
                id
            )))
            .mount(&server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/settings"))
        .respond_with(html_response("<title>Settings</title><h1>Settings</h1>"))
        .mount(&server)
        .await;

    let mut config = CrawlConfig::new(page_url(&server, "/"));
    config.settle = Duration::ZERO;
    let store: Arc<dyn SnapshotStore> = Arc::new(MemorySnapshotStore::new());
    let crawler = SiteCrawler::new(engine(), config, store);

    let inventory = crawler.crawl().await.unwrap();

    assert_eq!(inventory.pages_visited, 4);
    assert_eq!(inventory.total_screens(), 3);
    assert_eq!(inventory.template("/users/:id").unwrap().instances, 2);
    // The static engine cannot paint pixels
    assert!(inventory
        .screens
        .iter()
        .all(|s| s.capture_failed && s.snapshot.is_none()));
}
