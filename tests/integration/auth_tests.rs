//! Integration tests for pre-crawl auth validation
//!
//! Each test serves the base URL from wiremock and checks the verdict of the
//! validation check.

use screen_atlas::auth::{self, AuthDescriptor, AuthError, AuthOutcome};
use screen_atlas::browser::{BrowsingContext, HttpEngine, HttpSettings};
use screen_atlas::crawler::SiteCrawler;
use screen_atlas::snapshot::{MemorySnapshotStore, SnapshotStore};
use screen_atlas::{AtlasError, CrawlConfig};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn engine() -> HttpEngine {
    HttpEngine::new(HttpSettings {
        user_agent: "screen-atlas-tests".to_string(),
        timeout: Duration::from_secs(5),
    })
}

fn base(server: &MockServer, route: &str) -> Url {
    Url::parse(&server.uri()).unwrap().join(route).unwrap()
}

/// Runs the validation check and returns its verdict
async fn check_auth(auth: Option<&AuthDescriptor>, base: &Url) -> AuthOutcome {
    match auth::establish(&engine(), auth, base, Duration::from_secs(5), Duration::ZERO).await {
        Ok(_) => AuthOutcome::Authenticated,
        Err(AtlasError::Auth(error)) => error.outcome(),
        Err(other) => panic!("unexpected error: {}", other),
    }
}

fn html_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body.to_string())
        .insert_header("content-type", "text/html")
}

#[tokio::test]
async fn test_authenticated_session_is_returned_on_base() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .and(header("Authorization", "Bearer valid"))
        .respond_with(html_response("<h1>Dashboard</h1>"))
        .mount(&server)
        .await;

    let auth = AuthDescriptor::BearerToken {
        token: "valid".to_string(),
        headers: BTreeMap::new(),
    };
    let url = base(&server, "/dashboard");

    let result =
        auth::establish(&engine(), Some(&auth), &url, Duration::from_secs(5), Duration::ZERO).await;
    let Ok(mut context) = result else {
        panic!("expected an authenticated context");
    };
    assert_eq!(context.current_url().await.unwrap(), url);
}

#[tokio::test]
async fn test_redirect_to_login_route() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/login?next=%2Fdashboard"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(html_response("<form><input type=\"password\"></form>"))
        .mount(&server)
        .await;

    let outcome = check_auth(None, &base(&server, "/dashboard")).await;
    match outcome {
        AuthOutcome::RedirectedToLogin { final_url } => assert!(final_url.contains("/login")),
        other => panic!("expected redirected-to-login, got {:?}", other),
    }
}

#[tokio::test]
async fn test_login_form_on_unmarked_route() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/welcome"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/welcome"))
        .respond_with(html_response(
            r#"<form id="login-form"><input name="user"><input type="password" name="pw"></form>"#,
        ))
        .mount(&server)
        .await;

    assert!(matches!(
        check_auth(None, &base(&server, "/dashboard")).await,
        AuthOutcome::RedirectedToLogin { .. }
    ));
}

#[tokio::test]
async fn test_password_field_on_base_itself_is_not_a_redirect() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/account"))
        .respond_with(html_response(
            r#"<h1>Account</h1><form><input type="password" name="new-password"></form>"#,
        ))
        .mount(&server)
        .await;

    assert_eq!(
        check_auth(None, &base(&server, "/account")).await,
        AuthOutcome::Authenticated
    );
}

#[tokio::test]
async fn test_rejected_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    assert_eq!(
        check_auth(None, &base(&server, "/")).await,
        AuthOutcome::Unauthorized { status: 401 }
    );
    assert_eq!(
        check_auth(None, &base(&server, "/admin")).await,
        AuthOutcome::Unauthorized { status: 403 }
    );
}

#[tokio::test]
async fn test_unreachable_application() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(matches!(
        check_auth(None, &base(&server, "/")).await,
        AuthOutcome::Unreachable { .. }
    ));
    assert!(matches!(
        check_auth(None, &base(&server, "/missing")).await,
        AuthOutcome::Unreachable { .. }
    ));
    assert!(matches!(
        check_auth(None, &Url::parse("http://127.0.0.1:1/").unwrap()).await,
        AuthOutcome::Unreachable { .. }
    ));
}

#[tokio::test]
async fn test_crawl_aborts_without_inventory_on_auth_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemorySnapshotStore::new());
    let crawler = SiteCrawler::new(
        engine(),
        CrawlConfig::new(base(&server, "/")),
        Arc::clone(&store) as Arc<dyn SnapshotStore>,
    );

    match crawler.crawl().await {
        Err(AtlasError::Auth(AuthError::Unauthorized { status })) => assert_eq!(status, 401),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(inventory) => panic!("expected auth failure, got {} screens", inventory.total_screens()),
    }
    assert!(store.is_empty());
}
