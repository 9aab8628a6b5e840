//! Integration tests for the crawler
//!
//! These tests run the full crawl cycle end-to-end against an in-memory
//! fixture application served through the browser traits.

#[path = "common/mod.rs"]
mod common;

use common::{assert_inventory_invariants, config, crawl, html, url, FixtureEngine, FixtureSite};
use screen_atlas::auth::{AuthDescriptor, AuthError};
use screen_atlas::browser::BrowserEngine;
use screen_atlas::crawler::{PageFetcher, SiteCrawler};
use screen_atlas::extract::{extract_from_html, extract_structure, DetectionSource};
use screen_atlas::inventory::{PageKind, ScreenId, TruncationReason};
use screen_atlas::snapshot::{MemorySnapshotStore, SnapshotStore};
use screen_atlas::url::ScopeFilter;
use screen_atlas::AtlasError;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

fn item_page(id: u32) -> String {
    html(
        "Item",
        &format!(
            r#"<main><h1>Item</h1><p>Item number {}</p><a href="/">Back</a></main>"#,
            id
        ),
    )
}

fn bearer() -> AuthDescriptor {
    AuthDescriptor::BearerToken {
        token: "fixture-token".to_string(),
        headers: BTreeMap::new(),
    }
}

#[tokio::test]
async fn test_identifier_pages_collapse_into_one_screen() {
    let site = FixtureSite::new()
        .page(
            "/",
            html(
                "Home",
                r#"<nav><a href="/items/1">First</a><a href="/items/2">Second</a><a href="/about">About</a></nav>"#,
            ),
        )
        .page("/items/1", item_page(1))
        .page("/items/2", item_page(2))
        .page("/about", html("About", "<h1>About us</h1>"));
    let engine = FixtureEngine::new(site);

    let (result, store) = crawl(&engine, config(50, 4)).await;
    let inventory = result.unwrap();

    assert_inventory_invariants(&inventory, 50);
    assert_eq!(inventory.pages_visited, 4);
    assert_eq!(inventory.total_screens(), 3);

    let items: Vec<_> = inventory
        .screens
        .iter()
        .filter(|s| s.template == "/items/:id")
        .collect();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].nav_path, vec!["Home", "Item"]);

    let template = inventory.template("/items/:id").unwrap();
    assert_eq!(template.instances, 2);
    assert_eq!(template.representative, items[0].id);
    assert!(inventory.templates.len() < inventory.pages_visited as usize);

    // Every screen was captured; duplicates were not
    assert_eq!(store.len(), 3);
    assert!(inventory.screens.iter().all(|s| s.snapshot.is_some()));
    assert!(!inventory.truncated);
}

#[tokio::test]
async fn test_login_redirect_fails_fast() {
    let site = FixtureSite::new()
        .requires_auth()
        .page("/", html("Dashboard", r#"<a href="/reports">Reports</a>"#))
        .page("/reports", html("Reports", "<h1>Reports</h1>"))
        .page(
            "/login",
            html("Sign in", r#"<form action="/login"><input type="password" name="pw"></form>"#),
        );
    let engine = FixtureEngine::new(site);

    let (result, store) = crawl(&engine, config(50, 4)).await;

    match result {
        Err(AtlasError::Auth(AuthError::RedirectedToLogin { final_url })) => {
            assert!(final_url.ends_with("/login"));
        }
        other => panic!("expected redirected-to-login, got {:?}", other.map(|i| i.pages_visited)),
    }
    // Only the auth validation request ran
    assert_eq!(engine.site().fetches().len(), 1);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_credentials_pass_auth_gate() {
    let site = FixtureSite::new()
        .requires_auth()
        .page("/", html("Dashboard", r#"<a href="/reports">Reports</a>"#))
        .page("/reports", html("Reports", "<h1>Reports</h1>"));
    let engine = FixtureEngine::new(site);

    let mut config = config(50, 4);
    config.auth = Some(bearer());
    let (result, _) = crawl(&engine, config).await;
    let inventory = result.unwrap();

    assert_eq!(inventory.total_screens(), 2);
    assert!(inventory
        .screens
        .iter()
        .all(|s| s.kind == PageKind::Content));
}

#[tokio::test]
async fn test_session_expiry_mid_crawl_skips_page() {
    let site = FixtureSite::new()
        .page(
            "/",
            html("Home", r#"<a href="/admin">Admin</a><a href="/team">Team</a>"#),
        )
        .page("/team", html("Team", "<h1>Team</h1>"))
        .page("/login", html("Sign in", r#"<input type="password">"#))
        .redirect("/admin", "/login");
    let engine = FixtureEngine::new(site);

    let (result, _) = crawl(&engine, config(50, 4)).await;
    let inventory = result.unwrap();

    assert_eq!(inventory.total_screens(), 2);
    assert_eq!(inventory.skipped.len(), 1);
    assert_eq!(inventory.skipped[0].url, url("/admin").to_string());
    assert!(inventory.skipped[0].reason.contains("session expired"));
}

#[tokio::test]
async fn test_hash_route_control_discovered_as_screen() {
    let site = FixtureSite::new()
        .page(
            "/",
            html(
                "Home",
                r#"<main><h1>Overview</h1><div role="link" id="open-settings">Settings</div></main>"#,
            ),
        )
        .page(
            "/#/settings",
            html(
                "Settings",
                r#"<main><h1>Settings</h1><label for="name">Name</label><input id="name" name="name"></main>"#,
            ),
        )
        .engage("/", "#open-settings", "/#/settings");
    let engine = FixtureEngine::new(site);

    let (result, _) = crawl(&engine, config(50, 4)).await;
    let inventory = result.unwrap();

    assert_inventory_invariants(&inventory, 50);
    assert_eq!(inventory.total_screens(), 2);

    let settings = &inventory.screens[1];
    assert_eq!(settings.url, "https://fixture.test/#/settings");
    assert_eq!(settings.title, "Settings");
    assert_eq!(settings.parent, Some(ScreenId(0)));
    assert_eq!(settings.depth, 1);
    assert_eq!(settings.structure.form_fields.len(), 1);
}

#[tokio::test]
async fn test_page_limit_truncates() {
    let names = [
        "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel", "india",
    ];
    let links: String = names
        .iter()
        .map(|n| format!(r#"<a href="/{}">{}</a>"#, n, n))
        .collect();

    let mut site = FixtureSite::new().page("/", html("Home", &links));
    for name in names {
        site = site.page(&format!("/{}", name), html(name, &format!("<h1>{}</h1>", name)));
    }
    let engine = FixtureEngine::new(site);

    let (result, _) = crawl(&engine, config(5, 4)).await;
    let inventory = result.unwrap();

    assert_inventory_invariants(&inventory, 5);
    assert_eq!(inventory.pages_visited, 5);
    assert_eq!(inventory.total_screens(), 5);
    assert!(inventory.truncated);
    assert_eq!(inventory.truncation, Some(TruncationReason::PageLimit));
}

#[tokio::test]
async fn test_depth_limit_truncates() {
    let site = FixtureSite::new()
        .page("/", html("Home", r#"<a href="/projects">Projects</a>"#))
        .page(
            "/projects",
            html("Projects", r#"<a href="/projects/archive">Archive</a>"#),
        )
        .page("/projects/archive", html("Archive", "<h1>Archive</h1>"));
    let engine = FixtureEngine::new(site);

    let (result, _) = crawl(&engine, config(50, 1)).await;
    let inventory = result.unwrap();

    assert_eq!(inventory.total_screens(), 2);
    assert!(inventory.screens.iter().all(|s| s.depth <= 1));
    assert_eq!(inventory.truncation, Some(TruncationReason::DepthLimit));
    assert!(!engine
        .site()
        .fetches()
        .iter()
        .any(|f| f.ends_with("/archive")));
}

#[tokio::test]
async fn test_aria_tabs_detected() {
    let site = FixtureSite::new().page(
        "/",
        html(
            "Account",
            r#"<div role="tablist">
                <button role="tab" aria-selected="true">Profile</button>
                <button role="tab" aria-selected="false">Billing</button>
                <button role="tab" aria-selected="false">Security</button>
            </div>"#,
        ),
    );
    let engine = FixtureEngine::new(site);

    let (result, _) = crawl(&engine, config(50, 4)).await;
    let inventory = result.unwrap();

    let structure = &inventory.screens[0].structure;
    let labels: Vec<&str> = structure.tabs.iter().map(|t| t.label.as_str()).collect();
    assert_eq!(labels, vec!["Profile", "Billing", "Security"]);
    assert!(structure.tabs[0].selected);
    assert_eq!(structure.tab_source, Some(DetectionSource::Aria));
}

#[tokio::test]
async fn test_inventory_invariants_with_many_workers() {
    let sections = ["sales", "support", "finance"];
    let root_links: String = sections
        .iter()
        .map(|s| format!(r#"<a href="/{}">{}</a>"#, s, s))
        .collect();

    let mut site = FixtureSite::new()
        .latency(Duration::from_millis(20))
        .page("/", html("Home", &root_links));
    for section in sections {
        let links: String = (1..=3)
            .map(|i| format!(r#"<a href="/{}/items/{}">Item {}</a>"#, section, i, i))
            .chain(std::iter::once(format!(r#"<a href="/{}/overview">Overview</a>"#, section)))
            .chain(std::iter::once(r#"<a href="/">Home</a>"#.to_string()))
            .collect();
        site = site
            .page(&format!("/{}", section), html(section, &links))
            .page(
                &format!("/{}/overview", section),
                html("Overview", &format!("<h1>{} overview</h1>", section)),
            );
        for i in 1..=3 {
            site = site.page(&format!("/{}/items/{}", section, i), item_page(i));
        }
    }
    let engine = FixtureEngine::new(site);

    let mut config = config(50, 2);
    config.workers = 4;
    let (result, _) = crawl(&engine, config).await;
    let inventory = result.unwrap();

    assert_inventory_invariants(&inventory, 50);
    // root, three sections, and per section three items plus an overview
    assert_eq!(inventory.pages_visited, 16);
    assert_eq!(inventory.total_screens(), 10);
    assert!(inventory.templates.len() < inventory.pages_visited as usize);
    assert!(!inventory.truncated);

    // Each URL was navigated once, plus the auth check of the base URL
    let fetches = engine.site().fetches();
    assert_eq!(fetches.len(), inventory.pages_visited as usize + 1);
    assert!(engine.site().max_in_flight() <= 4);
    assert_eq!(engine.site().contexts_opened(), 4);
}

#[tokio::test]
async fn test_structure_extraction_is_pure() {
    let page_html = html(
        "Users",
        r#"<header><nav><a href="/users" class="active">Users</a></nav></header>
           <main><h1>Users</h1><button>Invite</button>
           <form><input name="q" placeholder="Search" required></form></main>"#,
    );
    let site = FixtureSite::new().page("/", page_html.clone());
    let engine = FixtureEngine::new(site);

    let mut context = engine.open_context(None).await.unwrap();
    let fetcher = PageFetcher::new(Duration::from_secs(5), Duration::ZERO);
    let first = fetcher.render(&mut context, &url("/")).await.unwrap();
    let second = fetcher.render(&mut context, &url("/")).await.unwrap();

    let a = extract_structure(&first);
    let b = extract_structure(&second);
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&extract_from_html(&page_html)).unwrap()
    );

    let (result, _) = crawl(&engine, config(50, 4)).await;
    let inventory = result.unwrap();
    assert_eq!(inventory.screens[0].structure, a);
}

#[tokio::test]
async fn test_failed_pages_are_recorded_not_fatal() {
    let site = FixtureSite::new()
        .page(
            "/",
            html(
                "Home",
                r#"<a href="/broken">Broken</a><a href="/missing">Missing</a><a href="/reports">Reports</a>"#,
            ),
        )
        .page_with_status("/broken", 502, html("Bad Gateway", "<h1>Bad Gateway</h1>"))
        .page("/reports", html("Reports", "<h1>Reports</h1>"))
        .failing_capture("/reports");
    let engine = FixtureEngine::new(site);

    let (result, store) = crawl(&engine, config(50, 4)).await;
    let inventory = result.unwrap();

    assert_inventory_invariants(&inventory, 50);
    assert_eq!(inventory.pages_visited, 4);
    assert_eq!(inventory.total_screens(), 2);

    // Error pages are listed with their status, never kept as screens
    let mut skipped: Vec<(String, String)> = inventory
        .skipped
        .iter()
        .map(|k| (k.url.clone(), k.reason.clone()))
        .collect();
    skipped.sort();
    assert_eq!(skipped.len(), 2);
    assert_eq!(skipped[0].0, url("/broken").to_string());
    assert!(skipped[0].1.contains("502"));
    assert_eq!(skipped[1], (url("/missing").to_string(), "HTTP 404".to_string()));
    assert!(inventory.screens.iter().all(|s| s.kind == PageKind::Content));

    let reports = inventory
        .screens
        .iter()
        .find(|s| s.url.ends_with("/reports"))
        .unwrap();
    assert!(reports.capture_failed);
    assert!(reports.snapshot.is_none());

    let home = &inventory.screens[0];
    let snapshot = home.snapshot.as_ref().unwrap();
    assert!(snapshot.id.starts_with("screen-home-"));
    assert!(snapshot.data_uri(store.as_ref()).unwrap().starts_with("data:image/png;base64,"));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_destructive_routes_are_never_visited() {
    let site = FixtureSite::new()
        .page(
            "/",
            html(
                "Home",
                r#"<nav><a href="/reports">Reports</a><a href="/logout">Log out</a>
                   <a href="/items/3/delete">Remove item</a></nav>
                   <div role="link" id="leave" data-href="/account/sign-out">Leave</div>"#,
            ),
        )
        .page("/reports", html("Reports", "<h1>Reports</h1>"))
        .page("/logout", html("Signed out", "<h1>Goodbye</h1>"))
        .page("/items/3/delete", html("Deleted", "<h1>Deleted</h1>"))
        .engage("/", "#leave", "/account/sign-out");
    let engine = FixtureEngine::new(site);

    let (result, _) = crawl(&engine, config(50, 4)).await;
    let inventory = result.unwrap();

    let fetches = engine.site().fetches();
    assert!(
        fetches
            .iter()
            .all(|f| !f.contains("logout") && !f.contains("delete") && !f.contains("sign-out")),
        "destructive route visited: {:?}",
        fetches
    );

    assert_eq!(inventory.total_screens(), 2);
    assert_eq!(inventory.pages_visited, 2);

    let mut refused: Vec<&str> = inventory.skipped.iter().map(|k| k.url.as_str()).collect();
    refused.sort();
    assert_eq!(
        refused,
        vec!["https://fixture.test/items/3/delete", "https://fixture.test/logout"]
    );
    assert!(inventory
        .skipped
        .iter()
        .all(|k| k.reason == "destructive route" && k.depth == 1));
}

#[tokio::test]
async fn test_scope_patterns_applied_during_crawl() {
    let site = FixtureSite::new()
        .page(
            "/",
            html(
                "Home",
                r#"<a href="/app/reports">Reports</a><a href="/app/admin/users">Users</a>
                   <a href="/marketing">Marketing</a>"#,
            ),
        )
        .page("/app/reports", html("Reports", r#"<a href="/app/admin">Admin</a>"#))
        .page("/app/admin", html("Admin", "<h1>Admin</h1>"))
        .page("/app/admin/users", html("Users", "<h1>Users</h1>"))
        .page("/marketing", html("Marketing", "<h1>Buy now</h1>"));
    let engine = FixtureEngine::new(site);

    let mut config = config(50, 4);
    config.scope = ScopeFilter::new(&["/app/*"], &["/app/admin*"]).unwrap();
    let (result, _) = crawl(&engine, config).await;
    let inventory = result.unwrap();

    let urls: Vec<&str> = inventory.screens.iter().map(|s| s.url.as_str()).collect();
    assert_eq!(urls, vec!["https://fixture.test/", "https://fixture.test/app/reports"]);
    assert!(!inventory.truncated);
    assert!(inventory.skipped.is_empty());

    let fetches = engine.site().fetches();
    assert!(!fetches.iter().any(|f| f.contains("/admin") || f.contains("/marketing")));
}

#[tokio::test]
async fn test_structural_siblings_merge_but_unrelated_pages_stay_apart() {
    let doc = |title: &str| {
        html(
            title,
            &format!(
                "<main><h1>{}</h1><h2>Steps</h2><button>Copy</button><button>Share</button></main>",
                title
            ),
        )
    };
    let site = FixtureSite::new()
        .page(
            "/",
            html(
                "Home",
                r#"<a href="/docs/getting-started">Start</a><a href="/docs/installation">Install</a>
                   <a href="/docs/settings">Settings</a>"#,
            ),
        )
        .page("/docs/getting-started", doc("Getting started"))
        .page("/docs/installation", doc("Installation"))
        .page(
            "/docs/settings",
            html(
                "Settings",
                r#"<h3>Preferences</h3><label for="email">Email</label>
                   <input id="email" name="email" type="email">"#,
            ),
        );
    let engine = FixtureEngine::new(site);

    let mut config = config(50, 4);
    config.workers = 1;
    let (result, _) = crawl(&engine, config).await;
    let inventory = result.unwrap();

    assert_inventory_invariants(&inventory, 50);
    assert_eq!(inventory.pages_visited, 4);
    assert_eq!(inventory.total_screens(), 3);
    assert_eq!(inventory.template("/docs/:slug").unwrap().instances, 2);

    let settings = inventory
        .screens
        .iter()
        .find(|s| s.url.ends_with("/docs/settings"))
        .unwrap();
    assert_eq!(settings.template, "/docs/settings");
}

#[tokio::test]
async fn test_single_page_site_yields_one_screen() {
    let site = FixtureSite::new().page("/", html("Landing", "<h1>Welcome</h1>"));
    let engine = FixtureEngine::new(site);

    let (result, _) = crawl(&engine, config(50, 4)).await;
    let inventory = result.unwrap();

    assert_eq!(inventory.total_screens(), 1);
    assert_eq!(inventory.screens[0].nav_path, vec!["Landing"]);
    assert!(inventory.skipped.is_empty());
    assert!(!inventory.truncated);
}

fn wide_site(pages: usize, latency: Duration) -> FixtureSite {
    let links: String = (0..pages)
        .map(|i| format!(r#"<a href="/page-{}">Page {}</a>"#, i, i))
        .collect();
    let mut site = FixtureSite::new()
        .latency(latency)
        .page("/", html("Home", &links));
    for i in 0..pages {
        site = site.page(
            &format!("/page-{}", i),
            html(&format!("Page {}", i), &format!("<h{}>Page</h{}>", i % 6 + 1, i % 6 + 1)),
        );
    }
    site
}

#[tokio::test]
async fn test_cancellation_drains_and_emits() {
    let engine = FixtureEngine::new(wide_site(30, Duration::from_millis(100)));
    let store: Arc<dyn SnapshotStore> = Arc::new(MemorySnapshotStore::new());
    let crawler = SiteCrawler::new(engine.clone(), config(50, 4), store);

    let canceller = crawler.canceller();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(350)).await;
        canceller.cancel();
    });

    let inventory = crawler.crawl().await.unwrap();

    assert!(crawler.canceller().is_cancelled());
    assert!(inventory.truncated);
    assert_eq!(inventory.truncation, Some(TruncationReason::Cancelled));
    assert!(inventory.pages_visited < 31);
    assert!(inventory.total_screens() >= 1);
    assert_inventory_invariants(&inventory, 50);
    // Every dispatched page finished before the inventory was emitted
    assert_eq!(
        inventory.total_screens() + inventory.skipped.len(),
        inventory.pages_visited as usize
    );
}

#[tokio::test]
async fn test_cancel_before_start_crawls_nothing() {
    let engine = FixtureEngine::new(wide_site(3, Duration::ZERO));
    let store: Arc<dyn SnapshotStore> = Arc::new(MemorySnapshotStore::new());
    let crawler = SiteCrawler::new(engine.clone(), config(50, 4), store);
    crawler.canceller().cancel();

    let inventory = crawler.crawl().await.unwrap();

    assert!(inventory.is_empty());
    assert_eq!(inventory.truncation, Some(TruncationReason::Cancelled));
    assert!(engine.site().fetches().is_empty());
}

#[tokio::test]
async fn test_deadline_truncates() {
    let engine = FixtureEngine::new(wide_site(30, Duration::from_millis(100)));

    let mut config = config(50, 4);
    config.deadline = Some(Duration::from_millis(400));
    let (result, _) = crawl(&engine, config).await;
    let inventory = result.unwrap();

    assert_eq!(inventory.truncation, Some(TruncationReason::Deadline));
    assert!(inventory.pages_visited < 31);
    assert_inventory_invariants(&inventory, 50);
}
