use probe_engine::extract::extract_forms;
use probe_engine::scan::form_injection_tasks;
use probe_engine::{directory_scan, injection_scan, query_injection_scan, DirScanOptions, SqliScanOptions};
use std::sync::Arc;
use url::Url;
use web_surface::{HttpProber, WebProbeOptions};
use webprobe_core::{ErrorKind, HttpMethod, Target};
use wiremock::matchers::{any, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn prober() -> Arc<HttpProber> {
    let opts = WebProbeOptions { timeout_ms: 2_000, ..Default::default() };
    Arc::new(HttpProber::new(opts).unwrap())
}

fn words(ws: &[&str]) -> Vec<String> {
    ws.iter().map(|w| w.to_string()).collect()
}

#[tokio::test]
async fn login_and_forbidden_config_are_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("login form"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/config"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let root = Target::parse(&server.uri()).unwrap();
    let result = directory_scan(prober(), &root, &words(&["login", "config"]), &DirScanOptions::default())
        .unwrap()
        .run()
        .await;

    let mut hits = result.directory_hits();
    hits.sort();
    assert_eq!(
        hits,
        vec![
            (format!("{}/config", server.uri()), HttpMethod::Get, 403),
            (format!("{}/login", server.uri()), HttpMethod::Get, 200),
        ]
    );
    assert!(result.errors.is_empty());
    assert_eq!(result.total_dispatched, 2);
}

#[tokio::test]
async fn branded_not_found_page_is_filtered() {
    let server = MockServer::start().await;
    let not_found = "<html><body><h1>Page Not Found — Acme Corp</h1></body></html>";
    Mock::given(path("/ghost"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(not_found, "text/html"))
        .mount(&server)
        .await;
    Mock::given(path("/dashboard"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<h1>Dashboard</h1>", "text/html"))
        .mount(&server)
        .await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(404).set_body_raw(not_found, "text/html"))
        .with_priority(10)
        .mount(&server)
        .await;

    let root = Target::parse(&server.uri()).unwrap();
    let result = directory_scan(prober(), &root, &words(&["ghost", "dashboard", "nothing"]), &DirScanOptions::default())
        .unwrap()
        .run()
        .await;
    assert_eq!(result.directory_hits(), vec![(format!("{}/dashboard", server.uri()), HttpMethod::Get, 200)]);
    assert_eq!(result.total_dispatched, 3);
}

#[tokio::test]
async fn hit_pages_are_expanded_once() {
    let server = MockServer::start().await;
    let admin = r#"<html><body><a href="/admin/users">Users</a><a href="/admin">Home</a><a href="https://elsewhere.test/">x</a></body></html>"#;
    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(admin, "text/html"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/users"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>alice, bob</p>", "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let root = Target::parse(&server.uri()).unwrap();
    let result = directory_scan(prober(), &root, &words(&["admin"]), &DirScanOptions::default())
        .unwrap()
        .run()
        .await;
    let mut urls: Vec<String> = result.directory_hits().into_iter().map(|(u, _, _)| u).collect();
    urls.sort();
    assert_eq!(urls, vec![format!("{}/admin", server.uri()), format!("{}/admin/users", server.uri())]);
    assert_eq!(result.total_dispatched, 2);
}

#[tokio::test]
async fn no_recurse_leaves_links_alone() {
    let server = MockServer::start().await;
    Mock::given(path("/admin"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"<a href="/admin/users">u</a>"#, "text/html"))
        .mount(&server)
        .await;
    Mock::given(path("/admin/users"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let root = Target::parse(&server.uri()).unwrap();
    let opts = DirScanOptions { recurse: false, ..Default::default() };
    let result = directory_scan(prober(), &root, &words(&["admin"]), &opts).unwrap().run().await;
    assert_eq!(result.total_dispatched, 1);
}

#[tokio::test]
async fn query_injection_reports_sql_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .and(query_param("id", "' OR '1'='1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("Warning: You have an error in your SQL syntax near ''1'='1'"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(ResponseTemplate::new(200).set_body_string("item 1"))
        .with_priority(10)
        .mount(&server)
        .await;

    let root = Target::parse(&format!("{}/item", server.uri())).unwrap();
    let payloads = words(&["' OR '1'='1", "1"]);
    let result = query_injection_scan(prober(), &root, &payloads, &SqliScanOptions::default())
        .unwrap()
        .run()
        .await;
    assert_eq!(
        result.injection_hits(),
        vec![(format!("{}/item", server.uri()), HttpMethod::Get, "' OR '1'='1".to_string())]
    );
    assert_eq!(result.total_dispatched, 2);
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn form_injection_posts_payload() {
    let server = MockServer::start().await;
    let page = r#"<form action="/login" method="post">
        <input type="text" name="username">
        <input type="password" name="password">
        <input type="hidden" name="csrf" value="t0k">
        <input type="submit" value="Go">
    </form>"#;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string_contains("username=admin%27+--"))
        .and(body_string_contains("csrf=t0k"))
        .respond_with(ResponseTemplate::new(500).set_body_string("pq: syntax error at or near \"--\""))
        .expect(1)
        .mount(&server)
        .await;

    let page_url = Url::parse(&format!("{}/", server.uri())).unwrap();
    let forms = extract_forms(page, &page_url);
    let tasks = form_injection_tasks(&forms, &words(&["admin' --"]));
    assert_eq!(tasks.len(), 1);
    let result = injection_scan(prober(), tasks, &SqliScanOptions::default()).unwrap().run().await;
    assert_eq!(
        result.injection_hits(),
        vec![(format!("{}/login", server.uri()), HttpMethod::Post, "admin' --".to_string())]
    );
}

#[tokio::test]
async fn unreachable_host_is_an_error_not_a_hit() {
    let root = Target::parse("http://127.0.0.1:9").unwrap();
    let opts = DirScanOptions { concurrency: 2, ..Default::default() };
    let result = directory_scan(prober(), &root, &words(&["a", "b"]), &opts).unwrap().run().await;
    assert!(result.hits.is_empty());
    assert_eq!(result.errors.len(), 2);
    assert!(result.errors.iter().all(|e| e.error.is_transient()));
}

#[tokio::test]
async fn scheme_less_root_is_rejected_until_resolved() {
    let server = MockServer::start().await;
    let admin = r#"<a href="/admin/users">Users</a><a href="/admin">Home</a>"#;
    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(admin, "text/html"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/users"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>users</p>", "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let p = prober();
    let bare = Target::parse(server.uri().trim_start_matches("http://")).unwrap();
    assert!(directory_scan(p.clone(), &bare, &words(&["admin"]), &DirScanOptions::default()).is_err());

    let root = p.resolve_scheme(&bare).await;
    assert!(root.0.starts_with("http://"));
    let result = directory_scan(p, &root, &words(&["admin"]), &DirScanOptions::default()).unwrap().run().await;
    assert_eq!(result.total_dispatched, 2);
    assert_eq!(result.hits.len(), 2);
}

#[tokio::test]
async fn links_survive_a_cap_inside_a_multibyte_character() {
    let server = MockServer::start().await;
    let page = r#"<a href="/admin/users">users</a> café crème"#;
    let cut = page.find('é').unwrap() + 1;
    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(page, "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/users"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>users</p>", "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let p = Arc::new(HttpProber::new(WebProbeOptions { timeout_ms: 2_000, max_body_bytes: cut, ..Default::default() }).unwrap());
    let root = Target::parse(&server.uri()).unwrap();
    let result = directory_scan(p, &root, &words(&["admin"]), &DirScanOptions::default()).unwrap().run().await;
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.total_dispatched, 2);
}

#[tokio::test]
async fn invalid_utf8_page_is_a_decode_error() {
    let server = MockServer::start().await;
    let body: Vec<u8> = b"<a href=\"/next\">n</a>\xff\xfe<p>x</p>".to_vec();
    Mock::given(method("GET"))
        .and(path("/bad"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(&server)
        .await;
    Mock::given(path("/next"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let root = Target::parse(&server.uri()).unwrap();
    let result = directory_scan(prober(), &root, &words(&["bad"]), &DirScanOptions::default()).unwrap().run().await;
    assert_eq!(result.total_dispatched, 1);
    assert_eq!(result.hits.len(), 1);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].error.kind, ErrorKind::Decode);
}
