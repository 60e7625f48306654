//! HTTP-level tests: the real router from `build_router`, driven request by
//! request with tower's `oneshot`.
//!
//! Each test stands up an engine over a fresh resources/cache tree with a
//! small DSL fixture dictionary, then exercises the lookup and management
//! surfaces exactly as a client would.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use dictserve_core::catalog::Paths;
use dictserve_core::Engine;
use dictserve_server::{build_router, AppContext};

const GROUP: &str = "Default%20Group";

/// UTF-16-LE with a BOM, the common DSL encoding in the wild.
fn write_dsl(path: &Path, text: &str) {
    let mut bytes = vec![0xff, 0xfe];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    std::fs::write(path, bytes).unwrap();
}

struct Harness {
    _dir: tempfile::TempDir,
    app: Router,
    cache_root: std::path::PathBuf,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::new(dir.path().join("res"), dir.path().join("cache"));
    paths.ensure().unwrap();
    write_dsl(
        &paths.default_source_dir().join("greet.dsl"),
        "#NAME \"Greetings\"\n\
         hello\n [b]a greeting[/b] see [ref]goodbye[/ref]\n\
         goodbye\n a farewell\n\
         hey\n an informal greeting\n",
    );

    let cache_root = dir.path().join("cache");
    let engine = Engine::open(paths).unwrap();
    engine.scan_sources();
    let app = build_router(AppContext {
        engine: Arc::new(engine),
        start_time: std::time::Instant::now(),
    });
    Harness { _dir: dir, app, cache_root }
}

async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&body).into_owned())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, body) = get(app, uri).await;
    let value = serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
    (status, value)
}

async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    payload: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, value)
}

// ---------------------------------------------------------------------------
// Health and lookup surface
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_the_loaded_catalog() {
    let h = harness();
    let (status, body) = get_json(&h.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["dictionaries"], 1);
}

#[tokio::test]
async fn suggestions_are_timestamped_and_padded() {
    let h = harness();
    let (status, body) = get_json(&h.app, &format!("/api/suggestions/{GROUP}/he")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["timestamp"].is_number());
    let suggestions = body["suggestions"].as_array().unwrap();
    assert_eq!(suggestions.len(), 10);
    assert_eq!(suggestions[0], "hello");
    assert_eq!(suggestions[1], "hey");
    assert_eq!(suggestions[2], "");
}

#[tokio::test]
async fn suggestions_for_a_missing_group_are_404() {
    let h = harness();
    let (status, body) = get(&h.app, "/api/suggestions/Nope/he").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("not found"));
}

#[tokio::test]
async fn query_returns_html_by_default_and_json_with_dicts() {
    let h = harness();
    let (status, body) = get(&h.app, &format!("/api/query/{GROUP}/hello")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<h3 class=\"headword\">hello</h3>"));
    assert!(body.contains("<div id=\"d-greet\">"));
    assert!(body.contains("<b>a greeting</b>"));

    let (status, body) = get_json(&h.app, &format!("/api/query/{GROUP}/hello?dicts=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["found"], true);
    assert_eq!(body["dictionaries"][0], "d-greet");
    assert!(body["articles"].as_str().unwrap().contains("a greeting"));
}

#[tokio::test]
async fn query_misses_render_a_suggestions_page() {
    let h = harness();
    let (status, body) = get_json(&h.app, &format!("/api/query/{GROUP}/zzz?dicts=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["found"], false);
    assert!(body["articles"].as_str().unwrap().contains("No entries found"));
}

#[tokio::test]
async fn lookup_serves_articles_and_404s() {
    let h = harness();
    let (status, body) = get(&h.app, "/api/lookup/d-greet/hello").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("a greeting"));

    let (status, _) = get(&h.app, "/api/lookup/d-greet/zzz").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = get(&h.app, "/api/lookup/d-missing/hello").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn anki_export_is_stripped_of_links() {
    let h = harness();
    let (status, body) = get(&h.app, &format!("/api/anki/{GROUP}/hello")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<b>a greeting</b>"));
    assert!(body.contains("goodbye"));
    assert!(!body.contains("<a href"));
}

#[tokio::test]
async fn fts_is_404_without_an_index() {
    let h = harness();
    let (status, body) = get(&h.app, "/api/fts/greeting").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("not available"));
}

#[tokio::test]
async fn cache_serves_extracted_resources() {
    let h = harness();
    let resource = h.cache_root.join("d-greet/img/pic.png");
    std::fs::create_dir_all(resource.parent().unwrap()).unwrap();
    std::fs::write(&resource, b"png bytes").unwrap();

    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/cache/d-greet/img/pic.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"png bytes");

    let (status, _) = get(&h.app, "/api/cache/d-greet/missing.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Management surface
// ---------------------------------------------------------------------------

#[tokio::test]
async fn management_lists_formats_dictionaries_and_groupings() {
    let h = harness();
    let (status, formats) = get_json(&h.app, "/api/management/formats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(formats.as_array().unwrap().len(), 3);

    let (_, dictionaries) = get_json(&h.app, "/api/management/dictionaries").await;
    assert_eq!(dictionaries[0]["dictionary_name"], "d-greet");
    assert_eq!(dictionaries[0]["dictionary_display_name"], "Greetings");

    let (_, groupings) = get_json(&h.app, "/api/management/dictionary_groupings").await;
    assert_eq!(groupings["Default Group"][0], "d-greet");
}

#[tokio::test]
async fn management_groups_validate_language_tags() {
    let h = harness();
    let (status, body) = send_json(
        &h.app,
        "POST",
        "/api/management/groups",
        serde_json::json!({ "name": "Greek", "lang": ["el"] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["groups"].as_array().unwrap().len(), 2);

    let (status, _) = send_json(
        &h.app,
        "POST",
        "/api/management/groups",
        serde_json::json!({ "name": "Bad", "lang": ["not-a-lang"] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn management_num_suggestions_resizes_the_padding() {
    let h = harness();
    let (status, body) = send_json(
        &h.app,
        "PUT",
        "/api/management/num_suggestions",
        serde_json::json!({ "size": 5 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["size"], 5);

    let (_, body) = get_json(&h.app, &format!("/api/suggestions/{GROUP}/he")).await;
    assert_eq!(body["suggestions"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn management_history_tracks_queries() {
    let h = harness();
    get(&h.app, &format!("/api/query/{GROUP}/hello")).await;
    get(&h.app, &format!("/api/query/{GROUP}/goodbye")).await;

    let (_, history) = get_json(&h.app, "/api/management/history").await;
    assert_eq!(history[0], "goodbye");
    assert_eq!(history[1], "hello");

    let request =
        Request::builder().method("DELETE").uri("/api/management/history").body(Body::empty());
    let response = h.app.clone().oneshot(request.unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let (_, history) = get_json(&h.app, "/api/management/history").await;
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn management_scan_is_additive() {
    let h = harness();
    let (status, body) = get_json(&h.app, "/api/management/scan").await;
    assert_eq!(status, StatusCode::OK);
    // The fixture was already registered at startup; a re-scan keeps it.
    assert_eq!(body["dictionaries"].as_array().unwrap().len(), 1);
    assert!(body["groupings"].is_object());
}

#[tokio::test]
async fn ngram_rebuild_enables_substring_suggestions() {
    let h = harness();
    let (status, body) = get_json(&h.app, "/api/management/create_ngram_table").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    // "ello" is a substring of "hello", reachable only through the n-gram
    // stage the rebuild just switched on.
    let (_, body) = get_json(&h.app, &format!("/api/suggestions/{GROUP}/ello")).await;
    let suggestions = body["suggestions"].as_array().unwrap();
    assert!(suggestions.iter().any(|s| s == "hello"));
}
