//! HTTP API handlers.
//!
//! The lookup surface (`/api/suggestions`, `/api/query`, `/api/lookup`,
//! `/api/anki`, `/api/fts`, `/api/cache`) serves the client UI; the
//! management surface (`/api/management/*`) administers the catalog, groups,
//! sources, and history. Engine calls run under `spawn_blocking`: everything
//! below them is synchronous file and database work.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use dictserve_core::catalog::{DictionaryFormat, GroupInfo};
use dictserve_core::{ArticleResult, DictionaryInfo, Engine, EngineError};

#[derive(Clone)]
pub struct AppContext {
    pub engine: Arc<Engine>,
    pub start_time: std::time::Instant,
}

/// Assemble the lookup and management surfaces over the shared context.
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(api_health))
        // Lookup surface
        .route("/api/suggestions/{group}/{key}", get(api_suggestions))
        .route("/api/query/{group}/{key}", get(api_query))
        .route("/api/lookup/{dictionary}/{key}", get(api_lookup))
        .route("/api/anki/{group}/{word}", get(api_anki))
        .route("/api/fts/{query}", get(api_fts))
        .route("/api/cache/{*path}", get(api_cache))
        // Management surface
        .route("/api/management/formats", get(api_formats))
        .route(
            "/api/management/dictionaries",
            get(api_dictionaries)
                .post(api_add_dictionary)
                .delete(api_remove_dictionary)
                .put(api_reorder_dictionaries),
        )
        .route("/api/management/dictionary_name", put(api_change_dictionary_name))
        .route("/api/management/headword_count", post(api_headword_count))
        .route(
            "/api/management/sources",
            get(api_sources).post(api_add_source).delete(api_remove_source),
        )
        .route("/api/management/scan", get(api_scan))
        .route(
            "/api/management/groups",
            get(api_groups).post(api_add_group).delete(api_remove_group).put(api_reorder_groups),
        )
        .route("/api/management/group_lang", put(api_change_group_lang))
        .route("/api/management/group_name", put(api_change_group_name))
        .route(
            "/api/management/dictionary_groupings",
            get(api_groupings).post(api_group_add_dictionary).delete(api_group_remove_dictionary),
        )
        .route("/api/management/history", get(api_history).delete(api_clear_history))
        .route("/api/management/history_size", get(api_history_size).put(api_set_history_size))
        .route(
            "/api/management/num_suggestions",
            get(api_num_suggestions).put(api_set_num_suggestions),
        )
        .route("/api/management/create_ngram_table", get(api_create_ngram_table))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Missing groups/dictionaries/entries are 404 with a short HTML body;
/// everything else is a 500 naming the error kind.
fn error_response(e: EngineError) -> Response {
    if e.is_not_found() {
        (StatusCode::NOT_FOUND, Html(format!("<p>{e}</p>"))).into_response()
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, Html(format!("<p>{}: {e}</p>", e.kind())))
            .into_response()
    }
}

async fn blocking<T, F>(work: F) -> Result<T, Response>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, EngineError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|_| {
            (StatusCode::INTERNAL_SERVER_ERROR, Html("<p>worker panicked</p>".to_string()))
                .into_response()
        })?
        .map_err(error_response)
}

fn unix_timestamp() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Article rendering
// ---------------------------------------------------------------------------

/// Each article sits in a container whose id carries the dictionary's CSS
/// namespace; isolated stylesheets target selectors beneath it.
fn render_articles(articles: &[ArticleResult]) -> String {
    articles
        .iter()
        .map(|article| {
            format!(
                "<div class=\"article-block\">\n<h2 class=\"dictionary-name\">{}</h2>\n\
                 <div id=\"{}\">{}</div>\n</div>",
                article.display_name, article.dictionary, article.html
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_no_results(group: &str, key: &str, suggestions: &[String]) -> String {
    let mut html = format!("<p>No entries found for <b>{key}</b>.</p>");
    let links: Vec<String> = suggestions
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| format!("<li><a href=\"/api/query/{group}/{s}\">{s}</a></li>"))
        .collect();
    if !links.is_empty() {
        html.push_str("<p>Did you mean:</p>\n<ul>");
        html.push_str(&links.join("\n"));
        html.push_str("</ul>");
    }
    html
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

pub async fn api_health(State(ctx): State<AppContext>) -> impl IntoResponse {
    let dictionaries = ctx.engine.settings.lock().unwrap().dictionaries.len();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "dictionaries": dictionaries,
        "uptime_seconds": ctx.start_time.elapsed().as_secs(),
    }))
}

// ---------------------------------------------------------------------------
// Lookup surface
// ---------------------------------------------------------------------------

pub async fn api_suggestions(
    State(ctx): State<AppContext>,
    Path((group, key)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, Response> {
    let timestamp = unix_timestamp();
    let engine = ctx.engine.clone();
    let suggestions = blocking(move || engine.suggestions(&group, &key)).await?;
    Ok(Json(json!({ "timestamp": timestamp, "suggestions": suggestions })))
}

#[derive(Deserialize)]
pub struct QueryFlags {
    dicts: Option<String>,
}

pub async fn api_query(
    State(ctx): State<AppContext>,
    Path((group, key)): Path<(String, String)>,
    Query(flags): Query<QueryFlags>,
) -> Result<Response, Response> {
    let engine = ctx.engine.clone();
    let query_group = group.clone();
    let query_key = key.clone();
    let articles = blocking(move || engine.query(&query_group, &query_key)).await?;

    let include_dictionaries = flags.dicts.is_some();
    if !articles.is_empty() {
        let html = render_articles(&articles);
        if include_dictionaries {
            let names: Vec<&str> = articles.iter().map(|a| a.dictionary.as_str()).collect();
            return Ok(
                Json(json!({ "found": true, "articles": html, "dictionaries": names }))
                    .into_response(),
            );
        }
        return Ok(Html(html).into_response());
    }

    // Nothing matched: offer spelling corrections instead.
    let engine = ctx.engine.clone();
    let spell_group = group.clone();
    let spell_key = key.clone();
    let suggestions =
        blocking(move || engine.group_spelling_suggestions(&spell_group, &spell_key)).await?;
    let html = render_no_results(&group, &key, &suggestions);
    if include_dictionaries {
        let members = ctx
            .engine
            .settings
            .lock()
            .unwrap()
            .dictionaries_of_group(&group)
            .map_err(error_response)?;
        return Ok(
            Json(json!({ "found": false, "articles": html, "dictionaries": members }))
                .into_response(),
        );
    }
    Ok(Html(html).into_response())
}

/// Legacy cross-reference target, kept because extracted articles link to it.
pub async fn api_lookup(
    State(ctx): State<AppContext>,
    Path((dictionary, key)): Path<(String, String)>,
) -> Result<Html<String>, Response> {
    let engine = ctx.engine.clone();
    let article = blocking(move || engine.lookup(&dictionary, &key)).await?;
    Ok(Html(article))
}

pub async fn api_anki(
    State(ctx): State<AppContext>,
    Path((group, word)): Path<(String, String)>,
) -> Result<Html<String>, Response> {
    let engine = ctx.engine.clone();
    let html = blocking(move || engine.anki(&group, &word)).await?;
    Ok(Html(html))
}

pub async fn api_fts(
    State(ctx): State<AppContext>,
    Path(query): Path<String>,
) -> Result<Response, Response> {
    let engine = ctx.engine.clone();
    let result = tokio::task::spawn_blocking(move || engine.fts(&query, 100)).await.map_err(
        |_| {
            (StatusCode::INTERNAL_SERVER_ERROR, Html("<p>worker panicked</p>".to_string()))
                .into_response()
        },
    )?;
    match result {
        Ok(articles) => {
            let html = render_articles(&articles);
            let names: Vec<&str> = articles.iter().map(|a| a.dictionary.as_str()).collect();
            Ok(Json(json!({
                "found": !articles.is_empty(),
                "articles": html,
                "dictionaries": names,
            }))
            .into_response())
        }
        // No index installed: the whole surface is absent.
        Err(EngineError::ExternalUnavailable(_)) => {
            Ok((StatusCode::NOT_FOUND, Html("<p>Full-text search is not available</p>"))
                .into_response())
        }
        Err(e) => Err(error_response(e)),
    }
}

/// Static files from the per-dictionary resource cache.
pub async fn api_cache(
    State(ctx): State<AppContext>,
    Path(path): Path<String>,
) -> Result<Response, Response> {
    let Some(full_path) = ctx.engine.resource_path(&path) else {
        return Err(
            (StatusCode::NOT_FOUND, Html("<p>Resource not found</p>".to_string()))
                .into_response(),
        );
    };
    let bytes = tokio::fs::read(&full_path).await.map_err(|_| {
        (StatusCode::NOT_FOUND, Html("<p>Resource not found</p>".to_string())).into_response()
    })?;
    Ok(([("content-type", content_type_of(&full_path))], bytes).into_response())
}

fn content_type_of(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "css" => "text/css",
        "js" => "application/javascript",
        "html" | "htm" => "text/html",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "ogg" | "oga" => "audio/ogg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------------------
// Management: dictionaries
// ---------------------------------------------------------------------------

pub async fn api_formats() -> Json<serde_json::Value> {
    Json(json!(DictionaryFormat::all()))
}

fn catalog_state(ctx: &AppContext) -> serde_json::Value {
    let settings = ctx.engine.settings.lock().unwrap();
    json!({
        "dictionaries": settings.dictionaries,
        "groupings": settings.dictionary_groupings(),
    })
}

pub async fn api_dictionaries(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    let dictionaries = ctx.engine.settings.lock().unwrap().dictionaries.clone();
    Json(json!(dictionaries))
}

#[derive(Deserialize)]
pub struct AddDictionaryRequest {
    #[serde(flatten)]
    info: DictionaryInfo,
    group_name: Option<String>,
}

pub async fn api_add_dictionary(
    State(ctx): State<AppContext>,
    Json(body): Json<AddDictionaryRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    let engine = ctx.engine.clone();
    let groups = body
        .group_name
        .map(|g| BTreeSet::from([g]));
    blocking(move || engine.add_dictionary(body.info, groups)).await?;
    Ok(Json(catalog_state(&ctx)))
}

#[derive(Deserialize)]
pub struct NamedRequest {
    name: String,
}

pub async fn api_remove_dictionary(
    State(ctx): State<AppContext>,
    Json(body): Json<NamedRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    let engine = ctx.engine.clone();
    blocking(move || engine.remove_dictionary(&body.name)).await?;
    Ok(Json(catalog_state(&ctx)))
}

pub async fn api_reorder_dictionaries(
    State(ctx): State<AppContext>,
    Json(body): Json<Vec<DictionaryInfo>>,
) -> Result<Json<serde_json::Value>, Response> {
    ctx.engine
        .settings
        .lock()
        .unwrap()
        .reorder_dictionaries(body)
        .map_err(error_response)?;
    Ok(Json(json!(ctx.engine.settings.lock().unwrap().dictionaries)))
}

#[derive(Deserialize)]
pub struct RenameDictionaryRequest {
    name: String,
    display: String,
}

pub async fn api_change_dictionary_name(
    State(ctx): State<AppContext>,
    Json(body): Json<RenameDictionaryRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    ctx.engine
        .settings
        .lock()
        .unwrap()
        .change_dictionary_display_name(&body.name, &body.display)
        .map_err(error_response)?;
    Ok(Json(json!({ "success": true })))
}

pub async fn api_headword_count(
    State(ctx): State<AppContext>,
    Json(body): Json<NamedRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    let engine = ctx.engine.clone();
    let count = blocking(move || engine.headword_count(&body.name)).await?;
    Ok(Json(json!({ "count": count })))
}

// ---------------------------------------------------------------------------
// Management: sources
// ---------------------------------------------------------------------------

pub async fn api_sources(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    Json(json!(ctx.engine.settings.lock().unwrap().misc.sources))
}

#[derive(Deserialize)]
pub struct SourceRequest {
    source: PathBuf,
}

pub async fn api_add_source(
    State(ctx): State<AppContext>,
    Json(body): Json<SourceRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    {
        let mut settings = ctx.engine.settings.lock().unwrap();
        if !settings.source_valid(&body.source) {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "source is not a writable directory" })),
            )
                .into_response());
        }
        settings.add_source(body.source).map_err(error_response)?;
    }
    Ok(Json(json!(ctx.engine.settings.lock().unwrap().misc.sources)))
}

pub async fn api_remove_source(
    State(ctx): State<AppContext>,
    Json(body): Json<SourceRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    let mut settings = ctx.engine.settings.lock().unwrap();
    settings.remove_source(&body.source).map_err(error_response)?;
    Ok(Json(json!(settings.misc.sources)))
}

pub async fn api_scan(
    State(ctx): State<AppContext>,
) -> Result<Json<serde_json::Value>, Response> {
    let engine = ctx.engine.clone();
    blocking(move || {
        engine.scan_sources();
        Ok(())
    })
    .await?;
    Ok(Json(catalog_state(&ctx)))
}

// ---------------------------------------------------------------------------
// Management: groups and the junction table
// ---------------------------------------------------------------------------

fn group_state(ctx: &AppContext) -> serde_json::Value {
    let settings = ctx.engine.settings.lock().unwrap();
    json!({
        "groups": settings.groups,
        "groupings": settings.dictionary_groupings(),
    })
}

pub async fn api_groups(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    Json(json!(ctx.engine.settings.lock().unwrap().groups))
}

pub async fn api_add_group(
    State(ctx): State<AppContext>,
    Json(body): Json<GroupInfo>,
) -> Result<Json<serde_json::Value>, Response> {
    {
        let mut settings = ctx.engine.settings.lock().unwrap();
        if !settings.group_valid(&body) {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid group or language tags" })),
            )
                .into_response());
        }
        settings.add_group(body).map_err(error_response)?;
    }
    Ok(Json(group_state(&ctx)))
}

pub async fn api_remove_group(
    State(ctx): State<AppContext>,
    Json(body): Json<NamedRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    ctx.engine
        .settings
        .lock()
        .unwrap()
        .remove_group_by_name(&body.name)
        .map_err(error_response)?;
    Ok(Json(group_state(&ctx)))
}

pub async fn api_reorder_groups(
    State(ctx): State<AppContext>,
    Json(body): Json<Vec<GroupInfo>>,
) -> Result<Json<serde_json::Value>, Response> {
    ctx.engine.settings.lock().unwrap().reorder_groups(body).map_err(error_response)?;
    Ok(Json(json!(ctx.engine.settings.lock().unwrap().groups)))
}

#[derive(Deserialize)]
pub struct GroupLangRequest {
    name: String,
    lang: BTreeSet<String>,
}

pub async fn api_change_group_lang(
    State(ctx): State<AppContext>,
    Json(body): Json<GroupLangRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    ctx.engine
        .settings
        .lock()
        .unwrap()
        .change_group_lang(&body.name, body.lang)
        .map_err(error_response)?;
    Ok(Json(json!(ctx.engine.settings.lock().unwrap().groups)))
}

#[derive(Deserialize)]
pub struct RenameGroupRequest {
    old: String,
    new: String,
}

pub async fn api_change_group_name(
    State(ctx): State<AppContext>,
    Json(body): Json<RenameGroupRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    ctx.engine
        .settings
        .lock()
        .unwrap()
        .change_group_name(&body.old, &body.new)
        .map_err(error_response)?;
    Ok(Json(group_state(&ctx)))
}

pub async fn api_groupings(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    Json(json!(ctx.engine.settings.lock().unwrap().dictionary_groupings()))
}

#[derive(Deserialize)]
pub struct JunctionRequest {
    dictionary_name: String,
    group_name: String,
}

pub async fn api_group_add_dictionary(
    State(ctx): State<AppContext>,
    Json(body): Json<JunctionRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    ctx.engine
        .settings
        .lock()
        .unwrap()
        .add_dictionary_to_group(&body.dictionary_name, &body.group_name)
        .map_err(error_response)?;
    Ok(Json(json!(ctx.engine.settings.lock().unwrap().dictionary_groupings())))
}

pub async fn api_group_remove_dictionary(
    State(ctx): State<AppContext>,
    Json(body): Json<JunctionRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    ctx.engine
        .settings
        .lock()
        .unwrap()
        .remove_dictionary_from_group(&body.dictionary_name, &body.group_name)
        .map_err(error_response)?;
    Ok(Json(json!(ctx.engine.settings.lock().unwrap().dictionary_groupings())))
}

// ---------------------------------------------------------------------------
// Management: history and knobs
// ---------------------------------------------------------------------------

pub async fn api_history(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    Json(json!(ctx.engine.settings.lock().unwrap().history))
}

pub async fn api_clear_history(
    State(ctx): State<AppContext>,
) -> Result<Json<serde_json::Value>, Response> {
    let mut settings = ctx.engine.settings.lock().unwrap();
    settings.clear_history().map_err(error_response)?;
    Ok(Json(json!(settings.history)))
}

pub async fn api_history_size(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    Json(json!({ "size": ctx.engine.settings.lock().unwrap().misc.history_size }))
}

#[derive(Deserialize)]
pub struct SizeRequest {
    size: usize,
}

pub async fn api_set_history_size(
    State(ctx): State<AppContext>,
    Json(body): Json<SizeRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    let mut settings = ctx.engine.settings.lock().unwrap();
    settings.set_history_size(body.size).map_err(error_response)?;
    Ok(Json(json!(settings.history)))
}

pub async fn api_num_suggestions(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    Json(json!({ "size": ctx.engine.settings.lock().unwrap().misc.num_suggestions }))
}

pub async fn api_set_num_suggestions(
    State(ctx): State<AppContext>,
    Json(body): Json<SizeRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    let mut settings = ctx.engine.settings.lock().unwrap();
    settings.set_num_suggestions(body.size).map_err(error_response)?;
    Ok(Json(json!({ "size": settings.misc.num_suggestions })))
}

pub async fn api_create_ngram_table(
    State(ctx): State<AppContext>,
) -> Result<Json<serde_json::Value>, Response> {
    let engine = ctx.engine.clone();
    blocking(move || engine.rebuild_ngram_table()).await?;
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn articles_render_inside_namespaced_containers() {
        let articles = vec![ArticleResult {
            dictionary: "d-oxford".into(),
            display_name: "Oxford".into(),
            html: "<p>def</p>".into(),
        }];
        let html = render_articles(&articles);
        assert!(html.contains("<h2 class=\"dictionary-name\">Oxford</h2>"));
        assert!(html.contains("<div id=\"d-oxford\"><p>def</p></div>"));
    }

    #[test]
    fn no_results_page_links_suggestions_and_skips_padding() {
        let html = render_no_results("G", "kat", &["cat".into(), "".into(), "".into()]);
        assert!(html.contains("No entries found for <b>kat</b>"));
        assert!(html.contains("<a href=\"/api/query/G/cat\">cat</a>"));
        assert_eq!(html.matches("<li>").count(), 1);
    }

    #[test]
    fn cache_content_types_cover_the_common_media() {
        assert_eq!(content_type_of(std::path::Path::new("a.css")), "text/css");
        assert_eq!(content_type_of(std::path::Path::new("a.mp3")), "audio/mpeg");
        assert_eq!(
            content_type_of(std::path::Path::new("a.bin")),
            "application/octet-stream"
        );
    }
}
