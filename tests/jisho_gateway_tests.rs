use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use kanji_tracker::services::jisho::{JishoClient, JishoConfig, JishoError};

/// Config with intervals shrunk so the tests run in milliseconds.
fn fast_config(base_url: String) -> JishoConfig {
    JishoConfig {
        base_url,
        min_request_interval: Duration::from_millis(10),
        cache_ttl: Duration::from_secs(3600),
        request_timeout: Duration::from_secs(5),
        max_attempts: 3,
        backoff_base: Duration::from_millis(5),
    }
}

async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn kanji_json(character: &str) -> serde_json::Value {
    json!({
        "found": true,
        "query": character,
        "onyomi": ["ニチ"],
        "kunyomi": ["ひ"],
        "meaning": "day, sun",
        "strokeCount": 4,
        "jlptLevel": "N5",
        "grade": "1",
    })
}

/// Stub that answers every kanji query successfully and counts calls.
fn counting_kanji_stub(calls: Arc<AtomicUsize>) -> Router {
    Router::new().route(
        "/search/kanji",
        get(move |Query(params): Query<HashMap<String, String>>| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let keyword = params.get("keyword").cloned().unwrap_or_default();
                Json(kanji_json(&keyword))
            }
        }),
    )
}

#[tokio::test]
async fn cached_lookup_suppresses_second_upstream_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let base_url = spawn_stub(counting_kanji_stub(Arc::clone(&calls))).await;

    let client = JishoClient::new(fast_config(base_url));

    let first = client.lookup_kanji("日").await.unwrap();
    let second = client.lookup_kanji("日").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn expired_cache_entry_triggers_exactly_one_refetch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let base_url = spawn_stub(counting_kanji_stub(Arc::clone(&calls))).await;

    let client = JishoClient::new(JishoConfig {
        cache_ttl: Duration::from_millis(50),
        ..fast_config(base_url)
    });

    client.lookup_kanji("日").await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    client.lookup_kanji("日").await.unwrap();
    client.lookup_kanji("日").await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rate_limit_floors_wall_clock_across_distinct_lookups() {
    let calls = Arc::new(AtomicUsize::new(0));
    let base_url = spawn_stub(counting_kanji_stub(Arc::clone(&calls))).await;

    let interval = Duration::from_millis(100);
    let client = JishoClient::new(JishoConfig {
        min_request_interval: interval,
        ..fast_config(base_url)
    });

    let started = Instant::now();
    client.lookup_kanji("日").await.unwrap();
    client.lookup_kanji("月").await.unwrap();
    client.lookup_kanji("火").await.unwrap();

    // Three distinct lookups mean two enforced gaps.
    assert!(started.elapsed() >= interval * 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn not_found_is_surfaced_and_never_cached() {
    let calls = Arc::new(AtomicUsize::new(0));
    let stub = Router::new().route(
        "/search/kanji",
        get({
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Json(json!({ "found": false }))
                }
            }
        }),
    );
    let base_url = spawn_stub(stub).await;

    let client = JishoClient::new(fast_config(base_url));

    assert!(matches!(
        client.lookup_kanji("ア").await,
        Err(JishoError::NotFound)
    ));
    assert!(matches!(
        client.lookup_kanji("ア").await,
        Err(JishoError::NotFound)
    ));

    // Both misses reached upstream.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn upstream_failure_is_retried_before_erroring() {
    let calls = Arc::new(AtomicUsize::new(0));
    let stub = Router::new().route(
        "/search/kanji",
        get({
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }),
    );
    let base_url = spawn_stub(stub).await;

    let client = JishoClient::new(fast_config(base_url));

    assert!(matches!(
        client.lookup_kanji("日").await,
        Err(JishoError::Upstream(_))
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn transient_failure_recovers_within_retry_budget() {
    let calls = Arc::new(AtomicUsize::new(0));
    let stub = Router::new().route(
        "/search/kanji",
        get({
            let calls = Arc::clone(&calls);
            move |Query(params): Query<HashMap<String, String>>| {
                let calls = Arc::clone(&calls);
                async move {
                    // First two attempts fail, the third answers.
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        return StatusCode::BAD_GATEWAY.into_response();
                    }
                    let keyword = params.get("keyword").cloned().unwrap_or_default();
                    Json(kanji_json(&keyword)).into_response()
                }
            }
        }),
    );
    let base_url = spawn_stub(stub).await;

    let client = JishoClient::new(fast_config(base_url));

    let data = client.lookup_kanji("日").await.unwrap();
    assert_eq!(data.character, "日");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn word_validation_degrades_to_invalid_on_upstream_failure() {
    let stub = Router::new().route(
        "/search/words",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR.into_response() }),
    );
    let base_url = spawn_stub(stub).await;

    let client = JishoClient::new(fast_config(base_url));

    let validation = client.lookup_word("日本", None).await;
    assert!(!validation.is_valid);
    assert!(validation.suggestions.is_empty());
}

#[tokio::test]
async fn word_validation_returns_suggestions_on_rejection() {
    let stub = Router::new().route(
        "/search/words",
        get(|| async {
            Json(json!({
                "data": [
                    {
                        "japanese": [{ "word": "日本", "reading": "にほん" }],
                        "senses": [{ "english_definitions": ["Japan"] }],
                    },
                ],
            }))
        }),
    );
    let base_url = spawn_stub(stub).await;

    let client = JishoClient::new(fast_config(base_url));

    let validation = client.lookup_word("日木", None).await;
    assert!(!validation.is_valid);
    assert_eq!(validation.suggestions.len(), 1);
    assert_eq!(validation.suggestions[0].word.as_deref(), Some("日本"));

    let validation = client.lookup_word("日本", Some("にほん")).await;
    assert!(validation.is_valid);
}

#[tokio::test]
async fn jlpt_search_filters_and_truncates() {
    let stub = Router::new().route(
        "/search/kanji",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            assert_eq!(params.get("jlpt").map(String::as_str), Some("N5"));
            Json(json!({
                "data": [
                    kanji_json("日"),
                    kanji_json("月"),
                    { "found": true, "query": "鬱", "onyomi": ["ウツ"], "kunyomi": [], "jlptLevel": "N1" },
                    kanji_json("火"),
                ],
            }))
        }),
    );
    let base_url = spawn_stub(stub).await;

    let client = JishoClient::new(fast_config(base_url));

    let kanji = client.kanji_by_jlpt_level("N5", 2).await.unwrap();
    assert_eq!(kanji.len(), 2);
    assert!(kanji.iter().all(|k| k.jlpt_level == "N5"));
}
