// tests/api_http.rs
//
// HTTP-level tests for the read API without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use doomsday_monitor::analyze::{self, venues::AreaLabel, ScoringClock};
use doomsday_monitor::api::{self, AppState, RETRY_AFTER_SECS};
use doomsday_monitor::ingest::scheduler::RefreshRuntime;
use doomsday_monitor::model::{Assessment, PopularDay, RawPlace, RawQuote, RiskItem};
use doomsday_monitor::store::MemoryStore;
use doomsday_monitor::FeedCache;

const BODY_LIMIT: usize = 1024 * 1024;

fn state(cache: FeedCache, store: Arc<MemoryStore>) -> AppState {
    AppState {
        cache,
        store,
        collection: "analyses".to_string(),
        runtime: Arc::new(RefreshRuntime::new()),
    }
}

async fn get(app: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Json) {
    let resp = app
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .expect("oneshot");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.expect("read body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Json::String(String::from_utf8_lossy(&bytes).into()));
    (status, headers, json)
}

fn publish_all(cache: &FeedCache) {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    let stocks = [("LMT", 100.0, 90.0), ("NOC", 450.0, 450.0)]
        .iter()
        .map(|(t, c, p)| analyze::quotes::score_quote(&RawQuote::new(*t, Some(*c), Some(*p))))
        .collect();
    cache.quotes.publish(analyze::quotes::build_snapshot(stocks, now));

    let item = |title: &str, severity: f64| RiskItem {
        title: title.into(),
        summary: String::new(),
        source: "Reuters".into(),
        published: "2024-05-01T11:00:00Z".into(),
        link: format!("https://example.com/{title}"),
        analysis: Assessment {
            severity,
            explanation: "test".into(),
        },
    };
    cache
        .risk
        .publish(analyze::risk::build_snapshot(vec![item("a", 0.2), item("b", 0.2)], now));

    let place = RawPlace {
        name: "Joe's Pizza".into(),
        address: "1 Main".into(),
        types: vec!["restaurant".into()],
        coordinates: Default::default(),
        rating: Some(4.5),
        rating_n: Some(10),
        current_popularity: Some(80),
        populartimes: vec![PopularDay {
            name: "Monday".into(),
            data: vec![40; 24],
        }],
        time_wait: None,
        time_spent: None,
    };
    cache.venues.publish(analyze::venues::build_snapshot(
        &[place],
        &ScoringClock::new(chrono::Weekday::Mon, 12),
        &AreaLabel {
            location: "Pentagon Area".into(),
            radius_miles: 5.0,
            search_type: "Pizza Places".into(),
        },
        None,
        now,
    ));
}

#[tokio::test]
async fn health_and_index() {
    let app = api::router(state(FeedCache::new(), Arc::new(MemoryStore::new())));
    let (status, _, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Json::String("OK".into()));

    let (status, _, body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["endpoints"]["/pizza"].is_string());
}

#[tokio::test]
async fn feeds_before_first_refresh_are_503_with_retry_after() {
    let app = api::router(state(FeedCache::new(), Arc::new(MemoryStore::new())));

    for (uri, feed) in [("/stocks", "stocks"), ("/news", "news"), ("/pizza", "pizza")] {
        let (status, headers, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{uri}");
        assert_eq!(
            headers.get(header::RETRY_AFTER).and_then(|v| v.to_str().ok()),
            Some(RETRY_AFTER_SECS.to_string().as_str())
        );
        assert_eq!(body["feed"], feed);
    }

    let (status, _, _) = get(&app, "/update").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn published_snapshots_are_served() {
    let cache = FeedCache::new();
    publish_all(&cache);
    let app = api::router(state(cache, Arc::new(MemoryStore::new())));

    let (status, _, body) = get(&app, "/stocks").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stocks"][0]["ticker"], "LMT");
    assert_eq!(body["stocks"][0]["change_percent"], 11.11);
    assert_eq!(body["stocks"][0]["status"], "increasing");
    assert_eq!(body["stocks"][1]["status"], "stable");
    assert_eq!(body["market_summary"]["overall_trend"], "bullish");

    let (_, _, body) = get(&app, "/news").await;
    assert_eq!(body["doomsday_probability"], 20.0);
    assert_eq!(
        body["interpretation"],
        "Some concerning developments, but nothing civilization-threatening"
    );
    assert_eq!(body["severity_distribution"]["counts"]["low"], 2);

    let (_, _, body) = get(&app, "/pizza").await;
    let status = &body["pizza_places"][0]["current_status"];
    assert_eq!(status["busyness_ratio"], 2.0);
    assert_eq!(status["percent_difference"], 100.0);
    assert_eq!(status["status"], "very_busy");
    assert_eq!(body["places_by_status"]["summary"]["total_unusually_busy"], 1);
}

#[tokio::test]
async fn update_persists_and_read_returns_latest() {
    let cache = FeedCache::new();
    let store = Arc::new(MemoryStore::new());
    let app = api::router(state(cache.clone(), store.clone()));

    let (status, _, _) = get(&app, "/read").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    publish_all(&cache);
    let (status, _, report) = get(&app, "/update").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["local_pizza_analysis"]["busyness_metrics"]["unusually_quiet_threshold"], -20.0);
    assert_eq!(report["news_analysis"]["detailed_news_analysis"]["articles_analyzed"], 2);
    // Timestamp document plus "latest".
    assert_eq!(store.len(), 2);

    let (status, _, latest) = get(&app, "/read").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest, report);
}

#[tokio::test]
async fn feed_health_lists_every_feed() {
    let cache = FeedCache::new();
    cache
        .quotes
        .publish(analyze::quotes::build_snapshot(vec![], Utc::now()));
    let app = api::router(state(cache, Arc::new(MemoryStore::new())));

    let (status, _, body) = get(&app, "/health/feeds").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().expect("array");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["feed"], "stocks");
    assert_eq!(rows[0]["ready"], true);
    assert_eq!(rows[1]["ready"], false);
    assert_eq!(rows[1]["consecutive_failures"], 0);

    // The not-ready body names the feed exactly as the health row does.
    let (status, _, not_ready) = get(&app, "/news").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(not_ready["feed"], rows[1]["feed"]);
    assert_eq!(rows[2]["feed"], "pizza");
}
