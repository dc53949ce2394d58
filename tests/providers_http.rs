// tests/providers_http.rs
//
// Upstream providers against a local wiremock server.

use doomsday_monitor::config::{NewsConfig, QuotesConfig, VenuesConfig};
use doomsday_monitor::error::FetchError;
use doomsday_monitor::ingest::providers::{NewsApiProvider, PopularTimesProvider, YahooChartProvider};
use doomsday_monitor::ingest::{headlines, quotes, venues};
use doomsday_monitor::ingest::{HeadlineProvider, QuoteProvider, SearchArea};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fixture(name: &str) -> serde_json::Value {
    let p = format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name);
    let raw = std::fs::read_to_string(&p).unwrap_or_else(|e| panic!("read {p}: {e}"));
    serde_json::from_str(&raw).expect("fixture json")
}

fn quotes_cfg(base: &str) -> QuotesConfig {
    QuotesConfig {
        base_url: base.to_string(),
        timeout_secs: 2,
        ..QuotesConfig::default()
    }
}

#[tokio::test]
async fn yahoo_chart_prices_and_per_ticker_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/LMT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixture("yahoo_chart_lmt.json")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/BA"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let p = YahooChartProvider::new(&quotes_cfg(&server.uri())).unwrap();
    let q = p.fetch_quote("LMT").await.unwrap();
    assert_eq!(q.current, Some(100.0));
    assert_eq!(q.previous, Some(90.0));

    let tickers = vec!["LMT".to_string(), "BA".to_string()];
    let out = quotes::fetch_quotes(&p, &tickers).await;
    assert!(out.failure.is_none(), "one ticker failing is not systemic");
    assert_eq!(out.items.len(), 2);
    assert!(out.items[1].error.as_deref().unwrap_or("").contains("404"));
}

#[tokio::test]
async fn yahoo_unreachable_for_every_ticker_is_systemic() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let p = YahooChartProvider::new(&quotes_cfg(&server.uri())).unwrap();
    let tickers = vec!["LMT".to_string(), "NOC".to_string()];
    let err = quotes::fetch_quotes(&p, &tickers).await.into_result().unwrap_err();
    assert!(matches!(err, FetchError::AllFailed { attempted: 2, .. }));
}

#[tokio::test]
async fn newsapi_sends_key_header_and_cleans_articles() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/top-headlines"))
        .and(header("X-Api-Key", "test-key"))
        .and(query_param("country", "us"))
        .and(query_param("language", "en"))
        .and(query_param("pageSize", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixture("newsapi_top_headlines.json")))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = NewsConfig {
        base_url: server.uri(),
        api_key: Some("test-key".into()),
        cache_path: None,
        ..NewsConfig::default()
    };
    let p = NewsApiProvider::new(&cfg).unwrap();
    let out = headlines::fetch_headlines(&p, 100, 20).await;
    let items = out.into_result().unwrap();

    let titles: Vec<&str> = items.iter().map(|h| h.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Senate passes \"defense\" appropriations bill", "Local bakery wins award"]
    );
    assert_eq!(items[0].summary, "The Senate approved funding late Tuesday.");
    assert_eq!(items[0].source, "Reuters");
    assert_eq!(items[1].summary, "");
}

#[tokio::test]
async fn newsapi_error_payload_aborts_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/top-headlines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "error",
            "code": "apiKeyInvalid",
            "message": "Your API key is invalid"
        })))
        .mount(&server)
        .await;

    let cfg = NewsConfig {
        base_url: server.uri(),
        api_key: Some("bad".into()),
        ..NewsConfig::default()
    };
    let p = NewsApiProvider::new(&cfg).unwrap();
    let err = p.top_headlines(20).await.unwrap_err();
    assert!(matches!(err, FetchError::Upstream(ref m) if m.contains("invalid")));
}

#[tokio::test]
async fn popular_times_union_filters_and_dedups() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("type", "restaurant"))
        .and(query_param("radius", "8047"))
        .and(header("X-Api-Key", "maps-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixture("populartimes_restaurant.json")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("type", "meal_takeaway"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixture("populartimes_meal_takeaway.json")))
        .mount(&server)
        .await;

    let cfg = VenuesConfig {
        base_url: server.uri(),
        api_key: Some("maps-key".into()),
        ..VenuesConfig::default()
    };
    let p = PopularTimesProvider::new(&cfg).unwrap();
    let area = SearchArea::around(cfg.center_lat, cfg.center_lng, cfg.radius_miles, cfg.degrees_per_mile, cfg.search_radius_m);
    let out = venues::fetch_venues(&p, &area, &cfg.place_types, &cfg.keyword).await;
    let places = out.into_result().unwrap();

    let names: Vec<&str> = places.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Joe's Pizza", "Pentagon Pizza Co", "Domino's"]);
}

#[tokio::test]
async fn popular_times_one_query_down_is_partial() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("type", "restaurant"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("type", "meal_takeaway"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixture("populartimes_meal_takeaway.json")))
        .mount(&server)
        .await;

    let cfg = VenuesConfig {
        base_url: server.uri(),
        api_key: Some("k".into()),
        ..VenuesConfig::default()
    };
    let p = PopularTimesProvider::new(&cfg).unwrap();
    let area = SearchArea::around(38.8719, -77.0563, 5.0, 0.0145, 8047);
    let places = venues::fetch_venues(&p, &area, &cfg.place_types, "pizza")
        .await
        .into_result()
        .unwrap();
    assert_eq!(places.len(), 2);
}

#[tokio::test]
async fn popular_times_without_key_is_missing_credential() {
    let cfg = VenuesConfig::default();
    let p = PopularTimesProvider::new(&cfg).unwrap();
    let area = SearchArea::around(0.0, 0.0, 1.0, 0.0145, 100);
    let err = venues::fetch_venues(&p, &area, &cfg.place_types, "pizza")
        .await
        .into_result()
        .unwrap_err();
    assert!(matches!(err, FetchError::AllFailed { ref last, .. } if last.contains("GOOGLE_MAPS_API_KEY")));
}

#[tokio::test]
async fn popular_times_malformed_venue_is_skipped_not_fatal() {
    let server = MockServer::start().await;
    let body = serde_json::json!([
        {
            "name": "Good Pizza",
            "address": "1 Main",
            "types": ["restaurant"],
            "current_popularity": 60,
            "populartimes": [{"name": "Monday", "data": vec![30u32; 24]}]
        },
        {"address": "2 Main"}
    ]);
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let cfg = VenuesConfig {
        base_url: server.uri(),
        api_key: Some("k".into()),
        ..VenuesConfig::default()
    };
    let p = PopularTimesProvider::new(&cfg).unwrap();
    let area = SearchArea::around(38.8719, -77.0563, 5.0, 0.0145, 8047);
    let out = venues::fetch_venues(&p, &area, &cfg.place_types, "pizza").await;
    assert!(out.failure.is_none(), "unexpected failure: {:?}", out.failure);
    assert_eq!(out.items.len(), 1);
    assert_eq!(out.items[0].name, "Good Pizza");
}

#[tokio::test]
async fn newsapi_malformed_article_is_skipped_not_fatal() {
    let server = MockServer::start().await;
    let body = serde_json::json!({
        "status": "ok",
        "totalResults": 2,
        "articles": [
            {"title": ["not", "a", "string"], "url": "https://bad.example/1"},
            {"source": {"id": null, "name": "AP"}, "title": "Kept headline",
             "description": "d", "url": "https://ap.example/2", "publishedAt": "2024-05-01T00:00:00Z"}
        ]
    });
    Mock::given(method("GET"))
        .and(path("/top-headlines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let cfg = NewsConfig {
        base_url: server.uri(),
        api_key: Some("news-key".into()),
        ..NewsConfig::default()
    };
    let p = NewsApiProvider::new(&cfg).unwrap();
    let arts = p.top_headlines(20).await.expect("batch survives");
    assert_eq!(arts.len(), 1);
    assert_eq!(arts[0].title.as_deref(), Some("Kept headline"));
}
