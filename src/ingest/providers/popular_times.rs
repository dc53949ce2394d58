// src/ingest/providers/popular_times.rs
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{decode_items, http_client, send_json, trim_base};
use crate::config::VenuesConfig;
use crate::error::FetchError;
use crate::ingest::types::{PlacesProvider, SearchArea};
use crate::model::RawPlace;

/// Either a bare array or `{"results": [...]}`. Elements stay raw so one
/// bad venue cannot sink the whole query.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SearchResponse {
    Bare(Vec<serde_json::Value>),
    Wrapped { results: Vec<serde_json::Value> },
}

impl SearchResponse {
    pub(crate) fn into_places(self) -> Vec<RawPlace> {
        match self {
            SearchResponse::Bare(v) | SearchResponse::Wrapped { results: v } => {
                decode_items(v, "pizza", "populartimes")
            }
        }
    }
}

/// Client for a popular-times service. The Maps key is forwarded so the
/// service can query Places on our behalf.
pub struct PopularTimesProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl PopularTimesProvider {
    pub fn new(cfg: &VenuesConfig) -> Result<Self, FetchError> {
        let timeout = Duration::from_secs(cfg.timeout_secs.max(1));
        Ok(Self {
            client: http_client(timeout)?,
            base_url: trim_base(&cfg.base_url).to_string(),
            api_key: cfg.api_key.clone(),
            timeout,
        })
    }
}

fn fmt_point(p: (f64, f64)) -> String {
    format!("{:.6},{:.6}", p.0, p.1)
}

#[async_trait]
impl PlacesProvider for PopularTimesProvider {
    async fn search(&self, place_type: &str, area: &SearchArea) -> Result<Vec<RawPlace>, FetchError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(FetchError::MissingCredential("GOOGLE_MAPS_API_KEY"))?;

        let req = self
            .client
            .get(format!("{}/search", self.base_url))
            .header("X-Api-Key", key)
            .query(&[
                ("type", place_type.to_string()),
                ("lower", fmt_point(area.lower)),
                ("upper", fmt_point(area.upper)),
                ("radius", area.radius_m.to_string()),
            ]);

        let body: SearchResponse = send_json(req, self.timeout, self.name()).await?;
        Ok(body.into_places())
    }

    fn name(&self) -> &'static str {
        "populartimes"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bare_and_wrapped_payloads() {
        let bare: SearchResponse =
            serde_json::from_str(r#"[{"name":"A","address":"1 St","types":["restaurant"]}]"#).unwrap();
        assert_eq!(bare.into_places()[0].name, "A");

        let wrapped: SearchResponse = serde_json::from_str(
            r#"{"results":[{"name":"B","populartimes":[{"name":"Monday","data":[0,1,2]}]}]}"#,
        )
        .unwrap();
        let places = wrapped.into_places();
        assert_eq!(places[0].populartimes[0].data, vec![0, 1, 2]);
        assert_eq!(places[0].address, "");
    }

    #[test]
    fn malformed_venue_is_skipped() {
        let body: SearchResponse =
            serde_json::from_str(r#"[{"name":"Good Pizza","current_popularity":50},{"address":"2 Main"}]"#)
                .unwrap();
        let places = body.into_places();
        assert_eq!(places.len(), 1);
        assert_eq!(places[0].name, "Good Pizza");
    }

    #[test]
    fn points_are_lat_comma_lng() {
        assert_eq!(fmt_point((38.8, -77.05)), "38.800000,-77.050000");
    }
}
