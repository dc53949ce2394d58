// src/ingest/venues.rs
use std::collections::HashSet;

use metrics::counter;

use crate::error::FetchError;
use crate::ingest::types::{Fetched, PlacesProvider, SearchArea};
use crate::model::RawPlace;

/// Case-insensitive match of `keyword` against the type list or the name.
pub fn matches_keyword(place: &RawPlace, keyword: &str) -> bool {
    let kw = keyword.to_lowercase();
    place.types.iter().any(|t| t.to_lowercase().contains(&kw)) || place.name.to_lowercase().contains(&kw)
}

/// Keep the first occurrence of each (name, address) pair.
pub fn dedup_places(places: Vec<RawPlace>) -> Vec<RawPlace> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    places
        .into_iter()
        .filter(|p| seen.insert((p.name.clone(), p.address.clone())))
        .collect()
}

/// Query every place type, union the keyword matches and dedup them.
/// One failing query degrades to partial results; all failing is systemic.
pub async fn fetch_venues(
    provider: &dyn PlacesProvider,
    area: &SearchArea,
    place_types: &[String],
    keyword: &str,
) -> Fetched<RawPlace> {
    super::ensure_metrics_described();

    let mut matched = Vec::new();
    let mut failures = 0usize;
    let mut last_error: Option<FetchError> = None;

    for place_type in place_types {
        match provider.search(place_type, area).await {
            Ok(results) => {
                let n = results.len();
                matched.extend(results.into_iter().filter(|p| matches_keyword(p, keyword)));
                tracing::debug!(target: "ingest", place_type = %place_type, results = n, "places query done");
            }
            Err(e) => {
                tracing::warn!(target: "ingest", place_type = %place_type, error = %e, provider = provider.name(), "places query failed");
                counter!("ingest_item_errors_total", "feed" => "pizza").increment(1);
                failures += 1;
                last_error = Some(e);
            }
        }
    }

    if !place_types.is_empty() && failures == place_types.len() {
        return Fetched::failed(FetchError::AllFailed {
            attempted: place_types.len(),
            last: last_error.map(|e| e.to_string()).unwrap_or_default(),
        });
    }

    let before = matched.len();
    let unique = dedup_places(matched);
    counter!("ingest_items_total", "feed" => "pizza").increment(unique.len() as u64);
    counter!("ingest_dropped_total", "feed" => "pizza").increment((before - unique.len()) as u64);
    Fetched::ok(unique)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str, address: &str, types: &[&str]) -> RawPlace {
        RawPlace {
            name: name.into(),
            address: address.into(),
            types: types.iter().map(|t| t.to_string()).collect(),
            coordinates: Default::default(),
            rating: None,
            rating_n: None,
            current_popularity: None,
            populartimes: vec![],
            time_wait: None,
            time_spent: None,
        }
    }

    #[test]
    fn keyword_matches_type_or_name() {
        assert!(matches_keyword(&p("Joe's", "a", &["Pizza_Restaurant"]), "pizza"));
        assert!(matches_keyword(&p("PIZZA Hut", "a", &["restaurant"]), "pizza"));
        assert!(!matches_keyword(&p("Taco Bell", "a", &["restaurant"]), "pizza"));
    }

    #[test]
    fn dedup_by_name_and_address() {
        let out = dedup_places(vec![
            p("Dominos", "1 Main", &[]),
            p("Dominos", "2 Main", &[]),
            p("Dominos", "1 Main", &["meal_takeaway"]),
        ]);
        assert_eq!(out.len(), 2);
        assert!(out[0].types.is_empty(), "first occurrence wins");
    }
}
