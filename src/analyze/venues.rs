// src/analyze/venues.rs
//! Venue busyness: compares live popularity with the venue's own weekly table
//! for the current weekday/hour and ranks venues by how unusual they are.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};

use super::scoring::{round1, round2};
use crate::model::{
    Baseline, BusynessStatus, CurrentStatus, PopularDay, Ratings, RawPlace, StatusDistribution,
    StatusSummary, VenueMetadata, VenueRecord, VenueSnapshot, WeeklyPeak,
};

/// Local weekday/hour the venues are scored against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringClock {
    pub weekday: String,
    pub hour: usize,
}

impl ScoringClock {
    pub fn new(weekday: Weekday, hour: u32) -> Self {
        Self {
            weekday: weekday_name(weekday).to_string(),
            hour: hour as usize,
        }
    }

    /// Host-local wall clock.
    pub fn now_local() -> Self {
        let now = chrono::Local::now();
        Self::new(now.weekday(), now.hour())
    }
}

pub fn weekday_name(d: Weekday) -> &'static str {
    match d {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Popularity for `weekday`/`hour` from the venue's own table; 0 if missing.
pub fn typical_popularity(days: &[PopularDay], weekday: &str, hour: usize) -> u32 {
    days.iter()
        .find(|d| d.name == weekday)
        .and_then(|d| d.data.get(hour).copied())
        .unwrap_or(0)
}

/// `current / typical`, or 1 with an insufficient baseline when typical is 0.
pub fn busyness_ratio(current: u32, typical: u32) -> (f64, Baseline) {
    if typical > 0 {
        (current as f64 / typical as f64, Baseline::Available)
    } else {
        (1.0, Baseline::Insufficient)
    }
}

pub fn percent_difference(ratio: f64) -> f64 {
    round1((ratio - 1.0) * 100.0)
}

/// Strict thresholds: exactly 20.0 is still typical.
pub fn classify(percent_difference: f64) -> BusynessStatus {
    if percent_difference > 50.0 {
        BusynessStatus::VeryBusy
    } else if percent_difference > 20.0 {
        BusynessStatus::Busy
    } else if percent_difference < -50.0 {
        BusynessStatus::VeryQuiet
    } else if percent_difference < -20.0 {
        BusynessStatus::Quiet
    } else {
        BusynessStatus::Typical
    }
}

/// Peak value and its first hour for each day that has data.
pub fn weekly_peaks(days: &[PopularDay]) -> BTreeMap<String, WeeklyPeak> {
    let mut out = BTreeMap::new();
    for d in days {
        let Some(&peak) = d.data.iter().max() else {
            continue;
        };
        let peak_hour = d.data.iter().position(|&v| v == peak).unwrap_or(0);
        out.insert(
            d.name.clone(),
            WeeklyPeak {
                hourly_data: d.data.clone(),
                peak_hour,
                peak_popularity: peak,
            },
        );
    }
    out
}

/// Score one venue. `None` when the venue has no live popularity.
pub fn score_place(place: &RawPlace, clock: &ScoringClock) -> Option<VenueRecord> {
    let current = place.current_popularity?;
    let typical = typical_popularity(&place.populartimes, &clock.weekday, clock.hour);
    let (ratio, baseline) = busyness_ratio(current, typical);
    let pct = percent_difference(ratio);

    Some(VenueRecord {
        name: place.name.clone(),
        address: place.address.clone(),
        coordinates: place.coordinates.clone(),
        current_status: CurrentStatus {
            current_popularity: current,
            typical_popularity: typical,
            busyness_ratio: round2(ratio),
            percent_difference: pct,
            status: classify(pct),
            baseline,
        },
        ratings: Ratings {
            google_rating: place.rating,
            number_of_ratings: place.rating_n,
        },
        place_types: place.types.clone(),
        weekly_popularity: weekly_peaks(&place.populartimes),
        wait_time_minutes: place.time_wait.clone(),
        time_spent_minutes: place.time_spent.clone(),
    })
}

/// Most unusual first (by |percent difference|), stable on ties, optionally capped.
pub fn rank(mut records: Vec<VenueRecord>, max: Option<usize>) -> Vec<VenueRecord> {
    records.sort_by(|a, b| {
        let ka = a.current_status.percent_difference.abs();
        let kb = b.current_status.percent_difference.abs();
        kb.total_cmp(&ka)
    });
    if let Some(n) = max {
        records.truncate(n);
    }
    records
}

pub fn status_distribution(records: &[VenueRecord]) -> StatusDistribution {
    let mut places: BTreeMap<String, Vec<String>> = BusynessStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), Vec::new()))
        .collect();
    for r in records {
        places
            .entry(r.current_status.status.as_str().to_string())
            .or_default()
            .push(r.name.clone());
    }
    let count = |s: BusynessStatus| places.get(s.as_str()).map_or(0, Vec::len);
    let summary = StatusSummary {
        total_unusually_busy: count(BusynessStatus::VeryBusy) + count(BusynessStatus::Busy),
        total_unusually_quiet: count(BusynessStatus::VeryQuiet) + count(BusynessStatus::Quiet),
        total_typical: count(BusynessStatus::Typical),
    };
    let counts = places.iter().map(|(k, v)| (k.clone(), v.len())).collect();
    StatusDistribution {
        counts,
        places,
        summary,
    }
}

/// Static description of the search area carried into the snapshot metadata.
#[derive(Debug, Clone)]
pub struct AreaLabel {
    pub location: String,
    pub radius_miles: f64,
    pub search_type: String,
}

pub fn build_snapshot(
    unique_places: &[RawPlace],
    clock: &ScoringClock,
    area: &AreaLabel,
    max_places: Option<usize>,
    now: DateTime<Utc>,
) -> VenueSnapshot {
    let scored: Vec<VenueRecord> = unique_places
        .iter()
        .filter_map(|p| score_place(p, clock))
        .collect();
    let with_data = scored.len();
    let ranked = rank(scored, max_places);

    VenueSnapshot {
        timestamp: now,
        metadata: VenueMetadata {
            location: area.location.clone(),
            radius_miles: area.radius_miles,
            search_type: area.search_type.clone(),
            current_time: format!("{}:00", clock.hour),
            current_day: clock.weekday.clone(),
            total_pizza_places_found: unique_places.len(),
            places_with_current_data: with_data,
        },
        places_by_status: status_distribution(&ranked),
        pizza_places: ranked,
    }
}
