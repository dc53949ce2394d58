// src/analyze/mod.rs
//! Scoring engine: pure per-feed transforms plus the severity classifier.

pub mod ai_adapter;
pub mod quotes;
pub mod risk;
pub mod scoring;
pub mod venues;

pub use crate::analyze::ai_adapter::{build_classifier, Classifier, DynClassifier};
pub use crate::analyze::scoring::{round1, round2};
pub use crate::analyze::venues::ScoringClock;
