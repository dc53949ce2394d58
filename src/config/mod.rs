// src/config/mod.rs
pub mod ai;
pub mod app;

pub use ai::ClassifierConfig;
pub use app::{AppConfig, NewsConfig, QuotesConfig, StoreBackend, StoreConfig, VenuesConfig};
