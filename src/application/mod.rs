// Application layer - Use cases and business logic
pub mod aggregator;
pub mod history_cache;
pub mod history_service;
pub mod host;
pub mod point_locator;
pub mod refresh;
pub mod series_builder;
